//! Snapshot history with bounded undo and redo stacks.
//!
//! [`History`] is a pure state machine over [`SceneSnapshot`]s. It tracks a
//! `current` snapshot (the state on screen), the `previous` one, and two
//! bounded stacks. Loading a snapshot into the scene is the caller's job:
//! [`History::undo`] and [`History::redo`] hand the snapshot out and enter
//! the busy state, and [`History::finish_load`] leaves it. While busy, every
//! save, undo and redo is ignored.

use std::collections::VecDeque;

use sketchmotion_scene::snapshot::SceneSnapshot;

/// Default depth of each stack.
pub const DEFAULT_CAPACITY: usize = 30;

/// Undo/redo bookkeeping.
#[derive(Debug, Clone)]
pub struct History {
    undo: VecDeque<SceneSnapshot>,
    redo: VecDeque<SceneSnapshot>,
    previous: Option<SceneSnapshot>,
    current: Option<SceneSnapshot>,
    capacity: usize,
    busy: bool,
}

impl History {
    /// Empty history whose stacks hold at most `capacity` snapshots each.
    pub fn new(capacity: usize) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: VecDeque::new(),
            previous: None,
            current: None,
            capacity: capacity.max(1),
            busy: false,
        }
    }

    /// Record `snapshot` as the new current state.
    ///
    /// Returns `false` (and changes nothing) while busy or when `snapshot`
    /// equals the current state.
    pub fn save(&mut self, snapshot: SceneSnapshot) -> bool {
        if self.busy {
            tracing::debug!("save ignored while a snapshot is loading");
            return false;
        }
        if self.current.as_ref() == Some(&snapshot) {
            return false;
        }
        if let Some(previous) = self.previous.take() {
            push_bounded(&mut self.undo, previous, self.capacity);
        }
        tracing::info!(
            digest = %snapshot.digest(),
            undo_depth = self.undo.len(),
            "history saved"
        );
        self.previous = self.current.take();
        self.current = Some(snapshot);
        self.redo.clear();
        true
    }

    /// Step back. Returns the snapshot to load and enters the busy state.
    pub fn undo(&mut self) -> Option<SceneSnapshot> {
        if self.busy || self.previous.is_none() {
            return None;
        }
        let target = self.previous.take()?;
        if let Some(current) = self.current.take() {
            push_bounded(&mut self.redo, current, self.capacity);
        }
        self.previous = self.undo.pop_back();
        self.current = Some(target.clone());
        self.busy = true;
        tracing::info!(digest = %target.digest(), "undo");
        Some(target)
    }

    /// Step forward. Returns the snapshot to load and enters the busy state.
    pub fn redo(&mut self) -> Option<SceneSnapshot> {
        if self.busy {
            return None;
        }
        let target = self.redo.pop_back()?;
        if let Some(previous) = self.previous.take() {
            push_bounded(&mut self.undo, previous, self.capacity);
        }
        self.previous = self.current.take();
        self.current = Some(target.clone());
        self.busy = true;
        tracing::info!(digest = %target.digest(), "redo");
        Some(target)
    }

    /// Leave the busy state once the loaded snapshot is on screen.
    pub fn finish_load(&mut self) {
        self.busy = false;
    }

    /// Whether a load is in progress.
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// Whether [`undo`](Self::undo) would do something.
    pub fn can_undo(&self) -> bool {
        !self.busy && self.previous.is_some()
    }

    /// Whether [`redo`](Self::redo) would do something.
    pub fn can_redo(&self) -> bool {
        !self.busy && !self.redo.is_empty()
    }

    /// The state on screen, as last saved or loaded.
    pub fn current(&self) -> Option<&SceneSnapshot> {
        self.current.as_ref()
    }

    /// Snapshots reachable by undo, `previous` included.
    pub fn undo_depth(&self) -> usize {
        self.undo.len() + usize::from(self.previous.is_some())
    }

    /// Snapshots reachable by redo.
    pub fn redo_depth(&self) -> usize {
        self.redo.len()
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

fn push_bounded(stack: &mut VecDeque<SceneSnapshot>, snapshot: SceneSnapshot, capacity: usize) {
    if stack.len() >= capacity {
        stack.pop_front();
    }
    stack.push_back(snapshot);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
