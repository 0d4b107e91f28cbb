//! Change notifications for collaborators that render the scene.
//!
//! Listeners are plain closures. They receive the changed collection by
//! reference after the mutation that triggered them has completed.

use sketchmotion_scene::prelude::*;

/// What changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeEvent {
    /// Animation or interaction records changed.
    AnimationDirectory,
    /// Entities were added, removed or restyled.
    EntityRegistry,
}

/// Listener for directory changes.
pub type DirectoryListener = Box<dyn FnMut(&AnimationDirectory)>;

/// Listener for registry changes.
pub type RegistryListener = Box<dyn FnMut(&EntityRegistry)>;

/// Fan-out of change notifications.
#[derive(Default)]
pub struct Notifier {
    directory: Vec<DirectoryListener>,
    registry: Vec<RegistryListener>,
}

impl Notifier {
    /// No listeners.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a directory listener.
    pub fn on_animation_directory_changed(&mut self, listener: DirectoryListener) {
        self.directory.push(listener);
    }

    /// Add a registry listener.
    pub fn on_entity_registry_changed(&mut self, listener: RegistryListener) {
        self.registry.push(listener);
    }

    /// Deliver `event` to the matching listeners.
    pub fn emit(&mut self, event: ChangeEvent, scene: &Scene) {
        tracing::trace!(?event, "change notification");
        match event {
            ChangeEvent::AnimationDirectory => {
                for listener in &mut self.directory {
                    listener(&scene.directory);
                }
            }
            ChangeEvent::EntityRegistry => {
                for listener in &mut self.registry {
                    listener(&scene.registry);
                }
            }
        }
    }

    /// Deliver both events, registry first.
    pub fn emit_all(&mut self, scene: &Scene) {
        self.emit(ChangeEvent::EntityRegistry, scene);
        self.emit(ChangeEvent::AnimationDirectory, scene);
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("directory_listeners", &self.directory.len())
            .field("registry_listeners", &self.registry.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn listeners_receive_matching_events_only() {
        let mut notifier = Notifier::new();
        let dir_hits = Rc::new(Cell::new(0));
        let reg_hits = Rc::new(Cell::new(0));
        let d = Rc::clone(&dir_hits);
        let r = Rc::clone(&reg_hits);
        notifier.on_animation_directory_changed(Box::new(move |_| d.set(d.get() + 1)));
        notifier.on_entity_registry_changed(Box::new(move |reg| {
            assert!(reg.is_empty());
            r.set(r.get() + 1)
        }));

        let scene = Scene::new();
        notifier.emit(ChangeEvent::AnimationDirectory, &scene);
        assert_eq!((dir_hits.get(), reg_hits.get()), (1, 0));
        notifier.emit_all(&scene);
        assert_eq!((dir_hits.get(), reg_hits.get()), (2, 1));
    }
}
