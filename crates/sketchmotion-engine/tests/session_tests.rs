//! Integration tests for the session surface: creating and reanimating
//! records, the deletion cascade, pause/resume and direct manipulation.

use std::cell::RefCell;
use std::rc::Rc;

use sketchmotion_engine::prelude::*;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn session() -> Session {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
    Session::new(EngineConfig::default()).unwrap()
}

fn shape(s: &mut Session, x: f64, y: f64) -> EntityId {
    s.add_entity(EntityDraft::shape(Vec2::new(x, y), Vec2::new(20.0, 20.0)))
}

fn pose(s: &Session, id: EntityId) -> Pose {
    s.registry().by_id(id).unwrap().pose()
}

// -- 1. Record lifecycle ----------------------------------------------------

#[test]
fn flock_rows_shrink_then_record_disappears() {
    let mut s = session();
    let a = shape(&mut s, 100.0, 100.0);
    let b = shape(&mut s, 200.0, 100.0);
    let c = shape(&mut s, 300.0, 100.0);

    let record = s
        .create_animation(BehaviorTag::Flock, &[a, b, c], AnimateOptions::prompt("birds"))
        .unwrap();
    assert_eq!(s.directory().animations().len(), 1);
    assert_eq!(record.data.len(), 3);
    let birds = record.entity_ids();
    for bird in &birds {
        assert_eq!(s.registry().by_id(*bird).unwrap().kind, EntityKind::Bird);
    }

    s.delete_entities(&[birds[1]]);
    assert_eq!(s.directory().animation(record.id).unwrap().data.len(), 2);

    s.delete_entities(&[birds[0], birds[2]]);
    assert!(s.directory().animation(record.id).is_none());
    assert!(s.animators().next().is_none());
    assert!(s.ticking().is_empty());
}

#[test]
fn reanimating_as_sway_replaces_record_and_keeps_title() {
    let mut s = session();
    let a = shape(&mut s, 100.0, 100.0);
    let b = shape(&mut s, 200.0, 100.0);
    let r1 = s
        .create_animation(BehaviorTag::Hop, &[a, b], AnimateOptions::prompt("bouncy things"))
        .unwrap();

    let r2 = s
        .reanimate(r1.id, BehaviorTag::Sway, &[a, b], AnimateOptions::default())
        .unwrap();
    assert_eq!(r2.behavior, BehaviorTag::Sway);
    assert_eq!(r2.title, "bouncy things");
    assert_eq!(s.directory().animations().len(), 1);
    assert_eq!(s.directory().animations()[0].behavior, BehaviorTag::Sway);
}

#[test]
fn reanimating_part_of_a_record_shrinks_it() {
    let mut s = session();
    let a = shape(&mut s, 100.0, 100.0);
    let b = shape(&mut s, 200.0, 100.0);
    let r1 = s
        .create_animation(BehaviorTag::Hop, &[a, b], AnimateOptions::prompt("hoppers"))
        .unwrap();

    let r2 = s
        .reanimate(r1.id, BehaviorTag::Sway, &[b], AnimateOptions::default())
        .unwrap();
    assert_eq!(r2.title, "hoppers");
    assert_eq!(s.directory().animation(r1.id).unwrap().entity_ids(), vec![a]);
    assert_eq!(s.animator(a).unwrap().behavior(), BehaviorTag::Hop);
    assert_eq!(s.animator(b).unwrap().behavior(), BehaviorTag::Sway);
}

#[test]
fn grouped_shapes_animate_as_one_unit() {
    let mut s = session();
    let g = GroupId(4);
    let a = s.add_entity(
        EntityDraft::shape(Vec2::new(100.0, 300.0), Vec2::new(20.0, 20.0)).with_group(g),
    );
    let b = s.add_entity(
        EntityDraft::shape(Vec2::new(130.0, 300.0), Vec2::new(20.0, 20.0)).with_group(g),
    );

    // Selecting one member animates the whole group.
    let record = s
        .create_animation(BehaviorTag::Hop, &[b], AnimateOptions::default())
        .unwrap();
    assert_eq!(record.data.len(), 1);
    let row = &record.data[0];
    assert!(row.is_group);
    assert_eq!(row.member_ids, vec![a, b]);
    assert_eq!(s.ticking(), &[row.entity_id]);

    s.run_ticks(20);
    let pa = pose(&s, a).position;
    let pb = pose(&s, b).position;
    assert!((pb.x - pa.x - 30.0).abs() < 1e-9);
    assert!((pb.y - pa.y).abs() < 1e-9);
}

#[test]
fn grouped_flock_collapses_into_one_bird() {
    let mut s = session();
    let g = GroupId(1);
    let a = s.add_entity(
        EntityDraft::shape(Vec2::new(100.0, 100.0), Vec2::new(20.0, 20.0)).with_group(g),
    );
    let b = s.add_entity(
        EntityDraft::shape(Vec2::new(140.0, 120.0), Vec2::new(20.0, 20.0)).with_group(g),
    );

    let record = s
        .create_animation(BehaviorTag::Flock, &[a], AnimateOptions::default())
        .unwrap();
    let row = &record.data[0];
    assert!(row.is_group);
    assert_eq!(row.member_ids, vec![a, b]);
    let bird = s.registry().by_id(row.entity_id).unwrap();
    assert_eq!(bird.kind, EntityKind::Bird);
    assert_eq!(bird.position, Vec2::new(120.0, 110.0));
    assert!(!s.registry().contains(a));
    assert!(!s.registry().contains(b));
}

// -- 2. Cascade -------------------------------------------------------------

#[test]
fn deleting_a_collapsed_bird_removes_its_record_and_links() {
    let mut s = session();
    let g = GroupId(1);
    let a = s.add_entity(
        EntityDraft::shape(Vec2::new(100.0, 100.0), Vec2::new(20.0, 20.0)).with_group(g),
    );
    s.add_entity(
        EntityDraft::shape(Vec2::new(140.0, 120.0), Vec2::new(20.0, 20.0)).with_group(g),
    );
    let rock = shape(&mut s, 600.0, 300.0);

    let flock = s
        .create_animation(BehaviorTag::Flock, &[a], AnimateOptions::default())
        .unwrap();
    let fixed = s
        .create_animation(BehaviorTag::Fixed, &[rock], AnimateOptions::default())
        .unwrap();
    s.link_interaction(flock.id, fixed.id, InteractionKind::Avoid, None)
        .unwrap();
    let bird = flock.data[0].entity_id;

    assert_eq!(s.delete_entities(&[bird]), vec![bird]);
    assert!(s.directory().animation(flock.id).is_none());
    assert!(s.directory().interactions().is_empty());
    assert!(s.directory().animation_for_entity(a).is_none());
    assert_eq!(s.registry().ids(), vec![rock]);
    assert!(s.animator(bird).is_none());
}

#[test]
fn deleting_a_record_endpoint_removes_its_interactions() {
    let mut s = session();
    let hopper = shape(&mut s, 100.0, 300.0);
    let rock = shape(&mut s, 600.0, 300.0);
    let hop = s
        .create_animation(BehaviorTag::Hop, &[hopper], AnimateOptions::default())
        .unwrap();
    let fixed = s
        .create_animation(BehaviorTag::Fixed, &[rock], AnimateOptions::default())
        .unwrap();
    let link = s
        .link_interaction(hop.id, fixed.id, InteractionKind::Avoid, None)
        .unwrap();

    s.delete_entities(&[rock]);
    assert!(s.directory().animation(fixed.id).is_none());
    assert!(s.directory().interaction(link.id).is_none());
    assert!(s.directory().animation(hop.id).is_some());
}

#[test]
fn deleting_one_member_deletes_the_whole_group() {
    let mut s = session();
    let g = GroupId(2);
    let a = s.add_entity(EntityDraft::shape(Vec2::new(10.0, 10.0), Vec2::new(5.0, 5.0)).with_group(g));
    let b = s.add_entity(EntityDraft::shape(Vec2::new(20.0, 10.0), Vec2::new(5.0, 5.0)).with_group(g));
    let c = shape(&mut s, 300.0, 300.0);

    let removed = s.delete_entities(&[b]);
    assert_eq!(removed, vec![a, b]);
    assert_eq!(s.registry().ids(), vec![c]);
}

// -- 3. Links ---------------------------------------------------------------

#[test]
fn link_validation_rejects_without_mutating() {
    let mut s = session();
    let a = shape(&mut s, 100.0, 100.0);
    let b = shape(&mut s, 300.0, 100.0);
    let sway = s
        .create_animation(BehaviorTag::Sway, &[a], AnimateOptions::default())
        .unwrap();
    let fixed = s
        .create_animation(BehaviorTag::Fixed, &[b], AnimateOptions::default())
        .unwrap();
    let depth = s.history().undo_depth();

    let err = s
        .link_interaction(sway.id, sway.id, InteractionKind::Orbit, None)
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidLink { .. }));

    let err = s
        .link_interaction(sway.id, fixed.id, InteractionKind::Avoid, None)
        .unwrap_err();
    assert!(err.to_string().contains("avoid"));

    let err = s
        .link_interaction(sway.id, AnimationId(99), InteractionKind::Orbit, None)
        .unwrap_err();
    assert!(matches!(err, EngineError::MissingAnimation { .. }));

    let err = s
        .link_interaction(
            sway.id,
            fixed.id,
            InteractionKind::Orbit,
            Some(InteractionParams::Avoid(AvoidParams::default())),
        )
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidLink { .. }));

    let err = s
        .link_interaction(
            sway.id,
            fixed.id,
            InteractionKind::Orbit,
            Some(InteractionParams::Orbit(OrbitParams {
                radius: -50.0,
                ..Default::default()
            })),
        )
        .unwrap_err();
    assert!(err.to_string().contains("orbit radius"), "{err}");

    let hopper = shape(&mut s, 500.0, 400.0);
    let hop = s
        .create_animation(BehaviorTag::Hop, &[hopper], AnimateOptions::default())
        .unwrap();
    let depth = s.history().undo_depth();
    let err = s
        .link_interaction(
            hop.id,
            fixed.id,
            InteractionKind::Avoid,
            Some(InteractionParams::Avoid(AvoidParams {
                jitter: f64::NAN,
                ..Default::default()
            })),
        )
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidLink { .. }));

    assert!(s.directory().interactions().is_empty());
    assert_eq!(s.history().undo_depth(), depth);
}

#[test]
fn orbit_link_records_initial_center() {
    let mut s = session();
    let moon = shape(&mut s, 100.0, 100.0);
    let planet = shape(&mut s, 400.0, 300.0);
    let sway = s
        .create_animation(BehaviorTag::Sway, &[moon], AnimateOptions::default())
        .unwrap();
    let fixed = s
        .create_animation(BehaviorTag::Fixed, &[planet], AnimateOptions::default())
        .unwrap();
    let link = s
        .link_interaction(sway.id, fixed.id, InteractionKind::Orbit, None)
        .unwrap();
    match link.params {
        InteractionParams::Orbit(ref p) => assert_eq!(p.center, Some(Vec2::new(400.0, 300.0))),
        ref other => panic!("unexpected params {other:?}"),
    }

    let removed = s.unlink(link.id).unwrap();
    assert_eq!(removed.id, link.id);
    assert!(matches!(
        s.unlink(link.id),
        Err(EngineError::MissingInteraction { .. })
    ));
}

// -- 4. Pause / resume ------------------------------------------------------

#[test]
fn pause_resume_without_move_is_exact() {
    let mut s = session();
    let leaf = shape(&mut s, 200.0, 200.0);
    s.create_animation(BehaviorTag::Sway, &[leaf], AnimateOptions::default())
        .unwrap();
    s.run_ticks(23);

    let before = s.registry().by_id(leaf).unwrap().clone();
    s.pause_entities(&[leaf]);
    assert!(s.animator(leaf).unwrap().is_paused());
    s.run_ticks(40);
    assert_eq!(pose(&s, leaf), before.pose());

    s.resume_entities(&[leaf]);
    let after = s.registry().by_id(leaf).unwrap();
    assert_eq!(after.pose(), before.pose());
    assert_eq!(after.behavior, before.behavior);
}

#[test]
fn pause_move_resume_rebases_without_jump() {
    let mut s = session();
    let leaf = shape(&mut s, 200.0, 200.0);
    s.create_animation(BehaviorTag::Sway, &[leaf], AnimateOptions::default())
        .unwrap();
    s.run_ticks(17);

    s.pause_all();
    let target = Vec2::new(500.0, 420.0);
    s.move_entity(leaf, target).unwrap();
    s.resume_all();
    assert_eq!(pose(&s, leaf).position, target);

    s.tick();
    let moved = pose(&s, leaf).position;
    assert!(moved.distance(target) < 1.0, "jumped to {moved:?}");
}

#[test]
fn selection_pauses_only_selected_units() {
    let mut s = session();
    let a = shape(&mut s, 100.0, 300.0);
    let b = shape(&mut s, 400.0, 300.0);
    s.create_animation(BehaviorTag::Hop, &[a, b], AnimateOptions::default())
        .unwrap();

    s.select(&[a]);
    s.pause_selection();
    assert!(s.animator(a).unwrap().is_paused());
    assert!(!s.animator(b).unwrap().is_paused());
    assert_eq!(s.ticking(), &[b]);

    s.resume_selection();
    assert_eq!(s.ticking(), &[b, a]);
}

// -- 5. Direct manipulation -------------------------------------------------

#[test]
fn drag_while_animating_moves_the_anchor() {
    let mut s = session();
    let leaf = shape(&mut s, 200.0, 200.0);
    s.create_animation(BehaviorTag::Sway, &[leaf], AnimateOptions::default())
        .unwrap();
    s.run_ticks(5);

    s.drag_start(leaf).unwrap();
    let grabbed = pose(&s, leaf).position;
    s.drag_move(leaf, grabbed + Vec2::new(50.0, 80.0)).unwrap();
    s.run_ticks(3);
    assert_eq!(pose(&s, leaf).position, grabbed + Vec2::new(50.0, 80.0));
    s.drag_end(leaf).unwrap();

    match s.registry().by_id(leaf).unwrap().behavior {
        BehaviorState::Sway { anchor, .. } => assert_eq!(anchor, grabbed + Vec2::new(50.0, 80.0)),
        ref other => panic!("unexpected state {other:?}"),
    }
    s.tick();
    assert!(pose(&s, leaf).position.distance(grabbed + Vec2::new(50.0, 80.0)) < 1.0);
}

#[test]
fn dragging_a_follower_moves_its_group() {
    let mut s = session();
    let g = GroupId(9);
    let a = s.add_entity(EntityDraft::shape(Vec2::new(100.0, 100.0), Vec2::new(10.0, 10.0)).with_group(g));
    let b = s.add_entity(EntityDraft::shape(Vec2::new(150.0, 100.0), Vec2::new(10.0, 10.0)).with_group(g));
    s.create_animation(BehaviorTag::Fixed, &[a], AnimateOptions::default())
        .unwrap();

    s.move_entity(b, Vec2::new(250.0, 200.0)).unwrap();
    assert_eq!(pose(&s, a).position, Vec2::new(200.0, 200.0));
    assert_eq!(pose(&s, b).position, Vec2::new(250.0, 200.0));
}

// -- 6. Notifications -------------------------------------------------------

#[test]
fn listeners_see_the_updated_collections() {
    let mut s = session();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let log = Rc::clone(&seen);
    s.on_animation_directory_changed(move |dir| log.borrow_mut().push(dir.animations().len()));
    let registry_sizes = Rc::new(RefCell::new(Vec::new()));
    let reg_log = Rc::clone(&registry_sizes);
    s.on_entity_registry_changed(move |reg| reg_log.borrow_mut().push(reg.len()));

    let a = shape(&mut s, 0.0, 0.0);
    s.create_animation(BehaviorTag::Fixed, &[a], AnimateOptions::default())
        .unwrap();
    s.delete_entities(&[a]);

    assert_eq!(*seen.borrow(), vec![1, 0]);
    assert_eq!(*registry_sizes.borrow(), vec![1, 1, 0]);
}
