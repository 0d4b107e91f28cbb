//! Headless demo -- a small flock avoiding a rock while a hopper orbits it.
//!
//! Run with:
//!   cargo run --example headless_flock -p sketchmotion-engine [config.json]
//!
//! Set `RUST_LOG=sketchmotion_engine=debug` to watch the session work.

use sketchmotion_engine::prelude::*;

fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    let mut session = Session::new(config)?;

    // Scene: five shapes to become birds, a rock and a hopper.
    let shapes: Vec<EntityId> = (0..5)
        .map(|i| {
            session.add_entity(
                EntityDraft::shape(
                    Vec2::new(120.0 + 40.0 * i as f64, 200.0 + 25.0 * i as f64),
                    Vec2::new(16.0, 16.0),
                )
                .with_color("#3a6ea5"),
            )
        })
        .collect();
    let rock = session.add_entity(
        EntityDraft::shape(Vec2::new(640.0, 360.0), Vec2::new(90.0, 70.0)).with_color("#6b5b4b"),
    );
    let hopper = session.add_entity(EntityDraft::shape(
        Vec2::new(400.0, 500.0),
        Vec2::new(24.0, 24.0),
    ));

    let flock = session.create_animation(
        BehaviorTag::Flock,
        &shapes,
        AnimateOptions::prompt("a flock of birds"),
    )?;
    let fixed = session.create_animation(
        BehaviorTag::Fixed,
        &[rock],
        AnimateOptions::prompt("a rock"),
    )?;
    let hop = session.create_animation(
        BehaviorTag::Hop,
        &[hopper],
        AnimateOptions::prompt("a hopping frog"),
    )?;
    session.link_interaction(flock.id, fixed.id, InteractionKind::Avoid, None)?;
    session.link_interaction(hop.id, fixed.id, InteractionKind::Orbit, None)?;

    session.run_ticks(600);

    for record in session.directory().animations() {
        println!("{} [{}] {} rows", record.title, record.behavior, record.data.len());
    }
    for bird in flock.entity_ids() {
        if let Some(e) = session.registry().by_id(bird) {
            let speed = e.behavior.velocity().map(Vec2::length).unwrap_or(0.0);
            println!(
                "  {bird}: ({:.1}, {:.1}) heading {:.0} speed {:.2}",
                e.position.x, e.position.y, e.rotation, speed
            );
        }
    }

    // Undo the orbit link, then bring it back.
    session.undo();
    println!("after undo: {} links", session.directory().interactions().len());
    session.redo();
    println!("after redo: {} links", session.directory().interactions().len());

    if let Some(snapshot) = session.history().current() {
        println!("snapshot digest {}", snapshot.digest());
    }
    Ok(())
}
