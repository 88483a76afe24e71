use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rocket::fairing::AdHoc;

use questline_engine::Engine;

/// Background loops: the weekly league promotion/demotion pass and the
/// daily goal reset. In deployments with an external scheduler these are
/// disabled and the scheduler calls the engine directly.
pub fn stage(
    league_interval: Duration,
    daily_interval: Duration,
    running: Arc<AtomicBool>,
) -> AdHoc {
    AdHoc::on_ignite("Background jobs", move |rocket| async move {
        rocket.attach(AdHoc::on_liftoff("Periodic resets", move |rocket| {
            Box::pin(async move {
                let engine: Engine = rocket
                    .state::<Engine>()
                    .cloned()
                    .expect("Failed to get engine state");

                let league_engine = engine.clone();
                let league_running = running.clone();
                rocket::tokio::spawn(async move {
                    let mut interval = rocket::tokio::time::interval(league_interval);
                    // The first tick fires immediately; skip it.
                    interval.tick().await;
                    while league_running.load(Ordering::Relaxed) {
                        interval.tick().await;
                        if let Err(e) = league_engine.league.run_weekly_reset().await {
                            tracing::error!("Failed to run weekly league reset: {e:#?}");
                        }
                    }
                });

                rocket::tokio::spawn(async move {
                    let mut interval = rocket::tokio::time::interval(daily_interval);
                    interval.tick().await;
                    while running.load(Ordering::Relaxed) {
                        interval.tick().await;
                        if let Err(e) = engine.leveling.reset_daily_goals().await {
                            tracing::error!("Failed to reset daily goals: {e:#?}");
                        }
                    }
                });
            })
        }))
    })
}
