#[macro_use]
extern crate rocket;

mod entrypoints;
mod jobs;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::EnvFilter;

use questline_engine::store::InMemoryStore;
use questline_engine::{Engine, LogSink, StandardAchievements};
use shared::SkillNode;

#[derive(Debug, serde::Deserialize)]
pub struct Env {
    catalog_file: Option<PathBuf>,
    league_reset_minutes: Option<u32>,
    daily_reset_minutes: Option<u32>,
}

fn load_catalog(path: &PathBuf) -> anyhow::Result<Vec<SkillNode>> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

#[launch]
async fn rocket() -> _ {
    dotenv::dotenv().ok();

    let subscriber = tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().pretty());
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set subscriber");

    let env = envy::from_env::<Env>().expect("Failed to load environment variables");

    let store = Arc::new(InMemoryStore::new());
    if let Some(path) = &env.catalog_file {
        let catalog = load_catalog(path).expect("Failed to read the node catalog");
        store
            .seed_nodes(catalog)
            .await
            .expect("Node catalog failed validation");
    }

    let engine = Engine::new(
        store.clone(),
        store.clone(),
        store.clone(),
        Arc::new(StandardAchievements),
        Arc::new(LogSink),
    );

    let league_interval =
        Duration::from_secs(env.league_reset_minutes.unwrap_or(7 * 24 * 60) as u64 * 60);
    let daily_interval =
        Duration::from_secs(env.daily_reset_minutes.unwrap_or(24 * 60) as u64 * 60);
    let running = Arc::new(AtomicBool::new(true));
    let running_on_shutdown = running.clone();

    rocket::build()
        .manage(engine)
        .attach(entrypoints::stage())
        .attach(jobs::stage(league_interval, daily_interval, running))
        .attach(rocket::fairing::AdHoc::on_shutdown(
            "Stop background jobs",
            |_| {
                Box::pin(async move {
                    running_on_shutdown.store(false, Ordering::Relaxed);
                })
            },
        ))
}
