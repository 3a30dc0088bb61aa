mod coordinator;
mod driver;
mod engine;
mod executor;
mod languages;
mod problem;
mod queue;
mod rewards;
mod server;
mod verdict;
mod worker;

use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use crate::coordinator::Coordinator;
use crate::executor::{ProcessExecutor, DEFAULT_TIME_LIMIT_MS};
use crate::problem::JsonProblemStore;
use crate::queue::QueueClient;
use crate::rewards::JsonProfileStore;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("arena_judge=info".parse()?),
        )
        .init();

    dotenvy::dotenv().ok();

    languages::init_languages()?;
    info!("Loaded language configurations");

    let redis_url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".into());
    let queue = match QueueClient::connect(&redis_url).await {
        Ok(queue) => Some(queue),
        Err(e) => {
            warn!(
                "Redis unavailable ({:#}). Running in local fallback mode.",
                e
            );
            None
        }
    };

    let problems_path =
        std::env::var("PROBLEMS_PATH").unwrap_or_else(|_| "./files/problems.json".into());
    let profiles_path =
        std::env::var("PROFILES_PATH").unwrap_or_else(|_| "./files/profiles.json".into());

    let time_limit_ms = std::env::var("EXEC_TIME_LIMIT_MS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_TIME_LIMIT_MS);
    let executor = Arc::new(ProcessExecutor::new(time_limit_ms));
    info!("Per-test time limit: {} ms", time_limit_ms);

    // The worker pool shares the queue with the coordinator; this binary
    // runs one worker alongside the API.
    if let Some(queue) = queue.clone() {
        let worker_executor = executor.clone();
        tokio::spawn(async move {
            if let Err(e) = worker::run_worker(queue, worker_executor).await {
                tracing::error!("Worker loop exited: {:#}", e);
            }
        });
    }

    let coordinator = Arc::new(Coordinator::new(
        queue,
        Arc::new(JsonProblemStore::new(problems_path)),
        Arc::new(JsonProfileStore::new(profiles_path)),
        executor,
    ));

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:5000".into());
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Judge service listening on {}", bind_addr);

    axum::serve(listener, server::router(coordinator)).await?;

    Ok(())
}
