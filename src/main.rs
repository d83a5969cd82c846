use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

mod auth;
mod config;
mod error;
mod export;
mod html;
mod pipeline;
mod routes;
mod session;
mod strava;
mod track;

#[cfg(test)]
mod testing;

use crate::config::Config;
use crate::routes::App;

const PURGE_INTERVAL: Duration = Duration::from_secs(10 * 60);

#[tokio::main]
async fn main() {
    // A .env file is optional; variables may come from the environment directly.
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!("{err}. Set it in the environment or in a .env file.");
            std::process::exit(1);
        }
    };

    let bind_addr = config.bind_addr;
    let app = Arc::new(App::new(config));

    let sessions = app.sessions.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PURGE_INTERVAL);
        loop {
            interval.tick().await;
            let purged = sessions.purge_expired();
            if purged > 0 {
                debug!(purged, "expired sessions removed");
            }
        }
    });

    info!(%bind_addr, activity_type = %app.config.activity_type, "listening");
    warp::serve(routes::routes(app)).run(bind_addr).await;
}
