//! Process-wide tracing bootstrap, mirroring the reference architecture's
//! `tracing_subscriber::fmt()` + `EnvFilter` convention used by every
//! service's `main.rs`.

use tracing_subscriber::{EnvFilter, FmtSubscriber};

pub fn init(service_name: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        tracing::debug!("tracing subscriber already set");
    }
    tracing::info!(service = service_name, "logging initialized");
}
