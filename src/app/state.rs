//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::net::Relay;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub relay: Arc<Relay>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let relay = Arc::new(Relay::from_config(&config));
        Self {
            config: Arc::new(config),
            relay,
        }
    }
}
