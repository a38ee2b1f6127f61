//! Application state.

use crate::hub::Hub;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub hub: Hub,
}

impl AppState {
    pub fn new(hub: Hub) -> Self {
        Self { hub }
    }
}
