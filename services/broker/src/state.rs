//! Application state shared across request handlers.

use std::sync::Arc;

use crate::broker::Broker;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    broker: Broker,
}

impl AppState {
    pub fn new(broker: Broker) -> Self {
        Self {
            inner: Arc::new(AppStateInner { broker }),
        }
    }

    pub fn broker(&self) -> &Broker {
        &self.inner.broker
    }
}
