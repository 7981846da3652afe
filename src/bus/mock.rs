//! In-memory publisher mock for testing sagas without a broker.

use std::sync::Mutex;

use async_trait::async_trait;

use super::{BusError, EventPublisher, Result};
use crate::events::UserEvent;

/// Records published events; optionally fails every publish to simulate a
/// dead broker.
#[derive(Default)]
pub struct MockEventPublisher {
    published: Mutex<Vec<(String, UserEvent)>>,
    fail: Mutex<bool>,
}

impl MockEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent publish fail with a connection error.
    pub fn fail_publishes(&self) {
        *self.fail.lock().unwrap() = true;
    }

    /// Events published so far, with their destination queues.
    pub fn published(&self) -> Vec<(String, UserEvent)> {
        self.published.lock().unwrap().clone()
    }

    pub fn published_count(&self) -> usize {
        self.published.lock().unwrap().len()
    }
}

#[async_trait]
impl EventPublisher for MockEventPublisher {
    async fn publish(&self, event: &UserEvent, queue: &str) -> Result<()> {
        if *self.fail.lock().unwrap() {
            return Err(BusError::Connection("broker unreachable".to_string()));
        }
        self.published
            .lock()
            .unwrap()
            .push((queue.to_string(), event.clone()));
        Ok(())
    }
}
