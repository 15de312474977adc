//! Reporter that keeps lifecycle milestones for later assertions.

use std::sync::Mutex;

use crate::health::{HealthReporter, Lifecycle};

/// Owned copy of a [`Lifecycle`] milestone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Milestone {
    Bootstrapping,
    Configured,
    BootstrapFailed(String),
    Listening(String),
    Stopping,
    Stopped,
}

impl From<Lifecycle<'_>> for Milestone {
    fn from(event: Lifecycle<'_>) -> Self {
        match event {
            Lifecycle::Bootstrapping => Self::Bootstrapping,
            Lifecycle::Configured(_) => Self::Configured,
            Lifecycle::BootstrapFailed(error) => Self::BootstrapFailed(error.to_string()),
            Lifecycle::Listening(endpoint) => Self::Listening(endpoint.to_string()),
            Lifecycle::Stopping => Self::Stopping,
            Lifecycle::Stopped => Self::Stopped,
        }
    }
}

#[derive(Debug, Default)]
pub struct RecordingHealthReporter {
    seen: Mutex<Vec<Milestone>>,
}

impl RecordingHealthReporter {
    pub fn milestones(&self) -> Vec<Milestone> {
        self.seen.lock().expect("reporter lock").clone()
    }
}

impl HealthReporter for RecordingHealthReporter {
    fn report(&self, event: Lifecycle<'_>) {
        self.seen.lock().expect("reporter lock").push(event.into());
    }
}
