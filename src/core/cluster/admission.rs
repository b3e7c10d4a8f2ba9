// src/core/cluster/admission.rs

use std::fmt::Debug;
use std::time::Duration;

/// Chooses the read deadline for the next request of a connection.
pub trait AdmissionControl: Send + Sync + Debug {
    /// `None` means no deadline.
    fn read_timeout(&self, keepalive: Duration) -> Option<Duration>;
}

/// Uses the configured keepalive as is. A zero keepalive disables the deadline.
#[derive(Debug, Default)]
pub struct KeepAlive;

impl AdmissionControl for KeepAlive {
    fn read_timeout(&self, keepalive: Duration) -> Option<Duration> {
        (!keepalive.is_zero()).then_some(keepalive)
    }
}
