use std::time::Duration;

/// Transport tuning for a [`Client`](crate::Client).
///
/// These never travel on the wire; the wire-visible knobs live in
/// [`Options`](crate::Options).
#[derive(Clone, Copy, Debug)]
pub struct ClientConfig {
    /// TCP connect timeout.
    pub connect_timeout: Duration,
    /// Deadline for one whole call exchange. `None` leaves the call bound
    /// only to the caller dropping the future.
    pub call_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self { connect_timeout: Duration::from_secs(10), call_timeout: None }
    }
}
