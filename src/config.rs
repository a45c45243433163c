//! Configuration options enumerated in spec.md §6.

use std::time::Duration;

/// Bound on the `peer_messages` queue, the timeout applied to each
/// synchronous directory request, and whether the collector/request/writer
/// layers emit diagnostic log lines. Defaults to `true`, mirroring
/// [`crate::directory::DirectoryOptions::logging`].
#[derive(Debug, Clone, Copy)]
pub struct PeerOptions {
    pub max_msg_in_queue: usize,
    pub timeout_seconds: u64,
    pub logging: bool,
}

impl PeerOptions {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Default for PeerOptions {
    fn default() -> Self {
        Self {
            max_msg_in_queue: 10,
            timeout_seconds: 10,
            logging: true,
        }
    }
}
