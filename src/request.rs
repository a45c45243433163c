//! Client request primitive: pairs an outbound request with a bounded wait
//! for its matching response (spec.md §4.4).
//!
//! Correlation is by action tag alone, never by nonce or sequence number —
//! the contract is that only one such request is in flight per action class
//! on a given client socket at a time.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;

use crate::collector::{Collector, Slots};
use crate::error::{CoreError, CoreResult};
use crate::protocol::{self, ActionClass, Message};

/// Serializes and sends a request to the directory, then awaits the
/// matching response on the collector's slot for that action's class.
pub struct RequestPrimitive {
    socket: Arc<UdpSocket>,
    directory_addr: SocketAddr,
    slots: Arc<Slots>,
    logging: bool,
}

impl RequestPrimitive {
    pub(crate) fn new(
        socket: Arc<UdpSocket>,
        directory_addr: SocketAddr,
        collector: &Collector,
        logging: bool,
    ) -> Self {
        Self {
            socket,
            directory_addr,
            slots: collector_slots(collector),
            logging,
        }
    }

    /// Sends `action` with `message` as the payload, addressed from
    /// `own_name`, and waits up to `timeout` for the paired response.
    ///
    /// - Unknown action → immediate error, nothing is sent.
    /// - Response with `has_error == true` → error carrying its message.
    /// - No response within `timeout` → [`CoreError::Timeout`].
    pub async fn request(
        &self,
        own_name: &str,
        action: &str,
        message: &str,
        timeout: Duration,
    ) -> CoreResult<Message> {
        let rx = match protocol::classify(action) {
            ActionClass::Registration => self.slots.registrations.register(),
            ActionClass::Lookup => self.slots.lookups.register(),
            ActionClass::Disconnection => self.slots.disconnections.register(),
            ActionClass::PeerMessage => return Err(CoreError::UnknownAction(action.to_string())),
        };

        let request = Message::request(action, own_name, message);
        let encoded = request.encode()?;
        self.socket.send_to(&encoded, self.directory_addr).await?;

        let response = match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => {
                // Sender half dropped without sending — the collector task
                // died. Surfaces identically to a timeout to the caller.
                if self.logging {
                    log::warn!("request: collector dropped while awaiting `{action}` response");
                }
                return Err(CoreError::Timeout(timeout.as_secs()));
            }
            Err(_) => return Err(CoreError::Timeout(timeout.as_secs())),
        };

        if response.has_error {
            return Err(CoreError::RemoteError(response.message));
        }

        Ok(response)
    }
}

fn collector_slots(collector: &Collector) -> Arc<Slots> {
    Arc::clone(&collector.slots)
}
