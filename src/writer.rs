//! Peer-to-peer writer: a small object bound to `(shared socket, peer
//! endpoint, own name)` whose sole operation sends an opaque
//! application-action datagram directly to the peer (spec.md §4.6).

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::UdpSocket;

use crate::error::CoreResult;
use crate::protocol::{classify, ActionClass, Message};

/// Borrows the owning peer agent's socket for the duration of each send; it
/// does not own the socket and never closes it.
#[derive(Debug)]
pub struct PeerWriter {
    own_name: String,
    socket: Arc<UdpSocket>,
    peer_addr: SocketAddr,
    logging: bool,
}

impl PeerWriter {
    pub(crate) fn new(own_name: String, socket: Arc<UdpSocket>, peer_addr: SocketAddr, logging: bool) -> Self {
        Self {
            own_name,
            socket,
            peer_addr,
            logging,
        }
    }

    /// The endpoint this writer sends to.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Sends an opaque application datagram to the bound peer. `action`
    /// must not collide with the six reserved directory tags (`S*`/`P*`) —
    /// doing so would misroute the message into a rendezvous channel at the
    /// recipient instead of its `peer_messages` queue (spec.md §4.6, §9).
    pub async fn write(&self, action: &str, message: &str) -> CoreResult<usize> {
        if self.logging && classify(action) != ActionClass::PeerMessage {
            log::warn!("writer: action `{action}` collides with a reserved directory tag");
        }
        let request = Message::request(action, &self.own_name, message);
        let encoded = request.encode()?;
        let sent = self.socket.send_to(&encoded, self.peer_addr).await?;
        Ok(sent)
    }
}
