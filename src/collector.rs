//! Client collector: the single inbound-demultiplexing task owned by each
//! peer agent (spec.md §4.3).
//!
//! Inbound datagrams are decoded and routed by action class into one of
//! three single-slot rendezvous channels (`registrations`, `lookups`,
//! `disconnections`) or into the bounded `peer_messages` queue. Routing
//! into a rendezvous slot relies on the request primitive's precondition
//! that only one request per action class is ever outstanding — by the
//! time a matching response arrives, [`RequestPrimitive::request`] has
//! already registered the slot that will receive it, so no actual blocking
//! is needed to realize the "rendezvous" semantics spec.md describes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::{CoreError, CoreResult};
use crate::protocol::{self, ActionClass, Message, MAX_MESSAGE_SIZE, P_DISCONNECT};

/// A single-slot rendezvous point: at most one outstanding waiter.
#[derive(Default)]
pub(crate) struct Slot(Mutex<Option<oneshot::Sender<Message>>>);

impl Slot {
    /// Registers a new waiter, returning the receiver half. Overwrites any
    /// stale, uncollected sender (the contract is that callers never
    /// overlap requests on the same action class).
    pub(crate) fn register(&self) -> oneshot::Receiver<Message> {
        let (tx, rx) = oneshot::channel();
        *self.0.lock() = Some(tx);
        rx
    }

    /// Delivers a response to whoever is currently waiting, if anyone.
    /// Returns `true` if a waiter was present and the value handed off.
    fn fill(&self, message: Message) -> bool {
        if let Some(tx) = self.0.lock().take() {
            tx.send(message).is_ok()
        } else {
            false
        }
    }
}

#[derive(Default)]
pub(crate) struct Slots {
    pub(crate) registrations: Slot,
    pub(crate) lookups: Slot,
    pub(crate) disconnections: Slot,
}

/// Owns demultiplexing state shared between the collector's reader task and
/// the request primitive. Exactly one [`Collector::start`] may succeed per
/// instance.
pub struct Collector {
    socket: Arc<UdpSocket>,
    pub(crate) slots: Arc<Slots>,
    peer_messages_tx: mpsc::Sender<Message>,
    peer_messages_rx: Mutex<Option<mpsc::Receiver<Message>>>,
    started: AtomicBool,
    logging: bool,
}

impl Collector {
    /// `max_msg_in_queue` bounds the `peer_messages` queue; `logging` gates
    /// this collector's diagnostic log lines (spec.md §6).
    pub fn new(socket: Arc<UdpSocket>, max_msg_in_queue: usize, logging: bool) -> Self {
        let (tx, rx) = mpsc::channel(max_msg_in_queue.max(1));
        Self {
            socket,
            slots: Arc::new(Slots::default()),
            peer_messages_tx: tx,
            peer_messages_rx: Mutex::new(Some(rx)),
            started: AtomicBool::new(false),
            logging,
        }
    }

    fn warn(&self, line: impl AsRef<str>) {
        if self.logging {
            log::warn!("{}", line.as_ref());
        }
    }

    /// Takes the peer-message receiver out for use by `listen()`. Only the
    /// first caller (the owning peer agent) gets it.
    pub(crate) fn take_peer_messages(&self) -> Option<mpsc::Receiver<Message>> {
        self.peer_messages_rx.lock().take()
    }

    /// Starts the reader loop. Fails with [`CoreError::AlreadyListening`] on
    /// a second call — idempotent-by-refusal, per spec.md §4.3.
    pub fn start(self: &Arc<Self>) -> CoreResult<JoinHandle<()>> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(CoreError::AlreadyListening);
        }

        let collector = Arc::clone(self);
        Ok(tokio::spawn(async move { collector.run().await }))
    }

    async fn run(self: Arc<Self>) {
        let mut buf = vec![0u8; MAX_MESSAGE_SIZE];

        loop {
            let (len, _src) = match self.socket.recv_from(&mut buf).await {
                Ok(v) => v,
                Err(e) => {
                    self.warn(format!("collector: recv failed: {e}"));
                    continue;
                }
            };

            let response = match Message::decode(&buf[..len]) {
                Ok(r) => r,
                Err(e) => {
                    self.warn(format!("collector: cannot decode datagram: {e}"));
                    continue;
                }
            };

            let is_clean_disconnect = response.action == P_DISCONNECT && !response.has_error;
            self.route(response).await;

            if is_clean_disconnect {
                break;
            }
        }
    }

    async fn route(&self, response: Message) {
        match protocol::classify(&response.action) {
            ActionClass::Registration => {
                self.slots.registrations.fill(response);
            }
            ActionClass::Lookup => {
                self.slots.lookups.fill(response);
            }
            ActionClass::Disconnection => {
                self.slots.disconnections.fill(response);
            }
            ActionClass::PeerMessage => {
                if self.peer_messages_tx.send(response).await.is_err() {
                    self.warn("collector: peer_messages receiver dropped");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{P_GET, P_NEW};

    #[tokio::test]
    async fn unmatched_tag_routes_to_peer_messages() {
        let socket = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
        let collector = Arc::new(Collector::new(socket, 4, true));
        let mut rx = collector.take_peer_messages().unwrap();

        collector.route(Message::request("Chat", "bob", "hi")).await;

        let got = rx.try_recv().unwrap();
        assert_eq!(got.action, "Chat");
    }

    #[tokio::test]
    async fn registration_response_reaches_waiting_slot() {
        let socket = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
        let collector = Arc::new(Collector::new(socket, 4, true));
        let rx = collector.slots.registrations.register();

        collector
            .route(Message::response(P_NEW, false, "alice", "127.0.0.1:1"))
            .await;

        let got = rx.await.unwrap();
        assert_eq!(got.action, P_NEW);
    }

    #[tokio::test]
    async fn lookup_and_registration_slots_are_independent() {
        let socket = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
        let collector = Arc::new(Collector::new(socket, 4, true));
        let reg_rx = collector.slots.registrations.register();
        let lookup_rx = collector.slots.lookups.register();

        collector
            .route(Message::response(P_GET, false, "bob", "127.0.0.1:2"))
            .await;
        collector
            .route(Message::response(P_NEW, false, "bob", "127.0.0.1:3"))
            .await;

        assert_eq!(lookup_rx.await.unwrap().action, P_GET);
        assert_eq!(reg_rx.await.unwrap().action, P_NEW);
    }
}
