//! Peer agent: composes the collector and request primitive, exposing
//! `init` / `connect` / `listen` / `disconnect` / `close` (spec.md §4.5).
//!
//! State is tracked with an explicit three-state machine so a disconnected
//! peer fails fast on reuse instead of racing a dead collector task. See
//! DESIGN.md's Open Question decisions.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, Mutex as AsyncMutex};

use crate::collector::Collector;
use crate::config::PeerOptions;
use crate::error::{CoreError, CoreResult};
use crate::protocol::{Message, S_DISCONNECT, S_GET, S_NEW};
use crate::request::RequestPrimitive;
use crate::writer::PeerWriter;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Constructed = 0,
    Running = 1,
    /// Reached after a successful `disconnect`; only `close` remains valid.
    Disconnected = 2,
}

impl From<u8> for State {
    fn from(v: u8) -> Self {
        match v {
            0 => State::Constructed,
            1 => State::Running,
            _ => State::Disconnected,
        }
    }
}

/// A client process participating in the network under a unique name.
pub struct Peer {
    name: String,
    options: PeerOptions,
    socket: Mutex<Option<Arc<UdpSocket>>>,
    collector: Arc<Collector>,
    request: RequestPrimitive,
    peer_messages: AsyncMutex<Option<mpsc::Receiver<Message>>>,
    state: AtomicU8,
}

impl Peer {
    /// Binds `local_addr`, resolves `directory_addr`, and constructs the
    /// collector and request primitive. Does not contact the directory or
    /// start the collector — that happens in [`Peer::init`].
    pub async fn new(
        name: impl Into<String>,
        directory_addr: &str,
        local_addr: &str,
        options: PeerOptions,
    ) -> CoreResult<Self> {
        let resolved_directory = resolve(directory_addr).await?;
        let socket = UdpSocket::bind(local_addr)
            .await
            .map_err(|e| CoreError::BindFailed(local_addr.to_string(), e))?;
        let socket = Arc::new(socket);

        let collector = Arc::new(Collector::new(
            Arc::clone(&socket),
            options.max_msg_in_queue,
            options.logging,
        ));
        let request = RequestPrimitive::new(Arc::clone(&socket), resolved_directory, &collector, options.logging);
        let peer_messages = collector.take_peer_messages();

        Ok(Self {
            name: name.into(),
            options,
            socket: Mutex::new(Some(socket)),
            collector,
            request,
            peer_messages: AsyncMutex::new(peer_messages),
            state: AtomicU8::new(State::Constructed as u8),
        })
    }

    fn state(&self) -> State {
        State::from(self.state.load(Ordering::SeqCst))
    }

    fn require_running(&self) -> CoreResult<()> {
        if self.state() == State::Running {
            Ok(())
        } else {
            Err(CoreError::NotInitialized)
        }
    }

    /// Starts the collector and registers with the directory via `SNew`.
    pub async fn init(&self) -> CoreResult<()> {
        self.collector.start()?;
        self.request
            .request(&self.name, S_NEW, "", self.options.timeout())
            .await?;
        self.state.store(State::Running as u8, Ordering::SeqCst);
        Ok(())
    }

    /// Looks up `target_name` via `SGet` and returns a writer bound to its
    /// resolved endpoint.
    pub async fn connect(&self, target_name: &str) -> CoreResult<PeerWriter> {
        self.require_running()?;
        let response = self
            .request
            .request(&self.name, S_GET, target_name, self.options.timeout())
            .await?;

        let addr: SocketAddr = response
            .message
            .parse()
            .map_err(|_| CoreError::MalformedPayload(response.message.clone()))?;

        let socket = self
            .socket
            .lock()
            .clone()
            .ok_or(CoreError::AlreadyClosed)?;
        Ok(PeerWriter::new(self.name.clone(), socket, addr, self.options.logging))
    }

    /// Returns the next datagram from `peer_messages`, blocking until one
    /// arrives. There is no timeout at this layer (spec.md §5) — callers
    /// needing one should race this against an external cancellation
    /// signal.
    pub async fn listen(&self) -> CoreResult<Message> {
        self.require_running()?;
        let mut guard = self.peer_messages.lock().await;
        let rx = guard.as_mut().ok_or(CoreError::NotInitialized)?;
        rx.recv().await.ok_or(CoreError::NotInitialized)
    }

    /// Announces departure to the directory via `SDisconnect` and awaits
    /// `PDisconnect`. On success the agent moves to `Disconnected`: only
    /// [`Peer::close`] remains valid afterward.
    pub async fn disconnect(&self) -> CoreResult<()> {
        self.require_running()?;
        self.request
            .request(&self.name, S_DISCONNECT, "", self.options.timeout())
            .await?;
        self.state.store(State::Disconnected as u8, Ordering::SeqCst);
        Ok(())
    }

    /// Releases the local socket. Idempotent in effect but a second call
    /// returns an error the caller may ignore, mirroring a double `close()`
    /// on a network connection.
    pub fn close(&self) -> CoreResult<()> {
        self.socket.lock().take().map(|_| ()).ok_or(CoreError::AlreadyClosed)
    }
}

async fn resolve(addr: &str) -> CoreResult<SocketAddr> {
    tokio::net::lookup_host(addr)
        .await
        .map_err(|e| CoreError::ResolveFailed(addr.to_string(), e))?
        .next()
        .ok_or_else(|| CoreError::ResolveFailed(addr.to_string(), std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses")))
}
