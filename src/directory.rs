//! Directory service: a single UDP endpoint serving the three directory-
//! bound actions, dispatching each datagram on its own task so a slow
//! registry operation cannot head-of-line block the receive loop.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

use crate::error::{CoreError, CoreResult};
use crate::protocol::{paired_response, Message, DIRECTORY_RECV_BUF, S_DISCONNECT, S_GET, S_NEW};
use crate::registry::{InMemoryRegistry, PeerRegistry};

/// Enables or disables diagnostic log lines. Defaults to `true`.
#[derive(Debug, Clone, Copy)]
pub struct DirectoryOptions {
    pub logging: bool,
}

impl Default for DirectoryOptions {
    fn default() -> Self {
        Self { logging: true }
    }
}

/// Owns a bound UDP socket and an in-memory peer registry. Stateless per
/// connection — the registry is the only mutable state.
pub struct Directory {
    socket: Arc<UdpSocket>,
    registry: Arc<dyn PeerRegistry>,
    options: DirectoryOptions,
}

impl Directory {
    /// Binds `addr` with the default in-memory registry. Fails if the
    /// address is malformed or already in use.
    pub async fn bind(addr: &str, options: DirectoryOptions) -> CoreResult<Self> {
        Self::bind_with_registry(addr, InMemoryRegistry::new(), options).await
    }

    /// Binds `addr` with a caller-supplied registry (the pluggable store
    /// seam spec.md §4.1 leaves open).
    pub async fn bind_with_registry(
        addr: &str,
        registry: Arc<dyn PeerRegistry>,
        options: DirectoryOptions,
    ) -> CoreResult<Self> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|e| CoreError::BindFailed(addr.to_string(), e))?;
        Ok(Self {
            socket: Arc::new(socket),
            registry,
            options,
        })
    }

    fn log(&self, line: impl AsRef<str>) {
        if self.options.logging {
            log::info!("{}", line.as_ref());
        }
    }

    /// The address actually bound (useful when `bind` was given port 0).
    pub fn local_addr(&self) -> CoreResult<SocketAddr> {
        self.socket.local_addr().map_err(CoreError::from)
    }

    /// A point-in-time snapshot of currently registered peers. Library-level
    /// introspection, not a wire action — the action-tag set stays closed.
    pub fn connected_peers(&self) -> Vec<(String, String)> {
        self.registry.enumerate()
    }

    /// Runs the receive loop until `cancel` is triggered. Receive errors are
    /// logged and the loop continues; the directory is never brought down
    /// by a single bad message.
    pub async fn serve(&self, cancel: CancellationToken) {
        self.log(format!(
            "directory ready on {:?}",
            self.socket.local_addr().ok()
        ));

        let mut buf = vec![0u8; DIRECTORY_RECV_BUF];

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.socket.recv_from(&mut buf) => {
                    match result {
                        Ok((len, src)) => {
                            let datagram = buf[..len].to_vec();
                            let socket = Arc::clone(&self.socket);
                            let registry = Arc::clone(&self.registry);
                            let logging = self.options.logging;
                            tokio::spawn(async move {
                                handle_datagram(socket, registry, logging, &datagram, src).await;
                            });
                        }
                        Err(e) => {
                            self.log(format!("directory recv error: {e}"));
                        }
                    }
                }
            }
        }

        self.log("directory stopped");
    }
}

async fn handle_datagram(
    socket: Arc<UdpSocket>,
    registry: Arc<dyn PeerRegistry>,
    logging: bool,
    datagram: &[u8],
    src: SocketAddr,
) {
    let request = match Message::decode(datagram) {
        Ok(r) => r,
        Err(e) => {
            if logging {
                log::warn!("directory: cannot decode datagram from {src}: {e}");
            }
            return;
        }
    };

    let response = match request.action.as_str() {
        S_NEW => handle_new(&registry, &request, src),
        S_GET => handle_get(&registry, &request),
        S_DISCONNECT => handle_disconnect(&registry, &request),
        other => {
            if logging {
                log::warn!("directory: unknown action `{other}` from {src}");
            }
            Message::response(other, true, &request.peername, "unknown action")
        }
    };

    if let Err(e) = send_response(&socket, &response, src).await {
        if logging {
            log::error!("directory: failed to send response to {src}: {e}");
        }
    }
}

fn handle_new(registry: &Arc<dyn PeerRegistry>, request: &Message, src: SocketAddr) -> Message {
    let tag = paired_response(S_NEW).expect("SNew has a paired response");
    let observed = src.to_string();
    match registry.save(&request.peername, &observed) {
        Ok(()) => Message::response(tag, false, &request.peername, observed),
        Err(CoreError::AlreadyRegistered(_)) => match registry.lookup(&request.peername) {
            Ok(existing) if existing == observed => {
                Message::response(tag, false, &request.peername, observed)
            }
            _ => Message::response(
                tag,
                true,
                &request.peername,
                format!("peer `{}` already registered", request.peername),
            ),
        },
        Err(e) => Message::response(tag, true, &request.peername, e.to_string()),
    }
}

fn handle_get(registry: &Arc<dyn PeerRegistry>, request: &Message) -> Message {
    let tag = paired_response(S_GET).expect("SGet has a paired response");
    let target = &request.message;
    match registry.lookup(target) {
        Ok(endpoint) => Message::response(tag, false, &request.peername, endpoint),
        Err(e) => Message::response(tag, true, &request.peername, e.to_string()),
    }
}

fn handle_disconnect(registry: &Arc<dyn PeerRegistry>, request: &Message) -> Message {
    let tag = paired_response(S_DISCONNECT).expect("SDisconnect has a paired response");
    match registry.delete(&request.peername) {
        Ok(()) => Message::response(tag, false, &request.peername, ""),
        Err(e) => Message::response(tag, true, &request.peername, e.to_string()),
    }
}

async fn send_response(socket: &UdpSocket, response: &Message, dest: SocketAddr) -> CoreResult<()> {
    let encoded = response.encode()?;
    socket.send_to(&encoded, dest).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{P_GET, P_NEW, S_NEW as REQ_NEW};

    async fn bound_directory() -> Directory {
        Directory::bind("127.0.0.1:0", DirectoryOptions { logging: false })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn register_round_trips_to_the_source_address() {
        let directory = bound_directory().await;
        let dir_addr = directory.socket.local_addr().unwrap();
        let cancel = CancellationToken::new();
        let serve_token = cancel.clone();
        let serve = tokio::spawn(async move { directory.serve(serve_token).await });

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let req = Message::request(REQ_NEW, "alice", "");
        client.send_to(&req.encode().unwrap(), dir_addr).await.unwrap();

        let mut buf = [0u8; 2048];
        let (n, _) = client.recv_from(&mut buf).await.unwrap();
        let resp = Message::decode(&buf[..n]).unwrap();
        assert_eq!(resp.action, P_NEW);
        assert!(!resp.has_error);
        assert_eq!(resp.message, client.local_addr().unwrap().to_string());

        cancel.cancel();
        serve.await.unwrap();
    }

    #[tokio::test]
    async fn unknown_action_gets_error_response_with_same_tag() {
        let directory = bound_directory().await;
        let dir_addr = directory.socket.local_addr().unwrap();
        let cancel = CancellationToken::new();
        let serve_token = cancel.clone();
        let serve = tokio::spawn(async move { directory.serve(serve_token).await });

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        // P* tags are not directory-bound per the open question in spec.md §9.
        let req = Message::request(P_NEW, "alice", "");
        client.send_to(&req.encode().unwrap(), dir_addr).await.unwrap();

        let mut buf = [0u8; 2048];
        let (n, _) = client.recv_from(&mut buf).await.unwrap();
        let resp = Message::decode(&buf[..n]).unwrap();
        assert_eq!(resp.action, P_NEW);
        assert!(resp.has_error);

        cancel.cancel();
        serve.await.unwrap();
    }

    #[tokio::test]
    async fn lookup_miss_yields_error_response() {
        let directory = bound_directory().await;
        let dir_addr = directory.socket.local_addr().unwrap();
        let cancel = CancellationToken::new();
        let serve_token = cancel.clone();
        let serve = tokio::spawn(async move { directory.serve(serve_token).await });

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let req = Message::request(S_GET, "bob", "ghost");
        client.send_to(&req.encode().unwrap(), dir_addr).await.unwrap();

        let mut buf = [0u8; 2048];
        let (n, _) = client.recv_from(&mut buf).await.unwrap();
        let resp = Message::decode(&buf[..n]).unwrap();
        assert_eq!(resp.action, P_GET);
        assert!(resp.has_error);

        cancel.cancel();
        serve.await.unwrap();
    }

    #[tokio::test]
    async fn reregistration_from_same_endpoint_is_idempotent() {
        let directory = bound_directory().await;
        let dir_addr = directory.socket.local_addr().unwrap();
        let cancel = CancellationToken::new();
        let serve_token = cancel.clone();
        let serve = tokio::spawn(async move { directory.serve(serve_token).await });

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let req = Message::request(S_NEW, "alice", "");
        let mut buf = [0u8; 2048];

        for _ in 0..2 {
            client.send_to(&req.encode().unwrap(), dir_addr).await.unwrap();
            let (n, _) = client.recv_from(&mut buf).await.unwrap();
            let resp = Message::decode(&buf[..n]).unwrap();
            assert!(!resp.has_error);
        }

        cancel.cancel();
        serve.await.unwrap();
    }
}
