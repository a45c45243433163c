//! Action-multiplexed request/response protocol for a UDP rendezvous
//! directory and peer-to-peer messaging.
//!
//! See `SPEC_FULL.md` in the repository root for the full design. In short:
//! a [`directory::Directory`] maintains a [`registry::PeerRegistry`] of
//! named peers and their observed UDP endpoints; a [`peer::Peer`] registers
//! with the directory, looks up other peers by name, and exchanges opaque
//! application datagrams with them directly through a [`writer::PeerWriter`].

pub mod collector;
pub mod config;
pub mod directory;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod request;
pub mod peer;
pub mod writer;

pub use config::PeerOptions;
pub use directory::{Directory, DirectoryOptions};
pub use error::{CoreError, CoreResult};
pub use peer::Peer;
pub use protocol::Message;
pub use writer::PeerWriter;
