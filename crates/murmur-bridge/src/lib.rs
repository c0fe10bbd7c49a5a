//! Correlation-id RPC client and unsolicited-event bus for the privileged
//! native helper process.
//!
//! The helper performs the few actions the sandboxed engine cannot: paste
//! simulation, system-audio mute, accessibility queries, and the global key
//! event tap. Wire format is line-delimited JSON over the helper's stdio.

pub mod client;
pub mod protocol;
pub mod transport;

pub use client::{BridgeError, EventSubscription, NativeBridge};
pub use protocol::{HelperEvent, HelperMethod, KeyPayload, RpcError, RpcRequest, RpcResponse};
pub use transport::{Transport, TransportPeer};
