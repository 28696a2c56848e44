//! `ps-network` — the node population and the contracts pluggable components
//! implement.
//!
//! # Crate layout
//!
//! | Module        | Contents                                                        |
//! |---------------|-----------------------------------------------------------------|
//! | [`node`]      | `Node`, `Liveness`                                              |
//! | [`network`]   | `Network` (ordered population with stable `NodeId`s), `Census`  |
//! | [`protocol`]  | `Protocol`, `CycleProtocol`, `EventProtocol`, `Linkable`, `Transport`, `ProtocolSpec`, `ProtocolTable` |
//! | [`context`]   | `ProtocolContext`, `ControlContext`, `InitContext`, `Control`, `NodeInitializer`, `Outgoing` |
//! | [`transport`] | `UniformTransport` (message latency model)                      |
//! | [`graph`]     | `OverlayGraph` (read-only view), `OverlayGraphMut` (wiring)     |
//! | [`error`]     | `NetworkError`, `NetworkResult<T>`                              |
//!
//! # Design notes
//!
//! Protocol steps mutate the world directly: the context hands out
//! `&mut Network`, so a gossip step can update its peer's state in place.
//! Aliasing is avoided by checking the executing instance out of its node
//! for the duration of the step.  The only deferred effect is event
//! emission, which goes through the context's outbox.
//!
//! # Feature flags
//!
//! | Flag      | Effect                                                        |
//! |-----------|---------------------------------------------------------------|
//! | `fx-hash` | `FxHashMap` for the `NodeId → index` map                      |
//! | `serde`   | Derives `Serialize`/`Deserialize` on `Liveness`               |

pub mod context;
pub mod error;
pub mod graph;
pub mod network;
pub mod node;
pub mod protocol;
pub mod transport;

#[cfg(test)]
mod tests;

pub use context::{
    Control, ControlContext, DelayPolicy, InitContext, NextCycle, NodeInitializer, Outgoing,
    Payload, ProtocolContext,
};
pub use error::{NetworkError, NetworkResult};
pub use graph::{OverlayGraph, OverlayGraphMut};
pub use network::{Census, Network};
pub use node::{Liveness, Node};
pub use protocol::{
    CycleProtocol, EventProtocol, Linkable, Protocol, ProtocolObject, ProtocolSpec, ProtocolTable,
    Transport,
};
pub use transport::UniformTransport;
