//! `ps-dynamics` — components that change the population or its wiring.
//!
//! # Crate layout
//!
//! | Module      | Contents                                                       |
//! |-------------|----------------------------------------------------------------|
//! | [`factory`] | `NodeFactory` trait, `PrototypeFactory`, `populate`            |
//! | [`churn`]   | `DynamicNetwork` — grows / shrinks the population each round   |
//! | [`wire`]    | `WireKOut`, `WireRingLattice` — overlay initializers           |
//! | [`cd`]      | `CdScheduler` — starts cycle emulation in event-driven runs    |
//!
//! Every component here is a [`Control`](ps_network::Control); the ones that
//! make sense for a single fresh node are also
//! [`NodeInitializer`](ps_network::NodeInitializer)s and can be listed in a
//! `DynamicNetwork`'s initializer chain.

pub mod cd;
pub mod churn;
pub mod factory;
pub mod wire;

#[cfg(test)]
mod tests;

pub use cd::CdScheduler;
pub use churn::DynamicNetwork;
pub use factory::{NodeFactory, PrototypeFactory, populate};
pub use wire::{WireKOut, WireRingLattice};
