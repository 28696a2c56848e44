//! `ps-core` — foundational types for the `ps` overlay protocol simulator.
//!
//! This crate is a dependency of every other `ps-*` crate.  It has no `ps-*`
//! dependencies and few external ones (`rand`, `rand_distr`, `thiserror`,
//! plus optional `serde`).
//!
//! # What lives here
//!
//! | Module      | Contents                                                  |
//! |-------------|-----------------------------------------------------------|
//! | [`ids`]     | `NodeId`, `ProtocolId`                                    |
//! | [`time`]    | `Time`                                                    |
//! | [`rng`]     | `SimRng` — seeded source with extended distributions      |
//! | [`sample`]  | `RandPermutation`, `WeightedRandPermutation`              |
//! | [`params`]  | `Params` — namespaced key → value configuration lookup    |
//! | [`error`]   | `PsError`, `PsResult`                                     |
//!
//! # Feature flags
//!
//! | Flag    | Effect                                                     |
//! |---------|------------------------------------------------------------|
//! | `serde` | Adds `Serialize`/`Deserialize` to the id and time types.   |

pub mod error;
pub mod ids;
pub mod params;
pub mod rng;
pub mod sample;
pub mod time;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use error::{PsError, PsResult};
pub use ids::{NodeId, ProtocolId};
pub use params::Params;
pub use rng::SimRng;
pub use sample::{RandPermutation, WeightedRandPermutation};
pub use time::Time;
