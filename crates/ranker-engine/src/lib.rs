//! # ranker-engine
//!
//! Poll domain engine for Ranker.
//!
//! ## Role in System
//!
//! - **Single Source of Truth**: authoritative in-memory state of one poll
//! - **Phase Machine**: `Nominating → Voting → Closed`, with `Cancelled`
//!   reachable from any non-terminal phase, all transitions one-way
//! - **Tally**: pure positional scoring over submitted rankings
//!
//! This crate is transport-agnostic and fully synchronous. Serialization of
//! the concurrent mutation stream is the responsibility of the session
//! coordinator in `ranker-gateway`; every mutator here either fully applies
//! or fails without partial effect, so a caller holding exclusive access can
//! never observe a half-applied poll.

pub mod domain;
pub mod ids;

pub use domain::*;
