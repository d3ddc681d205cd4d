//! # ranker-gateway
//!
//! Transport and orchestration layer for Ranker.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         GATEWAY                              │
//! ├──────────────────────────────────────────────────────────────┤
//! │  HTTP boundary                WebSocket (one task per conn)  │
//! │  POST /polls                  GET /ws?token=…                │
//! │  POST /polls/join                     │                      │
//! │        │                              ▼                      │
//! │        │                     ┌─────────────────┐             │
//! │        └────────────────────→│   Coordinator   │             │
//! │                              │ (per-poll lock) │             │
//! │                              └───────┬─────────┘             │
//! │                                      │ snapshot              │
//! │                              ┌───────┴─────────┐             │
//! │                              │  Room Registry  │             │
//! │                              │ (fan-out queues)│             │
//! │                              └─────────────────┘             │
//! └──────────────────────────────────────────────────────────────┘
//!                                        │
//!                                 ranker-engine
//!                            (store + tally, pure domain)
//! ```
//!
//! Every participant action is a command submitted to the coordinator, which
//! alone mutates canonical state and then republishes a full snapshot to the
//! room. Failures terminate the single offending action and are reported to
//! its originator only.

pub mod auth;
pub mod config;
pub mod coordinator;
pub mod events;
pub mod http;
pub mod rooms;
pub mod service;
pub mod ws;

pub use auth::{AuthError, Authed, TokenVerifier};
pub use config::GatewayConfig;
pub use coordinator::Coordinator;
pub use events::{ActionError, ClientCommand, JoinNotification, ServerEvent};
pub use rooms::{ConnectionId, RoomRegistry};
pub use service::GatewayService;
