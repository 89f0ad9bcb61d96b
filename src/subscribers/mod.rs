//! # Event subscribers for the relay runtime.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`]
//! fan-out, and the built-in [`LogWriter`].
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   SessionActor ── publish(Event) ──► Bus ──► supervisor listener
//!                                                │
//!                                                ▼
//!                                          SubscriberSet
//!                                      ┌────────┼────────┐
//!                                      ▼        ▼        ▼
//!                                  LogWriter  Metrics  Custom...
//! ```
//!
//! Subscribers are **observers**: they never influence session lifecycle.
//! The registry consumes the bus directly (not through this module) for its
//! cleanup listener.

mod log;
mod set;
mod subscribe;

pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
