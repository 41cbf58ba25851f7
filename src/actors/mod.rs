//! Actor-based monitoring pipeline
//!
//! Each prober runs as an independent async task; site state lives in a
//! single engine task. Communication is one-way probe reports plus
//! per-actor command channels.
//!
//! ## Architecture Overview
//!
//! ```text
//!   ┌────────────┐   ┌────────────┐        ┌────────────┐
//!   │ Prober-1   │   │ Prober-2   │  ...   │ Prober-N   │   (one per
//!   │ (host A)   │   │ (host B)   │        │ (host X)   │    endpoint row)
//!   └─────┬──────┘   └─────┬──────┘        └─────┬──────┘
//!         │                │                     │
//!         └────────────────┼─────────────────────┘
//!                          │ ProbeReport (mpsc)
//!                ┌─────────▼──────────┐
//!                │  AlertEngineActor  │  owns SiteRegistry + StatusStore
//!                └─────────┬──────────┘
//!                          │ alerts / dashboard edits
//!                ┌─────────▼──────────┐
//!                │      Notifier      │  retry policy around Telegram
//!                └────────────────────┘
//! ```
//!
//! ## Why a single owner for site state
//!
//! Down-counts must move by exactly one per host flip. With every mutation
//! funnelled through the engine task there is no interleaving to guard
//! against: a scan always sees a consistent snapshot, and no lock exists
//! to forget.
//!
//! ## Communication Patterns
//!
//! 1. **Reports**: probers push liveness transitions over one shared mpsc
//! 2. **Commands**: each actor has an mpsc command channel for control
//! 3. **Request/Response**: oneshot channels for synchronous queries

pub mod engine;
pub mod messages;
pub mod prober;
