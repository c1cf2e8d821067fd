//! Versioned local durable store.
//!
//! This module provides `OfflineStore`, the single owner of the durable
//! copies of all offline data: trip snapshots, cached map tiles, and
//! small key/value metadata. It exposes generic row primitives consumed
//! by the managers in `trips` and `tiles`; trip- and tile-specific
//! business rules live there, not here.
//!
//! The store is an explicitly constructed object passed by reference to
//! whatever needs it, never a hidden module-level singleton, so tests can
//! substitute an in-memory instance.

pub mod sqlite;

pub use sqlite::{OfflineStore, TileRow, TripRow};
