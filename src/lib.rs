//! Offline persistence and map-tile caching for the WanderGenius travel
//! planner.
//!
//! This crate keeps a bounded set of trips and their surrounding map
//! imagery usable with no network connectivity, falling back to cached
//! data transparently when the network is unavailable:
//!
//! - `projection`: pure coordinate-to-tile math (slippy-map scheme)
//! - `store`: the versioned local durable store (SQLite)
//! - `trips`: trip snapshot CRUD and storage-usage estimate
//! - `tiles`: tile image cache with age-based eviction
//! - `download`: batched area-download pipeline with progress reporting
//! - `resolver`: cache-first / network-fallback tile resolution
//! - `connectivity`: online/offline state driving UI transitions
//! - `service`: the façade the host application talks to
//!
//! The store is single-device and single-process; writes are
//! last-writer-wins and there is no multi-client consistency guarantee.

pub mod config;
pub mod connectivity;
pub mod download;
pub mod error;
pub mod projection;
pub mod resolver;
pub mod service;
pub mod store;
pub mod tiles;
pub mod trips;

pub use config::OfflineConfig;
pub use connectivity::{ConnectivityTracker, OnlineStatus};
pub use download::{AreaDownloader, HttpTileFetcher, TileFetcher};
pub use error::OfflineError;
pub use projection::{bounds_around_point, tile_for_point, tiles_for_area, GeoBounds, TileAddress};
pub use resolver::{ResolvedTile, TileOrigin, TileResolver};
pub use service::OfflineService;
pub use store::OfflineStore;
pub use tiles::TileCache;
pub use trips::{SavedTrip, StorageUsage, TripManager, TripSnapshot};
