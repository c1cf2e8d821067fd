//! Subsystem configuration.
//!
//! This module defines `OfflineConfig`, the explicitly constructed
//! configuration for the offline store, the area downloader, and the
//! runtime tile resolver. The host application builds one of these and
//! passes it in; nothing here reads ambient global state.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Application name used for the default store directory path
const APP_NAME: &str = "wandercache";

/// Store database file name
const DB_FILE: &str = "offline.db";

/// Default tile source URL template
const DEFAULT_TILE_URL: &str = "https://tile.openstreetmap.org/{z}/{x}/{y}.png";

/// Default zoom range for area downloads.
/// 10-14 balances city-level visual detail against tile-count blowup.
const DEFAULT_MIN_ZOOM: u8 = 10;
const DEFAULT_MAX_ZOOM: u8 = 14;

/// Tiles fetched concurrently per download batch.
/// 10 keeps fan-out bounded so we never overwhelm the tile server.
const DEFAULT_BATCH_SIZE: usize = 10;

/// Pause between download batches in milliseconds.
/// A politeness throttle against the tile source, not a correctness need.
const DEFAULT_BATCH_PAUSE_MS: u64 = 100;

/// Default download radius around a destination in kilometers.
const DEFAULT_RADIUS_KM: f64 = 15.0;

/// Cached tiles older than this are candidates for eviction.
const DEFAULT_TILE_MAX_AGE_DAYS: u64 = 7;

/// HTTP request timeout in seconds.
/// 30s allows for slow tile responses while failing fast enough that one
/// hung fetch cannot stall its batch slot indefinitely.
const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfflineConfig {
    /// Path of the SQLite database file. `None` uses the platform default
    /// under the user data directory.
    pub db_path: Option<PathBuf>,
    /// Tile source URL template with `{z}`, `{x}`, `{y}` placeholders.
    pub tile_url_template: String,
    /// Inclusive zoom range enumerated by area downloads.
    pub min_zoom: u8,
    pub max_zoom: u8,
    /// Tiles fetched concurrently per batch.
    pub batch_size: usize,
    /// Pause between batches.
    pub batch_pause: Duration,
    /// Download radius used when the caller does not supply one.
    pub default_radius_km: f64,
    /// Age cutoff for `evict_older_than` when none is given.
    pub tile_max_age: Duration,
    /// Timeout applied to each tile fetch.
    pub request_timeout: Duration,
}

impl Default for OfflineConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            tile_url_template: DEFAULT_TILE_URL.to_string(),
            min_zoom: DEFAULT_MIN_ZOOM,
            max_zoom: DEFAULT_MAX_ZOOM,
            batch_size: DEFAULT_BATCH_SIZE,
            batch_pause: Duration::from_millis(DEFAULT_BATCH_PAUSE_MS),
            default_radius_km: DEFAULT_RADIUS_KM,
            tile_max_age: Duration::from_secs(DEFAULT_TILE_MAX_AGE_DAYS * 24 * 60 * 60),
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
        }
    }
}

impl OfflineConfig {
    /// Resolve the database path, falling back to the platform data
    /// directory (`~/.local/share/wandercache/offline.db` on Linux).
    pub fn resolved_db_path(&self) -> Result<PathBuf> {
        if let Some(ref path) = self.db_path {
            return Ok(path.clone());
        }
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find user data directory"))?;
        Ok(data_dir.join(APP_NAME).join(DB_FILE))
    }

    /// Expand the URL template for one tile address.
    pub fn tile_url(&self, z: u8, x: u32, y: u32) -> String {
        self.tile_url_template
            .replace("{z}", &z.to_string())
            .replace("{x}", &x.to_string())
            .replace("{y}", &y.to_string())
    }
}
