//! Map tile cache manager.
//!
//! Get/put/count over individual cached tile images plus the age-based
//! eviction sweep. Keys are `z/x/y` tile addresses; writes are
//! replace-only. Eviction is an on-demand scan invoked by the host (for
//! example from a "free up space" settings action), not a background job;
//! no size-based policy exists.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::debug;

use crate::error::OfflineError;
use crate::projection::TileAddress;
use crate::store::{OfflineStore, TileRow};

/// Manager for cached tile images. Clone is cheap - the store handle is
/// an Arc.
#[derive(Clone)]
pub struct TileCache {
    store: Arc<OfflineStore>,
}

impl TileCache {
    pub fn new(store: Arc<OfflineStore>) -> Self {
        Self { store }
    }

    /// Stamp the current time and upsert the tile image under its
    /// `z/x/y` key. A later write replaces an earlier one wholesale.
    pub async fn put(
        &self,
        tile: TileAddress,
        image: Vec<u8>,
        source_url: &str,
    ) -> Result<(), OfflineError> {
        let row = TileRow {
            key: tile.key(),
            image,
            source_url: source_url.to_string(),
            saved_at: Utc::now().timestamp_millis(),
        };
        self.store.put_tile(&row).await
    }

    pub async fn get(&self, tile: TileAddress) -> Result<Option<Vec<u8>>, OfflineError> {
        Ok(self.store.get_tile(&tile.key()).await?.map(|row| row.image))
    }

    pub async fn count(&self) -> Result<u64, OfflineError> {
        self.store.count_tiles().await
    }

    /// Delete every cached tile whose save timestamp is older than
    /// `now - max_age`. Returns the number of entries removed.
    pub async fn evict_older_than(&self, max_age: Duration) -> Result<u64, OfflineError> {
        let cutoff = Utc::now().timestamp_millis() - max_age.as_millis() as i64;
        let mut removed = 0u64;

        for (key, saved_at) in self.store.list_tile_ages().await? {
            if saved_at < cutoff {
                self.store.delete_tile(&key).await?;
                removed += 1;
            }
        }

        if removed > 0 {
            debug!(removed, "Evicted stale tiles");
        }
        Ok(removed)
    }
}
