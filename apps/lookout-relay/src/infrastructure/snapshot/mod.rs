//! Snapshot Fetcher
//!
//! Builds the initial full state for one browser session: every
//! currently-online friend, every favorited friend (online or not), and
//! best-effort world/occupancy enrichment. The browser-side engine calls
//! this once before opening the push channel, and periodically afterwards
//! to backfill what the stream omits.
//!
//! # Read Strategy
//!
//! - Online friends and favorites are paginated bulk reads: fixed page
//!   size, continue while pages come back full, stop on a short page.
//!   A page failure is fatal only when no page of that read had succeeded.
//! - Favorited friends missing from the online listing are fetched
//!   individually in bounded-concurrency batches to populate the offline
//!   favorites with last-known profile data.
//! - World metadata and live occupancy resolve through the in-memory
//!   world cache or batched fetches with a small inter-batch delay to
//!   respect upstream rate limits. Individual enrichment failures are
//!   swallowed; that item simply goes unenriched.

pub mod api;
pub mod worlds;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use rand::Rng;
use serde::Serialize;

use crate::infrastructure::metrics;
use crate::infrastructure::upstream::SessionToken;

pub use api::{ApiError, FavoriteRecord, FriendRecord, UpstreamApi, WorldRecord};
pub use worlds::{WorldCache, WorldInfo};

// =============================================================================
// Error Types
// =============================================================================

/// Errors from snapshot assembly.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// The upstream platform rejected the session credential.
    #[error("upstream rejected session credential")]
    Unauthorized,

    /// A paginated read failed before any page succeeded.
    #[error("snapshot read failed with no data: {0}")]
    NoData(#[source] ApiError),
}

// =============================================================================
// Snapshot Types
// =============================================================================

/// One contact in the snapshot response, with best-effort enrichment.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotContact {
    /// Opaque user id.
    pub id: String,
    /// Display name.
    pub display_name: String,
    /// Coarse presence status.
    pub status: Option<String>,
    /// Free-text status message.
    pub status_description: Option<String>,
    /// Icon URL.
    pub user_icon: Option<String>,
    /// Raw connectivity flag.
    pub platform: Option<String>,
    /// Location string; `offline` for offline favorites.
    pub location: String,
    /// Whether the contact is favorited.
    pub is_favorite: bool,
    /// Ordinal favorite-group tag, e.g. `group_0`.
    pub favorite_group: Option<String>,
    /// Resolved world name, when enrichment succeeded.
    pub world_name: Option<String>,
    /// Resolved world thumbnail, when enrichment succeeded.
    pub world_thumbnail: Option<String>,
    /// Live occupancy of the contact's instance, best-effort.
    pub occupant_count: Option<u32>,
}

/// The full snapshot served to the browser.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Currently-online friends, favorited or not.
    pub friends: Vec<SnapshotContact>,
    /// Favorited friends that are not currently online.
    pub offline_friends: Vec<SnapshotContact>,
}

// =============================================================================
// Settings
// =============================================================================

/// Snapshot read settings.
#[derive(Debug, Clone)]
pub struct SnapshotSettings {
    /// Page size for paginated bulk reads.
    pub page_size: usize,
    /// Concurrency bound for batched individual lookups.
    pub batch_size: usize,
    /// Delay between lookup batches.
    pub batch_delay: Duration,
}

impl Default for SnapshotSettings {
    fn default() -> Self {
        Self {
            page_size: 100,
            batch_size: 8,
            batch_delay: Duration::from_millis(300),
        }
    }
}

// =============================================================================
// Fetcher
// =============================================================================

/// Builds snapshots for authenticated sessions.
#[derive(Debug, Clone)]
pub struct SnapshotFetcher {
    api: UpstreamApi,
    worlds: Arc<WorldCache>,
    settings: SnapshotSettings,
}

impl SnapshotFetcher {
    /// Create a new fetcher.
    #[must_use]
    pub const fn new(api: UpstreamApi, worlds: Arc<WorldCache>, settings: SnapshotSettings) -> Self {
        Self {
            api,
            worlds,
            settings,
        }
    }

    /// The shared world cache, for the world-metadata API route.
    #[must_use]
    pub fn world_cache(&self) -> Arc<WorldCache> {
        Arc::clone(&self.worlds)
    }

    /// Resolve one world through the cache, fetching on a miss.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` when the world is not cached and the upstream
    /// fetch fails.
    pub async fn resolve_world(
        &self,
        token: &SessionToken,
        world_id: &str,
    ) -> Result<WorldInfo, ApiError> {
        if let Some(info) = self.worlds.get(world_id) {
            return Ok(info);
        }
        let record = self.api.world(token, world_id).await?;
        let info = WorldInfo {
            name: record.name,
            thumbnail: record.thumbnail_image_url,
            capacity: record.capacity,
        };
        self.worlds.insert(world_id, info.clone());
        Ok(info)
    }

    /// Assemble the full snapshot for one session.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Unauthorized`] on credential rejection, and
    /// [`SnapshotError::NoData`] when a paginated read fails before any
    /// page succeeded. Individual enrichment failures never surface.
    pub async fn fetch(&self, token: &SessionToken) -> Result<Snapshot, SnapshotError> {
        let online = self.read_online_friends(token).await?;
        let favorites = self.read_favorites(token).await?;

        let favorite_groups: HashMap<String, Option<String>> = favorites
            .iter()
            .map(|f| (f.favorite_id.clone(), group_tag(&f.tags)))
            .collect();

        let online_ids: HashSet<&str> = online.iter().map(|f| f.id.as_str()).collect();
        let missing_favorites: Vec<String> = favorite_groups
            .keys()
            .filter(|id| !online_ids.contains(id.as_str()))
            .cloned()
            .collect();

        let offline_records = self.read_missing_favorites(token, &missing_favorites).await;
        let enrichment = self.resolve_enrichment(token, &online).await;

        let friends = online
            .into_iter()
            .map(|record| {
                let group = favorite_groups.get(&record.id).cloned();
                enrich_contact(record, group, &enrichment)
            })
            .collect();

        let offline_friends = offline_records
            .into_iter()
            .map(|record| {
                let group = favorite_groups.get(&record.id).cloned();
                SnapshotContact {
                    location: "offline".to_string(),
                    is_favorite: true,
                    favorite_group: group.flatten(),
                    world_name: None,
                    world_thumbnail: None,
                    occupant_count: None,
                    id: record.id,
                    display_name: record.display_name,
                    status: record.status,
                    status_description: record.status_description,
                    user_icon: record.user_icon,
                    platform: record.platform,
                }
            })
            .collect();

        Ok(Snapshot {
            friends,
            offline_friends,
        })
    }

    /// Paginated read of all currently-online friends.
    async fn read_online_friends(
        &self,
        token: &SessionToken,
    ) -> Result<Vec<FriendRecord>, SnapshotError> {
        let mut all = Vec::new();
        let mut offset = 0;

        loop {
            match self
                .api
                .online_friends_page(token, self.settings.page_size, offset)
                .await
            {
                Ok(page) => {
                    metrics::record_snapshot_page();
                    let full_page = page.len() == self.settings.page_size;
                    all.extend(page);
                    if !full_page {
                        return Ok(all);
                    }
                    offset += self.settings.page_size;
                }
                Err(e) => return page_failure(all, e),
            }
        }
    }

    /// Paginated read of all favorited-friend entries.
    async fn read_favorites(
        &self,
        token: &SessionToken,
    ) -> Result<Vec<FavoriteRecord>, SnapshotError> {
        let mut all = Vec::new();
        let mut offset = 0;

        loop {
            match self
                .api
                .favorites_page(token, self.settings.page_size, offset)
                .await
            {
                Ok(page) => {
                    metrics::record_snapshot_page();
                    let full_page = page.len() == self.settings.page_size;
                    all.extend(page);
                    if !full_page {
                        return Ok(all);
                    }
                    offset += self.settings.page_size;
                }
                Err(e) => return page_failure(all, e),
            }
        }
    }

    /// Fetch favorited friends missing from the online listing, batched.
    async fn read_missing_favorites(
        &self,
        token: &SessionToken,
        user_ids: &[String],
    ) -> Vec<FriendRecord> {
        let mut records = Vec::with_capacity(user_ids.len());

        for batch in user_ids.chunks(self.settings.batch_size.max(1)) {
            let lookups = batch.iter().map(|id| self.api.user(token, id));
            for (id, result) in batch.iter().zip(join_all(lookups).await) {
                match result {
                    Ok(record) => records.push(record),
                    Err(error) => {
                        metrics::record_enrichment_miss();
                        tracing::debug!(user_id = %id, %error, "Skipping unavailable favorite");
                    }
                }
            }
            self.pace().await;
        }

        records
    }

    /// Sleep between lookup batches, with jitter so concurrent sessions
    /// do not hammer the upstream in lockstep.
    #[allow(clippy::cast_possible_truncation)]
    async fn pace(&self) {
        let delay = self.settings.batch_delay;
        if delay.is_zero() {
            return;
        }
        let span = (delay.as_millis() as u64 / 5).max(1);
        let jitter = rand::rng().random_range(0..span);
        tokio::time::sleep(delay + Duration::from_millis(jitter)).await;
    }

    /// Resolve world metadata and occupancy for every distinct location.
    async fn resolve_enrichment(
        &self,
        token: &SessionToken,
        online: &[FriendRecord],
    ) -> Enrichment {
        let mut world_ids = HashSet::new();
        let mut locations = HashSet::new();
        for record in online {
            if let Some(location) = record.location.as_deref()
                && let Some(world_id) = world_id_of(location)
            {
                world_ids.insert(world_id.to_string());
                locations.insert(location.to_string());
            }
        }

        let mut worlds = HashMap::new();
        let uncached: Vec<String> = world_ids
            .into_iter()
            .filter(|id| match self.worlds.get(id) {
                Some(info) => {
                    worlds.insert(id.clone(), info);
                    false
                }
                None => true,
            })
            .collect();

        for batch in uncached.chunks(self.settings.batch_size.max(1)) {
            let lookups = batch.iter().map(|id| self.api.world(token, id));
            for (id, result) in batch.iter().zip(join_all(lookups).await) {
                match result {
                    Ok(record) => {
                        let info = WorldInfo {
                            name: record.name,
                            thumbnail: record.thumbnail_image_url,
                            capacity: record.capacity,
                        };
                        self.worlds.insert(id, info.clone());
                        worlds.insert(id.clone(), info);
                    }
                    Err(error) => {
                        metrics::record_enrichment_miss();
                        tracing::debug!(world_id = %id, %error, "World enrichment skipped");
                    }
                }
            }
            self.pace().await;
        }

        let mut occupancy = HashMap::new();
        let location_list: Vec<String> = locations.into_iter().collect();
        for batch in location_list.chunks(self.settings.batch_size.max(1)) {
            let lookups = batch.iter().map(|loc| self.api.instance(token, loc));
            for (location, result) in batch.iter().zip(join_all(lookups).await) {
                match result {
                    Ok(record) => {
                        if let Some(n) = record.n_users {
                            occupancy.insert(location.clone(), n);
                        }
                    }
                    Err(error) => {
                        metrics::record_enrichment_miss();
                        tracing::debug!(%location, %error, "Occupancy enrichment skipped");
                    }
                }
            }
            self.pace().await;
        }

        Enrichment { worlds, occupancy }
    }
}

/// Resolved enrichment lookups keyed by world id and full location.
struct Enrichment {
    worlds: HashMap<String, WorldInfo>,
    occupancy: HashMap<String, u32>,
}

/// Apply a paginated-read failure policy: fatal only with zero pages read.
fn page_failure<T>(partial: Vec<T>, error: ApiError) -> Result<Vec<T>, SnapshotError> {
    if matches!(error, ApiError::Unauthorized) {
        return Err(SnapshotError::Unauthorized);
    }
    if partial.is_empty() {
        return Err(SnapshotError::NoData(error));
    }
    tracing::warn!(%error, "Paginated read stopped early, keeping partial data");
    Ok(partial)
}

/// Extract the world id prefix of a location string.
///
/// Sentinel locations (`offline`, `private`, `traveling`) have no world.
fn world_id_of(location: &str) -> Option<&str> {
    match location {
        "offline" | "private" | "traveling" => None,
        _ => location
            .split_once(':')
            .map(|(world, _)| world)
            .filter(|world| !world.is_empty()),
    }
}

fn group_tag(tags: &[String]) -> Option<String> {
    tags.iter().find(|t| t.starts_with("group_")).cloned()
}

fn enrich_contact(
    record: FriendRecord,
    group: Option<Option<String>>,
    enrichment: &Enrichment,
) -> SnapshotContact {
    let location = record.location.unwrap_or_else(|| "offline".to_string());
    let world = world_id_of(&location).and_then(|id| enrichment.worlds.get(id));

    SnapshotContact {
        occupant_count: enrichment.occupancy.get(&location).copied(),
        world_name: world.map(|w| w.name.clone()),
        world_thumbnail: world.and_then(|w| w.thumbnail.clone()),
        is_favorite: group.is_some(),
        favorite_group: group.flatten(),
        location,
        id: record.id,
        display_name: record.display_name,
        status: record.status,
        status_description: record.status_description,
        user_icon: record.user_icon,
        platform: record.platform,
    }
}
