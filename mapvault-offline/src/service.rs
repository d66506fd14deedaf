//! The umbrella service: one cache instance plus the per-region downloader
//! registry.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;

use mapvault_core::{DownloadState, Region, RegionDefinition, RegionStatus};

use crate::cache::{CacheError, OfflineCache};
use crate::download::{OnlineSource, RegionDownload, RegionObserver, StyleParser};

/// Owns the offline cache, the network and style collaborators, and the
/// downloader registry.
///
/// Downloaders are created lazily on first access per region id and live
/// in the registry until their region is deleted or the service drops.
/// Everything is confined to the execution context that owns the service;
/// callers elsewhere marshal onto it.
pub struct OfflineService {
    cache: Rc<RefCell<OfflineCache>>,
    online: Rc<dyn OnlineSource>,
    style: Rc<dyn StyleParser>,
    downloads: RefCell<HashMap<i64, RegionDownload>>,
}

impl OfflineService {
    /// Open (or create) the cache at `path` and wire the collaborators.
    pub fn open(
        path: impl AsRef<Path>,
        online: Rc<dyn OnlineSource>,
        style: Rc<dyn StyleParser>,
    ) -> Result<Self, CacheError> {
        Ok(Self::with_cache(OfflineCache::open(path)?, online, style))
    }

    /// Wire the collaborators around a volatile in-memory cache.
    pub fn in_memory(
        online: Rc<dyn OnlineSource>,
        style: Rc<dyn StyleParser>,
    ) -> Result<Self, CacheError> {
        Ok(Self::with_cache(
            OfflineCache::open_in_memory()?,
            online,
            style,
        ))
    }

    fn with_cache(
        cache: OfflineCache,
        online: Rc<dyn OnlineSource>,
        style: Rc<dyn StyleParser>,
    ) -> Self {
        Self {
            cache: Rc::new(RefCell::new(cache)),
            online,
            style,
            downloads: RefCell::new(HashMap::new()),
        }
    }

    /// Shared handle to the underlying cache.
    #[must_use]
    pub fn cache(&self) -> Rc<RefCell<OfflineCache>> {
        Rc::clone(&self.cache)
    }

    /// All regions in storage order.
    pub fn list_regions(&self) -> Result<Vec<Region>, CacheError> {
        self.cache.borrow().list_regions()
    }

    /// Create a region and return it with its store-assigned id.
    pub fn create_region(
        &self,
        definition: &RegionDefinition,
        metadata: Vec<u8>,
    ) -> Result<Region, CacheError> {
        self.cache.borrow().create_region(definition, metadata)
    }

    /// Delete a region, discarding any live downloader tracking it.
    pub fn delete_region(&self, region: &Region) -> Result<(), CacheError> {
        if let Some(download) = self.downloads.borrow_mut().remove(&region.id) {
            download.set_state(DownloadState::Inactive);
        }
        self.cache.borrow().delete_region(region)
    }

    /// The downloader for `region_id`, created on first access.
    pub fn download(&self, region_id: i64) -> Result<RegionDownload, CacheError> {
        if let Some(existing) = self.downloads.borrow().get(&region_id) {
            return Ok(existing.clone());
        }
        let definition = self.cache.borrow().region_definition(region_id)?;
        let download = RegionDownload::new(
            region_id,
            definition,
            Rc::clone(&self.cache),
            Rc::clone(&self.online),
            Rc::clone(&self.style),
        );
        self.downloads
            .borrow_mut()
            .insert(region_id, download.clone());
        Ok(download)
    }

    /// Attach the observer for a region, replacing any prior one.
    pub fn set_region_observer(
        &self,
        region_id: i64,
        observer: Box<dyn RegionObserver>,
    ) -> Result<(), CacheError> {
        self.download(region_id)?.set_observer(observer);
        Ok(())
    }

    /// Transition a region's download state machine.
    pub fn set_region_download_state(
        &self,
        region_id: i64,
        state: DownloadState,
    ) -> Result<(), CacheError> {
        self.download(region_id)?.set_state(state);
        Ok(())
    }

    /// Snapshot of a region's download progress.
    pub fn region_status(&self, region_id: i64) -> Result<RegionStatus, CacheError> {
        Ok(self.download(region_id)?.status())
    }
}
