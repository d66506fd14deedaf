//! Per-region download state machine.

use std::cell::RefCell;
use std::rc::Rc;

use futures_util::StreamExt;
use futures_util::stream;
use mapvault_core::{
    DownloadState, RegionDefinition, RegionStatus, Resource, Response, glyph_ranges, tile_cover,
};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use super::source::{OnlineSource, TransportError};
use super::style::{StyleError, StyleManifest, StyleParser};
use crate::cache::{CacheError, OfflineCache};

/// Network fetches kept in flight per region download. Completions are
/// funnelled back onto the owning context before any row is written.
const FETCH_CONCURRENCY: usize = 8;

/// Callbacks observing one region's download.
///
/// A single observer is attached per region at a time; attaching a new one
/// replaces and drops the prior. Replacing the observer from inside one of
/// its own callbacks is not supported.
pub trait RegionObserver {
    /// Invoked after every resolved resource.
    fn status_changed(&self, _status: &RegionStatus) {}

    /// Invoked on any non-fatal per-resource failure.
    fn error(&self, _error: &DownloadError) {}
}

/// Failures reported while downloading a region.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// A network fetch failed hard.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The region's style could not be interpreted.
    #[error(transparent)]
    Style(#[from] StyleError),
    /// The cache failed while reading or writing.
    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Downloads the resource closure of one offline region.
///
/// Created lazily per region id by the service and kept alive in its
/// registry. `set_state(Active)` starts closure discovery on the current
/// thread's task set; `set_state(Inactive)` cancels outstanding fetches,
/// keeps already-cached progress, and suppresses further observer
/// callbacks until reactivated. Reactivation walks the closure again and
/// resolves previously fetched resources from the cache without touching
/// the network.
#[derive(Clone)]
pub struct RegionDownload {
    inner: Rc<DownloadShared>,
}

struct DownloadShared {
    region_id: i64,
    definition: RegionDefinition,
    cache: Rc<RefCell<OfflineCache>>,
    online: Rc<dyn OnlineSource>,
    style: Rc<dyn StyleParser>,
    observer: RefCell<Option<Box<dyn RegionObserver>>>,
    status: RefCell<RegionStatus>,
    cancel: RefCell<CancellationToken>,
}

impl RegionDownload {
    pub(crate) fn new(
        region_id: i64,
        definition: RegionDefinition,
        cache: Rc<RefCell<OfflineCache>>,
        online: Rc<dyn OnlineSource>,
        style: Rc<dyn StyleParser>,
    ) -> Self {
        Self {
            inner: Rc::new(DownloadShared {
                region_id,
                definition,
                cache,
                online,
                style,
                observer: RefCell::new(None),
                status: RefCell::new(RegionStatus::default()),
                cancel: RefCell::new(CancellationToken::new()),
            }),
        }
    }

    /// Id of the region this download belongs to.
    #[must_use]
    pub fn region_id(&self) -> i64 {
        self.inner.region_id
    }

    /// Snapshot of the current aggregate progress.
    #[must_use]
    pub fn status(&self) -> RegionStatus {
        self.inner.status.borrow().clone()
    }

    /// Attach the observer, replacing and dropping any prior one.
    pub fn set_observer(&self, observer: Box<dyn RegionObserver>) {
        self.inner.observer.replace(Some(observer));
    }

    /// Transition the download state machine.
    pub fn set_state(&self, state: DownloadState) {
        match state {
            DownloadState::Active => self.activate(),
            DownloadState::Inactive => self.deactivate(),
        }
    }

    fn activate(&self) {
        {
            let mut status = self.inner.status.borrow_mut();
            if status.download_state == DownloadState::Active {
                return;
            }
            // Progress is recounted from scratch; cache hits make the
            // recount cheap.
            *status = RegionStatus {
                download_state: DownloadState::Active,
                ..RegionStatus::default()
            };
        }
        let token = CancellationToken::new();
        self.inner.cancel.replace(token.clone());
        let shared = Rc::clone(&self.inner);
        tokio::task::spawn_local(async move {
            if let Err(error) = shared.drive(&token).await {
                shared.notify_error(&token, &error);
            }
        });
    }

    fn deactivate(&self) {
        self.inner.cancel.borrow().cancel();
        self.inner.status.borrow_mut().download_state = DownloadState::Inactive;
    }
}

impl DownloadShared {
    async fn drive(&self, cancel: &CancellationToken) -> Result<(), DownloadError> {
        self.status.borrow_mut().required_resource_count = 1;

        // Nothing else in the closure is derivable without the style.
        let style_resource = Resource::style(self.definition.style_url.clone());
        let Some(style_response) = self.resolve(&style_resource, cancel).await? else {
            return Ok(());
        };
        let Some(style_data) = style_response.data else {
            self.status.borrow_mut().required_resource_count_is_precise = true;
            self.notify_status(cancel);
            self.notify_error(
                cancel,
                &DownloadError::Style(StyleError::Malformed(
                    "style resource has no payload".to_owned(),
                )),
            );
            return Ok(());
        };
        let manifest = self.style.parse(&style_data)?;

        let pending = self.closure(&manifest);
        {
            let mut status = self.status.borrow_mut();
            status.required_resource_count += pending.len() as u64;
            status.required_resource_count_is_precise = true;
        }
        self.notify_status(cancel);

        // Cache-first pass; misses queue for the network.
        let mut missing = Vec::new();
        for resource in pending {
            if cancel.is_cancelled() {
                return Ok(());
            }
            let cached = self
                .cache
                .borrow()
                .get_region_resource(self.region_id, &resource)?;
            match cached {
                Some(response) => {
                    self.record(&response, false);
                    self.notify_status(cancel);
                }
                None => missing.push(resource),
            }
        }

        let online = Rc::clone(&self.online);
        let mut fetches = stream::iter(missing.into_iter().map(move |resource| {
            let online = Rc::clone(&online);
            async move {
                let outcome = online.request(&resource).await;
                (resource, outcome)
            }
        }))
        .buffer_unordered(FETCH_CONCURRENCY);

        loop {
            let next = tokio::select! {
                // Cancellation wins over a ready completion, so in-flight
                // responses arriving after deactivation are never written.
                biased;
                () = cancel.cancelled() => return Ok(()),
                next = fetches.next() => next,
            };
            let Some((resource, outcome)) = next else {
                break;
            };
            match outcome {
                Ok(response) => {
                    self.cache
                        .borrow()
                        .put_region_resource(self.region_id, &resource, &response)?;
                    self.record(&response, true);
                    self.notify_status(cancel);
                }
                Err(error) => {
                    log::debug!(
                        "fetch of {resource} for region {} failed: {error}",
                        self.region_id
                    );
                    self.notify_error(cancel, &DownloadError::Transport(error));
                }
            }
        }
        Ok(())
    }

    /// Resolve one resource cache-first, falling back to the network.
    /// Returns `None` when cancelled before resolution.
    async fn resolve(
        &self,
        resource: &Resource,
        cancel: &CancellationToken,
    ) -> Result<Option<Response>, DownloadError> {
        if cancel.is_cancelled() {
            return Ok(None);
        }
        if let Some(response) = self
            .cache
            .borrow()
            .get_region_resource(self.region_id, resource)?
        {
            self.record(&response, false);
            self.notify_status(cancel);
            return Ok(Some(response));
        }
        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(None),
            outcome = self.online.request(resource) => outcome,
        };
        let response = outcome?;
        self.cache
            .borrow()
            .put_region_resource(self.region_id, resource, &response)?;
        self.record(&response, true);
        self.notify_status(cancel);
        Ok(Some(response))
    }

    /// Expand the parsed manifest into the remaining resource closure.
    fn closure(&self, manifest: &StyleManifest) -> Vec<Resource> {
        let definition = &self.definition;
        let mut resources = Vec::new();
        for url in &manifest.sources {
            resources.push(Resource::source(url.clone()));
        }
        if let Some(url) = &manifest.sprite_image {
            resources.push(Resource::sprite_image(url.clone()));
        }
        if let Some(url) = &manifest.sprite_json {
            resources.push(Resource::sprite_json(url.clone()));
        }
        if let Some(template) = &manifest.glyph_template {
            for (start, end) in glyph_ranges() {
                resources.push(Resource::glyphs(
                    template.replace("{range}", &format!("{start}-{end}")),
                ));
            }
        }
        for template in &manifest.tile_templates {
            for tile in tile_cover(
                &definition.bounds,
                definition.min_zoom,
                definition.max_zoom,
            ) {
                resources.push(Resource::tile(
                    template.clone(),
                    definition.pixel_ratio,
                    tile.x,
                    tile.y,
                    tile.z,
                ));
            }
        }
        resources
    }

    fn record(&self, response: &Response, transferred: bool) {
        let mut status = self.status.borrow_mut();
        status.completed_resource_count += 1;
        if transferred {
            if let Some(data) = &response.data {
                status.completed_resource_size += data.len() as u64;
            }
        }
    }

    fn notify_status(&self, cancel: &CancellationToken) {
        if cancel.is_cancelled() {
            return;
        }
        let status = self.status.borrow().clone();
        if let Some(observer) = self.observer.borrow().as_ref() {
            observer.status_changed(&status);
        }
    }

    fn notify_error(&self, cancel: &CancellationToken, error: &DownloadError) {
        if cancel.is_cancelled() {
            return;
        }
        if let Some(observer) = self.observer.borrow().as_ref() {
            observer.error(error);
        }
    }
}
