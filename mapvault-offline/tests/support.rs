//! Shared fixtures for the offline engine integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashSet;
use std::future::Future;
use std::rc::Rc;

use async_trait::async_trait;
use geo::{Coord, Rect};
use mapvault_core::{RegionDefinition, Resource, Response};
use mapvault_offline::{OnlineSource, StyleError, StyleManifest, StyleParser, TransportError};

/// In-memory online source answering every URL with a deterministic
/// payload unless told to report it absent or failing.
pub struct StubOnlineSource {
    log: RefCell<Vec<String>>,
    not_found: RefCell<HashSet<String>>,
    failing: RefCell<HashSet<String>>,
}

impl StubOnlineSource {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            log: RefCell::new(Vec::new()),
            not_found: RefCell::new(HashSet::new()),
            failing: RefCell::new(HashSet::new()),
        })
    }

    /// Answer `url` with a cacheable `NotFound` response.
    pub fn mark_not_found(&self, url: impl Into<String>) {
        self.not_found.borrow_mut().insert(url.into());
    }

    /// Answer `url` with a hard transport error.
    pub fn fail(&self, url: impl Into<String>) {
        self.failing.borrow_mut().insert(url.into());
    }

    /// Total requests observed, including failing ones.
    pub fn request_count(&self) -> usize {
        self.log.borrow().len()
    }

    /// Requests observed for one specific URL.
    pub fn requests_for(&self, url: &str) -> usize {
        self.log.borrow().iter().filter(|seen| *seen == url).count()
    }
}

#[async_trait(?Send)]
impl OnlineSource for StubOnlineSource {
    async fn request(&self, resource: &Resource) -> Result<Response, TransportError> {
        let url = resource.url();
        self.log.borrow_mut().push(url.clone());
        if self.failing.borrow().contains(&url) {
            return Err(TransportError::Http {
                url,
                status: 500,
                message: "stub failure".to_owned(),
            });
        }
        if self.not_found.borrow().contains(&url) {
            return Ok(Response::not_found());
        }
        Ok(Response::from_data(
            format!("payload for {url}").into_bytes(),
        ))
    }
}

/// Style parser returning a fixed manifest regardless of input.
pub struct StubStyleParser {
    manifest: StyleManifest,
}

impl StubStyleParser {
    pub fn new(manifest: StyleManifest) -> Rc<Self> {
        Rc::new(Self { manifest })
    }
}

impl StyleParser for StubStyleParser {
    fn parse(&self, _style: &[u8]) -> Result<StyleManifest, StyleError> {
        Ok(self.manifest.clone())
    }
}

/// Manifest referencing one source, one sprite pair, one glyph template
/// (256 ranges), and one tile template.
pub fn sample_manifest() -> StyleManifest {
    StyleManifest {
        sources: vec!["https://example.org/streets.json".to_owned()],
        sprite_image: Some("https://example.org/sprite.png".to_owned()),
        sprite_json: Some("https://example.org/sprite.json".to_owned()),
        glyph_template: Some("https://example.org/glyphs/{range}.pbf".to_owned()),
        tile_templates: vec!["https://example.org/{z}-{x}-{y}.vector.pbf".to_owned()],
    }
}

/// World-spanning region at zoom zero: exactly one tile per template.
pub fn world_definition() -> RegionDefinition {
    RegionDefinition::new(
        "https://example.org/style.json",
        Rect::new(Coord { x: -180.0, y: -90.0 }, Coord { x: 180.0, y: 90.0 }),
        0,
        0,
        1.0,
    )
    .expect("valid definition")
}

/// Run `future` on a current-thread runtime with a local task set, so the
/// downloader's spawned tasks are driven alongside the test body.
pub fn run_local<F: Future>(future: F) -> F::Output {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("failed to build Tokio runtime");
    let local = tokio::task::LocalSet::new();
    runtime.block_on(local.run_until(future))
}

/// Yield to the local task set until `condition` holds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..100_000 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached while driving the local task set");
}

/// Yield a fixed number of times so any in-flight task work settles.
pub async fn settle() {
    for _ in 0..256 {
        tokio::task::yield_now().await;
    }
}
