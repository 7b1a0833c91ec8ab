// Copyright 2026 the Mapbridge Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Resource loaders.
//!
//! The headless engine fetches styles through a [`ResourceLoader`]. Loaders
//! answer through a [`Responder`], which may be called inline or from any
//! other thread; the engine routes the answer back to the map's run loop.

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use crossbeam_channel::Sender;
use parking_lot::RwLock;
use thiserror::Error;

/// Why a resource could not be loaded.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum LoadError {
    /// Nothing exists at the URL.
    #[error("resource not found: {0}")]
    NotFound(String),
    /// The resource exists but could not be read.
    #[error("failed to load resource: {0}")]
    Transport(String),
}

/// Receives the outcome of one request.
pub type Responder = Box<dyn FnOnce(Result<String, LoadError>) + Send>;

/// Fetches resources by URL.
pub trait ResourceLoader: Send + Sync {
    /// Requests `url`. `respond` is called exactly once, possibly before this
    /// returns and possibly on another thread.
    fn request(&self, url: &str, respond: Responder);
}

impl<L: ResourceLoader + ?Sized> ResourceLoader for Arc<L> {
    fn request(&self, url: &str, respond: Responder) {
        (**self).request(url, respond);
    }
}

/// Serves resources from memory, answering inline.
#[derive(Default)]
pub struct MemoryLoader {
    entries: RwLock<HashMap<String, Result<String, LoadError>>>,
    requests: AtomicUsize,
}

impl fmt::Debug for MemoryLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryLoader")
            .field("entries", &self.entries.read().len())
            .field("requests", &self.request_count())
            .finish()
    }
}

impl MemoryLoader {
    /// An empty loader.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves `body` at `url`.
    pub fn insert(&self, url: impl Into<String>, body: impl Into<String>) {
        self.entries.write().insert(url.into(), Ok(body.into()));
    }

    /// Fails requests for `url` with `error`.
    pub fn insert_error(&self, url: impl Into<String>, error: LoadError) {
        self.entries.write().insert(url.into(), Err(error));
    }

    /// Number of requests served so far.
    #[must_use]
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::Relaxed)
    }
}

impl ResourceLoader for MemoryLoader {
    fn request(&self, url: &str, respond: Responder) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        let result = self
            .entries
            .read()
            .get(url)
            .cloned()
            .unwrap_or_else(|| Err(LoadError::NotFound(url.to_owned())));
        respond(result);
    }
}

type Job = Box<dyn FnOnce() + Send>;

/// A named background thread that runs jobs in order.
///
/// The thread exits once every sender is gone.
struct Worker {
    tx: Sender<Job>,
}

impl Worker {
    fn spawn(name: &str) -> io::Result<Self> {
        let (tx, rx) = crossbeam_channel::unbounded::<Job>();
        thread::Builder::new().name(name.to_owned()).spawn(move || {
            for job in rx {
                job();
            }
        })?;
        Ok(Self { tx })
    }

    fn run(&self, job: Job) {
        if let Err(crossbeam_channel::SendError(job)) = self.tx.send(job) {
            tracing::warn!("loader worker is gone; running job inline");
            job();
        }
    }
}

/// Reads `file://` URLs on a worker thread.
pub struct FileLoader {
    worker: Worker,
}

impl fmt::Debug for FileLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileLoader").finish_non_exhaustive()
    }
}

impl FileLoader {
    /// Starts the worker thread.
    ///
    /// # Errors
    ///
    /// Any error from spawning the thread.
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            worker: Worker::spawn("mapbridge-file-loader")?,
        })
    }
}

fn read_file(url: &str) -> Result<String, LoadError> {
    let Some(path) = url.strip_prefix("file://") else {
        return Err(LoadError::Transport(format!("not a file URL: {url}")));
    };
    std::fs::read_to_string(path).map_err(|err| match err.kind() {
        io::ErrorKind::NotFound => LoadError::NotFound(url.to_owned()),
        _ => LoadError::Transport(format!("{url}: {err}")),
    })
}

impl ResourceLoader for FileLoader {
    fn request(&self, url: &str, respond: Responder) {
        let url = url.to_owned();
        self.worker.run(Box::new(move || respond(read_file(&url))));
    }
}

/// Moves another loader's requests onto a worker thread.
///
/// Turns inline answers into asynchronous ones, which is how network loaders
/// behave.
pub struct ThreadedLoader<L> {
    inner: Arc<L>,
    worker: Worker,
}

impl<L> fmt::Debug for ThreadedLoader<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadedLoader").finish_non_exhaustive()
    }
}

impl<L: ResourceLoader + 'static> ThreadedLoader<L> {
    /// Wraps `inner`.
    ///
    /// # Errors
    ///
    /// Any error from spawning the thread.
    pub fn new(inner: Arc<L>) -> io::Result<Self> {
        Ok(Self {
            inner,
            worker: Worker::spawn("mapbridge-threaded-loader")?,
        })
    }

    /// The wrapped loader.
    #[must_use]
    pub fn inner(&self) -> &Arc<L> {
        &self.inner
    }
}

impl<L: ResourceLoader + 'static> ResourceLoader for ThreadedLoader<L> {
    fn request(&self, url: &str, respond: Responder) {
        let inner = Arc::clone(&self.inner);
        let url = url.to_owned();
        self.worker
            .run(Box::new(move || inner.request(&url, respond)));
    }
}

/// Dispatches requests to loaders by URL scheme.
#[derive(Default)]
pub struct CompositeLoader {
    routes: Vec<(String, Box<dyn ResourceLoader>)>,
}

impl fmt::Debug for CompositeLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.routes.iter().map(|(scheme, _)| scheme))
            .finish()
    }
}

impl CompositeLoader {
    /// A loader with no routes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes URLs with `scheme` (without `://`) to `loader`. Earlier routes
    /// win.
    #[must_use]
    pub fn route(
        mut self,
        scheme: impl Into<String>,
        loader: impl ResourceLoader + 'static,
    ) -> Self {
        self.routes.push((scheme.into(), Box::new(loader)));
        self
    }
}

impl ResourceLoader for CompositeLoader {
    fn request(&self, url: &str, respond: Responder) {
        let scheme = url.split_once("://").map_or("", |(scheme, _)| scheme);
        match self.routes.iter().find(|(s, _)| s == scheme) {
            Some((_, loader)) => loader.request(url, respond),
            None => respond(Err(LoadError::Transport(format!(
                "no loader for scheme `{scheme}`"
            )))),
        }
    }
}
