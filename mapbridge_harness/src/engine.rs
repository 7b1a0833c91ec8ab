// Copyright 2026 the Mapbridge Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The headless [`MapEngine`].

use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use mapbridge_core::engine::{MapContext, MapEngine, NativeMap, NativeRenderer};
use mapbridge_core::error::ConstructionError;

use crate::clock::{Clock, SystemClock};
use crate::loader::{MemoryLoader, ResourceLoader};
use crate::map::HeadlessMap;
use crate::renderer::HeadlessRenderer;

/// Creates [`HeadlessMap`]s and [`HeadlessRenderer`]s.
///
/// Every map shares the engine's loader and clock.
pub struct HeadlessEngine {
    loader: Arc<dyn ResourceLoader>,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for HeadlessEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeadlessEngine").finish_non_exhaustive()
    }
}

impl Default for HeadlessEngine {
    fn default() -> Self {
        Self::new(MemoryLoader::new())
    }
}

impl HeadlessEngine {
    /// An engine that fetches through `loader` on wall-clock time.
    pub fn new(loader: impl ResourceLoader + 'static) -> Self {
        Self {
            loader: Arc::new(loader),
            clock: Arc::new(SystemClock::new()),
        }
    }

    /// Replaces the time source.
    #[must_use]
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }
}

impl MapEngine for HeadlessEngine {
    fn name(&self) -> &str {
        "headless"
    }

    fn create_map(&self, context: MapContext) -> Result<Rc<dyn NativeMap>, ConstructionError> {
        let map = HeadlessMap::new(context, Arc::clone(&self.loader), Arc::clone(&self.clock))?;
        Ok(map)
    }

    fn create_renderer(&self, pixel_ratio: f32) -> Box<dyn NativeRenderer> {
        Box::new(HeadlessRenderer::new(pixel_ratio))
    }
}
