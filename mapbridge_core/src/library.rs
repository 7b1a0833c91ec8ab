// Copyright 2026 the Mapbridge Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The process-wide native map library.
//!
//! A host loads the engine once, before creating its first map. There is no
//! unload: maps on any thread may hold references into the engine until the
//! process exits.

use std::sync::OnceLock;

use crate::engine::MapEngine;
use crate::error::ConstructionError;

static ENGINE: OnceLock<Box<dyn MapEngine>> = OnceLock::new();

/// Installs the engine produced by `init`, if none is installed yet.
///
/// `init` runs at most once per process. Later calls ignore their argument
/// and return the engine already installed.
pub fn load(init: impl FnOnce() -> Box<dyn MapEngine>) -> &'static dyn MapEngine {
    let engine = ENGINE.get_or_init(|| {
        let engine = init();
        tracing::info!(engine = engine.name(), "native map library loaded");
        engine
    });
    &**engine
}

/// The installed engine.
///
/// # Errors
///
/// [`ConstructionError::LibraryNotLoaded`] before the first [`load`].
pub fn engine() -> Result<&'static dyn MapEngine, ConstructionError> {
    ENGINE
        .get()
        .map(|engine| &**engine)
        .ok_or(ConstructionError::LibraryNotLoaded)
}

/// Returns whether an engine has been installed.
#[must_use]
pub fn is_loaded() -> bool {
    ENGINE.get().is_some()
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::engine::{MapContext, NativeMap, NativeRenderer};

    struct Named(&'static str);

    impl MapEngine for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn create_map(&self, _context: MapContext) -> Result<Rc<dyn NativeMap>, ConstructionError> {
            Err(ConstructionError::Engine("maps are not supported".into()))
        }

        fn create_renderer(&self, _pixel_ratio: f32) -> Box<dyn NativeRenderer> {
            unreachable!("no map is ever created")
        }
    }

    // The only test in this crate that touches the global engine.
    #[test]
    fn loads_exactly_once() {
        assert_eq!(
            engine().err(),
            Some(ConstructionError::LibraryNotLoaded),
            "nothing loaded yet"
        );
        assert!(!is_loaded(), "not loaded");

        let first = load(|| Box::new(Named("first")));
        assert_eq!(first.name(), "first", "first load installs");
        let second = load(|| panic!("second init must not run"));
        assert_eq!(second.name(), "first", "later loads are no-ops");
        assert!(is_loaded(), "loaded");
        assert_eq!(engine().map(|e| e.name()).ok(), Some("first"), "engine()");
    }
}
