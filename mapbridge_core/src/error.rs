// Copyright 2026 the Mapbridge Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error types.
//!
//! Each concern gets its own enum so callers can match on exactly the
//! failures an operation can produce. [`Error`] unifies them for facade
//! methods that can fail in more than one way.
//!
//! Map-load failures are the exception: they never surface as a `Result`.
//! They are delivered asynchronously as [`MapLoadError`] values through
//! [`MapObserver::on_did_fail_loading_map`](crate::observer::MapObserver::on_did_fail_loading_map).

use core::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::handle::NativeRef;

/// Misuse of a native object's lifecycle.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum LifecycleError {
    /// The object was already destroyed (explicitly or by drop).
    #[error("native object {reference} used after it was destroyed")]
    UseAfterFree {
        /// The reference the caller tried to use.
        reference: NativeRef,
    },
    /// The object is already borrowed further up the current call stack.
    #[error("native object {reference} re-entered while already in use")]
    Reentrant {
        /// The reference the caller tried to use.
        reference: NativeRef,
    },
}

/// Failure to create or reconfigure a drawable surface.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum SurfaceError {
    /// The host window has no area yet. Defer creation until it does.
    #[error("surface is not realized ({width}x{height})")]
    NotRealized {
        /// Requested width in physical pixels.
        width: u32,
        /// Requested height in physical pixels.
        height: u32,
    },
    /// Pixel ratio must be finite and positive.
    #[error("invalid pixel ratio {0}")]
    InvalidPixelRatio(f32),
    /// The window system behind the handle cannot be driven by this backend.
    #[error("window system not supported by this backend: {0}")]
    Unsupported(String),
    /// The graphics context or surface could not be created.
    #[error("failed to create graphics context: {0}")]
    Creation(String),
    /// A frame could not be acquired or presented.
    #[error("surface frame error: {0}")]
    Frame(String),
}

/// Failure to bind or reach a run loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum RunLoopError {
    /// The calling thread already owns a live run loop.
    #[error("a run loop is already bound to this thread")]
    AlreadyBound,
    /// The run loop (or mailbox) the task was addressed to is gone.
    #[error("run loop is closed")]
    Closed,
}

/// A precondition for constructing a native object was not met.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum ConstructionError {
    /// No run loop is bound to the calling thread.
    #[error("no run loop is bound to the current thread")]
    NoRunLoop,
    /// The backend surface could not be created.
    #[error(transparent)]
    Surface(#[from] SurfaceError),
    /// An option record failed validation.
    #[error("invalid options: {0}")]
    InvalidOptions(String),
    /// No map engine has been loaded into the process.
    #[error("native map library has not been loaded")]
    LibraryNotLoaded,
    /// The engine refused to create the object.
    #[error("engine error: {0}")]
    Engine(String),
}

/// A camera update that cannot be applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum CameraError {
    /// `center` and `anchor` were both supplied; only one may govern the
    /// transform's fixed point.
    #[error("camera options may not set both center and anchor")]
    CenterAndAnchor,
    /// A numeric field was NaN or infinite.
    #[error("camera field `{0}` is not finite")]
    NotFinite(&'static str),
}

/// Failure to draw a frame.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum RenderError {
    /// The backend failed to activate, draw or present.
    #[error(transparent)]
    Backend(#[from] SurfaceError),
    /// The native renderer reported an error.
    #[error("renderer error: {0}")]
    Renderer(String),
}

/// Why a map failed to load, reported through the observer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MapLoadError {
    /// The style document was malformed.
    StyleParseError,
    /// The style document could not be fetched.
    StyleLoadError,
    /// The style resource does not exist.
    NotFoundError,
    /// Anything else.
    UnknownError,
}

impl MapLoadError {
    /// Returns the stable numeric code used across the C ABI.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::StyleParseError => 0,
            Self::StyleLoadError => 1,
            Self::NotFoundError => 2,
            Self::UnknownError => 3,
        }
    }

    /// Maps a numeric code back to a variant; unknown codes become
    /// [`UnknownError`](Self::UnknownError).
    #[must_use]
    pub const fn from_code(code: i32) -> Self {
        match code {
            0 => Self::StyleParseError,
            1 => Self::StyleLoadError,
            2 => Self::NotFoundError,
            _ => Self::UnknownError,
        }
    }
}

impl fmt::Display for MapLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::StyleParseError => "style parse error",
            Self::StyleLoadError => "style load error",
            Self::NotFoundError => "not found",
            Self::UnknownError => "unknown error",
        };
        f.write_str(s)
    }
}

/// A host listener panicked while handling an event.
///
/// Faults are caught at the observer boundary; they are reported to the
/// bridge's fault handler and never propagate into the engine.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("listener panicked while handling {event}: {message}")]
pub struct ListenerFault {
    /// Name of the event being delivered.
    pub event: &'static str,
    /// Panic payload, when it was a string.
    pub message: String,
}

/// Any error produced by the map bridge.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum Error {
    /// See [`LifecycleError`].
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    /// See [`ConstructionError`].
    #[error(transparent)]
    Construction(#[from] ConstructionError),
    /// See [`CameraError`].
    #[error(transparent)]
    Camera(#[from] CameraError),
    /// See [`RunLoopError`].
    #[error(transparent)]
    RunLoop(#[from] RunLoopError),
    /// See [`SurfaceError`].
    #[error(transparent)]
    Surface(#[from] SurfaceError),
    /// See [`RenderError`].
    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Result alias defaulting to [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;
