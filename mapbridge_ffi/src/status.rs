// Copyright 2026 the Mapbridge Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Status codes and the per-thread last-error message.

use core::ffi::c_char;
use core::ptr;
use std::any::Any;
use std::cell::RefCell;
use std::ffi::CString;
use std::panic::{AssertUnwindSafe, catch_unwind};

use mapbridge_core::error::{
    ConstructionError, Error, LifecycleError, RunLoopError, SurfaceError,
};
use mapbridge_core::handle::NativeRef;
use thiserror::Error;

/// Result of every entry point.
pub type MbStatus = i32;

/// The call succeeded.
pub const MB_OK: MbStatus = 0;
/// A required pointer argument was null.
pub const MB_ERR_NULL: MbStatus = 1;
/// The handle is null or names an object of another kind.
pub const MB_ERR_INVALID_HANDLE: MbStatus = 2;
/// The handle names an object that was already destroyed.
pub const MB_ERR_USE_AFTER_FREE: MbStatus = 3;
/// A run loop already exists on this thread.
pub const MB_ERR_ALREADY_BOUND: MbStatus = 4;
/// A construction precondition failed: zero-sized surface, no run loop, no
/// library loaded, or a closed object.
pub const MB_ERR_PRECONDITION: MbStatus = 5;
/// The camera set both `center` and `anchor`, or a non-finite field.
pub const MB_ERR_INVALID_CAMERA: MbStatus = 6;
/// Malformed JSON, invalid UTF-8 or out-of-range numbers.
pub const MB_ERR_INVALID_ARGUMENT: MbStatus = 7;
/// Rust code panicked; the panic was contained.
pub const MB_ERR_PANIC: MbStatus = 8;

/// Why an entry point failed.
#[derive(Debug, Error)]
pub(crate) enum FfiError {
    #[error("`{0}` must not be null")]
    Null(&'static str),
    #[error("handle {reference} is not a live {expected}")]
    WrongKind {
        reference: NativeRef,
        expected: &'static str,
    },
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error(transparent)]
    Core(#[from] Error),
}

impl From<LifecycleError> for FfiError {
    fn from(err: LifecycleError) -> Self {
        Self::Core(err.into())
    }
}

impl From<ConstructionError> for FfiError {
    fn from(err: ConstructionError) -> Self {
        Self::Core(err.into())
    }
}

impl From<RunLoopError> for FfiError {
    fn from(err: RunLoopError) -> Self {
        Self::Core(err.into())
    }
}

impl From<SurfaceError> for FfiError {
    fn from(err: SurfaceError) -> Self {
        Self::Core(err.into())
    }
}

impl FfiError {
    pub(crate) fn status(&self) -> MbStatus {
        match self {
            Self::Null(_) => MB_ERR_NULL,
            Self::WrongKind { .. } => MB_ERR_INVALID_HANDLE,
            Self::InvalidArgument(_) => MB_ERR_INVALID_ARGUMENT,
            Self::Core(err) => core_status(err),
        }
    }
}

fn core_status(err: &Error) -> MbStatus {
    match err {
        Error::Lifecycle(LifecycleError::UseAfterFree { .. }) => MB_ERR_USE_AFTER_FREE,
        Error::Lifecycle(LifecycleError::Reentrant { .. }) => MB_ERR_PRECONDITION,
        Error::RunLoop(RunLoopError::AlreadyBound) => MB_ERR_ALREADY_BOUND,
        Error::Construction(ConstructionError::InvalidOptions(_))
        | Error::Surface(SurfaceError::InvalidPixelRatio(_))
        | Error::Construction(ConstructionError::Surface(SurfaceError::InvalidPixelRatio(_))) => {
            MB_ERR_INVALID_ARGUMENT
        }
        Error::Camera(_) => MB_ERR_INVALID_CAMERA,
        _ => MB_ERR_PRECONDITION,
    }
}

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(message: String) {
    let message = CString::new(message).unwrap_or_else(|e| {
        let mut bytes = e.into_vec();
        bytes.retain(|&b| b != 0);
        CString::new(bytes).unwrap_or_default()
    });
    LAST_ERROR.with(|slot| *slot.borrow_mut() = Some(message));
}

fn clear_last_error() {
    LAST_ERROR.with(|slot| *slot.borrow_mut() = None);
}

pub(crate) fn last_error_ptr() -> *const c_char {
    LAST_ERROR.with(|slot| slot.borrow().as_ref().map_or(ptr::null(), |s| s.as_ptr()))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        String::from("non-string panic payload")
    }
}

/// Runs one entry point body: contains panics, records the error message and
/// converts the outcome to a status code.
pub(crate) fn guard(name: &'static str, body: impl FnOnce() -> Result<(), FfiError>) -> MbStatus {
    match catch_unwind(AssertUnwindSafe(body)) {
        Ok(Ok(())) => {
            clear_last_error();
            MB_OK
        }
        Ok(Err(err)) => {
            let status = err.status();
            tracing::debug!(entry = name, status, error = %err, "ffi call failed");
            set_last_error(format!("{name}: {err}"));
            status
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            tracing::error!(entry = name, %message, "panic contained at the C boundary");
            set_last_error(format!("{name}: panic: {message}"));
            MB_ERR_PANIC
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_map_to_documented_codes() {
        let reference = NativeRef::from_raw(7);
        let cases = [
            (FfiError::Null("out"), MB_ERR_NULL),
            (
                FfiError::WrongKind {
                    reference,
                    expected: "map",
                },
                MB_ERR_INVALID_HANDLE,
            ),
            (LifecycleError::UseAfterFree { reference }.into(), MB_ERR_USE_AFTER_FREE),
            (RunLoopError::AlreadyBound.into(), MB_ERR_ALREADY_BOUND),
            (ConstructionError::NoRunLoop.into(), MB_ERR_PRECONDITION),
            (
                SurfaceError::NotRealized {
                    width: 0,
                    height: 1,
                }
                .into(),
                MB_ERR_PRECONDITION,
            ),
            (
                FfiError::Core(mapbridge_core::error::CameraError::CenterAndAnchor.into()),
                MB_ERR_INVALID_CAMERA,
            ),
            (
                ConstructionError::InvalidOptions("bad".into()).into(),
                MB_ERR_INVALID_ARGUMENT,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.status(), status, "{err}");
        }
    }

    #[test]
    fn guard_records_and_clears_the_message() {
        let status = guard("test_fail", || Err(FfiError::Null("out")));
        assert_eq!(status, MB_ERR_NULL, "null status");
        assert!(!last_error_ptr().is_null(), "message recorded");

        assert_eq!(guard("test_ok", || Ok(())), MB_OK, "ok status");
        assert!(last_error_ptr().is_null(), "success clears the message");
    }

    #[test]
    fn guard_contains_panics() {
        let status = guard("test_panic", || panic!("boom"));
        assert_eq!(status, MB_ERR_PANIC, "panic status");
        let message = LAST_ERROR.with(|slot| slot.borrow().clone()).expect("message");
        assert!(
            message.to_string_lossy().contains("boom"),
            "panic message kept: {message:?}"
        );
    }

    #[test]
    fn interior_nul_is_stripped() {
        set_last_error("a\0b".into());
        let message = LAST_ERROR.with(|slot| slot.borrow().clone()).expect("message");
        assert_eq!(message.to_str(), Ok("ab"), "nul removed");
    }
}
