// Copyright 2026 the Mapbridge Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Argument conversion at the C boundary.

use core::ffi::c_char;
use std::ffi::{CStr, CString};

use crate::status::FfiError;

/// Borrows a NUL-terminated UTF-8 string.
///
/// # Safety
///
/// `ptr` must be null or point at a NUL-terminated string that stays valid and
/// unmodified for `'a`.
pub(crate) unsafe fn str_arg<'a>(
    ptr: *const c_char,
    name: &'static str,
) -> Result<&'a str, FfiError> {
    if ptr.is_null() {
        return Err(FfiError::Null(name));
    }
    // SAFETY: non-null and NUL-terminated per the caller's contract.
    let s = unsafe { CStr::from_ptr(ptr) };
    s.to_str()
        .map_err(|e| FfiError::InvalidArgument(format!("`{name}` is not UTF-8: {e}")))
}

/// An output slot that was checked for null up front, before any side effect.
pub(crate) struct Out<T> {
    ptr: *mut T,
}

impl<T> Out<T> {
    /// # Safety
    ///
    /// `ptr` must be null or valid for a write of `T`.
    pub(crate) unsafe fn new(ptr: *mut T, name: &'static str) -> Result<Self, FfiError> {
        if ptr.is_null() {
            Err(FfiError::Null(name))
        } else {
            Ok(Self { ptr })
        }
    }

    pub(crate) fn write(self, value: T) {
        // SAFETY: non-null and writable per `new`'s contract.
        unsafe { self.ptr.write(value) };
    }
}

/// Like [`Out`], but a null pointer means the caller is not interested.
pub(crate) struct OptionalOut<T> {
    ptr: *mut T,
}

impl<T> OptionalOut<T> {
    /// # Safety
    ///
    /// `ptr` must be null or valid for a write of `T`.
    pub(crate) unsafe fn new(ptr: *mut T) -> Self {
        Self { ptr }
    }

    pub(crate) fn write(self, value: T) {
        if !self.ptr.is_null() {
            // SAFETY: non-null and writable per `new`'s contract.
            unsafe { self.ptr.write(value) };
        }
    }
}

/// Hands an owned string to the host, to be released with
/// `mapbridge_string_free`.
pub(crate) fn owned_c_string(value: String) -> Result<*mut c_char, FfiError> {
    CString::new(value)
        .map(CString::into_raw)
        .map_err(|e| FfiError::InvalidArgument(e.to_string()))
}

pub(crate) fn positive_finite(value: f64, name: &'static str) -> Result<f64, FfiError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(FfiError::InvalidArgument(format!(
            "`{name}` must be finite and positive, got {value}"
        )))
    }
}

pub(crate) fn finite(value: f64, name: &'static str) -> Result<f64, FfiError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(FfiError::InvalidArgument(format!(
            "`{name}` must be finite, got {value}"
        )))
    }
}
