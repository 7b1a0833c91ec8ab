// Copyright 2026 the Mapbridge Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The thread-local table behind every handle the host holds.
//!
//! Objects are handed out by clone (`Rc` or a cheap handle type) so that no
//! table borrow is held while engine code runs. Host callbacks may therefore
//! call back into the ABI, including destroying the object being driven.

use std::cell::RefCell;
use std::rc::Rc;

use mapbridge_core::backend::RendererBackend;
use mapbridge_core::frontend::RendererFrontend;
use mapbridge_core::handle::{HandleTable, NativeRef};
use mapbridge_core::map::Map;
use mapbridge_core::observer::ObserverBridge;
use mapbridge_core::run_loop::RunLoop;

use crate::status::FfiError;

pub(crate) type Backend = Box<dyn RendererBackend>;
pub(crate) type Frontend = RendererFrontend<Backend>;
pub(crate) type FfiMap = Map<Backend>;

pub(crate) enum Object {
    RunLoop(Rc<RunLoop>),
    /// A backend not yet bound to a frontend.
    Backend(Backend),
    Frontend(Frontend),
    Observer(ObserverBridge),
    Map(Rc<FfiMap>),
}

impl Object {
    fn kind(&self) -> &'static str {
        match self {
            Self::RunLoop(_) => "run loop",
            Self::Backend(_) => "backend",
            Self::Frontend(_) => "frontend",
            Self::Observer(_) => "observer",
            Self::Map(_) => "map",
        }
    }
}

thread_local! {
    static OBJECTS: RefCell<HandleTable<Object>> = const { RefCell::new(HandleTable::new()) };
}

pub(crate) fn insert(object: Object) -> u64 {
    let kind = object.kind();
    let reference = OBJECTS.with(|table| table.borrow_mut().insert(object));
    tracing::trace!(%reference, kind, "handle issued");
    reference.to_raw()
}

/// Removes the object behind `raw`. Stale and unknown handles yield `None`.
///
/// The object is dropped by the caller, after the table borrow ends.
pub(crate) fn remove(raw: u64) -> Option<Object> {
    let object = OBJECTS.with(|table| table.borrow_mut().remove(NativeRef::from_raw(raw)));
    if let Some(object) = &object {
        tracing::trace!(
            reference = %NativeRef::from_raw(raw),
            kind = object.kind(),
            "handle released"
        );
    }
    object
}

/// Removes `raw` for a `*_destroy` entry point.
///
/// Null, stale and unknown handles are not an error and yield `None`; a live
/// handle of another kind is.
pub(crate) fn destroy(
    raw: u64,
    expected: &'static str,
    matches: impl Fn(&Object) -> bool,
) -> Result<Option<Object>, FfiError> {
    let reference = NativeRef::from_raw(raw);
    let live = OBJECTS.with(|table| match table.borrow().get(reference) {
        Err(_) => Ok(false),
        Ok(object) if matches(object) => Ok(true),
        Ok(_) => Err(FfiError::WrongKind {
            reference,
            expected,
        }),
    })?;
    Ok(if live { remove(raw) } else { None })
}

/// Clones a value out of the object behind `raw`.
pub(crate) fn lookup<T>(
    raw: u64,
    expected: &'static str,
    project: impl FnOnce(&Object) -> Option<T>,
) -> Result<T, FfiError> {
    let reference = NativeRef::from_raw(raw);
    if reference.is_null() {
        return Err(FfiError::WrongKind {
            reference,
            expected,
        });
    }
    OBJECTS.with(|table| {
        let table = table.borrow();
        let object = table.get(reference)?;
        project(object).ok_or(FfiError::WrongKind {
            reference,
            expected,
        })
    })
}

pub(crate) fn run_loop(raw: u64) -> Result<Rc<RunLoop>, FfiError> {
    lookup(raw, "run loop", |object| match object {
        Object::RunLoop(run_loop) => Some(Rc::clone(run_loop)),
        _ => None,
    })
}

pub(crate) fn frontend(raw: u64) -> Result<Frontend, FfiError> {
    lookup(raw, "frontend", |object| match object {
        Object::Frontend(frontend) => Some(frontend.clone()),
        _ => None,
    })
}

pub(crate) fn observer(raw: u64) -> Result<ObserverBridge, FfiError> {
    lookup(raw, "observer", |object| match object {
        Object::Observer(bridge) => Some(bridge.clone()),
        _ => None,
    })
}

pub(crate) fn map(raw: u64) -> Result<Rc<FfiMap>, FfiError> {
    lookup(raw, "map", |object| match object {
        Object::Map(map) => Some(Rc::clone(map)),
        _ => None,
    })
}

/// Takes an unbound backend out of the table.
pub(crate) fn take_backend(raw: u64) -> Result<Backend, FfiError> {
    lookup(raw, "backend", |object| {
        matches!(object, Object::Backend(_)).then_some(())
    })?;
    match remove(raw) {
        Some(Object::Backend(backend)) => Ok(backend),
        _ => Err(FfiError::WrongKind {
            reference: NativeRef::from_raw(raw),
            expected: "backend",
        }),
    }
}

/// Number of live objects on this thread.
pub(crate) fn live() -> usize {
    OBJECTS.with(|table| table.borrow().len())
}
