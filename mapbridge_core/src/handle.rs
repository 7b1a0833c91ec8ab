// Copyright 2026 the Mapbridge Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Native resource ownership.
//!
//! Two mechanisms live here:
//!
//! - [`NativeHandle`] owns exactly one native resource and releases it exactly
//!   once, on the first of an explicit [`destroy`](NativeHandle::destroy) or
//!   drop. Access after destruction is reported as
//!   [`LifecycleError::UseAfterFree`] instead of touching freed memory.
//! - [`HandleTable`] maps opaque [`NativeRef`] values to objects using
//!   generational slots, so a host holding a stale or already-released
//!   reference gets an error rather than another object's slot.

use core::cell::{Cell, RefCell};
use core::fmt;
use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::rc::Rc;

use crate::error::LifecycleError;

/// Opaque 64-bit reference to a native object.
///
/// Zero is the null reference and never names a live object. Hosts store and
/// pass the raw value back without interpreting it.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NativeRef(u64);

impl NativeRef {
    /// The null reference.
    pub const NULL: Self = Self(0);

    /// Wraps a raw value received from a host.
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw value to hand to a host.
    #[inline]
    #[must_use]
    pub const fn to_raw(self) -> u64 {
        self.0
    }

    /// Returns `true` for the null reference.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Debug for NativeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeRef({:#x})", self.0)
    }
}

impl fmt::Display for NativeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

std::thread_local! {
    static LIVE_HANDLES: Cell<usize> = const { Cell::new(0) };
}

/// Returns the number of [`NativeHandle`]s on this thread that have not been
/// destroyed.
///
/// Handles cannot leave the thread that created them, so the count is exact.
#[must_use]
pub fn live_handles() -> usize {
    LIVE_HANDLES.with(Cell::get)
}

type ReleaseHook = Box<dyn FnOnce()>;

/// Exclusive owner of one native resource.
///
/// The resource is created by a factory that runs exactly once, inside the
/// constructor. The handle is never observable in a destroyed state before
/// the factory returns.
///
/// [`access`](Self::access) hands out a counted reference. Destroying the
/// handle while such a reference is still alive drops the handle's own
/// reference and runs the release hook; the borrower keeps a valid object
/// until it is done with it. No operation can reach the resource through the
/// handle afterwards.
///
/// Handles are `!Send` and `!Sync`; callers on one thread serialize by
/// construction.
pub struct NativeHandle<T: ?Sized> {
    reference: NativeRef,
    destroyed: AtomicBool,
    slot: RefCell<Option<Rc<T>>>,
    release: Cell<Option<ReleaseHook>>,
}

impl<T: ?Sized> fmt::Debug for NativeHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeHandle")
            .field("reference", &self.reference)
            .field("destroyed", &self.is_destroyed())
            .finish_non_exhaustive()
    }
}

impl<T> NativeHandle<T> {
    /// Creates a handle by running `factory` once.
    pub fn new(factory: impl FnOnce() -> T) -> Self {
        Self::from_rc(Rc::new(factory()))
    }

    /// Creates a handle from a fallible factory.
    ///
    /// On error no handle exists and nothing needs releasing.
    pub fn try_new<E>(factory: impl FnOnce() -> Result<T, E>) -> Result<Self, E> {
        factory().map(|resource| Self::from_rc(Rc::new(resource)))
    }
}

impl<T: ?Sized> NativeHandle<T> {
    /// Wraps an already-allocated resource.
    ///
    /// Use this for trait objects, which cannot be produced by value.
    pub fn from_rc(resource: Rc<T>) -> Self {
        let reference = NativeRef::next();
        LIVE_HANDLES.with(|n| n.set(n.get() + 1));
        tracing::trace!(%reference, "native handle created");
        Self {
            reference,
            destroyed: AtomicBool::new(false),
            slot: RefCell::new(Some(resource)),
            release: Cell::new(None),
        }
    }

    /// Registers a hook that runs exactly once when the handle is destroyed.
    ///
    /// Replaces any previously registered hook.
    #[must_use]
    pub fn with_release(self, release: impl FnOnce() + 'static) -> Self {
        self.release.set(Some(Box::new(release)));
        self
    }

    /// Returns this handle's reference.
    #[inline]
    #[must_use]
    pub fn reference(&self) -> NativeRef {
        self.reference
    }

    /// Returns whether the resource has been released.
    #[inline]
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    /// Returns a counted reference to the resource.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::UseAfterFree`] once the handle has been destroyed.
    pub fn access(&self) -> Result<Rc<T>, LifecycleError> {
        let gone = LifecycleError::UseAfterFree {
            reference: self.reference,
        };
        if self.is_destroyed() {
            return Err(gone);
        }
        self.slot.borrow().clone().ok_or(gone)
    }

    /// Releases the resource.
    ///
    /// The first call drops the handle's reference, runs the release hook
    /// and returns `true`. Every later call is a no-op returning `false`.
    pub fn destroy(&self) -> bool {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return false;
        }
        let resource = self.slot.borrow_mut().take();
        drop(resource);
        if let Some(release) = self.release.take() {
            release();
        }
        LIVE_HANDLES.with(|n| n.set(n.get().saturating_sub(1)));
        tracing::debug!(reference = %self.reference, "native handle destroyed");
        true
    }
}

impl<T: ?Sized> Drop for NativeHandle<T> {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Generational slot table keyed by [`NativeRef`].
///
/// A reference packs the slot index in its low 32 bits and the slot's
/// generation in its high 32 bits. Generations start at 1, so no live
/// reference is ever null. Removing an entry bumps the slot's generation,
/// which makes every outstanding reference to it stale.
pub struct HandleTable<T> {
    slots: Vec<Slot<T>>,
    free_list: Vec<u32>,
    len: usize,
}

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

impl<T> fmt::Debug for HandleTable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleTable")
            .field("len", &self.len)
            .field("capacity", &self.slots.len())
            .finish_non_exhaustive()
    }
}

impl<T> Default for HandleTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> HandleTable<T> {
    /// Creates an empty table.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            len: 0,
        }
    }

    /// Stores `value` and returns its reference.
    ///
    /// # Panics
    ///
    /// Panics if the table already holds `u32::MAX` slots.
    pub fn insert(&mut self, value: T) -> NativeRef {
        let idx = if let Some(idx) = self.free_list.pop() {
            // Reuse a freed slot; its generation was bumped on removal.
            self.slots[idx as usize].value = Some(value);
            idx
        } else {
            let idx = u32::try_from(self.slots.len()).expect("handle table is full");
            self.slots.push(Slot {
                generation: 1,
                value: Some(value),
            });
            idx
        };
        self.len += 1;
        pack(idx, self.slots[idx as usize].generation)
    }

    /// Returns the object behind `reference`.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::UseAfterFree`] for null, unknown or stale references.
    pub fn get(&self, reference: NativeRef) -> Result<&T, LifecycleError> {
        self.slot_index(reference)
            .and_then(|idx| self.slots[idx].value.as_ref())
            .ok_or(LifecycleError::UseAfterFree { reference })
    }

    /// Mutable variant of [`get`](Self::get).
    ///
    /// # Errors
    ///
    /// [`LifecycleError::UseAfterFree`] for null, unknown or stale references.
    pub fn get_mut(&mut self, reference: NativeRef) -> Result<&mut T, LifecycleError> {
        match self.slot_index(reference) {
            Some(idx) => self.slots[idx]
                .value
                .as_mut()
                .ok_or(LifecycleError::UseAfterFree { reference }),
            None => Err(LifecycleError::UseAfterFree { reference }),
        }
    }

    /// Removes the object behind `reference` and returns it.
    ///
    /// Stale, unknown and null references return `None`, so removing twice
    /// is harmless.
    pub fn remove(&mut self, reference: NativeRef) -> Option<T> {
        let idx = self.slot_index(reference)?;
        let slot = &mut self.slots[idx];
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1).max(1);
        #[expect(
            clippy::cast_possible_truncation,
            reason = "slot indices are created from u32 values"
        )]
        let idx = idx as u32;
        self.free_list.push(idx);
        self.len -= 1;
        Some(value)
    }

    /// Returns whether `reference` names a live object.
    #[must_use]
    pub fn contains(&self, reference: NativeRef) -> bool {
        self.get(reference).is_ok()
    }

    /// Number of live objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if no objects are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterates over live references and their objects.
    pub fn iter(&self) -> impl Iterator<Item = (NativeRef, &T)> + '_ {
        self.slots.iter().enumerate().filter_map(|(idx, slot)| {
            #[expect(
                clippy::cast_possible_truncation,
                reason = "slot indices are created from u32 values"
            )]
            let idx = idx as u32;
            slot.value.as_ref().map(|v| (pack(idx, slot.generation), v))
        })
    }

    fn slot_index(&self, reference: NativeRef) -> Option<usize> {
        if reference.is_null() {
            return None;
        }
        let (idx, generation) = unpack(reference);
        let slot = self.slots.get(idx as usize)?;
        (slot.generation == generation).then_some(idx as usize)
    }
}

fn pack(idx: u32, generation: u32) -> NativeRef {
    NativeRef((u64::from(generation) << 32) | u64::from(idx))
}

fn unpack(reference: NativeRef) -> (u32, u32) {
    #[expect(
        clippy::cast_possible_truncation,
        reason = "splitting a u64 into its two halves"
    )]
    let parts = (reference.0 as u32, (reference.0 >> 32) as u32);
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factory_runs_once() {
        let calls = Rc::new(Cell::new(0));
        let c = Rc::clone(&calls);
        let handle = NativeHandle::new(move || {
            c.set(c.get() + 1);
            7_u32
        });
        assert_eq!(calls.get(), 1, "factory should run exactly once");
        assert_eq!(*handle.access().unwrap(), 7, "resource should be stored");
        assert!(!handle.reference().is_null(), "live handles are non-null");
    }

    #[test]
    fn failed_factory_creates_nothing() {
        let before = live_handles();
        let result = NativeHandle::<u32>::try_new(|| Err("boom"));
        assert_eq!(result.err(), Some("boom"), "error is propagated");
        assert_eq!(live_handles(), before, "no handle was counted");
    }

    #[test]
    fn destroy_is_idempotent() {
        let released = Rc::new(Cell::new(0));
        let r = Rc::clone(&released);
        let handle = NativeHandle::new(|| 1_u8).with_release(move || r.set(r.get() + 1));

        assert!(handle.destroy(), "first destroy releases");
        assert!(!handle.destroy(), "second destroy is a no-op");
        drop(handle);
        assert_eq!(released.get(), 1, "release hook runs exactly once");
    }

    #[test]
    fn access_after_destroy_fails() {
        let handle = NativeHandle::new(|| String::from("map"));
        handle.destroy();
        assert_eq!(
            handle.access(),
            Err(LifecycleError::UseAfterFree {
                reference: handle.reference()
            }),
            "destroyed handles refuse access"
        );
    }

    #[test]
    fn drop_releases() {
        let released = Rc::new(Cell::new(false));
        let r = Rc::clone(&released);
        let before = live_handles();
        {
            let _handle = NativeHandle::new(|| 0_i32).with_release(move || r.set(true));
            assert_eq!(live_handles(), before + 1, "handle is counted while alive");
        }
        assert!(released.get(), "drop should run the release hook");
        assert_eq!(live_handles(), before, "dropped handle is uncounted");
    }

    #[test]
    fn in_flight_access_outlives_destroy() {
        let handle = NativeHandle::new(|| vec![1, 2, 3]);
        let borrowed = handle.access().unwrap();
        assert!(handle.destroy(), "destroy proceeds while borrowed");
        assert_eq!(borrowed.len(), 3, "borrower still sees a valid object");
        assert!(handle.access().is_err(), "but the handle no longer hands it out");
    }

    #[test]
    fn trait_objects_can_be_owned() {
        let handle: NativeHandle<dyn fmt::Debug> = NativeHandle::from_rc(Rc::new(5_u8));
        assert_eq!(
            format!("{:?}", handle.access().unwrap()),
            "5",
            "unsized resources are reachable"
        );
    }

    #[test]
    fn table_insert_get_remove() {
        let mut table = HandleTable::new();
        let a = table.insert("a");
        let b = table.insert("b");
        assert_ne!(a, b, "references are distinct");
        assert_eq!(table.get(a), Ok(&"a"), "lookup by reference");
        assert_eq!(table.len(), 2, "two entries");

        assert_eq!(table.remove(a), Some("a"), "first remove returns value");
        assert_eq!(table.remove(a), None, "second remove is a no-op");
        assert!(table.get(a).is_err(), "stale reference is rejected");
        assert_eq!(table.len(), 1, "one entry left");
    }

    #[test]
    fn recycled_slot_rejects_old_reference() {
        let mut table = HandleTable::new();
        let old = table.insert(1_u32);
        table.remove(old);
        let new = table.insert(2_u32);
        assert_eq!(
            old.to_raw() & 0xffff_ffff,
            new.to_raw() & 0xffff_ffff,
            "slot is reused"
        );
        assert_ne!(old, new, "generation differs after reuse");
        assert!(table.get(old).is_err(), "old reference stays dead");
        assert_eq!(table.get(new), Ok(&2), "new reference resolves");
    }

    #[test]
    fn null_and_unknown_references_are_rejected() {
        let mut table: HandleTable<u8> = HandleTable::new();
        assert!(table.get(NativeRef::NULL).is_err(), "null never resolves");
        assert!(
            table.get_mut(NativeRef::from_raw(0xdead_0000_0001)).is_err(),
            "unknown slot never resolves"
        );
        assert_eq!(table.remove(NativeRef::NULL), None, "null remove is a no-op");
        assert!(table.is_empty(), "table untouched");
    }
}
