// Copyright 2026 the Mapbridge Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Cooperative per-thread run loop.
//!
//! The map engine delivers every asynchronous completion (resource loads,
//! timers, animation steps) as a callback queued on the run loop of the thread
//! that owns the map. Nothing runs until the host pumps the loop with
//! [`RunLoop::run_once`], usually through
//! [`RendererFrontend::tick`](crate::frontend::RendererFrontend::tick).
//!
//! Three ways to enqueue work:
//!
//! - [`Scheduler::schedule`] for `!Send` tasks created on the loop's thread.
//! - [`RemoteScheduler::schedule`] for `Send` tasks posted from worker threads.
//! - [`Mailbox`] / [`MailboxSender`] for typed messages sent from any thread
//!   to a handler that lives on the loop's thread.
//!
//! # Draining rules
//!
//! `run_once` never blocks. It runs the tasks that were queued when it was
//! called and returns; work queued by those tasks waits for the next call.
//! Calling `run_once` from inside a task is a no-op, so a callback that
//! ticks the frontend cannot recurse into the loop.
//!
//! If nobody pumps the loop, queued callbacks never fire. That is a
//! starvation hazard for the host, not an error.

use core::cell::{Cell, RefCell};
use core::fmt;
use core::sync::atomic::{AtomicBool, Ordering};
use std::collections::VecDeque;
use std::rc::{Rc, Weak};
use std::sync::Arc;
use std::thread::ThreadId;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;

use crate::error::RunLoopError;

type LocalTask = Box<dyn FnOnce()>;
type RemoteTask = Box<dyn FnOnce() + Send>;
type Waker = Arc<dyn Fn() + Send + Sync>;

std::thread_local! {
    static CURRENT: RefCell<Weak<Shared>> = const { RefCell::new(Weak::new()) };
}

/// State reachable from other threads.
struct Remote {
    closed: AtomicBool,
    waker: Mutex<Option<Waker>>,
}

impl Remote {
    fn wake(&self) {
        let waker = self.waker.lock().clone();
        if let Some(waker) = waker {
            waker();
        }
    }
}

struct Shared {
    thread: ThreadId,
    local: RefCell<VecDeque<LocalTask>>,
    remote_tx: Sender<RemoteTask>,
    remote_rx: Receiver<RemoteTask>,
    mailboxes: RefCell<Vec<Weak<dyn Drain>>>,
    remote: Arc<Remote>,
    stopped: Cell<bool>,
    draining: Cell<bool>,
}

impl Shared {
    fn run_once(&self) -> usize {
        if self.stopped.get() || self.draining.get() {
            return 0;
        }
        self.draining.set(true);
        let _reset = ResetOnDrop(&self.draining);

        let local_n = self.local.borrow().len();
        let remote_n = self.remote_rx.len();
        let mailboxes: Vec<Rc<dyn Drain>> = {
            let mut boxes = self.mailboxes.borrow_mut();
            boxes.retain(|m| m.strong_count() > 0);
            boxes.iter().filter_map(Weak::upgrade).collect()
        };

        let mut ran = 0;
        for _ in 0..local_n {
            if self.stopped.get() {
                return ran;
            }
            let task = self.local.borrow_mut().pop_front();
            let Some(task) = task else { break };
            task();
            ran += 1;
        }
        for _ in 0..remote_n {
            if self.stopped.get() {
                return ran;
            }
            let Ok(task) = self.remote_rx.try_recv() else {
                break;
            };
            task();
            ran += 1;
        }
        for mailbox in mailboxes {
            if self.stopped.get() {
                return ran;
            }
            ran += mailbox.drain(&self.stopped);
        }
        if ran > 0 {
            tracing::trace!(ran, "run loop drained");
        }
        ran
    }

    fn pending(&self) -> usize {
        let boxes: usize = self
            .mailboxes
            .borrow()
            .iter()
            .filter_map(Weak::upgrade)
            .map(|m| m.pending())
            .sum();
        self.local.borrow().len() + self.remote_rx.len() + boxes
    }
}

struct ResetOnDrop<'a>(&'a Cell<bool>);

impl Drop for ResetOnDrop<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// A cooperative event loop bound to the thread that created it.
///
/// At most one run loop may be live per thread. It must exist before any map
/// or renderer frontend is created on that thread, and must outlive them.
/// Dropping it unbinds the thread; queued tasks are dropped without running.
pub struct RunLoop {
    shared: Rc<Shared>,
}

impl fmt::Debug for RunLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunLoop")
            .field("thread", &self.shared.thread)
            .field("stopped", &self.shared.stopped.get())
            .finish_non_exhaustive()
    }
}

impl RunLoop {
    /// Binds a new run loop to the calling thread.
    ///
    /// # Errors
    ///
    /// [`RunLoopError::AlreadyBound`] if this thread already owns a live loop.
    pub fn new() -> Result<Self, RunLoopError> {
        CURRENT.with(|current| {
            let mut current = current.borrow_mut();
            if current.upgrade().is_some() {
                return Err(RunLoopError::AlreadyBound);
            }
            let (remote_tx, remote_rx) = crossbeam_channel::unbounded();
            let shared = Rc::new(Shared {
                thread: std::thread::current().id(),
                local: RefCell::new(VecDeque::new()),
                remote_tx,
                remote_rx,
                mailboxes: RefCell::new(Vec::new()),
                remote: Arc::new(Remote {
                    closed: AtomicBool::new(false),
                    waker: Mutex::new(None),
                }),
                stopped: Cell::new(false),
                draining: Cell::new(false),
            });
            *current = Rc::downgrade(&shared);
            tracing::debug!(thread = ?shared.thread, "run loop bound");
            Ok(Self { shared })
        })
    }

    /// Runs every callback that was pending when the call began.
    ///
    /// Returns the number of callbacks that ran. Returns 0 once the loop is
    /// stopped, or when called from inside one of its own callbacks.
    pub fn run_once(&self) -> usize {
        self.shared.run_once()
    }

    /// Stops the loop. Later calls to [`run_once`](Self::run_once) do nothing.
    ///
    /// Tasks already queued stay queued; the loop can still be dropped
    /// normally.
    pub fn stop(&self) {
        if !self.shared.stopped.replace(true) {
            tracing::debug!(thread = ?self.shared.thread, "run loop stopped");
        }
    }

    /// Returns whether [`stop`](Self::stop) was called.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.shared.stopped.get()
    }

    /// Approximate number of callbacks waiting to run.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.shared.pending()
    }

    /// Returns a thread-local scheduler for this loop.
    #[must_use]
    pub fn scheduler(&self) -> Scheduler {
        Scheduler {
            shared: Rc::downgrade(&self.shared),
        }
    }

    /// Returns a scheduler that may be moved to other threads.
    #[must_use]
    pub fn remote(&self) -> RemoteScheduler {
        RemoteScheduler {
            tx: self.shared.remote_tx.clone(),
            remote: Arc::clone(&self.shared.remote),
        }
    }

    /// Installs a callback invoked, on the posting thread, whenever work is
    /// queued from another thread.
    ///
    /// Hosts use it to schedule a tick instead of polling.
    pub fn set_waker(&self, waker: impl Fn() + Send + Sync + 'static) {
        *self.shared.remote.waker.lock() = Some(Arc::new(waker));
    }
}

impl Drop for RunLoop {
    fn drop(&mut self) {
        self.shared.remote.closed.store(true, Ordering::Release);
        // `try_with` because the loop may be dropped during thread teardown.
        let _ = CURRENT.try_with(|current| {
            let mut current = current.borrow_mut();
            if core::ptr::eq(current.as_ptr(), Rc::as_ptr(&self.shared)) {
                *current = Weak::new();
            }
        });
        tracing::debug!(thread = ?self.shared.thread, "run loop unbound");
    }
}

/// Thread-local handle to a [`RunLoop`].
///
/// Does not keep the loop alive. Cannot leave its thread.
#[derive(Clone)]
pub struct Scheduler {
    shared: Weak<Shared>,
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("alive", &self.is_alive())
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    /// Returns the scheduler of the run loop bound to the calling thread.
    #[must_use]
    pub fn current() -> Option<Self> {
        CURRENT.with(|current| {
            let shared = current.borrow().clone();
            shared.upgrade().map(|_| Self { shared })
        })
    }

    /// Returns whether the loop still exists.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.shared.strong_count() > 0
    }

    /// Queues `task` to run on a later [`RunLoop::run_once`].
    ///
    /// # Errors
    ///
    /// [`RunLoopError::Closed`] if the loop was dropped.
    pub fn schedule(&self, task: impl FnOnce() + 'static) -> Result<(), RunLoopError> {
        let shared = self.shared.upgrade().ok_or(RunLoopError::Closed)?;
        shared.local.borrow_mut().push_back(Box::new(task));
        Ok(())
    }

    /// Pumps the loop once. Returns 0 if the loop is gone.
    pub fn run_once(&self) -> usize {
        self.shared.upgrade().map_or(0, |shared| shared.run_once())
    }

    /// Returns a cross-thread scheduler for the same loop.
    ///
    /// # Errors
    ///
    /// [`RunLoopError::Closed`] if the loop was dropped.
    pub fn remote(&self) -> Result<RemoteScheduler, RunLoopError> {
        let shared = self.shared.upgrade().ok_or(RunLoopError::Closed)?;
        Ok(RemoteScheduler {
            tx: shared.remote_tx.clone(),
            remote: Arc::clone(&shared.remote),
        })
    }

    /// Registers a mailbox whose messages are handed to `handler` on this
    /// loop's thread.
    ///
    /// The returned [`Mailbox`] owns the registration; dropping it stops
    /// delivery. The [`MailboxSender`] may be cloned and sent anywhere.
    ///
    /// # Errors
    ///
    /// [`RunLoopError::Closed`] if the loop was dropped.
    pub fn mailbox<M: Send + 'static>(
        &self,
        handler: impl FnMut(M) + 'static,
    ) -> Result<(Mailbox<M>, MailboxSender<M>), RunLoopError> {
        let shared = self.shared.upgrade().ok_or(RunLoopError::Closed)?;
        let (tx, rx) = crossbeam_channel::unbounded();
        let inner = Rc::new(MailboxInner {
            rx,
            handler: RefCell::new(Box::new(handler)),
        });
        let as_drain: Rc<dyn Drain> = inner.clone();
        shared.mailboxes.borrow_mut().push(Rc::downgrade(&as_drain));
        Ok((
            Mailbox { inner },
            MailboxSender {
                tx,
                remote: Arc::clone(&shared.remote),
            },
        ))
    }
}

/// `Send + Clone` handle for posting work to a [`RunLoop`] from any thread.
#[derive(Clone)]
pub struct RemoteScheduler {
    tx: Sender<RemoteTask>,
    remote: Arc<Remote>,
}

impl fmt::Debug for RemoteScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteScheduler")
            .field("closed", &self.remote.closed.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}

impl RemoteScheduler {
    /// Queues `task` to run on the loop's thread.
    ///
    /// # Errors
    ///
    /// [`RunLoopError::Closed`] if the loop was dropped.
    pub fn schedule(&self, task: impl FnOnce() + Send + 'static) -> Result<(), RunLoopError> {
        if self.remote.closed.load(Ordering::Acquire) {
            return Err(RunLoopError::Closed);
        }
        self.tx
            .send(Box::new(task))
            .map_err(|_| RunLoopError::Closed)?;
        self.remote.wake();
        Ok(())
    }
}

trait Drain {
    fn drain(&self, stopped: &Cell<bool>) -> usize;
    fn pending(&self) -> usize;
}

struct MailboxInner<M> {
    rx: Receiver<M>,
    handler: RefCell<Box<dyn FnMut(M)>>,
}

impl<M> Drain for MailboxInner<M> {
    fn drain(&self, stopped: &Cell<bool>) -> usize {
        let Ok(mut handler) = self.handler.try_borrow_mut() else {
            return 0;
        };
        let mut ran = 0;
        for _ in 0..self.rx.len() {
            if stopped.get() {
                break;
            }
            let Ok(msg) = self.rx.try_recv() else { break };
            handler(msg);
            ran += 1;
        }
        ran
    }

    fn pending(&self) -> usize {
        self.rx.len()
    }
}

/// Receiving end of a typed channel drained by a [`RunLoop`].
///
/// Created with [`Scheduler::mailbox`].
pub struct Mailbox<M> {
    inner: Rc<MailboxInner<M>>,
}

impl<M> fmt::Debug for Mailbox<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mailbox")
            .field("pending", &self.inner.rx.len())
            .finish_non_exhaustive()
    }
}

/// Sending end of a [`Mailbox`]. `Send + Clone` when `M: Send`.
pub struct MailboxSender<M> {
    tx: Sender<M>,
    remote: Arc<Remote>,
}

impl<M> Clone for MailboxSender<M> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            remote: Arc::clone(&self.remote),
        }
    }
}

impl<M> fmt::Debug for MailboxSender<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailboxSender").finish_non_exhaustive()
    }
}

impl<M> MailboxSender<M> {
    /// Sends `msg` to the mailbox's handler.
    ///
    /// # Errors
    ///
    /// [`RunLoopError::Closed`] if the mailbox or its loop was dropped.
    pub fn send(&self, msg: M) -> Result<(), RunLoopError> {
        if self.remote.closed.load(Ordering::Acquire) {
            return Err(RunLoopError::Closed);
        }
        self.tx.send(msg).map_err(|_| RunLoopError::Closed)?;
        self.remote.wake();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn one_loop_per_thread() {
        let first = RunLoop::new().unwrap();
        assert_eq!(
            RunLoop::new().err(),
            Some(RunLoopError::AlreadyBound),
            "second loop on the same thread is rejected"
        );
        drop(first);
        assert!(RunLoop::new().is_ok(), "thread is free again after drop");
    }

    #[test]
    fn current_tracks_binding() {
        assert!(Scheduler::current().is_none(), "no loop bound yet");
        let rl = RunLoop::new().unwrap();
        assert!(Scheduler::current().is_some(), "loop is discoverable");
        drop(rl);
        assert!(Scheduler::current().is_none(), "unbound after drop");
    }

    #[test]
    fn run_once_drains_only_prior_tasks() {
        let rl = RunLoop::new().unwrap();
        let sched = rl.scheduler();
        let log = Rc::new(RefCell::new(Vec::new()));

        let l = Rc::clone(&log);
        let s = sched.clone();
        sched
            .schedule(move || {
                l.borrow_mut().push("first");
                let l2 = Rc::clone(&l);
                s.schedule(move || l2.borrow_mut().push("second")).unwrap();
            })
            .unwrap();

        assert_eq!(rl.run_once(), 1, "only the first task runs");
        assert_eq!(*log.borrow(), ["first"], "nested task deferred");
        assert_eq!(rl.run_once(), 1, "nested task runs next time");
        assert_eq!(*log.borrow(), ["first", "second"], "order preserved");
        assert_eq!(rl.run_once(), 0, "nothing left");
    }

    #[test]
    fn stop_makes_run_once_a_no_op() {
        let rl = RunLoop::new().unwrap();
        let ran = Rc::new(Cell::new(false));
        let r = Rc::clone(&ran);
        rl.scheduler().schedule(move || r.set(true)).unwrap();
        rl.stop();
        assert!(rl.is_stopped(), "loop reports stopped");
        assert_eq!(rl.run_once(), 0, "stopped loop runs nothing");
        assert!(!ran.get(), "task did not run");
    }

    #[test]
    fn nested_run_once_is_ignored() {
        let rl = RunLoop::new().unwrap();
        let sched = rl.scheduler();
        let inner = Rc::new(Cell::new(usize::MAX));
        let i = Rc::clone(&inner);
        let s = sched.clone();
        sched.schedule(move || i.set(s.run_once())).unwrap();
        sched.schedule(|| {}).unwrap();
        assert_eq!(rl.run_once(), 2, "both tasks run in the outer drain");
        assert_eq!(inner.get(), 0, "inner pump does nothing");
    }

    #[test]
    fn remote_tasks_run_on_loop_thread() {
        let rl = RunLoop::new().unwrap();
        let remote = rl.remote();
        let loop_thread = std::thread::current().id();
        let seen = Arc::new(Mutex::new(None));
        let s = Arc::clone(&seen);
        std::thread::spawn(move || {
            remote
                .schedule(move || *s.lock() = Some(std::thread::current().id()))
                .unwrap();
        })
        .join()
        .unwrap();

        assert_eq!(rl.run_once(), 1, "remote task runs");
        assert_eq!(*seen.lock(), Some(loop_thread), "on the loop's thread");
    }

    #[test]
    fn remote_schedule_after_drop_fails() {
        let rl = RunLoop::new().unwrap();
        let remote = rl.remote();
        drop(rl);
        assert_eq!(
            remote.schedule(|| {}),
            Err(RunLoopError::Closed),
            "closed loops reject work"
        );
    }

    #[test]
    fn mailbox_delivers_in_order_and_wakes() {
        let rl = RunLoop::new().unwrap();
        let wakes = Arc::new(AtomicUsize::new(0));
        let w = Arc::clone(&wakes);
        rl.set_waker(move || {
            w.fetch_add(1, Ordering::Relaxed);
        });

        let got = Rc::new(RefCell::new(Vec::new()));
        let g = Rc::clone(&got);
        let (mailbox, tx) = rl
            .scheduler()
            .mailbox(move |n: u32| g.borrow_mut().push(n))
            .unwrap();

        let worker_tx = tx.clone();
        std::thread::spawn(move || {
            worker_tx.send(1).unwrap();
            worker_tx.send(2).unwrap();
        })
        .join()
        .unwrap();

        assert_eq!(rl.pending(), 2, "messages are counted as pending");
        assert_eq!(rl.run_once(), 2, "both messages handled");
        assert_eq!(*got.borrow(), [1, 2], "in send order");
        assert_eq!(wakes.load(Ordering::Relaxed), 2, "each send wakes the host");

        drop(mailbox);
        assert_eq!(tx.send(3), Err(RunLoopError::Closed), "dropped mailbox");
    }
}
