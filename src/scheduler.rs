//! Cooperative single-threaded scheduling substrate.
//!
//! The engine has exactly two kinds of deferred work: microtasks (buffered
//! notification flushes and the deferred emission loops of `of`/`from_iter`)
//! and futures (async transform tasks, future adapters). Both live in
//! thread-local queues and are drained by a trampoline: every public entry
//! point of the engine holds a dispatch guard, and when the outermost guard
//! releases, queued work runs to completion before control returns to the
//! caller. Work scheduled while a notification is being delivered therefore
//! runs strictly after that delivery, never recursively inside it.

pub mod serial;

use std::{
  any::Any,
  cell::{Cell, RefCell},
  collections::VecDeque,
  future::Future,
  panic::{catch_unwind, AssertUnwindSafe},
};

use futures::{
  executor::{LocalPool, LocalSpawner},
  task::LocalSpawnExt,
};

use crate::error::{self, UncaughtError};

thread_local! {
  static MICROTASKS: RefCell<VecDeque<Box<dyn FnOnce()>>> = RefCell::new(VecDeque::new());
  static EXECUTOR: RefCell<LocalPool> = RefCell::new(LocalPool::new());
  static SPAWNER: LocalSpawner = EXECUTOR.with(|pool| pool.borrow().spawner());
  static DEPTH: Cell<usize> = const { Cell::new(0) };
  static PUMPING: Cell<bool> = const { Cell::new(false) };
  static DEFERRED_PANICS: RefCell<VecDeque<Box<dyn Any + Send>>> =
    RefCell::new(VecDeque::new());
}

/// Marks one engine entry (a subscribe, a notification, an unsubscribe, a
/// broadcast). When the outermost guard drops, deferred work drains.
pub(crate) struct DispatchGuard(());

pub(crate) fn enter() -> DispatchGuard {
  DEPTH.with(|depth| depth.set(depth.get() + 1));
  DispatchGuard(())
}

impl Drop for DispatchGuard {
  fn drop(&mut self) {
    let outermost = DEPTH.with(|depth| {
      depth.set(depth.get() - 1);
      depth.get() == 0
    });
    if outermost && !PUMPING.with(Cell::get) && !std::thread::panicking() {
      pump();
    }
  }
}

/// Queues `task` to run once the current dispatch has completed. FIFO order
/// is guaranteed between microtasks.
pub(crate) fn enqueue(task: impl FnOnce() + 'static) {
  MICROTASKS.with(|tasks| tasks.borrow_mut().push_back(Box::new(task)));
  maybe_pump();
}

/// Spawns `future` on the thread-local executor.
pub(crate) fn spawn(future: impl Future<Output = ()> + 'static) {
  SPAWNER.with(|spawner| {
    let _ = spawner.spawn_local(future);
  });
  maybe_pump();
}

/// Defers a panic payload until the current drain finishes, where it is
/// resumed on the caller of the outermost engine entry point.
pub(crate) fn defer_panic(payload: Box<dyn Any + Send>) {
  DEFERRED_PANICS.with(|panics| panics.borrow_mut().push_back(payload));
}

/// Drains all deferred work until both queues are idle.
///
/// Everything scheduled by the engine drains automatically before the
/// outermost engine call returns, so this is only needed by hosts whose
/// futures are woken *after* the call that spawned them already returned
/// (an external timer or I/O reactor, for example).
pub fn run_until_idle() {
  if !PUMPING.with(Cell::get) {
    pump();
  }
}

fn maybe_pump() {
  if DEPTH.with(Cell::get) == 0 && !PUMPING.with(Cell::get) {
    pump();
  }
}

fn pump() {
  struct PumpGuard;
  impl Drop for PumpGuard {
    fn drop(&mut self) { PUMPING.with(|pumping| pumping.set(false)); }
  }

  PUMPING.with(|pumping| pumping.set(true));
  let _guard = PumpGuard;

  loop {
    loop {
      let task = MICROTASKS.with(|tasks| tasks.borrow_mut().pop_front());
      match task {
        Some(task) => {
          if let Err(payload) = catch_unwind(AssertUnwindSafe(task)) {
            error::report(UncaughtError::Panic(payload));
          }
        }
        None => break,
      }
    }

    EXECUTOR.with(|pool| pool.borrow_mut().run_until_stalled());

    if MICROTASKS.with(|tasks| tasks.borrow().is_empty()) {
      break;
    }
  }

  drop(_guard);
  let deferred = DEFERRED_PANICS.with(|panics| panics.borrow_mut().pop_front());
  if let Some(payload) = deferred {
    std::panic::resume_unwind(payload);
  }
}
