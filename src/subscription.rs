//! Subscription lifecycle and the reentrancy-safe delivery state machine.
//!
//! Every `subscribe` call pairs one producer with one consumer through a
//! shared subscription cell. The cell runs a small state machine that
//! guarantees ordered, exactly-once delivery even when a producer emits
//! synchronously during its own initialization, or a consumer callback
//! re-enters the producer side:
//!
//! ```text
//! Initializing → Ready ⇄ Buffering ⇄ Running → Closed
//! ```
//!
//! A notification that arrives while another dispatch is in flight is never
//! delivered recursively. It is buffered in arrival order and drained by a
//! deferred flush once the current dispatch has completed.

use std::{
  collections::VecDeque,
  panic::{catch_unwind, AssertUnwindSafe},
};

use crate::{
  error::{self, UncaughtError},
  observer::CallbackObserver,
  rc::{MutRc, RcDeref, RcDerefMut},
  scheduler,
};

/// Handle to a live producer/consumer pairing, able to cancel it.
pub trait SubscriptionLike {
  /// Stops the stream before it finished on its own. Idempotent: calling it
  /// on an already-closed subscription is a no-op.
  fn unsubscribe(&mut self);

  fn is_closed(&self) -> bool;
}

impl<T: SubscriptionLike + ?Sized> SubscriptionLike for Box<T> {
  #[inline]
  fn unsubscribe(&mut self) { (**self).unsubscribe() }

  #[inline]
  fn is_closed(&self) -> bool { (**self).is_closed() }
}

// ============================================================================
// TearDown
// ============================================================================

/// Normalized cleanup value returned by a producer.
///
/// Producers can release resources through a plain closure
/// (`TearDown::new`), by handing back another subscription (`From`), or by
/// returning nothing at all (`()` converts via [`IntoTearDown`]). Whatever
/// the shape, the cleanup runs exactly once; panics inside it are caught and
/// reported to the uncaught-error hook.
pub struct TearDown(Option<TearDownKind>);

enum TearDownKind {
  Callback(Box<dyn FnOnce()>),
  Handle(Box<dyn SubscriptionLike>),
}

impl TearDown {
  pub fn none() -> Self { TearDown(None) }

  pub fn new(f: impl FnOnce() + 'static) -> Self {
    TearDown(Some(TearDownKind::Callback(Box::new(f))))
  }

  /// Runs the cleanup. Only the first call has any effect.
  pub fn call(&mut self) {
    let outcome = match self.0.take() {
      None => return,
      Some(TearDownKind::Callback(f)) => catch_unwind(AssertUnwindSafe(f)),
      Some(TearDownKind::Handle(mut handle)) => {
        catch_unwind(AssertUnwindSafe(move || handle.unsubscribe()))
      }
    };
    if let Err(payload) = outcome {
      error::report(UncaughtError::Panic(payload));
    }
  }
}

impl<Item: 'static, Err: 'static> From<Subscription<Item, Err>> for TearDown {
  fn from(subscription: Subscription<Item, Err>) -> Self {
    TearDown(Some(TearDownKind::Handle(Box::new(subscription))))
  }
}

impl From<Box<dyn SubscriptionLike>> for TearDown {
  fn from(handle: Box<dyn SubscriptionLike>) -> Self {
    TearDown(Some(TearDownKind::Handle(handle)))
  }
}

/// Conversion the producer contract goes through: a producer may return
/// `()`, a [`TearDown`], or the [`Subscription`] of an upstream it opened.
pub trait IntoTearDown {
  fn into_tear_down(self) -> TearDown;
}

impl IntoTearDown for TearDown {
  #[inline]
  fn into_tear_down(self) -> TearDown { self }
}

impl IntoTearDown for () {
  #[inline]
  fn into_tear_down(self) -> TearDown { TearDown::none() }
}

impl<Item: 'static, Err: 'static> IntoTearDown for Subscription<Item, Err> {
  #[inline]
  fn into_tear_down(self) -> TearDown { self.into() }
}

// ============================================================================
// State machine
// ============================================================================

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum MachineState {
  Initializing,
  Ready,
  Buffering,
  Running,
  Closed,
}

pub(crate) enum Notification<Item, Err> {
  Next(Item),
  Error(Err),
  Complete,
}

struct SubscriptionCell<Item, Err> {
  state: MachineState,
  observer: Option<CallbackObserver<Item, Err>>,
  queue: Option<VecDeque<Notification<Item, Err>>>,
  tear_down: Option<TearDown>,
}

type Cell<Item, Err> = MutRc<SubscriptionCell<Item, Err>>;

/// The live handle representing one producer/consumer pairing.
///
/// Cloning yields another handle to the same pairing. Dropping the handle
/// does not cancel the stream; call
/// [`unsubscribe`](SubscriptionLike::unsubscribe) or hold a
/// [`SubscriptionGuard`].
pub struct Subscription<Item, Err> {
  cell: Cell<Item, Err>,
}

impl<Item, Err> Clone for Subscription<Item, Err> {
  fn clone(&self) -> Self { Self { cell: self.cell.clone() } }
}

/// The capability handed to a producer: `next`/`error`/`complete` feed the
/// delivery machine of the one subscription this observer belongs to.
///
/// The handle stays valid for as long as the producer cares to keep it;
/// after the subscription closes every call becomes a no-op, which is what
/// lets abandoned async work resolve harmlessly.
pub struct SubscriptionObserver<Item, Err> {
  cell: Cell<Item, Err>,
}

impl<Item, Err> Clone for SubscriptionObserver<Item, Err> {
  fn clone(&self) -> Self { Self { cell: self.cell.clone() } }
}

impl<Item: 'static, Err: 'static> SubscriptionObserver<Item, Err> {
  pub fn next(&self, value: Item) {
    let _guard = scheduler::enter();
    on_notify(&self.cell, Notification::Next(value));
  }

  pub fn error(&self, err: Err) {
    let _guard = scheduler::enter();
    on_notify(&self.cell, Notification::Error(err));
  }

  pub fn complete(&self) {
    let _guard = scheduler::enter();
    on_notify(&self.cell, Notification::Complete);
  }

  pub fn is_closed(&self) -> bool { self.cell.rc_deref().state == MachineState::Closed }
}

impl<Item: 'static, Err: 'static> Subscription<Item, Err> {
  /// Runs `producer` synchronously against a fresh subscription cell and
  /// returns the handle. Invoked once per `subscribe` call.
  pub(crate) fn start(
    observer: CallbackObserver<Item, Err>,
    producer: &dyn Fn(SubscriptionObserver<Item, Err>) -> TearDown,
  ) -> Self {
    let cell = MutRc::own(SubscriptionCell {
      state: MachineState::Initializing,
      observer: Some(observer),
      queue: None,
      tear_down: None,
    });
    let subscription = Subscription { cell: cell.clone() };
    let handle = SubscriptionObserver { cell: cell.clone() };

    let _guard = scheduler::enter();
    match catch_unwind(AssertUnwindSafe(|| producer(handle))) {
      Ok(tear_down) => {
        // A producer may have closed its own subscription synchronously; its
        // cleanup then runs right away instead of being stored.
        let run_now = {
          let mut guard = cell.rc_deref_mut();
          if guard.state == MachineState::Closed {
            Some(tear_down)
          } else {
            guard.tear_down = Some(tear_down);
            None
          }
        };
        if let Some(mut tear_down) = run_now {
          tear_down.call();
        }
      }
      Err(payload) => {
        error::report(UncaughtError::Panic(payload));
        let observer = close_cell(&cell);
        drop(observer);
        finalize(&cell);
      }
    }

    {
      let mut guard = cell.rc_deref_mut();
      if guard.state == MachineState::Initializing {
        guard.state = MachineState::Ready;
      }
    }
    subscription
  }
}

impl<Item: 'static, Err: 'static> SubscriptionLike for Subscription<Item, Err> {
  fn unsubscribe(&mut self) {
    let _guard = scheduler::enter();
    let open = {
      if self.cell.rc_deref().state == MachineState::Closed {
        None
      } else {
        Some(close_cell(&self.cell))
      }
    };
    // The taken observer drops outside the borrow: its callbacks own user
    // state with arbitrary Drop impls.
    if let Some(observer) = open {
      drop(observer);
      finalize(&self.cell);
    }
  }

  fn is_closed(&self) -> bool { self.cell.rc_deref().state == MachineState::Closed }
}

/// RAII wrapper that unsubscribes when dropped.
#[must_use]
pub struct SubscriptionGuard<T: SubscriptionLike>(T);

impl<T: SubscriptionLike> SubscriptionGuard<T> {
  pub fn new(subscription: T) -> Self { SubscriptionGuard(subscription) }
}

impl<T: SubscriptionLike> Drop for SubscriptionGuard<T> {
  #[inline]
  fn drop(&mut self) { self.0.unsubscribe() }
}

impl<Item: 'static, Err: 'static> Subscription<Item, Err> {
  /// Unsubscribes automatically as soon as the returned guard goes out of
  /// scope.
  pub fn unsubscribe_when_dropped(self) -> SubscriptionGuard<Self> { SubscriptionGuard(self) }
}

// ============================================================================
// Delivery
// ============================================================================

fn on_notify<Item: 'static, Err: 'static>(cell: &Cell<Item, Err>, notification: Notification<Item, Err>) {
  enum Accepted<Item, Err> {
    Dispatch(Notification<Item, Err>),
    ScheduleFlush,
    Done,
  }

  let accepted = {
    let mut guard = cell.rc_deref_mut();
    match guard.state {
      MachineState::Closed => Accepted::Done,
      MachineState::Buffering => {
        guard
          .queue
          .get_or_insert_with(VecDeque::new)
          .push_back(notification);
        Accepted::Done
      }
      // A dispatch is in flight: queue instead of recursing into the
      // consumer, and drain once the current delivery has finished.
      MachineState::Running => {
        guard.state = MachineState::Buffering;
        guard
          .queue
          .get_or_insert_with(VecDeque::new)
          .push_back(notification);
        Accepted::ScheduleFlush
      }
      MachineState::Ready | MachineState::Initializing => Accepted::Dispatch(notification),
    }
  };

  match accepted {
    Accepted::Dispatch(notification) => dispatch(cell, notification),
    Accepted::ScheduleFlush => {
      let cell = cell.clone();
      scheduler::enqueue(move || flush(&cell));
    }
    Accepted::Done => {}
  }
}

fn dispatch<Item: 'static, Err: 'static>(cell: &Cell<Item, Err>, notification: Notification<Item, Err>) {
  cell.rc_deref_mut().state = MachineState::Running;

  match notification {
    Notification::Next(value) => {
      // The callback leaves the cell while it runs so that re-entrant calls
      // never observe a borrowed cell.
      let callback = {
        let mut guard = cell.rc_deref_mut();
        guard.observer.as_mut().and_then(|o| o.next.take())
      };
      if let Some(mut callback) = callback {
        let outcome = catch_unwind(AssertUnwindSafe(|| callback(value)));
        {
          let mut guard = cell.rc_deref_mut();
          if let Some(observer) = guard.observer.as_mut() {
            observer.next = Some(callback);
          }
        }
        if let Err(payload) = outcome {
          error::report(UncaughtError::Panic(payload));
        }
      }
    }
    Notification::Error(err) => {
      // Terminal: close before the consumer observes the notification.
      let observer = close_cell(cell);
      match observer.and_then(|o| o.error) {
        Some(mut callback) => {
          if let Err(payload) = catch_unwind(AssertUnwindSafe(|| callback(err))) {
            error::report(UncaughtError::Panic(payload));
          }
        }
        None => error::report(UncaughtError::Unhandled(Box::new(err))),
      }
    }
    Notification::Complete => {
      let observer = close_cell(cell);
      if let Some(mut callback) = observer.and_then(|o| o.complete) {
        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| callback())) {
          error::report(UncaughtError::Panic(payload));
        }
      }
    }
  }

  let closed = {
    let mut guard = cell.rc_deref_mut();
    match guard.state {
      MachineState::Closed => true,
      MachineState::Running => {
        guard.state = MachineState::Ready;
        false
      }
      // Buffering: a flush is pending and owns the queue.
      _ => false,
    }
  };
  if closed {
    finalize(cell);
  }
}

/// Deferred drain of the buffered queue, strictly FIFO. Notifications that
/// arrive mid-drain start a fresh buffer with its own flush, which preserves
/// overall arrival order.
fn flush<Item: 'static, Err: 'static>(cell: &Cell<Item, Err>) {
  let items = {
    let mut guard = cell.rc_deref_mut();
    if guard.state == MachineState::Closed {
      return;
    }
    guard.state = MachineState::Ready;
    match guard.queue.take() {
      Some(queue) => queue,
      None => return,
    }
  };

  for notification in items {
    dispatch(cell, notification);
    if cell.rc_deref().state == MachineState::Closed {
      break;
    }
  }
}

/// Transitions to `Closed` and releases consumer and queue. The caller owns
/// the returned observer and must drop it outside any cell borrow.
fn close_cell<Item, Err>(cell: &Cell<Item, Err>) -> Option<CallbackObserver<Item, Err>> {
  let mut guard = cell.rc_deref_mut();
  guard.state = MachineState::Closed;
  guard.queue = None;
  guard.observer.take()
}

/// Runs the producer's cleanup exactly once.
fn finalize<Item, Err>(cell: &Cell<Item, Err>) {
  let tear_down = cell.rc_deref_mut().tear_down.take();
  if let Some(mut tear_down) = tear_down {
    tear_down.call();
  }
}
