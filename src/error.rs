//! Last-resort destination for errors that cannot reach a consumer.
//!
//! The delivery engine never lets an error unwind through producer or engine
//! frames: `error` notifications without a consumer handler, and panics
//! raised inside consumer callbacks or teardown logic, are routed here
//! instead. The default hook re-raises the error as a panic once the current
//! dispatch has fully drained, so nothing is ever silently dropped.

use std::{any::Any, cell::RefCell, rc::Rc, sync::RwLock};

use once_cell::sync::Lazy;

use crate::scheduler;

/// An error the engine could not deliver to any consumer.
pub enum UncaughtError {
  /// An `error` notification reached a subscription whose consumer installed
  /// no error callback.
  Unhandled(Box<dyn Any>),
  /// A consumer callback, producer, or teardown panicked while the engine
  /// was dispatching.
  Panic(Box<dyn Any + Send>),
}

impl std::fmt::Debug for UncaughtError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      UncaughtError::Unhandled(_) => f.write_str("UncaughtError::Unhandled(..)"),
      UncaughtError::Panic(_) => f.write_str("UncaughtError::Panic(..)"),
    }
  }
}

type Hook = Rc<dyn Fn(UncaughtError)>;
type GlobalHook = dyn Fn(UncaughtError) + Send + Sync;

// The process-wide hook. Payloads never cross threads: the hook runs on
// whichever engine thread reported the error.
static GLOBAL_HOOK: Lazy<RwLock<Option<Box<GlobalHook>>>> = Lazy::new(|| RwLock::new(None));

thread_local! {
  static LOCAL_HOOKS: RefCell<Vec<Hook>> = RefCell::new(Vec::new());
}

/// Installs the process-wide uncaught-error hook, replacing any previous one.
pub fn set_uncaught_hook(hook: impl Fn(UncaughtError) + Send + Sync + 'static) {
  *GLOBAL_HOOK.write().unwrap() = Some(Box::new(hook));
}

/// Restores the default uncaught-error behavior: re-raise as a panic once
/// the current dispatch has drained.
pub fn reset_uncaught_hook() { *GLOBAL_HOOK.write().unwrap() = None; }

/// Runs `scope` with `hook` layered as this thread's uncaught-error hook.
///
/// The layered hook shadows the process-wide one for the duration of the
/// call, which keeps tests independent of each other.
///
/// ```
/// use std::{cell::RefCell, rc::Rc};
///
/// use brook::prelude::*;
///
/// let seen = Rc::new(RefCell::new(Vec::new()));
/// let sink = seen.clone();
/// with_uncaught_hook(
///   move |err| sink.borrow_mut().push(err),
///   || {
///     // an error with no consumer error callback escalates to the hook
///     observable::throw_err::<i32, &str>("boom").subscribe(|_| {});
///   },
/// );
/// assert_eq!(seen.borrow().len(), 1);
/// ```
pub fn with_uncaught_hook<R>(hook: impl Fn(UncaughtError) + 'static, scope: impl FnOnce() -> R) -> R {
  struct PopOnDrop;
  impl Drop for PopOnDrop {
    fn drop(&mut self) {
      LOCAL_HOOKS.with(|hooks| {
        hooks.borrow_mut().pop();
      });
    }
  }

  LOCAL_HOOKS.with(|hooks| hooks.borrow_mut().push(Rc::new(hook)));
  let _guard = PopOnDrop;
  scope()
}

/// Reports an error to the innermost installed hook.
pub(crate) fn report(err: UncaughtError) {
  let local = LOCAL_HOOKS.with(|hooks| hooks.borrow().last().cloned());
  if let Some(hook) = local {
    hook(err);
    return;
  }
  let global = GLOBAL_HOOK.read().unwrap();
  match &*global {
    Some(hook) => hook(err),
    None => default_hook(err),
  }
}

fn default_hook(err: UncaughtError) {
  let payload: Box<dyn Any + Send> = match err {
    UncaughtError::Panic(payload) => payload,
    UncaughtError::Unhandled(_) => {
      Box::new("brook: observable error was not handled by any subscriber")
    }
  };
  scheduler::defer_panic(payload);
}

#[cfg(test)]
mod tests {
  use std::{cell::RefCell, rc::Rc};

  use super::*;

  #[test]
  fn local_hook_shadows_and_pops() {
    let seen = Rc::new(RefCell::new(0));
    let c_seen = seen.clone();
    with_uncaught_hook(
      move |_| *c_seen.borrow_mut() += 1,
      || {
        report(UncaughtError::Unhandled(Box::new("a")));
        report(UncaughtError::Unhandled(Box::new("b")));
      },
    );
    assert_eq!(*seen.borrow(), 2);
  }

  #[test]
  fn global_hook_receives_reports_until_reset() {
    use std::sync::{Arc, Mutex};

    let seen = Arc::new(Mutex::new(0));
    let c_seen = seen.clone();
    set_uncaught_hook(move |_| *c_seen.lock().unwrap() += 1);
    report(UncaughtError::Unhandled(Box::new("orphan")));
    reset_uncaught_hook();

    assert_eq!(*seen.lock().unwrap(), 1);
  }

  #[test]
  fn unhandled_payload_can_be_downcast() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let c_seen = seen.clone();
    with_uncaught_hook(
      move |err| c_seen.borrow_mut().push(err),
      || report(UncaughtError::Unhandled(Box::new(42_i32))),
    );

    let seen = seen.borrow();
    match &seen[0] {
      UncaughtError::Unhandled(payload) => {
        assert_eq!(payload.downcast_ref::<i32>(), Some(&42));
      }
      other => panic!("unexpected report: {:?}", other),
    }
  }
}
