//! Consumer side of a subscription.

use std::{cell::RefCell, rc::Rc};

/// The consumer of a stream: receives values, at most one terminal error or
/// completion, in the order the delivery engine dispatches them.
///
/// Closures passed to the `subscribe` family are adapted automatically; use
/// [`subscribe_with`](crate::observable::Observable::subscribe_with) to hand
/// over a full observer. [`Subject`](crate::subject::Subject) implements
/// this trait so it can sit on the consumer end of another stream.
pub trait Observer<Item, Err> {
  /// Receive the next value.
  fn next(&mut self, value: Item);

  /// Receive the terminal error.
  fn error(&mut self, err: Err);

  /// Receive the completion notification.
  fn complete(&mut self);
}

/// Callback bundle a subscription dispatches into. Any slot may be absent:
/// a missing `next`/`complete` is skipped, a missing `error` escalates the
/// error to the uncaught-error hook.
pub(crate) struct CallbackObserver<Item, Err> {
  pub(crate) next: Option<Box<dyn FnMut(Item)>>,
  pub(crate) error: Option<Box<dyn FnMut(Err)>>,
  pub(crate) complete: Option<Box<dyn FnMut()>>,
}

impl<Item: 'static, Err: 'static> CallbackObserver<Item, Err> {
  pub(crate) fn from_observer<O>(observer: O) -> Self
  where
    O: Observer<Item, Err> + 'static,
  {
    let observer = Rc::new(RefCell::new(observer));
    let error_observer = observer.clone();
    let complete_observer = observer.clone();
    CallbackObserver {
      next: Some(Box::new(move |v| observer.borrow_mut().next(v))),
      error: Some(Box::new(move |e| error_observer.borrow_mut().error(e))),
      complete: Some(Box::new(move || complete_observer.borrow_mut().complete())),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  struct Recording(Rc<RefCell<Vec<String>>>);

  impl Observer<i32, &'static str> for Recording {
    fn next(&mut self, value: i32) { self.0.borrow_mut().push(format!("next {}", value)); }

    fn error(&mut self, err: &'static str) { self.0.borrow_mut().push(format!("error {}", err)); }

    fn complete(&mut self) { self.0.borrow_mut().push("complete".to_string()); }
  }

  #[test]
  fn callback_observer_forwards_to_trait_observer() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut callbacks = CallbackObserver::from_observer(Recording(log.clone()));

    if let Some(next) = callbacks.next.as_mut() {
      next(1);
      next(2);
    }
    if let Some(complete) = callbacks.complete.as_mut() {
      complete();
    }

    assert_eq!(*log.borrow(), vec!["next 1", "next 2", "complete"]);
  }
}
