//! Adapts futures into single-value observables.

use std::future::Future;

use crate::{observable::Observable, scheduler};

/// Creates an observable that emits the output of the future built by
/// `factory`, then completes.
///
/// The factory runs once per subscription, which keeps the stream cold: two
/// subscribers await two independent futures. A subscriber that unsubscribes
/// while the future is still in flight never sees the late value.
///
/// # Examples
///
/// ```
/// use brook::prelude::*;
///
/// observable::from_future::<_, _, Infallible>(|| async { 42 })
///   .subscribe(|v| assert_eq!(v, 42));
/// ```
pub fn from_future<F, Fut, Err>(factory: F) -> Observable<Fut::Output, Err>
where
  F: Fn() -> Fut + 'static,
  Fut: Future + 'static,
  Fut::Output: 'static,
  Err: 'static,
{
  Observable::new(move |observer| {
    let future = factory();
    scheduler::spawn(async move {
      let value = future.await;
      if observer.is_closed() {
        return;
      }
      observer.next(value);
      observer.complete();
    });
  })
}

#[cfg(test)]
mod tests {
  use std::{cell::RefCell, convert::Infallible, rc::Rc};

  use super::*;
  use crate::prelude::*;

  #[test]
  fn emits_future_output_then_completes() {
    let emitted = Rc::new(RefCell::new(Vec::new()));
    let completed = Rc::new(RefCell::new(false));
    let c_emitted = emitted.clone();
    let c_completed = completed.clone();

    from_future::<_, _, Infallible>(|| async { 7 }).subscribe_complete(
      move |v| c_emitted.borrow_mut().push(v),
      move || *c_completed.borrow_mut() = true,
    );

    assert_eq!(*emitted.borrow(), vec![7]);
    assert!(*completed.borrow());
  }

  #[test]
  fn each_subscription_awaits_its_own_future() {
    let polls = Rc::new(RefCell::new(0));
    let c_polls = polls.clone();

    let source = from_future::<_, _, Infallible>(move || {
      *c_polls.borrow_mut() += 1;
      async { 1 }
    });
    source.clone().subscribe(|_| {});
    source.subscribe(|_| {});

    assert_eq!(*polls.borrow(), 2);
  }

  #[test]
  fn unsubscribed_consumer_never_sees_the_value() {
    let emitted = Rc::new(RefCell::new(Vec::new()));
    let release = Rc::new(RefCell::new(None::<futures::channel::oneshot::Sender<i32>>));
    let c_emitted = emitted.clone();
    let c_release = release.clone();

    let mut subscription = from_future::<_, _, Infallible>(move || {
      let (sender, receiver) = futures::channel::oneshot::channel();
      *c_release.borrow_mut() = Some(sender);
      async move { receiver.await.unwrap_or_default() }
    })
    .subscribe(move |v| c_emitted.borrow_mut().push(v));

    subscription.unsubscribe();
    if let Some(sender) = release.borrow_mut().take() {
      let _ = sender.send(9);
    }
    run_until_idle();

    assert!(emitted.borrow().is_empty());
  }
}
