//! Merge operator: interleave several streams into one.

use std::{cell::Cell, rc::Rc};

use smallvec::SmallVec;

use crate::{
  observable::Observable,
  rc::{MutRc, RcDerefMut},
  subscription::{Subscription, SubscriptionLike, TearDown},
};

/// Subscribes every source concurrently and forwards each value as it
/// arrives. The first error propagates immediately and aborts the remaining
/// sources; completion waits until every source has completed.
///
/// # Examples
///
/// ```
/// use brook::prelude::*;
///
/// let odd = observable::from_iter::<_, Infallible>(vec![1, 3, 5]);
/// let even = observable::from_iter::<_, Infallible>(vec![2, 4, 6]);
/// ops::merge([odd, even]).subscribe(|v| println!("{}", v));
/// ```
pub fn merge<Item, Err>(
  sources: impl IntoIterator<Item = Observable<Item, Err>>,
) -> Observable<Item, Err>
where
  Item: 'static,
  Err: 'static,
{
  let sources: Vec<_> = sources.into_iter().collect();
  Observable::new(move |observer| {
    if sources.is_empty() {
      observer.complete();
      return TearDown::none();
    }

    let remaining = Rc::new(Cell::new(sources.len()));
    let subscriptions: MutRc<SmallVec<[Subscription<Item, Err>; 2]>> =
      MutRc::own(SmallVec::new());

    for source in &sources {
      let next_observer = observer.clone();
      let error_observer = observer.clone();
      let complete_observer = observer.clone();
      let remaining = remaining.clone();

      let subscription = source.clone().subscribe_all(
        move |v| next_observer.next(v),
        move |e| error_observer.error(e),
        move || {
          remaining.set(remaining.get() - 1);
          if remaining.get() == 0 {
            complete_observer.complete();
          }
        },
      );
      subscriptions.rc_deref_mut().push(subscription);
    }

    TearDown::new(move || {
      let open: SmallVec<[Subscription<Item, Err>; 2]> = {
        let mut subscriptions = subscriptions.rc_deref_mut();
        subscriptions.drain(..).collect()
      };
      for mut subscription in open {
        subscription.unsubscribe();
      }
    })
  })
}

#[cfg(test)]
mod tests {
  use std::{cell::RefCell, convert::Infallible, rc::Rc};

  use super::*;
  use crate::prelude::*;

  #[test]
  fn forwards_values_from_every_source() {
    let emitted = Rc::new(RefCell::new(Vec::new()));
    let c_emitted = emitted.clone();

    let numbers = Subject::<i32, Infallible>::new();
    let even = numbers.observable().filter(|v| v % 2 == 0);
    let odd = numbers.observable().filter(|v| v % 2 != 0);

    merge([even, odd]).subscribe(move |v| c_emitted.borrow_mut().push(v));

    for v in 0..10 {
      numbers.next(v);
    }

    assert_eq!(*emitted.borrow(), (0..10).collect::<Vec<_>>());
  }

  #[test]
  fn completes_only_after_every_source() {
    let completed = Rc::new(RefCell::new(false));
    let c_completed = completed.clone();

    let even = Subject::<i32, Infallible>::new();
    let odd = Subject::<i32, Infallible>::new();

    merge([even.observable(), odd.observable()])
      .subscribe_complete(|_| {}, move || *c_completed.borrow_mut() = true);

    even.complete();
    assert!(!*completed.borrow());
    odd.complete();
    assert!(*completed.borrow());
  }

  #[test]
  fn first_error_aborts_the_remaining_sources() {
    let errors = Rc::new(RefCell::new(0));
    let completions = Rc::new(RefCell::new(0));
    let c_errors = errors.clone();
    let c_completions = completions.clone();

    let left = Subject::<i32, &'static str>::new();
    let right = Subject::<i32, &'static str>::new();

    merge([left.observable(), right.observable()]).subscribe_all(
      |_| {},
      move |_| *c_errors.borrow_mut() += 1,
      move || *c_completions.borrow_mut() += 1,
    );

    right.error("first failure");
    assert_eq!(left.subscriber_count(), 0);

    left.error("second failure");
    left.complete();

    assert_eq!(*errors.borrow(), 1);
    assert_eq!(*completions.borrow(), 0);
  }

  #[test]
  fn unsubscribe_stops_every_source() {
    let left = Subject::<i32, Infallible>::new();
    let right = Subject::<i32, Infallible>::new();

    let mut subscription = merge([left.observable(), right.observable()])
      .subscribe(|_| unreachable!("unsubscribed stream delivered a value"));
    subscription.unsubscribe();

    left.next(1);
    right.next(2);
    assert_eq!(left.subscriber_count(), 0);
    assert_eq!(right.subscriber_count(), 0);
  }

  #[test]
  fn merge_with_method_sugar() {
    let emitted = Rc::new(RefCell::new(Vec::new()));
    let c_emitted = emitted.clone();

    observable::from_iter::<_, Infallible>(vec![1, 2])
      .merge_with(observable::from_iter(vec![10, 20]))
      .subscribe(move |v| c_emitted.borrow_mut().push(v));

    let mut seen = emitted.borrow().clone();
    seen.sort_unstable();
    assert_eq!(seen, vec![1, 2, 10, 20]);
  }
}
