//! FlatMap operator: map every value to an inner stream and interleave them
//! all.

use std::{cell::RefCell, rc::Rc};

use smallvec::SmallVec;

use crate::{
  observable::{IntoObservable, Observable},
  rc::{MutRc, RcDeref, RcDerefMut},
  subscription::{Subscription, SubscriptionLike, SubscriptionObserver, TearDown},
};

struct FlatMapState<Out, Err> {
  /// Currently open inner subscriptions. A slot is reserved before the
  /// inner subscribe runs, so an inner that completes synchronously removes
  /// itself before its handle is even stored.
  inners: SmallVec<[(u64, Option<Subscription<Out, Err>>); 2]>,
  next_key: u64,
  outer_done: bool,
}

/// Maps every outer value to an inner stream and subscribes it immediately,
/// fanning all inner emissions through to the composed stream as they
/// arrive. There is no ordering constraint between interleaved inners.
///
/// The composition completes once the outer stream has completed AND no
/// inner subscription remains open. Unsubscribing tears down the outer and
/// every still-open inner.
///
/// # Examples
///
/// ```
/// use brook::prelude::*;
///
/// observable::from_iter::<_, Infallible>(1..=3)
///   .pipe(ops::flat_map(|v| vec![v * 10, v * 10 + 1]))
///   .subscribe(|v| println!("{}", v));
/// // 10, 11, 20, 21, 30, 31
/// ```
pub fn flat_map<In, Out, Err, F, O>(
  mapper: F,
) -> impl FnOnce(Observable<In, Err>) -> Observable<Out, Err>
where
  In: 'static,
  Out: 'static,
  Err: 'static,
  F: FnMut(In) -> O + 'static,
  O: IntoObservable<Out, Err>,
{
  move |source| {
    let mapper = Rc::new(RefCell::new(mapper));
    Observable::new(move |observer| {
      let state: MutRc<FlatMapState<Out, Err>> =
        MutRc::own(FlatMapState { inners: SmallVec::new(), next_key: 0, outer_done: false });
      let mapper = mapper.clone();

      let outer_state = state.clone();
      let outer_error = observer.clone();
      let outer_complete = observer.clone();
      let complete_state = state.clone();

      let outer = source.clone().subscribe_all(
        move |value| {
          let inner_source = { (mapper.borrow_mut())(value) }.into_observable();
          let key = {
            let mut state = outer_state.rc_deref_mut();
            let key = state.next_key;
            state.next_key += 1;
            state.inners.push((key, None));
            key
          };

          let inner_next = observer.clone();
          let inner_error = observer.clone();
          let inner_complete = observer.clone();
          let inner_state = outer_state.clone();
          let inner = inner_source.subscribe_all(
            move |v| inner_next.next(v),
            move |e| inner_error.error(e),
            move || {
              inner_state
                .rc_deref_mut()
                .inners
                .retain(|(registered, _)| *registered != key);
              complete_if_done(&inner_state, &inner_complete);
            },
          );

          let mut state = outer_state.rc_deref_mut();
          if let Some(slot) = state.inners.iter_mut().find(|(registered, _)| *registered == key) {
            slot.1 = Some(inner);
          }
        },
        move |e| outer_error.error(e),
        move || {
          complete_state.rc_deref_mut().outer_done = true;
          complete_if_done(&complete_state, &outer_complete);
        },
      );

      let outer = Rc::new(RefCell::new(outer));
      TearDown::new(move || {
        outer.borrow_mut().unsubscribe();
        let open: SmallVec<[Subscription<Out, Err>; 2]> = {
          let mut state = state.rc_deref_mut();
          state
            .inners
            .drain(..)
            .filter_map(|(_, subscription)| subscription)
            .collect()
        };
        for mut subscription in open {
          subscription.unsubscribe();
        }
      })
    })
  }
}

fn complete_if_done<Out: 'static, Err: 'static>(
  state: &MutRc<FlatMapState<Out, Err>>, observer: &SubscriptionObserver<Out, Err>,
) {
  let done = {
    let state = state.rc_deref();
    state.outer_done && state.inners.is_empty()
  };
  if done {
    observer.complete();
  }
}

#[cfg(test)]
mod tests {
  use std::{cell::RefCell, convert::Infallible, rc::Rc};

  use super::*;
  use crate::prelude::*;

  #[test]
  fn flattens_every_inner_stream() {
    let emitted = Rc::new(RefCell::new(Vec::new()));
    let completed = Rc::new(RefCell::new(false));
    let c_emitted = emitted.clone();
    let c_completed = completed.clone();

    observable::from_iter::<_, Infallible>(1..=5)
      .pipe(flat_map(|v| vec![2 * v - 1, 2 * v]))
      .subscribe_complete(
        move |v| c_emitted.borrow_mut().push(v),
        move || *c_completed.borrow_mut() = true,
      );

    assert_eq!(*emitted.borrow(), (1..=10).collect::<Vec<_>>());
    assert!(*completed.borrow());
  }

  #[test]
  fn completion_requires_outer_and_all_inners() {
    let completed = Rc::new(RefCell::new(false));
    let c_completed = completed.clone();

    let outer = Subject::<i32, Infallible>::new();
    let inner = Subject::<i32, Infallible>::new();
    let c_inner = inner.clone();

    outer
      .observable()
      .pipe(flat_map(move |_| c_inner.clone()))
      .subscribe_complete(|_| {}, move || *c_completed.borrow_mut() = true);

    outer.next(1);
    outer.complete();
    assert!(!*completed.borrow());

    inner.complete();
    assert!(*completed.borrow());
  }

  #[test]
  fn inner_emissions_interleave_as_they_arrive() {
    let emitted = Rc::new(RefCell::new(Vec::new()));
    let c_emitted = emitted.clone();

    let outer = Subject::<&'static str, Infallible>::new();
    let left = Subject::<&'static str, Infallible>::new();
    let right = Subject::<&'static str, Infallible>::new();
    let c_left = left.clone();
    let c_right = right.clone();

    outer
      .observable()
      .pipe(flat_map(move |which| {
        if which == "left" { c_left.clone() } else { c_right.clone() }
      }))
      .subscribe(move |v| c_emitted.borrow_mut().push(v));

    outer.next("left");
    outer.next("right");
    left.next("l1");
    right.next("r1");
    left.next("l2");

    assert_eq!(*emitted.borrow(), vec!["l1", "r1", "l2"]);
  }

  #[test]
  fn inner_error_terminates_the_composition() {
    let errors = Rc::new(RefCell::new(Vec::new()));
    let c_errors = errors.clone();

    observable::from_iter::<_, &'static str>(1..=3)
      .pipe(flat_map(|v| {
        if v == 2 {
          observable::throw_err::<i32, &'static str>("inner broke")
        } else {
          observable::of(v)
        }
      }))
      .subscribe_err(|_| {}, move |e| c_errors.borrow_mut().push(e));

    assert_eq!(*errors.borrow(), vec!["inner broke"]);
  }

  #[test]
  fn unsubscribe_cancels_outer_and_open_inners() {
    let outer = Subject::<i32, Infallible>::new();
    let inner = Subject::<i32, Infallible>::new();
    let c_inner = inner.clone();
    let emitted = Rc::new(RefCell::new(Vec::new()));
    let c_emitted = emitted.clone();

    let mut subscription = outer
      .observable()
      .pipe(flat_map(move |_| c_inner.clone()))
      .subscribe(move |v| c_emitted.borrow_mut().push(v));

    outer.next(1);
    inner.next(10);
    assert_eq!(outer.subscriber_count(), 1);
    assert_eq!(inner.subscriber_count(), 1);

    subscription.unsubscribe();
    assert_eq!(outer.subscriber_count(), 0);
    assert_eq!(inner.subscriber_count(), 0);

    inner.next(20);
    assert_eq!(*emitted.borrow(), vec![10]);
  }
}
