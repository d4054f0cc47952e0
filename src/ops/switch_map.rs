//! SwitchMap operator: map every value to an inner stream, keeping only the
//! most recent one.

use std::{cell::RefCell, rc::Rc};

use crate::{
  observable::{IntoObservable, Observable},
  rc::{MutRc, RcDerefMut},
  subscription::{Subscription, SubscriptionLike, TearDown},
};

struct SwitchState<Out, Err> {
  inner: Option<Subscription<Out, Err>>,
  inner_active: bool,
  /// Bumped on every outer value; inner callbacks from an older generation
  /// must not touch the state of a newer one.
  generation: u64,
  outer_done: bool,
}

/// Maps every outer value to an inner stream, unsubscribing the previous
/// inner before subscribing the new one — at most one inner is ever open,
/// and stale inner values can never surface after a newer outer value.
///
/// The composition completes only once the outer stream has completed AND
/// the current inner (if any) has completed: an inner finishing while the
/// outer is still live leaves the composition open for the next switch.
/// Unsubscribing tears down the outer and the active inner exactly once.
///
/// # Examples
///
/// ```
/// use brook::prelude::*;
///
/// observable::from_iter::<_, Infallible>(1..=3)
///   .pipe(ops::switch_map(|v| {
///     Observable::<i32>::new(move |observer| {
///       observer.next(v * v);
///       observer.complete();
///     })
///   }))
///   .subscribe(|v| println!("{}", v));
/// // 1, 4, 9
/// ```
pub fn switch_map<In, Out, Err, F, O>(
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
      let state: MutRc<SwitchState<Out, Err>> = MutRc::own(SwitchState {
        inner: None,
        inner_active: false,
        generation: 0,
        outer_done: false,
      });
      let mapper = mapper.clone();

      let next_state = state.clone();
      let complete_state = state.clone();
      let outer_error = observer.clone();
      let outer_complete = observer.clone();

      let outer = source.clone().subscribe_all(
        move |value| {
          let (generation, previous) = {
            let mut state = next_state.rc_deref_mut();
            state.generation += 1;
            state.inner_active = true;
            (state.generation, state.inner.take())
          };
          if let Some(mut previous) = previous {
            previous.unsubscribe();
          }

          let inner_source = { (mapper.borrow_mut())(value) }.into_observable();
          let inner_next = observer.clone();
          let inner_error = observer.clone();
          let inner_complete = observer.clone();
          let inner_state = next_state.clone();
          let inner = inner_source.subscribe_all(
            move |v| inner_next.next(v),
            move |e| inner_error.error(e),
            move || {
              let finished = {
                let mut state = inner_state.rc_deref_mut();
                if state.generation != generation {
                  return;
                }
                state.inner_active = false;
                state.inner = None;
                state.outer_done
              };
              if finished {
                inner_complete.complete();
              }
            },
          );

          let mut state = next_state.rc_deref_mut();
          if state.generation == generation && state.inner_active {
            state.inner = Some(inner);
          }
        },
        move |e| outer_error.error(e),
        move || {
          let finished = {
            let mut state = complete_state.rc_deref_mut();
            state.outer_done = true;
            !state.inner_active
          };
          if finished {
            outer_complete.complete();
          }
        },
      );

      let outer = Rc::new(RefCell::new(outer));
      TearDown::new(move || {
        outer.borrow_mut().unsubscribe();
        let inner = state.rc_deref_mut().inner.take();
        if let Some(mut inner) = inner {
          inner.unsubscribe();
        }
      })
    })
  }
}

#[cfg(test)]
mod tests {
  use std::{cell::RefCell, convert::Infallible, rc::Rc};

  use super::*;
  use crate::prelude::*;

  #[test]
  fn synchronous_inners_emit_for_every_outer_value() {
    let emitted = Rc::new(RefCell::new(Vec::new()));
    let c_emitted = emitted.clone();

    observable::from_iter::<_, Infallible>(vec![1, 2, 3])
      .pipe(switch_map(|v| {
        Observable::<i32>::new(move |observer| {
          observer.next(v * v);
          observer.complete();
        })
      }))
      .subscribe(move |v| c_emitted.borrow_mut().push(v));

    assert_eq!(*emitted.borrow(), vec![1, 4, 9]);
  }

  #[test]
  fn slow_inners_are_cancelled_by_newer_outer_values() {
    // Deferred inners never get to emit before the next outer value lands,
    // so only the values of the last inner survive.
    let emitted = Rc::new(RefCell::new(Vec::new()));
    let c_emitted = emitted.clone();

    observable::from_iter::<_, Infallible>(1..=3)
      .pipe(switch_map(|v| observable::from_iter(vec![v * 10, v * 10 + 1])))
      .subscribe(move |v| c_emitted.borrow_mut().push(v));

    assert_eq!(*emitted.borrow(), vec![30, 31]);
  }

  #[test]
  fn only_latest_inner_emits() {
    let emitted = Rc::new(RefCell::new(Vec::new()));
    let c_emitted = emitted.clone();

    let outer = Subject::<i32, Infallible>::new();
    let inner1 = Subject::<&'static str, Infallible>::new();
    let inner2 = Subject::<&'static str, Infallible>::new();
    let c_inner1 = inner1.clone();
    let c_inner2 = inner2.clone();

    outer
      .observable()
      .pipe(switch_map(move |which| {
        if which == 1 { c_inner1.clone() } else { c_inner2.clone() }
      }))
      .subscribe(move |v| c_emitted.borrow_mut().push(v));

    outer.next(1);
    inner1.next("a");

    outer.next(2);
    inner1.next("b");
    inner2.next("c");

    assert_eq!(*emitted.borrow(), vec!["a", "c"]);
    assert_eq!(inner1.subscriber_count(), 0);
  }

  #[test]
  fn completion_waits_for_the_active_inner() {
    let completed = Rc::new(RefCell::new(false));
    let c_completed = completed.clone();

    let outer = Subject::<i32, Infallible>::new();
    let inner = Subject::<i32, Infallible>::new();
    let c_inner = inner.clone();

    outer
      .observable()
      .pipe(switch_map(move |_| c_inner.clone()))
      .subscribe_complete(|_| {}, move || *c_completed.borrow_mut() = true);

    outer.next(1);
    outer.complete();
    assert!(!*completed.borrow());

    inner.complete();
    assert!(*completed.borrow());
  }

  #[test]
  fn inner_completion_alone_does_not_complete_the_composition() {
    let completed = Rc::new(RefCell::new(false));
    let emitted = Rc::new(RefCell::new(Vec::new()));
    let c_completed = completed.clone();
    let c_emitted = emitted.clone();

    let outer = Subject::<i32, Infallible>::new();

    outer
      .observable()
      .pipe(switch_map(|v| vec![v]))
      .subscribe_complete(
        move |v| c_emitted.borrow_mut().push(v),
        move || *c_completed.borrow_mut() = true,
      );

    outer.next(1);
    outer.next(2);
    assert_eq!(*emitted.borrow(), vec![1, 2]);
    assert!(!*completed.borrow());

    outer.complete();
    assert!(*completed.borrow());
  }

  #[test]
  fn inner_error_propagates_immediately() {
    let errors = Rc::new(RefCell::new(Vec::new()));
    let c_errors = errors.clone();

    let outer = Subject::<(), &'static str>::new();
    outer
      .observable()
      .pipe(switch_map(|_| observable::throw_err::<i32, &'static str>("boom")))
      .subscribe_err(|_| {}, move |e| c_errors.borrow_mut().push(e));

    outer.next(());
    assert_eq!(*errors.borrow(), vec!["boom"]);
  }

  #[test]
  fn unsubscribe_tears_down_outer_and_active_inner() {
    let outer = Subject::<i32, Infallible>::new();
    let inner = Subject::<i32, Infallible>::new();
    let c_inner = inner.clone();

    let mut subscription = outer
      .observable()
      .pipe(switch_map(move |_| c_inner.clone()))
      .subscribe(|_| {});

    outer.next(1);
    assert_eq!(inner.subscriber_count(), 1);

    subscription.unsubscribe();
    assert_eq!(outer.subscriber_count(), 0);
    assert_eq!(inner.subscriber_count(), 0);
  }
}
