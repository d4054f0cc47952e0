//! Async-capable filter operator with order-preserving emission.

use std::{cell::RefCell, future::Future, rc::Rc};

use smallvec::{smallvec, SmallVec};

use crate::{observable::Observable, scheduler::serial::SerialScheduler};

/// Keeps only the values an asynchronous predicate accepts, preserving
/// input order the same way [`ops::map`](crate::ops::map) does: predicates
/// run concurrently, surviving values surface in arrival order.
///
/// For a synchronous predicate use
/// [`Observable::filter`](crate::observable::Observable::filter) instead.
///
/// # Examples
///
/// ```
/// use brook::prelude::*;
///
/// observable::from_iter::<_, Infallible>(1..=6)
///   .pipe(ops::filter(|v| {
///     let keep = v % 2 == 0;
///     async move { keep }
///   }))
///   .subscribe(|v| println!("{}", v));
/// // 2, 4, 6
/// ```
pub fn filter<In, Err, F, Fut>(
  predicate: F,
) -> impl FnOnce(Observable<In, Err>) -> Observable<In, Err>
where
  In: 'static,
  Err: 'static,
  F: FnMut(&In) -> Fut + 'static,
  Fut: Future<Output = bool> + 'static,
{
  move |source| {
    let predicate = Rc::new(RefCell::new(predicate));
    Observable::new(move |observer| {
      let scheduler = SerialScheduler::new(observer);
      let error_scheduler = scheduler.clone();
      let complete_scheduler = scheduler.clone();
      let predicate = predicate.clone();

      source.clone().subscribe_all(
        move |value| {
          let future = { (predicate.borrow_mut())(&value) };
          scheduler.schedule(async move {
            let kept: SmallVec<[In; 1]> = if future.await { smallvec![value] } else { smallvec![] };
            Ok(kept)
          });
        },
        move |e| error_scheduler.error(e),
        move || complete_scheduler.complete(),
      )
    })
  }
}

#[cfg(test)]
mod tests {
  use std::{
    cell::RefCell,
    convert::Infallible,
    pin::Pin,
    rc::Rc,
    task::{Context, Poll},
  };

  use super::*;
  use crate::prelude::*;

  struct Yields {
    remaining: usize,
  }

  impl Future for Yields {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
      if self.remaining == 0 {
        Poll::Ready(())
      } else {
        self.remaining -= 1;
        cx.waker().wake_by_ref();
        Poll::Pending
      }
    }
  }

  #[test]
  fn keeps_accepted_values_in_arrival_order() {
    let emitted = Rc::new(RefCell::new(Vec::new()));
    let c_emitted = emitted.clone();

    observable::from_iter::<_, Infallible>(1..=6)
      .pipe(filter(|v: &i32| {
        let keep = v % 2 == 0;
        // Earlier values resolve later; order must still hold.
        let latency = (7 - *v) as usize;
        async move {
          Yields { remaining: latency }.await;
          keep
        }
      }))
      .subscribe(move |v| c_emitted.borrow_mut().push(v));

    assert_eq!(*emitted.borrow(), vec![2, 4, 6]);
  }

  #[test]
  fn completes_after_the_last_pending_predicate() {
    let completed = Rc::new(RefCell::new(false));
    let c_completed = completed.clone();

    observable::from_iter::<_, Infallible>(1..=3)
      .pipe(filter(|_: &i32| async {
        Yields { remaining: 5 }.await;
        true
      }))
      .subscribe_complete(|_| {}, move || *c_completed.borrow_mut() = true);

    assert!(*completed.borrow());
  }
}
