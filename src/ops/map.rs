//! Async-capable map operator with order-preserving emission.

use std::{cell::RefCell, future::Future, rc::Rc};

use smallvec::smallvec;

use crate::{observable::Observable, scheduler::serial::SerialScheduler};

/// Maps every value through an asynchronous transform.
///
/// Transforms run concurrently — a slow item never delays the *start* of the
/// next one — but results are emitted strictly in input order: a fast-
/// resolving later item waits for every earlier item before it surfaces.
/// Errors from the source are forwarded immediately, discarding in-flight
/// transforms.
///
/// For a synchronous mapping use
/// [`Observable::map`](crate::observable::Observable::map) instead.
///
/// # Examples
///
/// ```
/// use brook::prelude::*;
///
/// observable::from_iter::<_, Infallible>(1..=5)
///   .pipe(ops::map(|v| async move { v * 2 }))
///   .subscribe(|v| println!("{}", v));
/// // 2, 4, 6, 8, 10 — always in this order
/// ```
pub fn map<In, Out, Err, F, Fut>(
  mapper: F,
) -> impl FnOnce(Observable<In, Err>) -> Observable<Out, Err>
where
  In: 'static,
  Out: 'static,
  Err: 'static,
  F: FnMut(In) -> Fut + 'static,
  Fut: Future<Output = Out> + 'static,
{
  move |source| {
    let mapper = Rc::new(RefCell::new(mapper));
    Observable::new(move |observer| {
      let scheduler = SerialScheduler::new(observer);
      let error_scheduler = scheduler.clone();
      let complete_scheduler = scheduler.clone();
      let mapper = mapper.clone();

      source.clone().subscribe_all(
        move |value| {
          let future = { (mapper.borrow_mut())(value) };
          scheduler.schedule(async move { Ok(smallvec![future.await]) });
        },
        move |e| error_scheduler.error(e),
        move || complete_scheduler.complete(),
      )
    })
  }
}
