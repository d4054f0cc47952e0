//! Source constructors and the capability-based `from` adapter set.

use crate::{observable::Observable, scheduler, subject::Subject};

/// Creates an observable that emits one value, then completes.
///
/// Emission is deferred onto the cooperative scheduler, so a subscriber that
/// unsubscribes before the deferred turn runs never sees the value.
///
/// # Examples
///
/// ```
/// use brook::prelude::*;
///
/// observable::of::<_, Infallible>(123).subscribe(|v| println!("{}", v));
/// ```
pub fn of<Item, Err>(value: Item) -> Observable<Item, Err>
where
  Item: Clone + 'static,
  Err: 'static,
{
  Observable::new(move |observer| {
    let value = value.clone();
    scheduler::enqueue(move || {
      if observer.is_closed() {
        return;
      }
      observer.next(value);
      observer.complete();
    });
  })
}

/// Creates an observable that emits every value of an iterable, then
/// completes.
///
/// The emission loop is deferred onto the cooperative scheduler and checks
/// for cancellation before every step, so an early unsubscribe stops the
/// iteration.
///
/// # Examples
///
/// ```
/// use brook::prelude::*;
///
/// observable::from_iter::<_, Infallible>(0..10).subscribe(|v| println!("{},", v));
/// ```
pub fn from_iter<I, Err>(iter: I) -> Observable<I::Item, Err>
where
  I: IntoIterator + Clone + 'static,
  I::Item: 'static,
  Err: 'static,
{
  Observable::new(move |observer| {
    let iter = iter.clone();
    scheduler::enqueue(move || {
      for value in iter {
        if observer.is_closed() {
          return;
        }
        observer.next(value);
      }
      if !observer.is_closed() {
        observer.complete();
      }
    });
  })
}

/// Creates an observable that completes without emitting. Never errors.
pub fn empty<Item: 'static, Err: 'static>() -> Observable<Item, Err> {
  Observable::new(|observer| {
    observer.complete();
  })
}

/// Creates an observable that immediately emits the error given.
pub fn throw_err<Item, Err>(err: Err) -> Observable<Item, Err>
where
  Item: 'static,
  Err: Clone + 'static,
{
  Observable::new(move |observer| {
    observer.error(err.clone());
  })
}

/// Values adaptable into an [`Observable`].
///
/// This is the explicit adapter set behind [`from`] and the inner-stream
/// normalization of `flat_map`/`switch_map`: an existing `Observable` passes
/// through untouched, a [`Subject`] contributes its hub stream, and plain
/// collections become deferred emission loops. Anything else simply does not
/// implement the capability.
pub trait IntoObservable<Item, Err> {
  fn into_observable(self) -> Observable<Item, Err>;
}

impl<Item: 'static, Err: 'static> IntoObservable<Item, Err> for Observable<Item, Err> {
  #[inline]
  fn into_observable(self) -> Observable<Item, Err> { self }
}

impl<Item, Err> IntoObservable<Item, Err> for Subject<Item, Err>
where
  Item: Clone + 'static,
  Err: Clone + 'static,
{
  fn into_observable(self) -> Observable<Item, Err> { self.observable() }
}

impl<Item, Err> IntoObservable<Item, Err> for &Subject<Item, Err>
where
  Item: Clone + 'static,
  Err: Clone + 'static,
{
  fn into_observable(self) -> Observable<Item, Err> { self.observable() }
}

impl<Item, Err> IntoObservable<Item, Err> for Vec<Item>
where
  Item: Clone + 'static,
  Err: 'static,
{
  fn into_observable(self) -> Observable<Item, Err> { from_iter(self) }
}

impl<Item, Err, const N: usize> IntoObservable<Item, Err> for [Item; N]
where
  Item: Clone + 'static,
  Err: 'static,
{
  fn into_observable(self) -> Observable<Item, Err> { from_iter(self) }
}

/// Adapts any [`IntoObservable`] capability into an observable.
///
/// # Examples
///
/// ```
/// use brook::prelude::*;
///
/// observable::from::<_, i32, Infallible>(vec![1, 2, 3]).subscribe(|v| println!("{}", v));
/// ```
pub fn from<S, Item, Err>(source: S) -> Observable<Item, Err>
where
  S: IntoObservable<Item, Err>,
{
  source.into_observable()
}
