//! The cold push-stream primitive.

use std::{cell::RefCell, convert::Infallible, future::Future, rc::Rc};

use futures::channel::oneshot;

use crate::{
  observer::{CallbackObserver, Observer},
  ops,
  subscription::{IntoTearDown, Subscription, SubscriptionLike, SubscriptionObserver, TearDown},
};

mod from;
pub use from::*;
mod from_future;
pub use from_future::*;

/// A representation of any set of values over any amount of time.
///
/// An `Observable` is an immutable description: a producer function waiting
/// to be run. Every `subscribe` call runs the producer once against a fresh
/// [`Subscription`], so independent subscribers never share state (cold
/// semantics). Cloning an `Observable` only clones the description.
///
/// ```
/// use brook::prelude::*;
///
/// let collected = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
/// let sink = collected.clone();
///
/// observable::from_iter::<_, Infallible>(0..4)
///   .filter(|v| v % 2 == 0)
///   .map(|v| v * 10)
///   .subscribe(move |v| sink.borrow_mut().push(v));
///
/// assert_eq!(*collected.borrow(), vec![0, 20]);
/// ```
pub struct Observable<Item, Err = Infallible> {
  producer: Rc<dyn Fn(SubscriptionObserver<Item, Err>) -> TearDown>,
}

impl<Item, Err> Clone for Observable<Item, Err> {
  fn clone(&self) -> Self { Self { producer: self.producer.clone() } }
}

impl<Item: 'static, Err: 'static> Observable<Item, Err> {
  /// Wraps a producer function.
  ///
  /// The producer is invoked synchronously once per subscription. It
  /// receives the [`SubscriptionObserver`] to emit through, and returns its
  /// cleanup: `()`, a [`TearDown`], or the [`Subscription`] of an upstream
  /// it opened.
  ///
  /// ```
  /// use brook::prelude::*;
  ///
  /// let ticks = Observable::<i32>::new(|observer| {
  ///   observer.next(1);
  ///   observer.next(2);
  ///   observer.complete();
  ///   TearDown::new(|| { /* release resources here */ })
  /// });
  /// ticks.subscribe(|v| println!("{}", v));
  /// ```
  pub fn new<F, T>(producer: F) -> Self
  where
    F: Fn(SubscriptionObserver<Item, Err>) -> T + 'static,
    T: IntoTearDown,
  {
    Observable { producer: Rc::new(move |observer| producer(observer).into_tear_down()) }
  }

  // ==================== Subscribe family ====================

  /// Subscribes with a value callback only. An `error` notification on such
  /// a subscription escalates to the uncaught-error hook.
  pub fn subscribe<N>(self, next: N) -> Subscription<Item, Err>
  where
    N: FnMut(Item) + 'static,
  {
    self.subscribe_parts(Some(Box::new(next)), None, None)
  }

  pub fn subscribe_err<N, E>(self, next: N, error: E) -> Subscription<Item, Err>
  where
    N: FnMut(Item) + 'static,
    E: FnMut(Err) + 'static,
  {
    self.subscribe_parts(Some(Box::new(next)), Some(Box::new(error)), None)
  }

  pub fn subscribe_complete<N, C>(self, next: N, complete: C) -> Subscription<Item, Err>
  where
    N: FnMut(Item) + 'static,
    C: FnMut() + 'static,
  {
    self.subscribe_parts(Some(Box::new(next)), None, Some(Box::new(complete)))
  }

  pub fn subscribe_all<N, E, C>(self, next: N, error: E, complete: C) -> Subscription<Item, Err>
  where
    N: FnMut(Item) + 'static,
    E: FnMut(Err) + 'static,
    C: FnMut() + 'static,
  {
    self.subscribe_parts(Some(Box::new(next)), Some(Box::new(error)), Some(Box::new(complete)))
  }

  /// Subscribes a full [`Observer`].
  pub fn subscribe_with<O>(self, observer: O) -> Subscription<Item, Err>
  where
    O: Observer<Item, Err> + 'static,
  {
    let callbacks = CallbackObserver::from_observer(observer);
    Subscription::start(callbacks, &*self.producer)
  }

  fn subscribe_parts(
    self,
    next: Option<Box<dyn FnMut(Item)>>,
    error: Option<Box<dyn FnMut(Err)>>,
    complete: Option<Box<dyn FnMut()>>,
  ) -> Subscription<Item, Err> {
    Subscription::start(CallbackObserver { next, error, complete }, &*self.producer)
  }

  // ==================== Composition ====================

  /// Applies one `(Observable) -> X` function. Chains of `pipe` calls
  /// left-fold a pipeline:
  ///
  /// ```
  /// use brook::prelude::*;
  ///
  /// observable::from_iter::<_, Infallible>(1..=3)
  ///   .pipe(ops::scan(0, |acc, v| acc + v))
  ///   .pipe(ops::start_with(0))
  ///   .subscribe(|v| println!("{}", v));
  /// ```
  pub fn pipe<Out>(self, op: impl FnOnce(Self) -> Out) -> Out { op(self) }

  /// Creates a new stream which calls a closure on each value and emits its
  /// return.
  pub fn map<Out, F>(self, f: F) -> Observable<Out, Err>
  where
    Out: 'static,
    F: FnMut(Item) -> Out + 'static,
  {
    let f = Rc::new(RefCell::new(f));
    Observable::new(move |observer| {
      let f = f.clone();
      let error_observer = observer.clone();
      let complete_observer = observer.clone();
      self.clone().subscribe_all(
        move |v| {
          let mapped = (f.borrow_mut())(v);
          observer.next(mapped);
        },
        move |e| error_observer.error(e),
        move || complete_observer.complete(),
      )
    })
  }

  /// Transforms the error channel, leaving values untouched.
  pub fn map_err<Err2, F>(self, f: F) -> Observable<Item, Err2>
  where
    Err2: 'static,
    F: FnMut(Err) -> Err2 + 'static,
  {
    let f = Rc::new(RefCell::new(f));
    Observable::new(move |observer| {
      let f = f.clone();
      let error_observer = observer.clone();
      let complete_observer = observer.clone();
      self.clone().subscribe_all(
        move |v| observer.next(v),
        move |e| {
          let mapped = (f.borrow_mut())(e);
          error_observer.error(mapped);
        },
        move || complete_observer.complete(),
      )
    })
  }

  /// Keeps only the values the predicate accepts.
  pub fn filter<F>(self, predicate: F) -> Observable<Item, Err>
  where
    F: FnMut(&Item) -> bool + 'static,
  {
    let predicate = Rc::new(RefCell::new(predicate));
    Observable::new(move |observer| {
      let predicate = predicate.clone();
      let error_observer = observer.clone();
      let complete_observer = observer.clone();
      self.clone().subscribe_all(
        move |v| {
          if (predicate.borrow_mut())(&v) {
            observer.next(v);
          }
        },
        move |e| error_observer.error(e),
        move || complete_observer.complete(),
      )
    })
  }

  /// Accumulates every value with `f`, emitting the final accumulation when
  /// the source completes. The first value seeds the accumulator.
  ///
  /// Reducing an empty stream is a usage error; it is reported through the
  /// uncaught-error hook. Use [`fold`](Self::fold) when the stream may be
  /// empty.
  pub fn reduce<F>(self, f: F) -> Observable<Item, Err>
  where
    F: FnMut(Item, Item) -> Item + 'static,
  {
    let f = Rc::new(RefCell::new(f));
    Observable::new(move |observer| {
      let f = f.clone();
      let acc = Rc::new(RefCell::new(None::<Item>));
      let complete_acc = acc.clone();
      let error_observer = observer.clone();
      let complete_observer = observer.clone();
      self.clone().subscribe_all(
        move |v| {
          let mut acc = acc.borrow_mut();
          *acc = Some(match acc.take() {
            None => v,
            Some(prev) => (f.borrow_mut())(prev, v),
          });
        },
        move |e| error_observer.error(e),
        move || match complete_acc.borrow_mut().take() {
          Some(result) => {
            complete_observer.next(result);
            complete_observer.complete();
          }
          None => panic!("cannot reduce an empty stream without a seed"),
        },
      )
    })
  }

  /// Accumulates every value onto `seed`, emitting the final accumulation
  /// when the source completes.
  pub fn fold<Acc, F>(self, seed: Acc, f: F) -> Observable<Acc, Err>
  where
    Acc: Clone + 'static,
    F: FnMut(Acc, Item) -> Acc + 'static,
  {
    let f = Rc::new(RefCell::new(f));
    Observable::new(move |observer| {
      let f = f.clone();
      let acc = Rc::new(RefCell::new(seed.clone()));
      let complete_acc = acc.clone();
      let error_observer = observer.clone();
      let complete_observer = observer.clone();
      self.clone().subscribe_all(
        move |v| {
          let current = acc.borrow().clone();
          let folded = (f.borrow_mut())(current, v);
          *acc.borrow_mut() = folded;
        },
        move |e| error_observer.error(e),
        move || {
          let result = complete_acc.borrow().clone();
          complete_observer.next(result);
          complete_observer.complete();
        },
      )
    })
  }

  /// Emits every value of `self`, then every value of `tail`.
  pub fn concat(self, tail: Observable<Item, Err>) -> Observable<Item, Err> {
    Observable::new(move |observer| {
      let active = Rc::new(RefCell::new(None::<Subscription<Item, Err>>));
      let tail = tail.clone();
      let tail_active = active.clone();
      let error_observer = observer.clone();
      let complete_observer = observer.clone();
      let next_observer = observer.clone();

      let head = self.clone().subscribe_all(
        move |v| next_observer.next(v),
        move |e| error_observer.error(e),
        move || {
          let tail_error = complete_observer.clone();
          let tail_complete = complete_observer.clone();
          let tail_next = complete_observer.clone();
          let second = tail.clone().subscribe_all(
            move |v| tail_next.next(v),
            move |e| tail_error.error(e),
            move || tail_complete.complete(),
          );
          *tail_active.borrow_mut() = Some(second);
        },
      );
      {
        // The head may have completed synchronously and stored the tail's
        // subscription already; never clobber it.
        let mut slot = active.borrow_mut();
        if slot.is_none() {
          *slot = Some(head);
        }
      }

      TearDown::new(move || {
        if let Some(mut subscription) = active.borrow_mut().take() {
          subscription.unsubscribe();
        }
      })
    })
  }

  /// Observes values passing through without altering them.
  pub fn tap<F>(self, f: F) -> Observable<Item, Err>
  where
    F: FnMut(&Item) + 'static,
  {
    let f = Rc::new(RefCell::new(f));
    Observable::new(move |observer| {
      let f = f.clone();
      let error_observer = observer.clone();
      let complete_observer = observer.clone();
      self.clone().subscribe_all(
        move |v| {
          (f.borrow_mut())(&v);
          observer.next(v);
        },
        move |e| error_observer.error(e),
        move || complete_observer.complete(),
      )
    })
  }

  /// Maps every value to an inner stream and flattens all of them, see
  /// [`ops::flat_map`].
  pub fn flat_map<Out, O, F>(self, f: F) -> Observable<Out, Err>
  where
    Out: 'static,
    O: IntoObservable<Out, Err>,
    F: FnMut(Item) -> O + 'static,
  {
    self.pipe(ops::flat_map(f))
  }

  /// Maps every value to an inner stream, keeping only the latest, see
  /// [`ops::switch_map`].
  pub fn switch_map<Out, O, F>(self, f: F) -> Observable<Out, Err>
  where
    Out: 'static,
    O: IntoObservable<Out, Err>,
    F: FnMut(Item) -> O + 'static,
  {
    self.pipe(ops::switch_map(f))
  }

  /// Merges `other` into this stream, see [`ops::merge`].
  pub fn merge_with(self, other: Observable<Item, Err>) -> Observable<Item, Err> {
    ops::merge([self, other])
  }

  /// Consumes every value with `f`; the returned future resolves when the
  /// stream terminates.
  ///
  /// ```
  /// use brook::prelude::*;
  ///
  /// let total = std::rc::Rc::new(std::cell::RefCell::new(0));
  /// let sink = total.clone();
  /// let done = observable::from_iter::<_, Infallible>(1..=4)
  ///   .for_each(move |v| *sink.borrow_mut() += v);
  /// assert_eq!(futures::executor::block_on(done), Ok(()));
  /// assert_eq!(*total.borrow(), 10);
  /// ```
  pub fn for_each<F>(self, mut f: F) -> impl Future<Output = Result<(), Err>>
  where
    F: FnMut(Item) + 'static,
  {
    let (sender, receiver) = oneshot::channel::<Result<(), Err>>();
    let sender = Rc::new(RefCell::new(Some(sender)));
    let error_sender = sender.clone();

    self.subscribe_all(
      move |v| f(v),
      move |e| {
        if let Some(sender) = error_sender.borrow_mut().take() {
          let _ = sender.send(Err(e));
        }
      },
      move || {
        if let Some(sender) = sender.borrow_mut().take() {
          let _ = sender.send(Ok(()));
        }
      },
    );

    async move { receiver.await.unwrap_or(Ok(())) }
  }
}

impl<Item: Clone + 'static, Err: Clone + 'static> Observable<Item, Err> {
  /// Shares one subscription to this stream between all downstream
  /// subscribers, see [`ops::multicast`].
  pub fn multicast(self) -> Observable<Item, Err> { ops::multicast(self) }
}
