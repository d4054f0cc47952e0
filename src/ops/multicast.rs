//! Multicast operator: share one source subscription between many
//! subscribers.

use crate::{
  observable::Observable,
  rc::{MutRc, RcDeref, RcDerefMut},
  subject::Subject,
  subscription::{Subscription, SubscriptionLike, TearDown},
};

struct Shared<Item, Err> {
  hub: Subject<Item, Err>,
  source_subscription: Option<Subscription<Item, Err>>,
  subscribers: usize,
}

/// Converts a cold stream into a shared one.
///
/// The source is subscribed lazily when the first downstream subscriber
/// arrives, and every source notification fans out through an internal hub.
/// Subscribers are reference-counted: when the count returns to zero the
/// source subscription is torn down, and a later subscriber starts the
/// source afresh. Values emitted before a subscriber joined are not
/// replayed.
///
/// # Examples
///
/// ```
/// use std::{cell::RefCell, rc::Rc};
///
/// use brook::prelude::*;
///
/// let runs = Rc::new(RefCell::new(0));
/// let c_runs = runs.clone();
/// let shared = Observable::<i32>::new(move |observer| {
///   *c_runs.borrow_mut() += 1;
///   observer.next(1);
/// })
/// .multicast();
///
/// let _first = shared.clone().subscribe(|_| {});
/// let _second = shared.subscribe(|_| {});
/// // one producer run serves both subscribers
/// assert_eq!(*runs.borrow(), 1);
/// ```
pub fn multicast<Item, Err>(source: Observable<Item, Err>) -> Observable<Item, Err>
where
  Item: Clone + 'static,
  Err: Clone + 'static,
{
  let shared: MutRc<Shared<Item, Err>> = MutRc::own(Shared {
    hub: Subject::new(),
    source_subscription: None,
    subscribers: 0,
  });

  Observable::new(move |observer| {
    // Register the downstream first so a synchronously-emitting source
    // reaches it, then start the source lazily.
    let hub_stream = { shared.rc_deref().hub.observable() };
    let error_observer = observer.clone();
    let complete_observer = observer.clone();
    let downstream = hub_stream.subscribe_all(
      move |v| observer.next(v),
      move |e| error_observer.error(e),
      move || complete_observer.complete(),
    );

    shared.rc_deref_mut().subscribers += 1;
    let needs_source = { shared.rc_deref().source_subscription.is_none() };
    if needs_source {
      let hub = { shared.rc_deref().hub.clone() };
      let subscription = source.clone().subscribe_with(hub);
      shared.rc_deref_mut().source_subscription = Some(subscription);
    }

    let shared = shared.clone();
    let downstream = std::cell::RefCell::new(downstream);
    TearDown::new(move || {
      downstream.borrow_mut().unsubscribe();
      let released = {
        let mut shared = shared.rc_deref_mut();
        shared.subscribers -= 1;
        if shared.subscribers == 0 {
          // Last subscriber gone: drop the source and reset the hub so a
          // future subscriber triggers a fresh source run.
          shared.hub = Subject::new();
          shared.source_subscription.take()
        } else {
          None
        }
      };
      if let Some(mut subscription) = released {
        subscription.unsubscribe();
      }
    })
  })
}
