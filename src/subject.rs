//! Broadcast hub: both a stream and a consumer of one.

use smallvec::SmallVec;

use crate::{
  observable::Observable,
  observer::Observer,
  rc::{MutRc, RcDeref, RcDerefMut},
  scheduler,
  subscription::{SubscriptionObserver, TearDown},
};

enum Terminal<Err> {
  Completed,
  Errored(Err),
}

impl<Err: Clone> Clone for Terminal<Err> {
  fn clone(&self) -> Self {
    match self {
      Terminal::Completed => Terminal::Completed,
      Terminal::Errored(err) => Terminal::Errored(err.clone()),
    }
  }
}

struct Hub<Item, Err> {
  subscribers: SmallVec<[(u64, SubscriptionObserver<Item, Err>); 2]>,
  next_key: u64,
  terminal: Option<Terminal<Err>>,
}

/// A hot broadcast point: values pushed into the subject fan out to every
/// subscriber registered at that moment.
///
/// Each subscriber gets its own full subscription state machine, so the
/// reentrancy and exactly-once guarantees of the delivery engine hold per
/// subscriber. A subject never replays: late subscribers only see values
/// pushed after they joined (and the terminal notification, if the subject
/// already ended).
///
/// `Subject` also implements [`Observer`], so it can be subscribed into
/// another stream to rebroadcast it — this is how `multicast` shares one
/// source subscription.
///
/// ```
/// use std::{cell::RefCell, rc::Rc};
///
/// use brook::prelude::*;
///
/// let subject = Subject::<i32, Infallible>::new();
/// let seen = Rc::new(RefCell::new(Vec::new()));
/// let sink = seen.clone();
///
/// subject.subscribe(move |v| sink.borrow_mut().push(v));
/// subject.next(1);
/// subject.next(2);
///
/// assert_eq!(*seen.borrow(), vec![1, 2]);
/// ```
pub struct Subject<Item, Err> {
  hub: MutRc<Hub<Item, Err>>,
}

impl<Item, Err> Clone for Subject<Item, Err> {
  fn clone(&self) -> Self { Self { hub: self.hub.clone() } }
}

impl<Item, Err> Default for Subject<Item, Err>
where
  Item: Clone + 'static,
  Err: Clone + 'static,
{
  fn default() -> Self { Self::new() }
}

impl<Item, Err> Subject<Item, Err>
where
  Item: Clone + 'static,
  Err: Clone + 'static,
{
  pub fn new() -> Self {
    Subject {
      hub: MutRc::own(Hub { subscribers: SmallVec::new(), next_key: 0, terminal: None }),
    }
  }

  /// The cold face of the hub: each subscription registers one more
  /// broadcast target, and deregisters it on unsubscribe.
  pub fn observable(&self) -> Observable<Item, Err> {
    let hub = self.hub.clone();
    Observable::new(move |observer| {
      let replay = { hub.rc_deref().terminal.clone() };
      if let Some(terminal) = replay {
        match terminal {
          Terminal::Completed => observer.complete(),
          Terminal::Errored(err) => observer.error(err),
        }
        return TearDown::none();
      }

      let key = {
        let mut hub = hub.rc_deref_mut();
        let key = hub.next_key;
        hub.next_key += 1;
        hub.subscribers.push((key, observer));
        key
      };
      let hub = hub.clone();
      TearDown::new(move || {
        hub
          .rc_deref_mut()
          .subscribers
          .retain(|(registered, _)| *registered != key);
      })
    })
  }

  /// Broadcasts a value to every current subscriber.
  pub fn next(&self, value: Item) {
    let _guard = scheduler::enter();
    // Snapshot: subscribers joining mid-broadcast see only later values.
    let targets = { self.hub.rc_deref().subscribers.clone() };
    for (_, observer) in targets {
      observer.next(value.clone());
    }
  }

  /// Terminates every current subscriber with `err` and closes the hub.
  pub fn error(&self, err: Err) {
    let _guard = scheduler::enter();
    let targets = {
      let mut hub = self.hub.rc_deref_mut();
      if hub.terminal.is_some() {
        return;
      }
      hub.terminal = Some(Terminal::Errored(err.clone()));
      std::mem::take(&mut hub.subscribers)
    };
    for (_, observer) in targets {
      observer.error(err.clone());
    }
  }

  /// Completes every current subscriber and closes the hub.
  pub fn complete(&self) {
    let _guard = scheduler::enter();
    let targets = {
      let mut hub = self.hub.rc_deref_mut();
      if hub.terminal.is_some() {
        return;
      }
      hub.terminal = Some(Terminal::Completed);
      std::mem::take(&mut hub.subscribers)
    };
    for (_, observer) in targets {
      observer.complete();
    }
  }

  pub fn subscriber_count(&self) -> usize { self.hub.rc_deref().subscribers.len() }

  pub fn is_closed(&self) -> bool { self.hub.rc_deref().terminal.is_some() }

  // Subscribe sugar mirroring `Observable`.

  pub fn subscribe<N>(&self, next: N) -> crate::subscription::Subscription<Item, Err>
  where
    N: FnMut(Item) + 'static,
  {
    self.observable().subscribe(next)
  }

  pub fn subscribe_err<N, E>(&self, next: N, error: E) -> crate::subscription::Subscription<Item, Err>
  where
    N: FnMut(Item) + 'static,
    E: FnMut(Err) + 'static,
  {
    self.observable().subscribe_err(next, error)
  }

  pub fn subscribe_all<N, E, C>(
    &self, next: N, error: E, complete: C,
  ) -> crate::subscription::Subscription<Item, Err>
  where
    N: FnMut(Item) + 'static,
    E: FnMut(Err) + 'static,
    C: FnMut() + 'static,
  {
    self.observable().subscribe_all(next, error, complete)
  }
}

impl<Item, Err> Observer<Item, Err> for Subject<Item, Err>
where
  Item: Clone + 'static,
  Err: Clone + 'static,
{
  fn next(&mut self, value: Item) { Subject::next(self, value); }

  fn error(&mut self, err: Err) { Subject::error(self, err); }

  fn complete(&mut self) { Subject::complete(self); }
}
