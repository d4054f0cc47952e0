//! Convenient single-import surface for the whole crate.

pub use std::convert::Infallible;

pub use crate::{
  error::{reset_uncaught_hook, set_uncaught_hook, with_uncaught_hook, UncaughtError},
  observable,
  observable::{IntoObservable, Observable},
  observer::Observer,
  ops,
  rc::{MutRc, RcDeref, RcDerefMut},
  scheduler::{run_until_idle, serial::SerialScheduler},
  subject::Subject,
  subscription::{
    IntoTearDown, Subscription, SubscriptionGuard, SubscriptionLike, SubscriptionObserver,
    TearDown,
  },
};
