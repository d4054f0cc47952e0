use std::{
  cell::{Ref, RefCell, RefMut},
  rc::Rc,
};

use crate::subscription::SubscriptionLike;

/// Immutable access to the value behind a reference-counted cell.
pub trait RcDeref {
  type Target<'a>
  where
    Self: 'a;
  fn rc_deref(&self) -> Self::Target<'_>;
}

/// Mutable access to the value behind a reference-counted cell.
pub trait RcDerefMut {
  type Target<'a>
  where
    Self: 'a;
  fn rc_deref_mut(&self) -> Self::Target<'_>;
}

/// Shared mutable cell used by the engine and the composition operators.
///
/// The whole engine is single-threaded by design, so `Rc<RefCell<T>>` is all
/// the sharing it ever needs.
pub struct MutRc<T>(Rc<RefCell<T>>);

impl<T> MutRc<T> {
  pub fn own(t: T) -> Self { Self(Rc::new(RefCell::new(t))) }
}

impl<T> RcDeref for MutRc<T> {
  type Target<'a>
    = Ref<'a, T>
  where
    Self: 'a;
  #[inline]
  fn rc_deref(&self) -> Self::Target<'_> { self.0.borrow() }
}

impl<T> RcDerefMut for MutRc<T> {
  type Target<'a>
    = RefMut<'a, T>
  where
    Self: 'a;
  #[inline]
  fn rc_deref_mut(&self) -> Self::Target<'_> { self.0.borrow_mut() }
}

impl<T> Clone for MutRc<T> {
  #[inline]
  fn clone(&self) -> Self { Self(self.0.clone()) }
}

impl<T: SubscriptionLike> SubscriptionLike for MutRc<T> {
  #[inline]
  fn unsubscribe(&mut self) { self.rc_deref_mut().unsubscribe() }

  #[inline]
  fn is_closed(&self) -> bool { self.rc_deref().is_closed() }
}
