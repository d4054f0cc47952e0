//! DistinctUntilChanged operator: drop consecutive duplicates.

use std::{cell::RefCell, rc::Rc};

use crate::observable::Observable;

/// Forwards a value only when it differs from the previous forwarded value.
/// The comparison state is per subscription.
///
/// # Examples
///
/// ```
/// use brook::prelude::*;
///
/// observable::from_iter::<_, Infallible>(vec![1, 1, 2, 2, 2, 1])
///   .pipe(ops::distinct_until_changed())
///   .subscribe(|v| println!("{}", v));
/// // 1, 2, 1
/// ```
pub fn distinct_until_changed<Item, Err>() -> impl FnOnce(Observable<Item, Err>) -> Observable<Item, Err>
where
  Item: PartialEq + Clone + 'static,
  Err: 'static,
{
  move |source| {
    Observable::new(move |observer| {
      let latest = Rc::new(RefCell::new(None::<Item>));
      let error_observer = observer.clone();
      let complete_observer = observer.clone();
      source.clone().subscribe_all(
        move |v| {
          let changed = { latest.borrow().as_ref() != Some(&v) };
          if changed {
            *latest.borrow_mut() = Some(v.clone());
            observer.next(v);
          }
        },
        move |e| error_observer.error(e),
        move || complete_observer.complete(),
      )
    })
  }
}

#[cfg(test)]
mod tests {
  use std::{cell::RefCell, convert::Infallible, rc::Rc};

  use super::*;
  use crate::prelude::*;

  #[test]
  fn drops_consecutive_duplicates_only() {
    let emitted = Rc::new(RefCell::new(Vec::new()));
    let c_emitted = emitted.clone();

    observable::from_iter::<_, Infallible>(vec![1, 1, 2, 2, 2, 1, 3, 3])
      .pipe(distinct_until_changed())
      .subscribe(move |v| c_emitted.borrow_mut().push(v));

    assert_eq!(*emitted.borrow(), vec![1, 2, 1, 3]);
  }

  #[test]
  fn comparison_state_is_per_subscription() {
    let source = observable::from_iter::<_, Infallible>(vec![7, 7, 8]).pipe(distinct_until_changed());

    let first = Rc::new(RefCell::new(Vec::new()));
    let second = Rc::new(RefCell::new(Vec::new()));
    let c_first = first.clone();
    source.clone().subscribe(move |v| c_first.borrow_mut().push(v));
    let c_second = second.clone();
    source.subscribe(move |v| c_second.borrow_mut().push(v));

    assert_eq!(*first.borrow(), vec![7, 8]);
    assert_eq!(*second.borrow(), vec![7, 8]);
  }
}
