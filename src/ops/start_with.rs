//! StartWith operator: prepend a value to a stream.

use crate::{observable, observable::Observable};

/// Emits `value` first, then everything the source emits.
///
/// # Examples
///
/// ```
/// use brook::prelude::*;
///
/// observable::from_iter::<_, Infallible>(2..=3)
///   .pipe(ops::start_with(1))
///   .subscribe(|v| println!("{}", v));
/// // 1, 2, 3
/// ```
pub fn start_with<Item, Err>(value: Item) -> impl FnOnce(Observable<Item, Err>) -> Observable<Item, Err>
where
  Item: Clone + 'static,
  Err: 'static,
{
  move |source| observable::of(value).concat(source)
}

#[cfg(test)]
mod tests {
  use std::{cell::RefCell, convert::Infallible, rc::Rc};

  use super::*;

  #[test]
  fn prepends_the_value() {
    let emitted = Rc::new(RefCell::new(Vec::new()));
    let completed = Rc::new(RefCell::new(false));
    let c_emitted = emitted.clone();
    let c_completed = completed.clone();

    observable::from_iter::<_, Infallible>(2..=4)
      .pipe(start_with(1))
      .subscribe_complete(
        move |v| c_emitted.borrow_mut().push(v),
        move || *c_completed.borrow_mut() = true,
      );

    assert_eq!(*emitted.borrow(), vec![1, 2, 3, 4]);
    assert!(*completed.borrow());
  }

  #[test]
  fn errors_still_pass_through() {
    let emitted = Rc::new(RefCell::new(Vec::new()));
    let errors = Rc::new(RefCell::new(Vec::new()));
    let c_emitted = emitted.clone();
    let c_errors = errors.clone();

    observable::throw_err::<i32, &'static str>("late failure")
      .pipe(start_with(0))
      .subscribe_err(
        move |v| c_emitted.borrow_mut().push(v),
        move |e| c_errors.borrow_mut().push(e),
      );

    assert_eq!(*emitted.borrow(), vec![0]);
    assert_eq!(*errors.borrow(), vec!["late failure"]);
  }
}
