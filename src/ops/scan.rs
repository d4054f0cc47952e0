//! Scan operator: running accumulation.

use std::{cell::RefCell, rc::Rc};

use crate::observable::Observable;

/// Folds every value onto an accumulator seeded with `seed`, emitting each
/// intermediate accumulation. The accumulator is created per subscription.
///
/// # Examples
///
/// ```
/// use brook::prelude::*;
///
/// observable::from_iter::<_, Infallible>(1..=4)
///   .pipe(ops::scan(0, |acc, v| acc + v))
///   .subscribe(|v| println!("{}", v));
/// // 1, 3, 6, 10
/// ```
pub fn scan<In, Acc, Err, F>(seed: Acc, f: F) -> impl FnOnce(Observable<In, Err>) -> Observable<Acc, Err>
where
  In: 'static,
  Acc: Clone + 'static,
  Err: 'static,
  F: FnMut(Acc, In) -> Acc + 'static,
{
  move |source| {
    let f = Rc::new(RefCell::new(f));
    Observable::new(move |observer| {
      let f = f.clone();
      let acc = Rc::new(RefCell::new(seed.clone()));
      let error_observer = observer.clone();
      let complete_observer = observer.clone();
      source.clone().subscribe_all(
        move |v| {
          let current = acc.borrow().clone();
          let folded = (f.borrow_mut())(current, v);
          *acc.borrow_mut() = folded.clone();
          observer.next(folded);
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
  fn emits_every_intermediate_accumulation() {
    let emitted = Rc::new(RefCell::new(Vec::new()));
    let c_emitted = emitted.clone();

    observable::from_iter::<_, Infallible>(1..=4)
      .pipe(scan(0, |acc, v| acc + v))
      .subscribe(move |v| c_emitted.borrow_mut().push(v));

    assert_eq!(*emitted.borrow(), vec![1, 3, 6, 10]);
  }

  #[test]
  fn accumulator_resets_per_subscription() {
    let source = observable::from_iter::<_, Infallible>(1..=3).pipe(scan(0, |acc, v| acc + v));

    let first = Rc::new(RefCell::new(Vec::new()));
    let second = Rc::new(RefCell::new(Vec::new()));
    let c_first = first.clone();
    source.clone().subscribe(move |v| c_first.borrow_mut().push(v));
    let c_second = second.clone();
    source.subscribe(move |v| c_second.borrow_mut().push(v));

    assert_eq!(*first.borrow(), vec![1, 3, 6]);
    assert_eq!(*second.borrow(), vec![1, 3, 6]);
  }
}
