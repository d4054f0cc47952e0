//! # brook: push-based lazy observables for Rust
//!
//! A cold [`Observable`] wraps a producer function that runs once per
//! subscription. The delivery engine guarantees ordered, exactly-once
//! notification delivery even under synchronous re-entrant emission, and the
//! serial scheduler keeps asynchronous transforms in input order no matter
//! how their latencies interleave.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::{cell::RefCell, rc::Rc};
//!
//! use brook::prelude::*;
//!
//! let sums = Rc::new(RefCell::new(Vec::new()));
//! let sink = sums.clone();
//!
//! observable::from_iter::<_, Infallible>(1..=5)
//!   .filter(|v| v % 2 == 1)
//!   .pipe(ops::scan(0, |acc, v| acc + v))
//!   .subscribe(move |v| sink.borrow_mut().push(v));
//!
//! assert_eq!(*sums.borrow(), vec![1, 4, 9]);
//! ```
//!
//! ## Key Concepts
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Observable`] | Cold stream descriptor; `subscribe` runs the producer |
//! | [`Subscription`] | Handle to cancel one producer/consumer pairing |
//! | [`SubscriptionObserver`] | Capability a producer emits through |
//! | [`Subject`] | Hot broadcast hub, both stream and consumer |
//! | [`ops`] | `(Observable) -> Observable` operators for [`pipe`] |
//!
//! The engine is single-threaded and cooperative: notifications that arrive
//! while another is being delivered are buffered and flushed in FIFO order
//! before the outermost call returns, never delivered recursively. Errors
//! that cannot reach a consumer go to the process-wide
//! [uncaught-error hook](crate::error).
//!
//! [`Observable`]: observable::Observable
//! [`Subscription`]: subscription::Subscription
//! [`SubscriptionObserver`]: subscription::SubscriptionObserver
//! [`Subject`]: subject::Subject
//! [`pipe`]: observable::Observable::pipe

pub mod error;
pub mod observable;
pub mod observer;
pub mod ops;
pub mod prelude;
pub mod rc;
pub mod scheduler;
pub mod subject;
pub mod subscription;

pub use prelude::*;
