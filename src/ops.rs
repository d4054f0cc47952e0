//! Composition operators.
//!
//! Every operator here is a value-level function from stream to stream,
//! meant to be applied with
//! [`Observable::pipe`](crate::observable::Observable::pipe) or through the
//! method sugar on `Observable`. Operators
//! hold no state of their own: whatever state a pipeline stage needs is
//! created inside the producer, once per subscription, so composed streams
//! stay cold.

pub mod distinct_until_changed;
pub mod filter;
pub mod flat_map;
pub mod map;
pub mod merge;
pub mod multicast;
pub mod scan;
pub mod start_with;
pub mod switch_map;

pub use distinct_until_changed::distinct_until_changed;
pub use filter::filter;
pub use flat_map::flat_map;
pub use map::map;
pub use merge::merge;
pub use multicast::multicast;
pub use scan::scan;
pub use start_with::start_with;
pub use switch_map::switch_map;
