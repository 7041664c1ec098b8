//! Structured runtime types wrapped by [`Value`](crate::value::Value) variants.
//!
//! Each type carries the operations the engine needs from it (lookup, mutation, iteration);
//! the value-level dispatch lives in `value.rs` and `ops.rs`.
pub mod dict;
pub mod exception;
pub mod iter;
pub mod method;
pub mod range;
pub mod set;

pub use dict::Dict;
pub use exception::{ExcClass, ExcInstance};
pub use iter::ValueIter;
pub use method::BoundMethod;
pub use range::Range;
pub use set::Set;
