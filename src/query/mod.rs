//! Query filters and predicate composition.
//!
//! A [`QueryFilter`] is built per call, either directly or from the JSON
//! arguments of a read request, and turned into a [`Predicate`] that the
//! store applies over its current snapshot.

mod filter;

pub use filter::{Predicate, QueryFilter};
