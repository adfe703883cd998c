//! Reference selection and grouping.
//!
//! A scan walks from the tips of selected references and tallies every
//! reference it sees into a tree of named groups. [`filter`] supplies the
//! predicate algebra over refnames; [`group`] supplies the built-in and
//! configured group tree plus the per-reference categorization the size
//! accumulator consumes.

pub mod filter;
pub mod group;

pub use filter::{Polarity, ReferenceFilter, SelectionRule};
pub use group::{GroupRule, RefGroupTally, RefGrouper};
