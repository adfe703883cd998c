//! Git-Shape is a library for measuring the size shape of a Git repository:
//! how many unique objects it holds, how big its worst individual objects are,
//! and how large the biggest checkout anywhere in its history would expand to.
//!
//! The scan is a single pass over every reachable object. Reference tips are
//! classified into groups and become walk roots; object headers stream in
//! topological order; tree, commit and tag bodies are then fetched in one
//! batch and folded into a DAG of partial size records until every record
//! finalizes into the repository-wide [`HistorySize`](internal::sizes::HistorySize)
//! aggregate. Counters saturate instead of overflowing, so a hostile
//! "git bomb" reports pinned maxima rather than panicking.
pub mod analyze;
pub mod counter;
pub mod errors;
pub mod hash;
pub mod internal;
pub mod source;
