//! Internal building blocks (object model, reference classification, size
//! graph, path resolution) that power the public APIs.

pub mod graph;
pub mod object;
pub mod path;
pub mod refs;
pub mod sizes;
