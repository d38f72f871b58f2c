//! # Adapters
//!
//! Port implementations owned by the node rather than the execution layer.

pub mod storage;
