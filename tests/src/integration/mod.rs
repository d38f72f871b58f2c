//! # Integration Tests
//!
//! Cross-crate flows through the execution layer:
//!
//! - `fixtures`: chain-spec files and node wiring shared by the flows
//! - `flows`: ordering, failure isolation, genesis and concurrent delivery

pub mod fixtures;
pub mod flows;
