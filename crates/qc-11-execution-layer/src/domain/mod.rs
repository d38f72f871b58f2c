//! Domain module for the Execution Layer
//!
//! Value objects, deploys, the ordered queue, the candidate block and errors.

pub mod candidate;
pub mod deploy;
pub mod errors;
pub mod invariants;
pub mod queue;
pub mod value_objects;

pub use candidate::*;
pub use deploy::*;
pub use errors::*;
pub use queue::DeployQueue;
pub use value_objects::*;
