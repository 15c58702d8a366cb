//! Git repository access
//!
//! Hybrid backend:
//! - `GitBackend` - gitoxide for opening repositories and read-only queries
//! - `WorkingTree` - validated working tree driving the git CLI for
//!   status/diff/log text and every mutation
//! - root discovery for client-advertised workspace roots

mod backend;
mod ops;
mod roots;
mod tree;

pub use backend::*;
pub use ops::*;
pub use roots::*;
pub use tree::*;
