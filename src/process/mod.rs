//! External process integration
//!
//! - `ProcessRunner` - Semaphore-controlled async command execution
//! - `CommandOutput` - Captured stdout, stderr and exit status

mod runner;

pub use runner::*;
