//! Tool registry and dispatch
//!
//! - `Catalog` - the immutable list of operations and their schemas
//! - `ToolCall` - typed arguments decoded from the untyped bag
//! - `Dispatcher` - validation, working-tree resolution and execution

mod args;
mod catalog;
mod dispatch;

pub use args::*;
pub use catalog::*;
pub use dispatch::*;
