//! Command implementations.

mod extract;
mod fetch;

pub use extract::{apply_overrides, execute_extract};
pub use fetch::execute_fetch;
