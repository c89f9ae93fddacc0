//! Test-only helpers: a scripted serial transport, device reply scripts and
//! temporary file management.

mod fixtures;
mod temp;
mod transport;

pub use fixtures::*;
pub use temp::TestContext;
pub use transport::ScriptedTransport;
