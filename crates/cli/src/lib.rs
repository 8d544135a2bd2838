//! Library half of the `convoke` binary: command implementations and the
//! replay script loader, exposed so integration tests can drive them.

pub mod commands;
pub mod script;
