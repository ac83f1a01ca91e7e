//! Helpers shared by the backends.

pub mod command;
pub mod path;
