//! Command implementations. Each module exposes an `execute` function taking
//! its parsed arguments.

pub mod build;
pub mod dev;
pub mod inspect;
pub(crate) mod utils;
