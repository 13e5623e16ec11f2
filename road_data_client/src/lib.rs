//! HTTP clients for the source registry and the linear-referencing converter.

pub mod errors;
pub mod providers;
pub mod retry;
