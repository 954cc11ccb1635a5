//! Middleware components for the health API

pub mod logging;
pub mod recover;
