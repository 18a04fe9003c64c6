//! SSM configuration library
//!
//! Resolves the service configuration from stage-keyed YAML documents and
//! locates key files through an ordered directory search path.

pub mod cli;
pub mod config;
pub mod error;
pub mod format;
pub mod keys;
pub mod logging;
pub mod paths;
