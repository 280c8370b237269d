//! Doxy Library
//!
//! Deployment registry, build-and-run pipeline and reverse proxy behind the
//! doxy server.

pub mod app;
pub mod deploy;
pub mod errors;
pub mod logs;
pub mod proxy;
pub mod registry;
pub mod server;
pub mod settings;
pub mod utils;
