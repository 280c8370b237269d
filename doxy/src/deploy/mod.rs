//! Deployment module

pub mod command;
pub mod pipeline;
pub mod request;
