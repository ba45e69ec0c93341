//! Direct-to-storage uploads for ActiveStorage-style backends.
//!
//! Each file is registered with the application backend, sent straight to the
//! storage service, and once the whole batch has landed the signed ids are
//! submitted to an application endpoint. [`upload::BatchOrchestrator`] is the
//! entry point; [`config::UploaderConfig`] wires one up from TOML.

pub mod config;
pub mod error;
pub mod upload;
pub mod utils;
