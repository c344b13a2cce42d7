//! memorylane-core: the local persistence and generation core behind an
//! oral-history storybook tool.
//!
//! The crate keeps four small JSON collections (interview subjects, stories,
//! session logs, prompt cards) in a quota-limited record store, parks large
//! generated images in a durable id-keyed cache, and wraps a remote
//! text/image generation service with response-shape recovery and a
//! deterministic placeholder fallback.
//!
//! Everything hangs off [`commands::Context`]: open it once at application
//! start and pass it to whatever drives the UI.

pub mod commands;
pub mod config;
pub mod entities;
pub mod errors;
pub mod services;
pub mod utils;

pub use commands::Context;
