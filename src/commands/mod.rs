// src/commands/mod.rs
mod api;

pub use api::Context;
