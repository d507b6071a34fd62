// Library exports for the fall-detect CLI
// This allows testing of internal modules

pub mod commands;
pub mod config;
pub mod input;
