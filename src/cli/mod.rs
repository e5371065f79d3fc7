//! CLI module for ragbuddy
//!
//! Handles command-line argument parsing.

pub mod args;

pub use args::{Args, Commands, IngestSource, Verbosity};
