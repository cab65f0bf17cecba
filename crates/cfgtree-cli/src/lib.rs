//! # cfgtree-cli
//!
//! Command-line interface for cfgtree configuration files.
//!
//! ## Commands
//!
//! - `cfgtree show` — Print the tree or a subtree (`--json` for machine output)
//! - `cfgtree get` / `cfgtree set` — Read or change one option
//! - `cfgtree add` — Add a typed option
//! - `cfgtree add-section` — Add a section
//! - `cfgtree reset` — Restore defaults

pub mod commands;

pub use commands::Cli;
