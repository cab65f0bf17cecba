//! # cfgtree-core
//!
//! Shared vocabulary for the cfgtree workspace: the error taxonomy, the
//! canonical [`Value`] type, and the closed set of [`InputKind`]s with their
//! normalization rules.

pub mod error;
pub mod kind;
pub mod value;

pub use error::{ConfigError, Result};
pub use kind::InputKind;
pub use value::{Address, Value};
