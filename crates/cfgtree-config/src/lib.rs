//! # cfgtree-config
//!
//! A tree of named sections and typed options persisted to an INI-style file.
//! The file embeds a schema version; a file written by an incompatible
//! (major, minor) version is moved to `<path>.old` and the store starts over
//! from its seeded defaults.
//!
//! Every persisting mutation rewrites the whole file before returning. Use
//! [`Store::transaction`] to batch several changes into a single write.

pub mod ini;
pub mod option;
pub mod section;
pub mod store;

pub use option::{ConfigOption, OptionSpec};
pub use section::{Entry, EntrySpec, SECTION_SEPARATOR, Section, SectionSpec, VERSION_KEY};
pub use store::{LoadOutcome, Persist, Store, StoreBuilder};

pub use cfgtree_core::{Address, ConfigError, InputKind, Result, Value};
