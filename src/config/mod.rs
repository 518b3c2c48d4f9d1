// src/config/mod.rs

//! Build options.
//!
//! Responsibilities:
//! - Declare the option schema: type tag, enumeration, default and whether a
//!   change invalidates the build (`schema.rs`).
//! - Coerce and validate assigned values (`validate.rs`).
//! - Hold global values plus per-job overrides (`options.rs`).
//! - Offer a per-job read view with ordered fallback (`job_view.rs`).
//! - Read option files written in TOML (`loader.rs`).
//!
//! Malformed external configuration never aborts a build: rejected values are
//! logged with `warn!` and dropped.

pub mod job_view;
pub mod loader;
pub mod options;
pub mod schema;
pub mod validate;

pub use job_view::JobOptions;
pub use loader::{load_from_path, load_from_str, parse_assignment};
pub use options::{OptionSet, OptionValue};
pub use schema::{OptionSchema, OptionSpec, OptionType};
