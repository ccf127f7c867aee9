//! tyconf-core: sectioned, typed configuration files
//!
//! This crate parses a hierarchical text format of sections and
//! `keyword = value` entries into typed values (scalar, array or hash),
//! optionally checked against a definitions file that whitelists keywords
//! and declares their types, separators and allowed values.
//!
//! # Example
//!
//! ```rust,no_run
//! use tyconf_core::{Config, ConfigOptions};
//!
//! let config = Config::load("app.conf", Some("app.defs".into()), ConfigOptions::default());
//! for message in config.errors() {
//!     eprintln!("{}", message);
//! }
//! let hosts = config.get_array("server", "hosts")?;
//! # Ok::<(), tyconf_core::Error>(())
//! ```

pub mod definitions;
pub mod error;
pub mod escape;
pub mod lines;
pub mod parser;
pub mod value;

mod config;

pub use config::{Config, ConfigOptions};
pub use definitions::{Definitions, KeywordDef};
pub use error::{Error, ErrorKind, Result};
pub use parser::Parser;
pub use value::{Document, TypedValue, ValueType};
