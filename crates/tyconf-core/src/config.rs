//! Main Config type for tyconf
//!
//! A Config owns one parsed document, the definitions it was checked
//! against and the errors collected while parsing. Content problems never
//! fail construction; check [`Config::error_count`] after loading.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::definitions::Definitions;
use crate::error::{Error, Result};
use crate::parser::Parser;
use crate::value::{Document, TypedValue, ValueType};

/// Options recognized when loading a config
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOptions {
    /// Accept keywords that the definitions file does not declare
    pub accept_undefined_keywords: bool,
    /// Log parse progress at debug level for this instance
    pub debug: bool,
}

impl ConfigOptions {
    /// Build options from `name => value` pairs
    ///
    /// Names are matched case-insensitively. `AcceptUndefinedKeywords` is
    /// enabled by "yes"; `Debug` by "yes", "true" or "1". Unknown names
    /// are ignored.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut options = Self::default();
        for (name, value) in pairs {
            let value = value.as_ref().trim().to_ascii_lowercase();
            match name.as_ref().to_ascii_lowercase().as_str() {
                "acceptundefinedkeywords" => options.accept_undefined_keywords = value == "yes",
                "debug" => options.debug = matches!(value.as_str(), "yes" | "true" | "1"),
                other => log::debug!("Ignoring unknown option '{}'", other),
            }
        }
        options
    }
}

/// The main configuration container
#[derive(Debug, Clone)]
pub struct Config {
    config_path: PathBuf,
    definitions_path: Option<PathBuf>,
    options: ConfigOptions,
    definitions: Definitions,
    document: Document,
    errors: Vec<Error>,
    complete: bool,
}

impl Config {
    /// Parse a config file, optionally checked against a definitions file
    ///
    /// Never fails: problems are collected in [`Config::errors`]. A fatal
    /// problem stops the parse early; see [`Config::is_complete`].
    pub fn load(
        config_path: impl Into<PathBuf>,
        definitions_path: Option<PathBuf>,
        options: ConfigOptions,
    ) -> Self {
        let mut config = Self {
            config_path: config_path.into(),
            definitions_path,
            options,
            definitions: Definitions::new(),
            document: Document::new(),
            errors: Vec::new(),
            complete: false,
        };
        config.parse();
        config
    }

    /// Like [`Config::load`], but return the fatal error if the parse was aborted
    pub fn try_load(
        config_path: impl Into<PathBuf>,
        definitions_path: Option<PathBuf>,
        options: ConfigOptions,
    ) -> Result<Self> {
        let config = Self::load(config_path, definitions_path, options);
        match config.fatal_error() {
            Some(err) => Err(err.clone()),
            None => Ok(config),
        }
    }

    /// Parse the original files again, discarding the document and all errors
    pub fn reload(&mut self) -> &mut Self {
        self.parse();
        self
    }

    fn parse(&mut self) {
        self.document.clear();
        self.errors.clear();
        self.definitions = Definitions::new();
        self.complete = false;

        if let Some(path) = &self.definitions_path {
            match Definitions::from_file(path) {
                Ok(definitions) => self.definitions = definitions,
                Err(e) => {
                    self.record_fatal(e);
                    return;
                }
            }
        }

        let accept_undefined = self.accepts_undefined_keywords();
        let result = Parser::new(
            &self.definitions,
            accept_undefined,
            &mut self.document,
            &mut self.errors,
        )
        .with_debug(self.options.debug)
        .parse_file(&self.config_path);

        match result {
            Ok(()) => {
                self.complete = true;
                if self.options.debug {
                    log::debug!(
                        "Parsed {} with {} section(s), {} error(s)",
                        self.config_path.display(),
                        self.document.section_names().count(),
                        self.errors.len()
                    );
                }
            }
            Err(e) => self.record_fatal(e),
        }
    }

    fn record_fatal(&mut self, err: Error) {
        log::warn!("Parse aborted: {}", err.message());
        self.errors.push(err);
    }

    /// Whether the last parse ran to the end without a fatal error
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// The error that aborted the last parse, if any
    pub fn fatal_error(&self) -> Option<&Error> {
        if self.complete {
            return None;
        }
        self.errors.last().filter(|e| e.is_fatal())
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Error messages in the order they were recorded
    pub fn errors(&self) -> Vec<String> {
        self.errors.iter().map(Error::message).collect()
    }

    /// Structured errors in the order they were recorded
    pub fn error_list(&self) -> &[Error] {
        &self.errors
    }

    /// Forget all recorded errors; the document is left untouched
    pub fn clear_errors(&mut self) -> &mut Self {
        self.errors.clear();
        self
    }

    /// Section names in first-seen order
    pub fn sections(&self) -> Vec<&str> {
        self.document.section_names().collect()
    }

    /// Keywords set in `section`, in no particular order
    ///
    /// An unknown section has no keywords.
    pub fn keywords(&self, section: &str) -> Result<Vec<&str>> {
        require("section", section)?;
        Ok(self
            .document
            .section(section)
            .map(|s| s.keys().map(String::as_str).collect())
            .unwrap_or_default())
    }

    /// Type of a keyword, or `None` if it holds no value
    pub fn get_type(&self, section: &str, keyword: &str) -> Result<Option<ValueType>> {
        require("section", section)?;
        require("keyword", keyword)?;
        Ok(self.document.type_of(section, keyword))
    }

    /// Value of a keyword
    ///
    /// An unknown pair returns `Err(NotFound)` to the caller; queries do not
    /// add to the parse error list, which only `load`/`reload` populate.
    pub fn get_values(&self, section: &str, keyword: &str) -> Result<&TypedValue> {
        require("section", section)?;
        require("keyword", keyword)?;
        self.document
            .get(section, keyword)
            .ok_or_else(|| Error::not_found(section, keyword))
    }

    pub fn get_scalar(&self, section: &str, keyword: &str) -> Result<&str> {
        let value = self.get_values(section, keyword)?;
        value
            .as_scalar()
            .ok_or_else(|| wrong_type(section, keyword, ValueType::Scalar, value))
    }

    pub fn get_array(&self, section: &str, keyword: &str) -> Result<&[String]> {
        let value = self.get_values(section, keyword)?;
        value
            .as_array()
            .ok_or_else(|| wrong_type(section, keyword, ValueType::Array, value))
    }

    pub fn get_hash(&self, section: &str, keyword: &str) -> Result<&HashMap<String, String>> {
        let value = self.get_values(section, keyword)?;
        value
            .as_hash()
            .ok_or_else(|| wrong_type(section, keyword, ValueType::Hash, value))
    }

    /// Enable or disable debug logging for this instance, returning the previous setting
    pub fn set_debug(&mut self, debug: bool) -> bool {
        std::mem::replace(&mut self.options.debug, debug)
    }

    pub fn debug(&self) -> bool {
        self.options.debug
    }

    /// True when no definitions file is used or the option allows it
    pub fn accepts_undefined_keywords(&self) -> bool {
        self.definitions_path.is_none() || self.options.accept_undefined_keywords
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn definitions_path(&self) -> Option<&Path> {
        self.definitions_path.as_deref()
    }

    pub fn definitions(&self) -> &Definitions {
        &self.definitions
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Export as `{ section: { keyword: value } }`
    ///
    /// Sections keep their order; keywords are sorted for stable output.
    pub fn to_value(&self) -> IndexMap<&str, IndexMap<&str, &TypedValue>> {
        self.document
            .iter()
            .map(|(name, section)| {
                let mut keywords: IndexMap<&str, &TypedValue> =
                    section.iter().map(|(k, v)| (k.as_str(), v)).collect();
                keywords.sort_keys();
                (name, keywords)
            })
            .collect()
    }

    /// Export as pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.to_value())
            .map_err(|e| Error::internal(format!("JSON export failed: {}", e)))
    }

    /// Export as YAML
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(&self.to_value())
            .map_err(|e| Error::internal(format!("YAML export failed: {}", e)))
    }
}

fn require(name: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        Err(Error::missing_argument(name))
    } else {
        Ok(())
    }
}

fn wrong_type(section: &str, keyword: &str, expected: ValueType, got: &TypedValue) -> Error {
    Error::wrong_type(expected, got.value_type())
        .with_section(section)
        .with_keyword(keyword)
}
