//! Keyword definitions (the schema layer)
//!
//! A definitions file declares which keywords a config may use and, per
//! keyword, its type, list separator and allowed values:
//!
//! ```text
//! keyword = timeout
//! type = scalar
//!
//! keyword = server:hosts
//! type = array
//! separator = ';'
//! allowed-values = alpha; beta; 'gamma ray'
//! ```
//!
//! A bare keyword applies in every section (global scope); `section:keyword`
//! applies in that section only and takes precedence over the global entry.

use std::collections::HashMap;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result, SourceLocation};
use crate::escape;
use crate::lines::{self, IncludeStack, Line, LogicalLines};
use crate::value::ValueType;

/// Separator used when none is declared
pub const DEFAULT_SEPARATOR: &str = ",";

static DIRECTIVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([A-Za-z][\w-]*)\s*=\s*(.*?)\s*$").expect("valid directive regex")
});

/// Metadata declared for one keyword
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeywordDef {
    pub value_type: Option<ValueType>,
    pub separator: Option<String>,
    pub allowed_values: Option<Vec<String>>,
}

/// Parsed definitions file
#[derive(Debug, Clone, Default)]
pub struct Definitions {
    /// Keyword (lower-cased) → metadata, for every section
    global: HashMap<String, KeywordDef>,
    /// (section, keyword lower-cased) → metadata
    sections: HashMap<(String, String), KeywordDef>,
}

impl Definitions {
    /// Definitions that declare nothing
    pub fn new() -> Self {
        Self::default()
    }

    /// Load definitions from a file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let mut builder = Builder::default();
        builder.read_file(path.as_ref(), &mut IncludeStack::new())?;
        builder.finish()
    }

    /// Load definitions from a string; includes resolve against `origin`
    pub fn from_str_with_origin(content: &str, origin: impl AsRef<Path>) -> Result<Self> {
        let origin = origin.as_ref();
        let mut builder = Builder::default();
        let mut stack = IncludeStack::new();
        stack.enter(origin)?;
        builder.read_lines(
            LogicalLines::new(std::io::Cursor::new(content)),
            origin,
            &mut stack,
        )?;
        builder.finish()
    }

    pub fn len(&self) -> usize {
        self.global.len() + self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Metadata declared for `keyword` in `section` specifically
    pub fn specific(&self, section: &str, keyword: &str) -> Option<&KeywordDef> {
        self.sections
            .get(&(section.to_string(), keyword.to_lowercase()))
    }

    /// Metadata declared for `keyword` in every section
    pub fn global(&self, keyword: &str) -> Option<&KeywordDef> {
        self.global.get(&keyword.to_lowercase())
    }

    /// Whether `keyword` is declared for `section` or globally
    pub fn is_defined(&self, section: &str, keyword: &str) -> bool {
        self.specific(section, keyword).is_some() || self.global(keyword).is_some()
    }

    /// Declared type, section scope first
    pub fn value_type(&self, section: &str, keyword: &str) -> Option<ValueType> {
        self.specific(section, keyword)
            .and_then(|d| d.value_type)
            .or_else(|| self.global(keyword).and_then(|d| d.value_type))
    }

    /// Declared separator, section scope first, falling back to a comma
    pub fn separator(&self, section: &str, keyword: &str) -> &str {
        self.specific(section, keyword)
            .and_then(|d| d.separator.as_deref())
            .or_else(|| self.global(keyword).and_then(|d| d.separator.as_deref()))
            .unwrap_or(DEFAULT_SEPARATOR)
    }

    /// Check a candidate value against every declared allowed-values set
    ///
    /// Section and global sets are checked independently and both must
    /// accept. An undeclared set imposes no constraint.
    pub fn is_allowed(&self, section: &str, keyword: &str, candidate: &str) -> bool {
        let accepts = |def: Option<&KeywordDef>| {
            def.and_then(|d| d.allowed_values.as_ref())
                .map_or(true, |allowed| allowed.iter().any(|v| v == candidate))
        };
        accepts(self.specific(section, keyword)) && accepts(self.global(keyword))
    }
}

/// Record being filled in by the directives that follow its `keyword =` line
struct PendingRecord {
    section: Option<String>,
    keyword: String,
    def: KeywordDef,
    raw_allowed: Option<String>,
}

#[derive(Default)]
struct Builder {
    defs: Definitions,
    pending: Option<PendingRecord>,
}

impl Builder {
    fn read_file(&mut self, path: &Path, stack: &mut IncludeStack) -> Result<()> {
        stack.enter(path)?;
        log::trace!("Reading definitions from {}", path.display());
        let source = LogicalLines::open(path)?;
        self.read_lines(source, path, stack)?;
        stack.leave();
        Ok(())
    }

    fn read_lines<R: BufRead>(
        &mut self,
        source: LogicalLines<R>,
        path: &Path,
        stack: &mut IncludeStack,
    ) -> Result<()> {
        for line in source {
            let line = line.map_err(|e| Error::io(path, &e))?;
            let location = SourceLocation::new(path, line.number());
            match line {
                Line::Include { path: target, .. } => {
                    let target: PathBuf = lines::resolve_include(path, &target);
                    self.read_file(&target, stack)
                        .map_err(|e| locate(e, location))?;
                }
                Line::Text { text, .. } => {
                    self.directive(&text).map_err(|e| locate(e, location))?;
                }
            }
        }
        Ok(())
    }

    fn directive(&mut self, text: &str) -> Result<()> {
        let caps = DIRECTIVE_RE
            .captures(text)
            .ok_or_else(|| Error::definitions(format!("Unrecognized line: {}", text.trim())))?;
        let name = caps[1].to_lowercase();
        let value = &caps[2];

        if name == "keyword" {
            self.flush()?;
            self.pending = Some(parse_keyword_spec(value)?);
            return Ok(());
        }

        let record = self.pending.as_mut().ok_or_else(|| {
            Error::definitions(format!("'{}' appears before any 'keyword' line", name))
        })?;

        match name.as_str() {
            "type" => {
                let value_type = value
                    .parse::<ValueType>()
                    .map_err(|_| Error::definitions(format!("Invalid type '{}'", value)))?;
                record.def.value_type = Some(value_type);
            }
            "separator" => {
                let separator = escape::unescape(value, "");
                if separator.is_empty() {
                    return Err(Error::definitions(format!(
                        "Empty separator for keyword '{}'",
                        record.keyword
                    )));
                }
                record.def.separator = Some(separator);
            }
            "allowed-values" => record.raw_allowed = Some(value.to_string()),
            _ => {
                return Err(Error::definitions(format!(
                    "Unknown directive '{}'",
                    &caps[1]
                )))
            }
        }
        Ok(())
    }

    /// Store the pending record, splitting its allowed values
    fn flush(&mut self) -> Result<()> {
        let Some(mut record) = self.pending.take() else {
            return Ok(());
        };
        if let Some(raw) = record.raw_allowed.take() {
            let separator = record
                .def
                .separator
                .as_deref()
                .unwrap_or(DEFAULT_SEPARATOR);
            record.def.allowed_values = Some(escape::split(&raw, separator));
        }

        log::trace!(
            "Defined keyword '{}' (section: {:?}, type: {:?})",
            record.keyword,
            record.section,
            record.def.value_type
        );
        match record.section {
            Some(section) => {
                self.defs
                    .sections
                    .insert((section, record.keyword), record.def);
            }
            None => {
                self.defs.global.insert(record.keyword, record.def);
            }
        }
        Ok(())
    }

    fn finish(mut self) -> Result<Definitions> {
        self.flush()?;
        Ok(self.defs)
    }
}

/// Parse `keyword` or `section:keyword`
fn parse_keyword_spec(spec: &str) -> Result<PendingRecord> {
    let (section, keyword) = match spec.split_once(':') {
        Some((section, keyword)) => (Some(section.trim()), keyword.trim()),
        None => (None, spec.trim()),
    };
    if keyword.is_empty() || section.is_some_and(str::is_empty) {
        return Err(Error::definitions(format!(
            "Invalid keyword specification '{}'",
            spec
        )));
    }
    Ok(PendingRecord {
        section: section.map(str::to_string),
        keyword: keyword.to_lowercase(),
        def: KeywordDef::default(),
        raw_allowed: None,
    })
}

fn locate(err: Error, location: SourceLocation) -> Error {
    if err.source_location.is_some() {
        err
    } else {
        err.with_source_location(location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn defs(content: &str) -> Result<Definitions> {
        Definitions::from_str_with_origin(content, "test.defs")
    }

    #[test]
    fn test_global_and_specific_records() {
        let d = defs(
            r#"
# comment
keyword = Timeout
type = scalar

keyword = server:hosts
type = array
separator = ';'
allowed-values = alpha; beta; 'gamma ray'
"#,
        )
        .unwrap();

        assert_eq!(d.len(), 2);
        assert!(d.is_defined("anything", "timeout"));
        assert!(d.is_defined("server", "HOSTS"));
        assert!(!d.is_defined("client", "hosts"));

        assert_eq!(d.value_type("x", "timeout"), Some(ValueType::Scalar));
        assert_eq!(d.value_type("server", "hosts"), Some(ValueType::Array));
        assert_eq!(d.separator("server", "hosts"), ";");
        assert_eq!(d.separator("server", "timeout"), ",");

        let allowed = d.specific("server", "hosts").unwrap();
        assert_eq!(
            allowed.allowed_values.as_deref(),
            Some(&["alpha".to_string(), "beta".into(), "gamma ray".into()][..])
        );
    }

    #[test]
    fn test_specific_falls_back_to_global_per_field() {
        let d = defs(
            "keyword = tags\ntype = array\nseparator = |\nkeyword = web:tags\nallowed-values = a|b\n",
        )
        .unwrap();

        assert_eq!(d.value_type("web", "tags"), Some(ValueType::Array));
        assert_eq!(d.separator("web", "tags"), "|");
        // Specific allowed-values split on the comma default of its own record
        assert_eq!(
            d.specific("web", "tags").unwrap().allowed_values,
            Some(vec!["a|b".to_string()])
        );
    }

    #[test]
    fn test_quoted_separator_keeps_whitespace() {
        let d = defs("keyword = words\nseparator = ' '\n").unwrap();
        assert_eq!(d.separator("any", "words"), " ");
    }

    #[test]
    fn test_allowed_values_and_semantics() {
        let d = defs(
            "keyword = mode\nallowed-values = a, b\nkeyword = s:mode\nallowed-values = b, c\n",
        )
        .unwrap();

        assert!(d.is_allowed("s", "mode", "b"));
        assert!(!d.is_allowed("s", "mode", "a"));
        assert!(!d.is_allowed("s", "mode", "c"));
        // Outside section s only the global set applies
        assert!(d.is_allowed("t", "mode", "a"));
        assert!(!d.is_allowed("t", "mode", "c"));
        // Undeclared keywords are unconstrained
        assert!(d.is_allowed("s", "other", "anything"));
    }

    #[test]
    fn test_invalid_type_is_fatal() {
        let err = defs("keyword = x\ntype = list\n").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Definitions);
        assert!(err.is_fatal());
        assert_eq!(err.source_location.unwrap().line, Some(2));
    }

    #[test]
    fn test_unknown_directive_is_fatal() {
        let err = defs("keyword = x\ndefault = 3\n").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Definitions);

        let err = defs("keyword = x\nthis is not a directive\n").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Definitions);
    }

    #[test]
    fn test_directive_before_keyword_is_fatal() {
        let err = defs("type = scalar\n").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Definitions);
    }

    #[test]
    fn test_empty_separator_is_fatal() {
        assert!(defs("keyword = x\nseparator = ''\n").is_err());
    }

    #[test]
    fn test_directive_names_case_insensitive() {
        let d = defs("KEYWORD = x\nType = hash\n").unwrap();
        assert_eq!(d.value_type("s", "x"), Some(ValueType::Hash));
    }

    #[test]
    fn test_continuation_lines() {
        let d = defs("keyword = color\nallowed-values = red, \\\n  green, blue\n").unwrap();
        assert!(d.is_allowed("s", "color", "green"));
        assert!(d.is_allowed("s", "color", "blue"));
    }

    #[test]
    fn test_from_file_with_include() {
        let temp_dir = std::env::temp_dir().join("tyconf_test_defs_include");
        std::fs::create_dir_all(&temp_dir).unwrap();
        let main_path = temp_dir.join("main.defs");
        let extra_path = temp_dir.join("extra.defs");
        std::fs::write(&main_path, "keyword = a\n#include extra.defs\n").unwrap();
        std::fs::write(&extra_path, "keyword = b\ntype = array\n").unwrap();

        let d = Definitions::from_file(&main_path).unwrap();
        assert!(d.is_defined("s", "a"));
        assert_eq!(d.value_type("s", "b"), Some(ValueType::Array));

        std::fs::remove_dir_all(&temp_dir).ok();
    }

    #[test]
    fn test_missing_file() {
        let err = Definitions::from_file("/nonexistent/tyconf/x.defs").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Io);
    }
}
