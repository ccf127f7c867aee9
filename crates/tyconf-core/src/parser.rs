//! Config file grammar
//!
//! Each logical line is either a section header or a keyword entry:
//!
//! ```text
//! server:
//!     host = example.org
//!     ports (array) = 80, 443
//!     limits (hash) = cpu = 2, memory = '4 GB'
//! #include more.conf
//! ```
//!
//! Recoverable problems (malformed lines, type conflicts, unknown keywords,
//! disallowed values) are recorded and the offending entry is skipped.
//! Unreadable files, bad definitions and include cycles abort the parse.

use std::fmt;
use std::io::BufRead;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::definitions::Definitions;
use crate::error::{Error, Result, SourceLocation};
use crate::escape;
use crate::lines::{self, IncludeStack, Line, LogicalLines};
use crate::value::{Document, ValueType};

static SECTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\w[^=]*?)\s*:?\s*$").expect("valid section regex"));

static ENTRY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([^=\s(][^=(]*?)\s*(?:\(\s*([^)]*?)\s*\))?\s*=\s*(.*?)\s*$")
        .expect("valid entry regex")
});

static HASH_ITEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([^=]+?)\s*=\s*(.*)$").expect("valid hash item regex"));

/// State carried through one parse, across included files
#[derive(Debug, Default)]
pub struct ParseContext {
    /// Section that keyword entries currently belong to
    pub current_section: Option<String>,
    /// Files being read, for cycle detection
    pub includes: IncludeStack,
}

/// One `keyword (type) = value` line, split into its parts
#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry<'a> {
    keyword: &'a str,
    hint: Option<&'a str>,
    value: &'a str,
}

/// Parses config files into a [`Document`]
pub struct Parser<'a> {
    definitions: &'a Definitions,
    accept_undefined: bool,
    debug: bool,
    document: &'a mut Document,
    errors: &'a mut Vec<Error>,
}

impl<'a> Parser<'a> {
    pub fn new(
        definitions: &'a Definitions,
        accept_undefined: bool,
        document: &'a mut Document,
        errors: &'a mut Vec<Error>,
    ) -> Self {
        Self {
            definitions,
            accept_undefined,
            debug: false,
            document,
            errors,
        }
    }

    /// Emit per-line diagnostics at debug level instead of trace
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Parse a file and everything it includes
    ///
    /// Returns the fatal error, if any; recoverable errors are recorded.
    pub fn parse_file(&mut self, path: &Path) -> Result<()> {
        let mut ctx = ParseContext::default();
        self.read_file(path, &mut ctx)
    }

    /// Parse in-memory content; includes resolve against `origin`
    pub fn parse_str(&mut self, content: &str, origin: &Path) -> Result<()> {
        let mut ctx = ParseContext::default();
        ctx.includes.enter(origin)?;
        self.read_lines(
            LogicalLines::new(std::io::Cursor::new(content)),
            origin,
            &mut ctx,
        )
    }

    fn read_file(&mut self, path: &Path, ctx: &mut ParseContext) -> Result<()> {
        ctx.includes.enter(path)?;
        self.note(format_args!("Reading {}", path.display()));
        let source = LogicalLines::open(path)?;
        self.read_lines(source, path, ctx)?;
        ctx.includes.leave();
        Ok(())
    }

    fn read_lines<R: BufRead>(
        &mut self,
        source: LogicalLines<R>,
        path: &Path,
        ctx: &mut ParseContext,
    ) -> Result<()> {
        for line in source {
            let line = line.map_err(|e| Error::io(path, &e))?;
            let location = SourceLocation::new(path, line.number());
            match line {
                Line::Include { path: target, .. } => {
                    let target = lines::resolve_include(path, &target);
                    self.note(format_args!(
                        "Including {} from {}:{}",
                        target.display(),
                        location.file,
                        line_of(&location)
                    ));
                    // The included file continues the open section; ours resumes afterwards
                    let resume = ctx.current_section.clone();
                    self.read_file(&target, ctx).map_err(|e| {
                        if e.source_location.is_some() {
                            e
                        } else {
                            e.with_source_location(location.clone())
                        }
                    })?;
                    ctx.current_section = resume;
                }
                Line::Text { text, .. } => self.line(&text, &location, ctx),
            }
        }
        Ok(())
    }

    fn line(&mut self, text: &str, location: &SourceLocation, ctx: &mut ParseContext) {
        if let Some(caps) = SECTION_RE.captures(text) {
            let name = caps[1].to_string();
            if self.document.add_section(&name) {
                self.note(format_args!("New section '{}'", name));
            }
            ctx.current_section = Some(name);
            return;
        }

        let Some(entry) = parse_entry(text) else {
            self.record(
                Error::malformed_entry(text.trim()).with_source_location(location.clone()),
            );
            return;
        };

        let Some(section) = ctx.current_section.clone() else {
            self.record(
                Error::malformed_entry(text.trim())
                    .with_keyword(entry.keyword)
                    .with_help("Keyword entries must follow a 'section:' header")
                    .with_source_location(location.clone()),
            );
            return;
        };

        if let Err(e) = self.entry(&section, &entry, location) {
            self.record(
                e.with_section(section.as_str())
                    .with_keyword(entry.keyword)
                    .with_source_location(location.clone()),
            );
        }
    }

    /// Validate and commit one entry
    ///
    /// An `Err` rejects the whole entry. Individual array items or hash
    /// pairs may be rejected while their siblings still commit.
    fn entry(
        &mut self,
        section: &str,
        entry: &Entry<'_>,
        location: &SourceLocation,
    ) -> Result<()> {
        let keyword = entry.keyword;
        let definitions = self.definitions;

        if !self.accept_undefined && !definitions.is_defined(section, keyword) {
            return Err(Error::keyword_not_allowed(section, keyword));
        }

        let value_type = self.resolve_type(section, entry)?;
        if let Some(existing) = self.document.type_of(section, keyword) {
            if existing != value_type {
                return Err(Error::type_mismatch(existing, value_type)
                    .with_help("A keyword keeps the type of its first entry"));
            }
        }

        let separator = definitions.separator(section, keyword);
        match value_type {
            ValueType::Scalar => {
                let value = escape::unescape(entry.value, separator);
                if !definitions.is_allowed(section, keyword, &value) {
                    return Err(Error::value_not_allowed(value));
                }
                self.document.set_scalar(section, keyword, value);
            }
            ValueType::Array => {
                let tokens = escape::split(entry.value, separator);
                let total = tokens.len();
                let mut accepted = Vec::with_capacity(total);
                for token in tokens {
                    if definitions.is_allowed(section, keyword, &token) {
                        accepted.push(token);
                    } else {
                        let err = Error::value_not_allowed(token);
                        self.reject(err, section, keyword, location);
                    }
                }
                if accepted.is_empty() && total > 0 {
                    return Ok(());
                }
                self.document.push_array(section, keyword, accepted);
            }
            ValueType::Hash => {
                let tokens = escape::split_keep_quotes(entry.value, separator);
                let total = tokens.len();
                let mut accepted = Vec::with_capacity(total);
                for token in tokens {
                    let Some(caps) = HASH_ITEM_RE.captures(&token) else {
                        let err = Error::invalid_hash_entry(token.as_str());
                        self.reject(err, section, keyword, location);
                        continue;
                    };
                    let sub_key = escape::strip_quotes(&caps[1]).to_string();
                    let sub_value = escape::strip_quotes(&caps[2]).to_string();
                    if definitions.is_allowed(section, keyword, &sub_value) {
                        accepted.push((sub_key, sub_value));
                    } else {
                        let err = Error::value_not_allowed(sub_value);
                        self.reject(err, section, keyword, location);
                    }
                }
                if accepted.is_empty() && total > 0 {
                    return Ok(());
                }
                self.document.merge_hash(section, keyword, accepted);
            }
        }

        self.note(format_args!(
            "Set {}.{} ({}) at {}:{}",
            section,
            keyword,
            value_type,
            location.file,
            line_of(location)
        ));
        Ok(())
    }

    /// Inline hint first, then the definitions, then scalar
    fn resolve_type(&self, section: &str, entry: &Entry<'_>) -> Result<ValueType> {
        let declared = self.definitions.value_type(section, entry.keyword);
        let Some(hint) = entry.hint else {
            return Ok(declared.unwrap_or(ValueType::Scalar));
        };

        let hinted: ValueType = hint.parse()?;
        match declared {
            Some(declared) if declared != hinted => Err(Error::type_mismatch(declared, hinted)
                .with_help("The inline type must match the definitions file")),
            _ => Ok(hinted),
        }
    }

    fn reject(&mut self, err: Error, section: &str, keyword: &str, location: &SourceLocation) {
        self.record(
            err.with_section(section)
                .with_keyword(keyword)
                .with_source_location(location.clone()),
        );
    }

    fn record(&mut self, err: Error) {
        if self.debug {
            log::warn!("{}", err.message());
        } else {
            log::trace!("{}", err.message());
        }
        self.errors.push(err);
    }

    fn note(&self, args: fmt::Arguments<'_>) {
        if self.debug {
            log::debug!("{}", args);
        } else {
            log::trace!("{}", args);
        }
    }
}

fn parse_entry(text: &str) -> Option<Entry<'_>> {
    let caps = ENTRY_RE.captures(text)?;
    Some(Entry {
        keyword: caps.get(1)?.as_str(),
        hint: caps.get(2).map(|m| m.as_str()),
        value: caps.get(3)?.as_str(),
    })
}

fn line_of(location: &SourceLocation) -> usize {
    location.line.unwrap_or_default()
}
