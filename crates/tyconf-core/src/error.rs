//! Error types for tyconf
//!
//! Errors are structured: a kind, optional section/keyword context, the
//! source location of the offending line and an actionable help message.
//! Parsing accumulates recoverable errors and stops on fatal ones; see
//! [`Error::is_fatal`].

use std::fmt;
use std::path::Path;

/// Result type alias for tyconf operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for tyconf operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    /// The kind of error that occurred
    pub kind: ErrorKind,
    /// Section the offending entry belongs to
    pub section: Option<String>,
    /// Keyword the offending entry defines
    pub keyword: Option<String>,
    /// Source location (file, line) if available
    pub source_location: Option<SourceLocation>,
    /// Actionable help message
    pub help: Option<String>,
    /// Underlying cause or offending text
    pub cause: Option<String>,
}

/// Location in a source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: String,
    pub line: Option<usize>,
}

impl SourceLocation {
    pub fn new(file: &Path, line: usize) -> Self {
        Self {
            file: file.display().to_string(),
            line: Some(line),
        }
    }
}

/// Categories of errors that can occur
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ErrorKind {
    /// A config, definitions or included file could not be opened or read
    #[error("Cannot read file")]
    Io,
    /// Invalid line in the definitions file
    #[error("Invalid definitions file")]
    Definitions,
    /// A file includes itself, directly or through other files
    #[error("Include cycle detected")]
    IncludeCycle,
    /// Line is neither a section header nor a keyword entry
    #[error("Malformed entry")]
    MalformedEntry,
    /// Inline type hint is not scalar, array or hash
    #[error("Invalid type")]
    InvalidType,
    /// Entry type conflicts with the definitions file or an earlier entry
    #[error("Type mismatch")]
    TypeMismatch,
    /// Keyword is not declared in the definitions file
    #[error("Keyword not allowed")]
    KeywordNotAllowed,
    /// Value is not in the declared allowed-values set
    #[error("Value not allowed")]
    ValueNotAllowed,
    /// Hash token is not of the form `key = value`
    #[error("Invalid hash entry")]
    InvalidHashEntry,
    /// A query was made with an empty section or keyword
    #[error("Missing argument")]
    MissingArgument,
    /// No value is stored for the requested section/keyword
    #[error("Not found")]
    NotFound,
    /// A typed accessor was used on a value of another type
    #[error("Wrong type")]
    WrongType,
    /// Internal error (bug in tyconf)
    #[error("Internal error")]
    Internal,
}

impl Error {
    fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            section: None,
            keyword: None,
            source_location: None,
            help: None,
            cause: None,
        }
    }

    /// Create an error for a file that cannot be opened or read
    pub fn io(path: &Path, err: &std::io::Error) -> Self {
        Self {
            help: Some("Check that the file exists and is readable".into()),
            cause: Some(format!("{}: {}", path.display(), err)),
            ..Self::new(ErrorKind::Io)
        }
    }

    /// Create a definitions file error
    pub fn definitions(message: impl Into<String>) -> Self {
        Self {
            help: Some(
                "Definition lines are 'keyword', 'type', 'separator' or 'allowed-values'".into(),
            ),
            cause: Some(message.into()),
            ..Self::new(ErrorKind::Definitions)
        }
    }

    /// Create an include cycle error
    pub fn include_cycle(chain: &[impl AsRef<Path>]) -> Self {
        let chain_str = chain
            .iter()
            .map(|p| p.as_ref().display().to_string())
            .collect::<Vec<_>>()
            .join(" → ");
        Self {
            help: Some("Remove one of the #include directives to break the cycle".into()),
            cause: Some(format!("Chain: {}", chain_str)),
            ..Self::new(ErrorKind::IncludeCycle)
        }
    }

    /// Create a malformed entry error
    pub fn malformed_entry(line: impl Into<String>) -> Self {
        Self {
            help: Some("Expected a 'section:' header or a 'keyword = value' entry".into()),
            cause: Some(format!("Line: {}", line.into())),
            ..Self::new(ErrorKind::MalformedEntry)
        }
    }

    /// Create an invalid type error
    pub fn invalid_type(type_name: impl Into<String>) -> Self {
        Self {
            help: Some("Valid types are scalar, array and hash".into()),
            cause: Some(format!("Got: {}", type_name.into())),
            ..Self::new(ErrorKind::InvalidType)
        }
    }

    /// Create a type mismatch error
    pub fn type_mismatch(expected: impl fmt::Display, got: impl fmt::Display) -> Self {
        Self {
            help: Some(format!("Declare the keyword as {} everywhere", expected)),
            cause: Some(format!("Expected {}, got {}", expected, got)),
            ..Self::new(ErrorKind::TypeMismatch)
        }
    }

    /// Create a keyword not allowed error
    pub fn keyword_not_allowed(section: &str, keyword: &str) -> Self {
        Self {
            help: Some(
                "Declare the keyword in the definitions file or accept undefined keywords".into(),
            ),
            ..Self::new(ErrorKind::KeywordNotAllowed)
        }
        .with_section(section)
        .with_keyword(keyword)
    }

    /// Create a value not allowed error
    pub fn value_not_allowed(value: impl Into<String>) -> Self {
        Self {
            help: Some("Use one of the allowed-values from the definitions file".into()),
            cause: Some(format!("Value: '{}'", value.into())),
            ..Self::new(ErrorKind::ValueNotAllowed)
        }
    }

    /// Create an invalid hash entry error
    pub fn invalid_hash_entry(token: impl Into<String>) -> Self {
        Self {
            help: Some("Hash values are written as 'key = value' pairs".into()),
            cause: Some(format!("Token: '{}'", token.into())),
            ..Self::new(ErrorKind::InvalidHashEntry)
        }
    }

    /// Create a missing argument error
    pub fn missing_argument(name: &str) -> Self {
        Self {
            cause: Some(format!("{} must not be empty", name)),
            ..Self::new(ErrorKind::MissingArgument)
        }
    }

    /// Create a not found error
    pub fn not_found(section: &str, keyword: &str) -> Self {
        Self {
            help: Some(format!(
                "Check that '{}' is set in section '{}'",
                keyword, section
            )),
            ..Self::new(ErrorKind::NotFound)
        }
        .with_section(section)
        .with_keyword(keyword)
    }

    /// Create a wrong type error
    pub fn wrong_type(expected: impl fmt::Display, got: impl fmt::Display) -> Self {
        Self {
            cause: Some(format!("Expected {}, got {}", expected, got)),
            ..Self::new(ErrorKind::WrongType)
        }
    }

    /// Create an internal error (bug in tyconf)
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            help: Some("This is likely a bug in tyconf. Please report it.".into()),
            cause: Some(message.into()),
            ..Self::new(ErrorKind::Internal)
        }
    }

    /// Add section context to the error
    pub fn with_section(mut self, section: impl Into<String>) -> Self {
        self.section = Some(section.into());
        self
    }

    /// Add keyword context to the error
    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = Some(keyword.into());
        self
    }

    /// Add source location to the error
    pub fn with_source_location(mut self, loc: SourceLocation) -> Self {
        self.source_location = Some(loc);
        self
    }

    /// Add help message to the error
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Whether this error aborts the whole parse
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::Io | ErrorKind::Definitions | ErrorKind::IncludeCycle
        )
    }

    /// Single-line rendering without the help text
    pub fn message(&self) -> String {
        let mut msg = self.kind.to_string();
        if let Some(keyword) = &self.keyword {
            msg.push_str(&format!(" for keyword '{}'", keyword));
        }
        if let Some(section) = &self.section {
            msg.push_str(&format!(" in section '{}'", section));
        }
        if let Some(loc) = &self.source_location {
            msg.push_str(&format!(" at {}", loc.file));
            if let Some(line) = loc.line {
                msg.push_str(&format!(":{}", line));
            }
        }
        if let Some(cause) = &self.cause {
            msg.push_str(&format!(": {}", cause));
        }
        msg
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;

        if let Some(section) = &self.section {
            write!(f, "\n  Section: {}", section)?;
        }
        if let Some(keyword) = &self.keyword {
            write!(f, "\n  Keyword: {}", keyword)?;
        }

        if let Some(loc) = &self.source_location {
            write!(f, "\n  File: {}", loc.file)?;
            if let Some(line) = loc.line {
                write!(f, ":{}", line)?;
            }
        }

        if let Some(cause) = &self.cause {
            write!(f, "\n  {}", cause)?;
        }

        if let Some(help) = &self.help {
            write!(f, "\n  Help: {}", help)?;
        }

        Ok(())
    }
}

impl std::error::Error for Error {}
