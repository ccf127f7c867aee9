//! Logical line assembly
//!
//! Turns the physical lines of one file into logical lines: blank and
//! comment lines are dropped, lines ending in `\` are joined with the next
//! physical line, and `#include <path>` directives are reported so the
//! caller can recurse into the named file.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};

static INCLUDE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#include\s+(\S.*?)\s*$").expect("valid include regex"));

/// One logical line of input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    /// Content line; `number` is the physical line it started on
    Text { number: usize, text: String },
    /// `#include` directive with its target as written
    Include { number: usize, path: String },
}

impl Line {
    pub fn number(&self) -> usize {
        match self {
            Line::Text { number, .. } | Line::Include { number, .. } => *number,
        }
    }
}

/// Iterator over the logical lines of a reader
pub struct LogicalLines<R> {
    reader: R,
    line_number: usize,
}

impl LogicalLines<BufReader<File>> {
    /// Open a file for line assembly
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| Error::io(path, &e))?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> LogicalLines<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line_number: 0,
        }
    }

    fn read_physical(&mut self) -> std::io::Result<Option<String>> {
        let mut buf = String::new();
        if self.reader.read_line(&mut buf)? == 0 {
            return Ok(None);
        }
        self.line_number += 1;
        if buf.ends_with('\n') {
            buf.pop();
            if buf.ends_with('\r') {
                buf.pop();
            }
        }
        Ok(Some(buf))
    }
}

impl<R: BufRead> Iterator for LogicalLines<R> {
    type Item = std::io::Result<Line>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let first = match self.read_physical() {
                Ok(Some(line)) => line,
                Ok(None) => return None,
                Err(e) => return Some(Err(e)),
            };
            let number = self.line_number;

            if first.trim().is_empty() {
                continue;
            }
            if let Some(caps) = INCLUDE_RE.captures(&first) {
                let path = unwrap_include_target(&caps[1]).to_string();
                return Some(Ok(Line::Include { number, path }));
            }
            if first.trim_start().starts_with('#') {
                continue;
            }

            let mut text = first;
            while text.ends_with('\\') {
                text.pop();
                match self.read_physical() {
                    Ok(Some(next)) => text.push_str(&next),
                    Ok(None) => break,
                    Err(e) => return Some(Err(e)),
                }
            }
            return Some(Ok(Line::Text { number, text }));
        }
    }
}

/// Strip matching quotes or angle brackets around an include target
fn unwrap_include_target(target: &str) -> &str {
    for (open, close) in [('"', '"'), ('\'', '\''), ('<', '>')] {
        if target.len() >= 2 && target.starts_with(open) && target.ends_with(close) {
            return &target[1..target.len() - 1];
        }
    }
    target
}

/// Resolve an include target relative to the including file
///
/// A relative target is looked up next to `including` first and otherwise
/// taken as given, relative to the working directory.
pub fn resolve_include(including: &Path, target: &str) -> PathBuf {
    let target = Path::new(target);
    if target.is_absolute() {
        return target.to_path_buf();
    }
    if let Some(dir) = including.parent() {
        let candidate = dir.join(target);
        if candidate.exists() {
            return candidate;
        }
    }
    target.to_path_buf()
}

/// Files currently being read, outermost first
///
/// Used to reject `#include` cycles before they recurse.
#[derive(Debug, Default)]
pub struct IncludeStack {
    files: Vec<PathBuf>,
}

impl IncludeStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push `path`, failing if it is already open further up the stack
    pub fn enter(&mut self, path: &Path) -> Result<()> {
        let key = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        if self.files.contains(&key) {
            let mut chain = self.files.clone();
            chain.push(key);
            return Err(Error::include_cycle(chain.as_slice()));
        }
        self.files.push(key);
        Ok(())
    }

    pub fn leave(&mut self) {
        self.files.pop();
    }

    #[cfg(test)]
    fn depth(&self) -> usize {
        self.files.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn lines(input: &str) -> Vec<Line> {
        LogicalLines::new(Cursor::new(input))
            .collect::<std::io::Result<Vec<_>>>()
            .unwrap()
    }

    fn text(number: usize, text: &str) -> Line {
        Line::Text {
            number,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_skips_blank_and_comment_lines() {
        let input = "\n   \n# comment\n    # indented comment\nsection:\n\tkey = value\n";
        assert_eq!(
            lines(input),
            vec![text(5, "section:"), text(6, "\tkey = value")]
        );
    }

    #[test]
    fn test_continuation_joins_lines() {
        let input = "key = one \\\n  two\\\nthree\nnext = 1\n";
        assert_eq!(
            lines(input),
            vec![text(1, "key = one   twothree"), text(4, "next = 1")]
        );
    }

    #[test]
    fn test_continuation_at_eof() {
        assert_eq!(lines("key = a\\"), vec![text(1, "key = a")]);
    }

    #[test]
    fn test_crlf_line_endings() {
        assert_eq!(
            lines("key = a\\\r\nb\r\n"),
            vec![text(1, "key = ab")]
        );
    }

    #[test]
    fn test_include_directive() {
        let input = "#include other.conf\n  #include ignored.conf\n#include \"quoted file.conf\"\n#include <angled.conf>\n";
        assert_eq!(
            lines(input),
            vec![
                Line::Include {
                    number: 1,
                    path: "other.conf".into()
                },
                Line::Include {
                    number: 3,
                    path: "quoted file.conf".into()
                },
                Line::Include {
                    number: 4,
                    path: "angled.conf".into()
                },
            ]
        );
    }

    #[test]
    fn test_include_requires_path() {
        assert!(lines("#include\n#includefoo\n").is_empty());
    }

    #[test]
    fn test_open_missing_file() {
        let err = LogicalLines::open(Path::new("/nonexistent/tyconf/missing.conf"))
            .err()
            .unwrap();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_include_stack_detects_cycle() {
        let mut stack = IncludeStack::new();
        stack.enter(Path::new("/tmp/tyconf-a.conf")).unwrap();
        stack.enter(Path::new("/tmp/tyconf-b.conf")).unwrap();
        assert_eq!(stack.depth(), 2);

        let err = stack.enter(Path::new("/tmp/tyconf-a.conf")).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::IncludeCycle);

        stack.leave();
        stack.enter(Path::new("/tmp/tyconf-c.conf")).unwrap();
        assert_eq!(stack.depth(), 2);
    }

    #[test]
    fn test_resolve_include_relative_to_parent() {
        let temp_dir = std::env::temp_dir().join("tyconf_test_resolve_include");
        std::fs::create_dir_all(&temp_dir).unwrap();
        let child = temp_dir.join("child.conf");
        std::fs::write(&child, "").unwrap();

        let parent = temp_dir.join("parent.conf");
        assert_eq!(resolve_include(&parent, "child.conf"), child);
        assert_eq!(
            resolve_include(&parent, "elsewhere.conf"),
            PathBuf::from("elsewhere.conf")
        );

        std::fs::remove_dir_all(&temp_dir).ok();
    }
}
