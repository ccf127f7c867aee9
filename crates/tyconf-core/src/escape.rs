//! Value escaping and splitting
//!
//! Values are scanned once, left to right, tracking escapes:
//! - `\\` is a literal backslash
//! - `\<sep>` is a literal separator and never splits
//! - any other backslash is kept as written
//!
//! After splitting, each token is trimmed and one matching pair of
//! surrounding `'` or `"` quotes is removed.

/// Single-pass scanner over a raw value
pub struct ValueScanner<'a> {
    input: &'a str,
    separator: &'a str,
    pos: usize,
}

/// Characters resolved from one stretch of input, each flagged when it
/// came from an escape sequence
#[derive(Debug, Default)]
struct Token {
    chars: Vec<(char, bool)>,
}

impl Token {
    fn push(&mut self, c: char, escaped: bool) {
        self.chars.push((c, escaped));
    }

    fn push_str(&mut self, s: &str, escaped: bool) {
        self.chars.extend(s.chars().map(|c| (c, escaped)));
    }

    /// Text with surrounding whitespace removed, except escaped whitespace
    fn trimmed(&self) -> String {
        let loose = |&(c, escaped): &(char, bool)| c.is_whitespace() && !escaped;
        let start = self
            .chars
            .iter()
            .position(|p| !loose(p))
            .unwrap_or(self.chars.len());
        let end = self
            .chars
            .iter()
            .rposition(|p| !loose(p))
            .map_or(start, |i| i + 1);
        self.chars[start..end].iter().map(|&(c, _)| c).collect()
    }

    fn into_string(self) -> String {
        self.chars.into_iter().map(|(c, _)| c).collect()
    }
}

impl<'a> ValueScanner<'a> {
    /// Create a new scanner for the given input and separator
    pub fn new(input: &'a str, separator: &'a str) -> Self {
        Self {
            input,
            separator,
            pos: 0,
        }
    }

    /// Resolve escapes over the whole input without splitting
    pub fn unescape_all(mut self) -> String {
        let mut out = Token::default();
        while !self.is_eof() {
            self.scan_char(&mut out);
        }
        out.into_string()
    }

    /// Resolve escapes and split on every bare separator
    ///
    /// Each token is trimmed of whitespace that was not escaped, so an
    /// escaped whitespace separator survives at the edge of a token.
    pub fn split_all(mut self) -> Vec<String> {
        let mut tokens = Vec::new();
        let mut current = Token::default();

        while !self.is_eof() {
            if !self.separator.is_empty() && self.rest().starts_with(self.separator) {
                self.pos += self.separator.len();
                tokens.push(std::mem::take(&mut current).trimmed());
            } else {
                self.scan_char(&mut current);
            }
        }
        tokens.push(current.trimmed());
        tokens
    }

    /// Check if we're at end of input
    fn is_eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    /// Consume one character or escape sequence into `out`
    fn scan_char(&mut self, out: &mut Token) {
        let rest = self.rest();
        if let Some(after) = rest.strip_prefix('\\') {
            if after.starts_with('\\') {
                out.push('\\', true);
                self.pos += 2;
                return;
            }
            if !self.separator.is_empty() && after.starts_with(self.separator) {
                out.push_str(self.separator, true);
                self.pos += 1 + self.separator.len();
                return;
            }
        }
        if let Some(c) = rest.chars().next() {
            out.push(c, false);
            self.pos += c.len_utf8();
        }
    }
}

/// Unescape a whole value and strip one pair of matching quotes
pub fn unescape(value: &str, separator: &str) -> String {
    let resolved = ValueScanner::new(value, separator).unescape_all();
    strip_quotes(&resolved).to_string()
}

/// Split a value on `separator`, producing trimmed, unescaped, unquoted tokens
///
/// Tokens that are empty after trimming are dropped; an explicitly quoted
/// empty string (`''`) is kept.
pub fn split(value: &str, separator: &str) -> Vec<String> {
    split_keep_quotes(value, separator)
        .into_iter()
        .map(|token| strip_quotes(&token).to_string())
        .collect()
}

/// Like [`split`], but leave quotes in place
///
/// Hash items are split on `=` first and have their key and value
/// unquoted separately.
pub fn split_keep_quotes(value: &str, separator: &str) -> Vec<String> {
    ValueScanner::new(value, separator)
        .split_all()
        .into_iter()
        .filter(|token| !token.is_empty())
        .collect()
}

/// Remove one matching pair of surrounding single or double quotes
pub fn strip_quotes(s: &str) -> &str {
    for quote in ['"', '\''] {
        if s.len() >= 2 && s.starts_with(quote) && s.ends_with(quote) {
            return &s[1..s.len() - 1];
        }
    }
    s
}
