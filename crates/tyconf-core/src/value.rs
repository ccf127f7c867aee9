//! Typed configuration values and the document store
//!
//! Every keyword in a section holds exactly one [`TypedValue`]: a scalar
//! string, an ordered array of strings, or an unordered string map.
//! Sections keep first-seen order; keywords within a section are unordered.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// The declared or inferred type of a keyword
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Scalar,
    Array,
    Hash,
}

impl ValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::Scalar => "scalar",
            ValueType::Array => "array",
            ValueType::Hash => "hash",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValueType {
    type Err = Error;

    /// Type names are matched case-insensitively
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "scalar" => Ok(ValueType::Scalar),
            "array" => Ok(ValueType::Array),
            "hash" => Ok(ValueType::Hash),
            _ => Err(Error::invalid_type(s)),
        }
    }
}

/// A keyword's value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TypedValue {
    Scalar(String),
    Array(Vec<String>),
    Hash(HashMap<String, String>),
}

impl TypedValue {
    /// An empty value of the given type
    pub fn empty(value_type: ValueType) -> Self {
        match value_type {
            ValueType::Scalar => TypedValue::Scalar(String::new()),
            ValueType::Array => TypedValue::Array(Vec::new()),
            ValueType::Hash => TypedValue::Hash(HashMap::new()),
        }
    }

    pub fn value_type(&self) -> ValueType {
        match self {
            TypedValue::Scalar(_) => ValueType::Scalar,
            TypedValue::Array(_) => ValueType::Array,
            TypedValue::Hash(_) => ValueType::Hash,
        }
    }

    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            TypedValue::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[String]> {
        match self {
            TypedValue::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_hash(&self) -> Option<&HashMap<String, String>> {
        match self {
            TypedValue::Hash(h) => Some(h),
            _ => None,
        }
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypedValue::Scalar(s) => write!(f, "{}", s),
            TypedValue::Array(items) => write!(f, "[{}]", items.join(", ")),
            TypedValue::Hash(map) => {
                // Sorted so the rendering is stable
                let mut keys: Vec<_> = map.keys().collect();
                keys.sort();
                write!(f, "{{")?;
                for (i, k) in keys.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, map[*k])?;
                }
                write!(f, "}}")
            }
        }
    }
}

/// Keyword → value map of one section
pub type Section = HashMap<String, TypedValue>;

/// The parsed document: section name → keyword → value
///
/// A keyword's type is fixed by the first entry that commits it. Array and
/// hash values grow across repeated entries; scalars are overwritten.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    sections: IndexMap<String, Section>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a section, keeping first-seen order. Returns true if new.
    pub fn add_section(&mut self, name: &str) -> bool {
        if self.sections.contains_key(name) {
            return false;
        }
        self.sections.insert(name.to_string(), Section::new());
        true
    }

    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.sections.keys().map(String::as_str)
    }

    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.get(name)
    }

    pub fn get(&self, section: &str, keyword: &str) -> Option<&TypedValue> {
        self.sections.get(section)?.get(keyword)
    }

    pub fn type_of(&self, section: &str, keyword: &str) -> Option<ValueType> {
        self.get(section, keyword).map(TypedValue::value_type)
    }

    /// Mutable slot for a keyword, created empty with `value_type` on first use
    ///
    /// Returns `None` when the keyword already holds a value of another type.
    pub fn entry(
        &mut self,
        section: &str,
        keyword: &str,
        value_type: ValueType,
    ) -> Option<&mut TypedValue> {
        let slot = self
            .sections
            .entry(section.to_string())
            .or_default()
            .entry(keyword.to_string())
            .or_insert_with(|| TypedValue::empty(value_type));
        if slot.value_type() == value_type {
            Some(slot)
        } else {
            None
        }
    }

    pub fn set_scalar(&mut self, section: &str, keyword: &str, value: String) -> bool {
        match self.entry(section, keyword, ValueType::Scalar) {
            Some(TypedValue::Scalar(s)) => {
                *s = value;
                true
            }
            _ => false,
        }
    }

    pub fn push_array(&mut self, section: &str, keyword: &str, items: Vec<String>) -> bool {
        match self.entry(section, keyword, ValueType::Array) {
            Some(TypedValue::Array(a)) => {
                a.extend(items);
                true
            }
            _ => false,
        }
    }

    pub fn merge_hash(
        &mut self,
        section: &str,
        keyword: &str,
        pairs: Vec<(String, String)>,
    ) -> bool {
        match self.entry(section, keyword, ValueType::Hash) {
            Some(TypedValue::Hash(h)) => {
                h.extend(pairs);
                true
            }
            _ => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn clear(&mut self) {
        self.sections.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Section)> {
        self.sections.iter().map(|(k, v)| (k.as_str(), v))
    }
}
