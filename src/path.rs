//! Canonical key paths: joining segments into keys like `FOO[0]_NAME` or
//! `database.url`, and splitting such keys back into tokens.

use crate::types::Case;

/// Segment standing in for any concrete map key in shape patterns.
pub const MAP_PLACEHOLDER: &str = "<name>";

/// Suffix marking "an element of this list" in shape patterns.
pub const LIST_MARKER: &str = "[]";

/// One step of a structural location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// A declared record field.
    Field(String),
    /// A dynamic map key.
    Key(String),
    /// A zero-based list position.
    Index(usize),
}

/// Separator and case transform used to render paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathStyle {
    pub separator: String,
    pub case: Case,
}

impl PathStyle {
    pub fn new(separator: &str) -> Self {
        Self {
            separator: separator.to_string(),
            case: Case::Preserve,
        }
    }

    pub fn case(mut self, case: Case) -> Self {
        self.case = case;
        self
    }

    /// `FOO_BAR[0]_BAZ`
    pub fn env() -> Self {
        Self::new("_").case(Case::Upper)
    }

    /// `foo.bar[0].baz`
    pub fn flag() -> Self {
        Self::new(".")
    }

    /// Append one segment to an already-rendered path.
    ///
    /// Names are case-folded; an empty name adds nothing (embedded fields).
    /// Indices are glued to the previous segment as `[i]`.
    pub fn push(&self, prefix: &str, segment: &Segment) -> String {
        match segment {
            Segment::Index(i) => format!("{prefix}[{i}]"),
            Segment::Field(name) | Segment::Key(name) => {
                if name.is_empty() {
                    prefix.to_string()
                } else if prefix.is_empty() {
                    self.case.apply(name)
                } else {
                    format!("{prefix}{}{}", self.separator, self.case.apply(name))
                }
            }
        }
    }
}

/// Join segments into a canonical path.
pub fn join(segments: &[Segment], style: &PathStyle) -> String {
    segments
        .iter()
        .fold(String::new(), |acc, seg| style.push(&acc, seg))
}

/// A separator-delimited piece of a path with the index markers glued to it.
///
/// `foo[0][2]` is `Token { name: "foo", indices: [0, 2] }`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub name: String,
    pub indices: Vec<usize>,
}

impl Token {
    /// The token as it appeared in the path.
    pub fn raw(&self) -> String {
        let mut out = self.name.clone();
        for i in &self.indices {
            out.push_str(&format!("[{i}]"));
        }
        out
    }
}

/// Split a path on `separator`, peeling trailing `[i]` markers off each piece.
///
/// Brackets that do not hold a non-negative integer stay part of the name.
pub fn tokenize(path: &str, separator: &str) -> Vec<Token> {
    if path.is_empty() {
        return Vec::new();
    }
    let pieces: Vec<&str> = if separator.is_empty() {
        vec![path]
    } else {
        path.split(separator).collect()
    };
    pieces.into_iter().map(split_indices).collect()
}

fn split_indices(piece: &str) -> Token {
    let mut name = piece;
    let mut indices = Vec::new();
    while let Some(rest) = name.strip_suffix(']') {
        let Some(open) = rest.rfind('[') else {
            break;
        };
        let Ok(index) = rest[open + 1..].parse::<usize>() else {
            break;
        };
        if rest[open + 1..].starts_with('+') {
            break;
        }
        indices.push(index);
        name = &rest[..open];
    }
    indices.reverse();
    Token {
        name: name.to_string(),
        indices,
    }
}
