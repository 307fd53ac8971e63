/// Case transform applied to field segments when joining a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Case {
    /// Keep names as declared (flag style).
    #[default]
    Preserve,
    /// Upper-case every segment (environment variable style).
    Upper,
    /// Lower-case every segment (shape patterns, decoded env keys).
    Lower,
}

impl Case {
    pub fn apply(self, s: &str) -> String {
        match self {
            Case::Preserve => s.to_string(),
            Case::Upper => s.to_uppercase(),
            Case::Lower => s.to_lowercase(),
        }
    }
}

/// How the flattener renders a list whose elements are all scalars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScalarLists {
    /// One key per element: `tags[0]=a`, `tags[1]=b`.
    #[default]
    Indexed,
    /// A single key with the elements joined: `tags=a,b`.
    Joined(char),
}

/// Structural kind of a declared path, as recorded in a [`TypeShape`](crate::shape::TypeShape).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Bool,
    Number,
    Scalar,
    List,
    Map,
    Record,
}

impl Kind {
    /// Leaf kinds end a path: nothing can be nested below them.
    pub fn is_leaf(self) -> bool {
        matches!(self, Kind::Bool | Kind::Number | Kind::Scalar)
    }
}
