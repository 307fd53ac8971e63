//! Declared shapes of decode targets and the path → kind index built from them.
//!
//! Flat text loses structure: `FOO=a,b` could be a string or a list, and
//! `DATABASE_POOL_SIZE` could be `database.pool_size` or `database.pool.size`.
//! A [`Shape`] describes the target once; [`inspect`] turns it into a
//! [`TypeShape`] that the unflattener consults key by key.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use crate::path::{LIST_MARKER, MAP_PLACEHOLDER, tokenize};
use crate::types::Kind;

/// Declared structure of a type.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Bool,
    /// Integers and floats. Their text is typed before decoding, so they
    /// survive `#[serde(flatten)]`, which buffers values without coercion.
    Number,
    /// Any other single-valued leaf: strings, bytes, durations, enums.
    Scalar,
    List(Box<Shape>),
    /// String-keyed map; the key is only known at decode time.
    Map(Box<Shape>),
    Record(Vec<Field>),
}

/// One declared field of a record.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub shape: Shape,
    /// Embedded fields are flattened into the parent and add no path segment.
    pub embedded: bool,
}

impl Field {
    pub fn new(name: &str, shape: Shape) -> Self {
        Self {
            name: name.to_string(),
            shape,
            embedded: false,
        }
    }

    /// Field whose shape comes from its type.
    pub fn of<T: Described + ?Sized>(name: &str) -> Self {
        Self::new(name, T::shape())
    }

    /// Embedded record (`#[serde(flatten)]`).
    pub fn embedded<T: Described + ?Sized>() -> Self {
        Self {
            name: String::new(),
            shape: T::shape(),
            embedded: true,
        }
    }
}

impl Shape {
    pub fn record(fields: impl IntoIterator<Item = Field>) -> Self {
        Shape::Record(fields.into_iter().collect())
    }

    pub fn list(elem: Shape) -> Self {
        Shape::List(Box::new(elem))
    }

    pub fn map(value: Shape) -> Self {
        Shape::Map(Box::new(value))
    }

    pub fn kind(&self) -> Kind {
        match self {
            Shape::Bool => Kind::Bool,
            Shape::Number => Kind::Number,
            Shape::Scalar => Kind::Scalar,
            Shape::List(_) => Kind::List,
            Shape::Map(_) => Kind::Map,
            Shape::Record(_) => Kind::Record,
        }
    }
}

/// Types that can describe their own shape.
///
/// This stands in for runtime reflection: records list their fields by the
/// names serde uses for them.
///
/// ```ignore
/// impl Described for Server {
///     fn shape() -> Shape {
///         Shape::record([Field::of::<String>("host"), Field::of::<u16>("port")])
///     }
/// }
/// ```
pub trait Described {
    fn shape() -> Shape;
}

macro_rules! described_as {
    ($shape:expr => $($ty:ty),* $(,)?) => {
        $(
            impl Described for $ty {
                fn shape() -> Shape {
                    $shape
                }
            }
        )*
    };
}

described_as!(Shape::Bool => bool);
described_as!(Shape::Number =>
    i8, i16, i32, i64, i128, isize,
    u8, u16, u32, u64, u128, usize,
    f32, f64,
);
described_as!(Shape::Scalar => char, str, String, PathBuf, Duration, SystemTime);

impl<T: Described> Described for Vec<T> {
    fn shape() -> Shape {
        Shape::list(T::shape())
    }
}

impl<T: Described> Described for [T] {
    fn shape() -> Shape {
        Shape::list(T::shape())
    }
}

impl<T: Described, S> Described for HashMap<String, T, S> {
    fn shape() -> Shape {
        Shape::map(T::shape())
    }
}

impl<T: Described> Described for BTreeMap<String, T> {
    fn shape() -> Shape {
        Shape::map(T::shape())
    }
}

impl<T: Described> Described for Option<T> {
    fn shape() -> Shape {
        T::shape()
    }
}

impl<T: Described + ?Sized> Described for Box<T> {
    fn shape() -> Shape {
        T::shape()
    }
}

/// Lower-cased path pattern → kind, for every declared location.
///
/// Map keys appear as `<name>`; list elements as `path[]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypeShape {
    separator: String,
    /// Kind of the target itself, stored under the empty pattern.
    root: Option<Kind>,
    kinds: BTreeMap<String, Kind>,
    /// Record pattern → names of its direct fields (embedded ones spliced in).
    fields: BTreeMap<String, BTreeSet<String>>,
}

/// Walk a declared shape and record the kind of every reachable path.
pub fn inspect(shape: &Shape, separator: &str) -> TypeShape {
    let mut out = TypeShape {
        separator: separator.to_string(),
        root: Some(shape.kind()),
        kinds: BTreeMap::new(),
        fields: BTreeMap::new(),
    };
    out.add(shape, "");
    out
}

impl TypeShape {
    fn add(&mut self, shape: &Shape, path: &str) {
        if !path.is_empty() {
            self.kinds.insert(path.to_string(), shape.kind());
        }
        match shape {
            Shape::Bool | Shape::Number | Shape::Scalar => {}
            Shape::List(elem) => self.add(elem, &format!("{path}{LIST_MARKER}")),
            Shape::Map(value) => {
                let child = self.child(path, MAP_PLACEHOLDER);
                self.add(value, &child);
            }
            Shape::Record(fields) => self.add_fields(fields, path),
        }
    }

    fn add_fields(&mut self, fields: &[Field], path: &str) {
        for field in fields {
            match (&field.shape, field.embedded) {
                (Shape::Record(inner), true) => self.add_fields(inner, path),
                // Only records can be spliced into their parent.
                (_, true) => {}
                (shape, false) => {
                    let name = field.name.to_lowercase();
                    let child = self.child(path, &name);
                    self.fields
                        .entry(path.to_string())
                        .or_default()
                        .insert(name);
                    self.add(shape, &child);
                }
            }
        }
    }

    /// Join a segment onto a pattern.
    pub fn child(&self, pattern: &str, segment: &str) -> String {
        if pattern.is_empty() {
            segment.to_string()
        } else {
            format!("{pattern}{}{segment}", self.separator)
        }
    }

    pub fn separator(&self) -> &str {
        &self.separator
    }

    /// Kind recorded for an exact pattern. The empty pattern is the target itself.
    pub fn get(&self, pattern: &str) -> Option<Kind> {
        if pattern.is_empty() {
            return self.root;
        }
        self.kinds.get(pattern).copied()
    }

    /// Whether the record at `pattern` declares a field called `name` (lower-cased).
    pub fn has_field(&self, pattern: &str, name: &str) -> bool {
        self.fields
            .get(pattern)
            .is_some_and(|names| names.contains(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Kind)> {
        self.kinds.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    /// Kind of a concrete path such as `foo[1]_name` or `labels.env`.
    ///
    /// Index markers match `[]`; any single segment matches `<name>`.
    pub fn kind_of(&self, path: &str) -> Option<Kind> {
        let concrete = tokenize(&path.to_lowercase(), &self.separator);
        self.kinds.iter().find_map(|(pattern, kind)| {
            let pattern = tokenize(pattern, &self.separator);
            let matches = pattern.len() == concrete.len()
                && pattern.iter().zip(&concrete).all(|(p, c)| {
                    let (p_name, p_depth) = strip_markers(&p.name);
                    p_depth == c.indices.len() && (p_name == MAP_PLACEHOLDER || p_name == c.name)
                });
            matches.then_some(*kind)
        })
    }

    /// Whether the value stored under `pattern` ends a path.
    ///
    /// Lists of leaves count: their elements are written joined or indexed
    /// directly after the key.
    pub fn is_leaf(&self, pattern: &str) -> bool {
        match self.get(pattern) {
            Some(Kind::List) => self.is_leaf(&format!("{pattern}{LIST_MARKER}")),
            Some(kind) => kind.is_leaf(),
            None => false,
        }
    }
}

/// Split `name[][]` into `("name", 2)`.
fn strip_markers(segment: &str) -> (&str, usize) {
    let mut name = segment;
    let mut depth = 0;
    while let Some(rest) = name.strip_suffix(LIST_MARKER) {
        name = rest;
        depth += 1;
    }
    (name, depth)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::test::{Collection, Database, Listing, Nested, Server};

    #[test]
    fn records_bools_and_scalars() {
        let ts = inspect(&Server::shape(), "_");
        assert_eq!(ts.get("host"), Some(Kind::Scalar));
        assert_eq!(ts.get("debug"), Some(Kind::Bool));
        assert_eq!(ts.get("database"), Some(Kind::Record));
        assert_eq!(ts.get("database_pool_size"), Some(Kind::Number));
    }

    #[test]
    fn root_kind_is_recorded() {
        let ts = inspect(&HashMap::<String, String>::shape(), "_");
        assert_eq!(ts.get(""), Some(Kind::Map));
        assert_eq!(ts.get("<name>"), Some(Kind::Scalar));
        assert_eq!(inspect(&Server::shape(), "_").get(""), Some(Kind::Record));
        assert_eq!(TypeShape::default().get(""), None);
    }

    #[test]
    fn numbers_have_their_own_kind() {
        let ts = inspect(&Server::shape(), "_");
        assert_eq!(ts.get("port"), Some(Kind::Number));
        assert!(ts.is_leaf("port"));
    }

    #[test]
    fn fields_are_indexed_by_parent() {
        let ts = inspect(&Server::shape(), "_");
        assert!(ts.has_field("", "database"));
        assert!(ts.has_field("database", "pool_size"));
        assert!(!ts.has_field("", "database_pool_size"));
    }

    #[test]
    fn lists_record_element_pattern() {
        let ts = inspect(&Listing::shape(), "_");
        assert_eq!(ts.get("tags"), Some(Kind::List));
        assert_eq!(ts.get("tags[]"), Some(Kind::Scalar));
        assert_eq!(ts.get("items"), Some(Kind::List));
        assert_eq!(ts.get("items[]"), Some(Kind::Record));
        assert_eq!(ts.get("items[]_name"), Some(Kind::Scalar));
    }

    #[test]
    fn maps_use_placeholder() {
        let ts = inspect(&Collection::shape(), ".");
        assert_eq!(ts.get("labels"), Some(Kind::Map));
        assert_eq!(ts.get("labels.<name>"), Some(Kind::Scalar));
        assert_eq!(ts.get("groups.<name>.value"), Some(Kind::Scalar));
    }

    #[test]
    fn optional_records_are_transparent() {
        let ts = inspect(&Nested::shape(), "_");
        assert_eq!(ts.get("foo_<name>_bar"), Some(Kind::Record));
        assert_eq!(ts.get("foo_<name>_bar_value"), Some(Kind::Scalar));
    }

    #[test]
    fn embedded_fields_add_no_segment() {
        struct Outer;
        impl Described for Outer {
            fn shape() -> Shape {
                Shape::record([Field::of::<String>("name"), Field::embedded::<Database>()])
            }
        }
        let ts = inspect(&Outer::shape(), ".");
        assert_eq!(ts.get("url"), Some(Kind::Scalar));
        assert_eq!(ts.get("pool_size"), Some(Kind::Number));
        assert_eq!(ts.len(), 3);
        assert!(ts.has_field("", "pool_size"));
    }

    #[test]
    fn field_names_are_lower_cased() {
        struct Camel;
        impl Described for Camel {
            fn shape() -> Shape {
                Shape::record([Field::of::<bool>("numberOne")])
            }
        }
        let ts = inspect(&Camel::shape(), ".");
        assert_eq!(ts.get("numberone"), Some(Kind::Bool));
    }

    #[test]
    fn kind_of_matches_concrete_paths() {
        let ts = inspect(&Listing::shape(), "_");
        assert_eq!(ts.kind_of("ITEMS[3]_NAME"), Some(Kind::Scalar));
        assert_eq!(ts.kind_of("items[0]"), Some(Kind::Record));
        assert_eq!(ts.kind_of("items_name"), None);

        let ts = inspect(&Collection::shape(), ".");
        assert_eq!(ts.kind_of("labels.env"), Some(Kind::Scalar));
        assert_eq!(ts.kind_of("groups.a.value"), Some(Kind::Scalar));
    }

    #[test]
    fn leaf_detection_sees_through_lists() {
        let ts = inspect(&Listing::shape(), "_");
        assert!(ts.is_leaf("tags"));
        assert!(!ts.is_leaf("items"));
        assert!(!ts.is_leaf("missing"));
    }
}
