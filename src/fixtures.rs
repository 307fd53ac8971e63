#[cfg(test)]
pub mod test {
    use std::collections::{BTreeMap, HashMap};
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    use serde::{Deserialize, Serialize};

    use crate::error::CodecError;
    use crate::decode::from_node;
    use crate::node::Node;
    use crate::record::{FieldAccessor, FieldDescriptor};
    use crate::shape::{Described, Field, Shape};

    #[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
    pub struct Server {
        pub host: String,
        pub port: u16,
        pub debug: bool,
        pub database: Database,
    }

    impl Described for Server {
        fn shape() -> Shape {
            Shape::record([
                Field::of::<String>("host"),
                Field::of::<u16>("port"),
                Field::of::<bool>("debug"),
                Field::of::<Database>("database"),
            ])
        }
    }

    #[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
    pub struct Database {
        #[serde(skip_serializing_if = "Option::is_none")]
        pub url: Option<String>,
        pub pool_size: usize,
    }

    impl Described for Database {
        fn shape() -> Shape {
            Shape::record([
                Field::of::<Option<String>>("url"),
                Field::of::<usize>("pool_size"),
            ])
        }
    }

    /// Record whose database fields sit at its own level.
    #[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
    pub struct Deployment {
        pub name: String,
        #[serde(flatten)]
        pub database: Database,
    }

    impl Described for Deployment {
        fn shape() -> Shape {
            Shape::record([Field::of::<String>("name"), Field::embedded::<Database>()])
        }
    }

    #[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
    pub struct Listing {
        pub enabled: bool,
        pub tags: Vec<String>,
        pub items: Vec<Item>,
    }

    impl Described for Listing {
        fn shape() -> Shape {
            Shape::record([
                Field::of::<bool>("enabled"),
                Field::of::<Vec<String>>("tags"),
                Field::of::<Vec<Item>>("items"),
            ])
        }
    }

    #[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
    pub struct Item {
        pub name: String,
    }

    impl Described for Item {
        fn shape() -> Shape {
            Shape::record([Field::of::<String>("name")])
        }
    }

    #[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
    pub struct Collection {
        pub labels: HashMap<String, String>,
        pub groups: BTreeMap<String, Group>,
    }

    impl Described for Collection {
        fn shape() -> Shape {
            Shape::record([
                Field::of::<HashMap<String, String>>("labels"),
                Field::of::<BTreeMap<String, Group>>("groups"),
            ])
        }
    }

    #[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
    pub struct Group {
        pub value: String,
    }

    impl Described for Group {
        fn shape() -> Shape {
            Shape::record([Field::of::<String>("value")])
        }
    }

    /// Map of records holding an optional boxed record.
    #[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
    pub struct Nested {
        pub foo: HashMap<String, NestedEntry>,
    }

    impl Described for Nested {
        fn shape() -> Shape {
            Shape::record([Field::of::<HashMap<String, NestedEntry>>("foo")])
        }
    }

    #[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
    pub struct NestedEntry {
        #[serde(skip_serializing_if = "Option::is_none")]
        pub bar: Option<Box<Group>>,
    }

    impl Described for NestedEntry {
        fn shape() -> Shape {
            Shape::record([Field::of::<Option<Box<Group>>>("bar")])
        }
    }

    #[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
    pub struct Plain {
        pub foo: String,
    }

    impl Described for Plain {
        fn shape() -> Shape {
            Shape::record([Field::of::<String>("foo")])
        }
    }

    #[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
    pub struct Flags {
        pub foo: bool,
        pub bar: bool,
    }

    impl Described for Flags {
        fn shape() -> Shape {
            Shape::record([Field::of::<bool>("foo"), Field::of::<bool>("bar")])
        }
    }

    #[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
    pub struct Login {
        pub username: String,
        #[serde(skip_serializing_if = "String::is_empty")]
        pub password: String,
    }

    impl Described for Login {
        fn shape() -> Shape {
            Shape::record([
                Field::of::<String>("username"),
                Field::of::<String>("password"),
            ])
        }
    }

    #[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
    #[serde(rename_all = "lowercase")]
    pub enum Mode {
        #[default]
        Fast,
        Slow,
    }

    impl Described for Mode {
        fn shape() -> Shape {
            Shape::Scalar
        }
    }

    /// Well-known scalars with more than one text form.
    #[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
    pub struct Complex {
        pub timeout: Duration,
        pub created: SystemTime,
        #[serde(with = "serde_bytes")]
        pub payload: Vec<u8>,
        pub mode: Mode,
        pub ratio: f32,
    }

    impl Default for Complex {
        fn default() -> Self {
            Self {
                timeout: Duration::ZERO,
                created: UNIX_EPOCH,
                payload: Vec::new(),
                mode: Mode::default(),
                ratio: 0.0,
            }
        }
    }

    impl Described for Complex {
        fn shape() -> Shape {
            Shape::record([
                Field::of::<Duration>("timeout"),
                Field::of::<SystemTime>("created"),
                Field::new("payload", Shape::Scalar),
                Field::of::<Mode>("mode"),
                Field::of::<f32>("ratio"),
            ])
        }
    }

    // -- Field accessor fixtures ------------------------------------------------

    /// Presence-aware message: `None` means the field was never set.
    #[derive(Debug, Clone, PartialEq, Default)]
    pub struct Profile {
        pub id: Option<i64>,
        pub number_one: Option<String>,
        pub active: Option<bool>,
        pub simples: Vec<String>,
        pub map: BTreeMap<String, String>,
        pub very_simple: Option<Simple>,
    }

    #[derive(Debug, Clone, PartialEq, Default)]
    pub struct Simple {
        pub component: Option<String>,
    }

    impl FieldAccessor for Simple {
        fn fields(&self) -> Vec<FieldDescriptor> {
            vec![FieldDescriptor::new("component", Shape::Scalar)]
        }

        fn get(&self, name: &str) -> Option<Node> {
            match name {
                "component" => self.component.clone().map(Node::Str),
                _ => None,
            }
        }

        fn set(&mut self, name: &str, value: Node) -> Result<(), CodecError> {
            match name {
                "component" => self.component = Some(from_node(value)?),
                other => return Err(CodecError::UnknownField(other.to_string())),
            }
            Ok(())
        }

        fn message(&self, _name: &str) -> Option<&dyn FieldAccessor> {
            None
        }

        fn message_mut(&mut self, _name: &str) -> Option<&mut dyn FieldAccessor> {
            None
        }
    }

    impl FieldAccessor for Profile {
        fn fields(&self) -> Vec<FieldDescriptor> {
            vec![
                FieldDescriptor::new("id", Shape::Scalar),
                FieldDescriptor::new("numberOne", Shape::Scalar),
                FieldDescriptor::new("active", Shape::Bool),
                FieldDescriptor::new("simples", Shape::list(Shape::Scalar)),
                FieldDescriptor::new("map", Shape::map(Shape::Scalar)),
                FieldDescriptor::new(
                    "verySimple",
                    Shape::record([Field::new("component", Shape::Scalar)]),
                ),
            ]
        }

        fn get(&self, name: &str) -> Option<Node> {
            match name {
                "id" => self.id.map(Node::Int),
                "numberOne" => self.number_one.clone().map(Node::Str),
                "active" => self.active.map(Node::Bool),
                "simples" if !self.simples.is_empty() => Some(Node::List(
                    self.simples.iter().cloned().map(Node::Str).collect(),
                )),
                "map" if !self.map.is_empty() => Some(Node::Map(
                    self.map
                        .iter()
                        .map(|(k, v)| (k.clone(), Node::Str(v.clone())))
                        .collect(),
                )),
                _ => None,
            }
        }

        fn set(&mut self, name: &str, value: Node) -> Result<(), CodecError> {
            match name {
                "id" => self.id = Some(from_node(value)?),
                "numberOne" => self.number_one = Some(from_node(value)?),
                "active" => self.active = Some(from_node(value)?),
                "simples" => self.simples = from_node(value)?,
                "map" => self.map = from_node(value)?,
                other => return Err(CodecError::UnknownField(other.to_string())),
            }
            Ok(())
        }

        fn message(&self, name: &str) -> Option<&dyn FieldAccessor> {
            match name {
                "verySimple" => self.very_simple.as_ref().map(|m| m as &dyn FieldAccessor),
                _ => None,
            }
        }

        fn message_mut(&mut self, name: &str) -> Option<&mut dyn FieldAccessor> {
            match name {
                "verySimple" => Some(self.very_simple.get_or_insert_with(Simple::default)),
                _ => None,
            }
        }
    }

    #[test]
    fn fixture_shapes_match_serde_names() {
        let node = crate::node::to_node(&Server::default()).unwrap();
        let Node::Map(entries) = node else {
            panic!("Expected a map");
        };
        let names: Vec<&str> = entries.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(names, vec!["host", "port", "debug", "database"]);
    }
}
