//! Generic request construction.
//!
//! A request is described by a call name plus an [`Arguments`] tree. Each
//! entry of the tree is a [`TagValue`]:
//!
//! - a scalar, written as element text,
//! - a [`Record`] carrying a value (text or nested arguments) and the
//!   attributes to place on the element,
//! - a list of the above, written as repeated sibling elements.
//!
//! ```
//! use zimbra_soap::request::{build_request, CallOptions, Record};
//!
//! let options = CallOptions::new()
//!     .arg("id", "4a7e9c35-6b1f-4f3e-8d2b-1a2c3d4e5f60")
//!     .arg("a", vec![
//!         Record::text("Jane").attr("n", "givenName"),
//!         Record::text("Doe").attr("n", "sn"),
//!     ]);
//! let request = build_request("ModifyAccount", &options);
//! assert_eq!(request.name(), "ModifyAccountRequest");
//! assert_eq!(request.children().len(), 3);
//! ```

use crate::element::Element;
use crate::error::{Result, ZimbraError};
use serde_yaml::Value;

/// Suffix carried by every regular Zimbra request element.
pub const REQUEST_SUFFIX: &str = "Request";

/// Reserved key holding a record's value when arguments are read from YAML.
pub const VALUE_KEY: &str = "value";

/// Ordered string-to-string attribute container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes(Vec<(String, String)>);

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key`, replacing an earlier value. Values are stored in string form.
    pub fn insert(&mut self, key: impl Into<String>, value: impl ToString) {
        let key = key.into();
        let value = value.to_string();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.0.push((key, value)),
        }
    }

    /// Builder form of [`Attributes::insert`].
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: ToString> FromIterator<(K, V)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut attributes = Attributes::new();
        for (key, value) in iter {
            attributes.insert(key, value);
        }
        attributes
    }
}

/// Value of one tag in an [`Arguments`] tree.
#[derive(Debug, Clone, PartialEq)]
pub enum TagValue {
    /// Element text, no attributes
    Scalar(String),
    /// Element with a value and attributes
    Record(Record),
    /// Repeated sibling elements under the same tag
    List(Vec<TagValue>),
}

impl TagValue {
    pub fn scalar(value: impl ToString) -> Self {
        TagValue::Scalar(value.to_string())
    }
}

/// An element value plus the attributes placed on that element.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub value: RecordValue,
    pub attributes: Attributes,
}

/// What a [`Record`] holds: text, or a nested argument tree.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordValue {
    Text(String),
    Nested(Arguments),
}

impl Record {
    pub fn text(value: impl ToString) -> Self {
        Self {
            value: RecordValue::Text(value.to_string()),
            attributes: Attributes::new(),
        }
    }

    pub fn nested(arguments: Arguments) -> Self {
        Self {
            value: RecordValue::Nested(arguments),
            attributes: Attributes::new(),
        }
    }

    /// Add an attribute to the generated element.
    pub fn attr(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.attributes.insert(key, value);
        self
    }
}

impl From<Record> for TagValue {
    fn from(record: Record) -> Self {
        TagValue::Record(record)
    }
}

impl<T: Into<TagValue>> From<Vec<T>> for TagValue {
    fn from(items: Vec<T>) -> Self {
        TagValue::List(items.into_iter().map(Into::into).collect())
    }
}

macro_rules! scalar_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for TagValue {
                fn from(value: $ty) -> Self {
                    TagValue::Scalar(value.to_string())
                }
            }
        )*
    };
}

scalar_from!(&str, String, &String, bool, char, i8, i16, i32, i64, u8, u16, u32, u64, usize, f32, f64);

/// Ordered mapping from tag name to [`TagValue`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments(Vec<(String, TagValue)>);

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `tag`, replacing an earlier value for the same tag in place.
    pub fn insert(&mut self, tag: impl Into<String>, value: impl Into<TagValue>) {
        let tag = tag.into();
        let value = value.into();
        match self.0.iter_mut().find(|(t, _)| *t == tag) {
            Some(slot) => slot.1 = value,
            None => self.0.push((tag, value)),
        }
    }

    /// Builder form of [`Arguments::insert`].
    pub fn with(mut self, tag: impl Into<String>, value: impl Into<TagValue>) -> Self {
        self.insert(tag, value);
        self
    }

    pub fn get(&self, tag: &str) -> Option<&TagValue> {
        self.0.iter().find(|(t, _)| t == tag).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TagValue)> {
        self.0.iter().map(|(t, v)| (t.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Read an argument tree from YAML.
    ///
    /// Mappings carrying a `value` key are records; every other key of such a
    /// mapping becomes an attribute. Sequences become repeated elements.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let value: Value = serde_yaml::from_str(yaml)
            .map_err(|e| ZimbraError::Config(format!("Invalid arguments document: {}", e)))?;
        match value {
            Value::Null => Ok(Arguments::new()),
            other => Arguments::try_from(other),
        }
    }
}

impl TryFrom<Value> for Arguments {
    type Error = ZimbraError;

    fn try_from(value: Value) -> Result<Self> {
        let Value::Mapping(mapping) = value else {
            return Err(ZimbraError::Config(
                "Arguments must be a mapping of tag names".to_string(),
            ));
        };

        let mut arguments = Arguments::new();
        for (key, value) in mapping {
            let tag = scalar_string(&key)?;
            arguments.insert(tag, tag_value_from_yaml(value)?);
        }
        Ok(arguments)
    }
}

fn tag_value_from_yaml(value: Value) -> Result<TagValue> {
    match value {
        Value::Mapping(mapping) => {
            let mut inner = None;
            let mut attributes = Attributes::new();
            for (key, value) in mapping {
                let key = scalar_string(&key)?;
                if key == VALUE_KEY {
                    inner = Some(value);
                } else {
                    attributes.insert(key, scalar_string(&value)?);
                }
            }
            let inner = inner.ok_or_else(|| {
                ZimbraError::Config(format!("Record is missing its '{}' key", VALUE_KEY))
            })?;
            let value = match inner {
                Value::Mapping(_) => RecordValue::Nested(Arguments::try_from(inner)?),
                other => RecordValue::Text(scalar_string(&other)?),
            };
            Ok(TagValue::Record(Record { value, attributes }))
        }
        Value::Sequence(items) => items
            .into_iter()
            .map(tag_value_from_yaml)
            .collect::<Result<Vec<_>>>()
            .map(TagValue::List),
        other => Ok(TagValue::Scalar(scalar_string(&other)?)),
    }
}

fn scalar_string(value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(ZimbraError::Config(format!(
            "Expected a scalar, found {:?}",
            other
        ))),
    }
}

/// Attributes for the request element itself.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RootAttributes {
    #[default]
    None,
    /// Set as attributes on the request element
    Flat(Attributes),
    /// Imported into the request element as a child
    Prebuilt(Element),
}

impl From<Attributes> for RootAttributes {
    fn from(attributes: Attributes) -> Self {
        RootAttributes::Flat(attributes)
    }
}

impl From<Element> for RootAttributes {
    fn from(element: Element) -> Self {
        RootAttributes::Prebuilt(element)
    }
}

/// Everything needed to build one request besides its name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallOptions {
    /// Send the call name as given, without appending `Request`
    pub suppress_suffix: bool,
    /// Request element attributes (ignored when `positional` is non-empty)
    pub attributes: RootAttributes,
    /// Pre-built elements imported into the request element
    pub positional: Vec<Element>,
    /// Child elements of the request
    pub body: Arguments,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn suppress_suffix(mut self) -> Self {
        self.suppress_suffix = true;
        self
    }

    pub fn attributes(mut self, attributes: impl Into<RootAttributes>) -> Self {
        self.attributes = attributes.into();
        self
    }

    /// Add one flat attribute to the request element.
    pub fn attr(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        match self.attributes {
            RootAttributes::Flat(ref mut attributes) => attributes.insert(key, value),
            _ => self.attributes = RootAttributes::Flat(Attributes::new().with(key, value)),
        }
        self
    }

    pub fn positional(mut self, element: Element) -> Self {
        self.positional.push(element);
        self
    }

    pub fn arg(mut self, tag: impl Into<String>, value: impl Into<TagValue>) -> Self {
        self.body.insert(tag, value);
        self
    }

    pub fn body(mut self, body: Arguments) -> Self {
        self.body = body;
        self
    }
}

/// Append `Request` to `name` unless suppressed or already present.
pub fn normalize_call_name(name: &str, suppress_suffix: bool) -> String {
    if suppress_suffix || name.ends_with(REQUEST_SUFFIX) {
        name.to_string()
    } else {
        format!("{}{}", name, REQUEST_SUFFIX)
    }
}

/// Build the request element for `call_name`.
///
/// The result is the SOAP body content only; it is not yet wrapped in an
/// envelope.
pub fn build_request(call_name: &str, options: &CallOptions) -> Element {
    let mut root = Element::new(normalize_call_name(call_name, options.suppress_suffix));

    if !options.positional.is_empty() {
        for element in &options.positional {
            root.import(element.clone());
        }
    } else {
        match options.attributes {
            RootAttributes::Prebuilt(ref element) => root.import(element.clone()),
            RootAttributes::Flat(ref attributes) => {
                for (key, value) in attributes.iter() {
                    root.set_attr(key, value);
                }
            }
            RootAttributes::None => {}
        }
    }

    append_arguments(&mut root, &options.body);
    root
}

fn append_arguments(parent: &mut Element, arguments: &Arguments) {
    for (tag, value) in arguments.iter() {
        append_tag(parent, tag, value);
    }
}

fn append_tag(parent: &mut Element, tag: &str, value: &TagValue) {
    match value {
        TagValue::Scalar(text) => {
            parent.add_child_with_text(tag, text.as_str());
        }
        TagValue::Record(record) => {
            let child = match record.value {
                RecordValue::Nested(ref nested) => {
                    let child = parent.add_child(tag);
                    append_arguments(child, nested);
                    child
                }
                RecordValue::Text(ref text) => parent.add_child_with_text(tag, text.as_str()),
            };
            for (key, value) in record.attributes.iter() {
                child.set_attr(key, value);
            }
        }
        // Nested lists flatten into further siblings
        TagValue::List(items) => {
            for item in items {
                append_tag(parent, tag, item);
            }
        }
    }
}
