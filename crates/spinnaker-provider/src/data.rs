use std::fmt::Display;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A single attribute value of a resource or data source.
///
/// Attributes are flat: nested configuration (like a pipeline definition) is carried as a YAML or
/// JSON encoded string.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Int(i64),
    String(String),
}

impl AttributeValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }
}

impl Display for AttributeValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(value) => write!(f, "{value}"),
            Self::Int(value) => write!(f, "{value}"),
            Self::String(value) => write!(f, "{value:?}"),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

/// The state of one resource instance as seen by its lifecycle callbacks.
///
/// An empty id means the object does not exist (anymore). Read callbacks clear the id when the
/// remote object vanished, which the reconciler turns into a re-creation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceData {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    id: String,

    #[serde(default)]
    attributes: IndexMap<String, AttributeValue>,
}

impl ResourceData {
    pub fn new(attributes: IndexMap<String, AttributeValue>) -> Self {
        Self {
            id: String::new(),
            attributes,
        }
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            attributes: IndexMap::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    /// Marks the object as gone.
    pub fn clear_id(&mut self) {
        self.id.clear();
    }

    pub fn is_absent(&self) -> bool {
        self.id.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }

    /// Returns the string attribute `key`, or `""` if it is unset or not a string.
    pub fn get_str(&self, key: &str) -> &str {
        self.get(key).and_then(AttributeValue::as_str).unwrap_or_default()
    }

    pub fn get_bool(&self, key: &str) -> bool {
        self.get(key)
            .and_then(AttributeValue::as_bool)
            .unwrap_or_default()
    }

    pub fn get_int(&self, key: &str) -> i64 {
        self.get(key).and_then(AttributeValue::as_int).unwrap_or_default()
    }

    pub fn set(&mut self, key: &str, value: impl Into<AttributeValue>) {
        self.attributes.insert(key.to_owned(), value.into());
    }

    pub fn attributes(&self) -> &IndexMap<String, AttributeValue> {
        &self.attributes
    }

    pub fn into_attributes(self) -> IndexMap<String, AttributeValue> {
        self.attributes
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;

    #[test]
    fn getters_fall_back_to_defaults() {
        let mut data = ResourceData::with_id("docta");
        data.set("email", "team@example.com");
        data.set("instance_port", 8080);
        data.set("platform_health_only", true);

        assert_eq!(data.get_str("email"), "team@example.com");
        assert_eq!(data.get_int("instance_port"), 8080);
        assert!(data.get_bool("platform_health_only"));

        assert_eq!(data.get_str("description"), "");
        assert_eq!(data.get_str("instance_port"), "");
        assert_eq!(data.get_int("email"), 0);
        assert!(!data.get_bool("missing"));
    }

    #[test]
    fn clearing_the_id_marks_the_object_absent() {
        let mut data = ResourceData::with_id("docta");
        assert!(!data.is_absent());

        data.clear_id();
        assert!(data.is_absent());
        assert_eq!(data.id(), "");
    }

    #[test]
    fn attribute_values_keep_their_yaml_type() {
        let attributes: IndexMap<String, AttributeValue> = serde_yaml::from_str(indoc! {"
            application: docta
            instance_port: 80
            platform_health_only: false
            quoted_port: '80'
        "})
        .expect("attributes parse");

        assert_eq!(attributes["application"], AttributeValue::from("docta"));
        assert_eq!(attributes["instance_port"], AttributeValue::Int(80));
        assert_eq!(attributes["platform_health_only"], AttributeValue::Bool(false));
        assert_eq!(attributes["quoted_port"], AttributeValue::from("80"));
    }
}
