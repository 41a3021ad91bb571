//! Declarative description of the attributes a resource or data source accepts.
//!
//! A [`Schema`] is used for three things: rejecting invalid configuration before anything is sent
//! to Gate, filling in defaults, and deciding whether a changed attribute can be updated in place
//! or forces the object to be replaced.

use indexmap::IndexMap;
use serde::Serialize;
use snafu::{ResultExt as _, Snafu, ensure};
use strum::Display;

use crate::{data::AttributeValue, validation};

type Result<T, E = Error> = std::result::Result<T, E>;

/// Checks a string attribute value.
pub type ValidateFn = fn(&str) -> Result<(), validation::Errors>;

/// Returns `true` if `old` and `new` are equivalent and the difference should be ignored.
pub type DiffSuppressFn = fn(old: &str, new: &str) -> bool;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("unsupported attribute {name:?}"))]
    UnknownAttribute { name: String },

    #[snafu(display("missing required attribute {name:?}"))]
    MissingAttribute { name: &'static str },

    #[snafu(display("attribute {name:?} is computed and cannot be set"))]
    ComputedAttribute { name: &'static str },

    #[snafu(display("attribute {name:?} expects a {expected} value, got {value}"))]
    InvalidType {
        name: &'static str,
        expected: ValueType,
        value: AttributeValue,
    },

    #[snafu(display("invalid value for attribute {name:?}"))]
    InvalidValue {
        source: validation::Errors,
        name: &'static str,
    },

    #[snafu(display("required attribute {name:?} must not declare a default"))]
    RequiredWithDefault { name: &'static str },

    #[snafu(display("computed attribute {name:?} must not declare a default"))]
    ComputedWithDefault { name: &'static str },

    #[snafu(display("computed attribute {name:?} cannot force a replacement"))]
    ComputedForceNew { name: &'static str },

    #[snafu(display("computed attribute {name:?} cannot be validated"))]
    ComputedWithValidator { name: &'static str },

    #[snafu(display("default of attribute {name:?} is not a {expected} value"))]
    DefaultTypeMismatch {
        name: &'static str,
        expected: ValueType,
    },

    #[snafu(display("validator on attribute {name:?} requires a string value"))]
    ValidatorOnNonString { name: &'static str },
}

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    String,
    Bool,
    Int,
}

impl ValueType {
    pub fn of(value: &AttributeValue) -> Self {
        match value {
            AttributeValue::String(_) => Self::String,
            AttributeValue::Bool(_) => Self::Bool,
            AttributeValue::Int(_) => Self::Int,
        }
    }

    /// Converts `value` to this type, if it has an unambiguous representation.
    ///
    /// Scalars are accepted as strings, and strings spelling a number or boolean are accepted for
    /// the respective types.
    pub fn coerce(self, value: AttributeValue) -> Option<AttributeValue> {
        match (self, value) {
            (Self::String, AttributeValue::String(value)) => Some(AttributeValue::String(value)),
            (Self::String, AttributeValue::Bool(value)) => Some(value.to_string().into()),
            (Self::String, AttributeValue::Int(value)) => Some(value.to_string().into()),
            (Self::Bool, AttributeValue::Bool(value)) => Some(AttributeValue::Bool(value)),
            (Self::Bool, AttributeValue::String(value)) => {
                value.trim().parse().ok().map(AttributeValue::Bool)
            }
            (Self::Int, AttributeValue::Int(value)) => Some(AttributeValue::Int(value)),
            (Self::Int, AttributeValue::String(value)) => {
                value.trim().parse().ok().map(AttributeValue::Int)
            }
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Presence {
    /// Must be set in the configuration.
    Required,

    /// May be set in the configuration, falls back to the attribute default.
    Optional,

    /// Set by the lifecycle callbacks only.
    Computed,
}

#[derive(Clone, Debug, Serialize)]
pub struct Attribute {
    #[serde(rename = "type")]
    pub value_type: ValueType,

    pub presence: Presence,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<AttributeValue>,

    /// Changing the attribute destroys and re-creates the object.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub force_new: bool,

    #[serde(skip)]
    pub validate: Option<ValidateFn>,

    #[serde(skip)]
    pub diff_suppress: Option<DiffSuppressFn>,

    pub description: &'static str,
}

impl Attribute {
    pub fn required(value_type: ValueType, description: &'static str) -> Self {
        Self {
            value_type,
            presence: Presence::Required,
            default: None,
            force_new: false,
            validate: None,
            diff_suppress: None,
            description,
        }
    }

    pub fn optional(default: impl Into<AttributeValue>, description: &'static str) -> Self {
        let default = default.into();
        Self {
            value_type: ValueType::of(&default),
            presence: Presence::Optional,
            default: Some(default),
            ..Self::required(ValueType::String, description)
        }
    }

    pub fn computed(value_type: ValueType, description: &'static str) -> Self {
        Self {
            presence: Presence::Computed,
            ..Self::required(value_type, description)
        }
    }

    pub fn with_force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    pub fn with_validator(mut self, validate: ValidateFn) -> Self {
        self.validate = Some(validate);
        self
    }

    pub fn with_diff_suppress(mut self, diff_suppress: DiffSuppressFn) -> Self {
        self.diff_suppress = Some(diff_suppress);
        self
    }

    pub fn is_computed(&self) -> bool {
        self.presence == Presence::Computed
    }

    /// Returns `true` if `old` and `new` should be treated as the same value.
    pub fn is_equivalent(
        &self,
        old: Option<&AttributeValue>,
        new: Option<&AttributeValue>,
    ) -> bool {
        match (old, new) {
            (Some(old), Some(new)) if old == new => true,
            (Some(AttributeValue::String(old)), Some(AttributeValue::String(new))) => self
                .diff_suppress
                .is_some_and(|diff_suppress| diff_suppress(old, new)),
            (None, None) => true,
            _ => false,
        }
    }
}

/// The ordered set of attributes of a resource, data source or the provider itself.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(transparent)]
pub struct Schema(IndexMap<&'static str, Attribute>);

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attribute(mut self, name: &'static str, attribute: Attribute) -> Self {
        self.0.insert(name, attribute);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.0.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Attribute)> {
        self.0.iter().map(|(name, attribute)| (*name, attribute))
    }

    /// Validates declared attributes and fills in defaults.
    ///
    /// The returned map contains every non-computed attribute of the schema, in schema order.
    pub fn apply(
        &self,
        declared: &IndexMap<String, AttributeValue>,
    ) -> Result<IndexMap<String, AttributeValue>> {
        if let Some(name) = declared.keys().find(|name| !self.0.contains_key(name.as_str())) {
            return UnknownAttributeSnafu { name: name.clone() }.fail();
        }

        let mut attributes = IndexMap::new();
        for (name, attribute) in self.iter() {
            let value = match (attribute.presence, declared.get(name)) {
                (Presence::Computed, Some(_)) => return ComputedAttributeSnafu { name }.fail(),
                (Presence::Computed, None) => continue,
                (Presence::Required, None) => return MissingAttributeSnafu { name }.fail(),
                (Presence::Optional, None) => match &attribute.default {
                    Some(default) => default.clone(),
                    None => continue,
                },
                (_, Some(value)) => attribute
                    .value_type
                    .coerce(value.clone())
                    .ok_or_else(|| {
                        InvalidTypeSnafu {
                            name,
                            expected: attribute.value_type,
                            value: value.clone(),
                        }
                        .build()
                    })?,
            };

            if let (Some(validate), AttributeValue::String(value)) = (attribute.validate, &value) {
                validate(value).context(InvalidValueSnafu { name })?;
            }
            attributes.insert(name.to_owned(), value);
        }

        Ok(attributes)
    }

    /// Checks the schema itself for contradicting attribute settings.
    pub fn internal_validate(&self) -> Result<()> {
        for (name, attribute) in self.iter() {
            match attribute.presence {
                Presence::Required => {
                    ensure!(attribute.default.is_none(), RequiredWithDefaultSnafu { name });
                }
                Presence::Computed => {
                    ensure!(attribute.default.is_none(), ComputedWithDefaultSnafu { name });
                    ensure!(!attribute.force_new, ComputedForceNewSnafu { name });
                    ensure!(
                        attribute.validate.is_none(),
                        ComputedWithValidatorSnafu { name }
                    );
                }
                Presence::Optional => {}
            }

            if let Some(default) = &attribute.default {
                ensure!(
                    ValueType::of(default) == attribute.value_type,
                    DefaultTypeMismatchSnafu {
                        name,
                        expected: attribute.value_type,
                    }
                );
            }
            ensure!(
                attribute.validate.is_none() || attribute.value_type == ValueType::String,
                ValidatorOnNonStringSnafu { name }
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn schema() -> Schema {
        Schema::new()
            .attribute(
                "application",
                Attribute::required(ValueType::String, "Application name")
                    .with_force_new()
                    .with_validator(validation::is_application_name),
            )
            .attribute("instance_port", Attribute::optional(80, "Port"))
            .attribute("description", Attribute::optional("", "Description"))
            .attribute("url", Attribute::computed(ValueType::String, "URL"))
    }

    fn declared(pairs: &[(&str, AttributeValue)]) -> IndexMap<String, AttributeValue> {
        pairs
            .iter()
            .map(|(name, value)| ((*name).to_owned(), value.clone()))
            .collect()
    }

    #[test]
    fn defaults_are_applied() {
        let attributes = schema()
            .apply(&declared(&[("application", "docta".into())]))
            .expect("configuration is valid");

        assert_eq!(
            attributes.keys().collect::<Vec<_>>(),
            ["application", "instance_port", "description"]
        );
        assert_eq!(attributes["instance_port"], AttributeValue::Int(80));
        assert_eq!(attributes["description"], AttributeValue::from(""));
    }

    #[test]
    fn numeric_strings_are_coerced() {
        let attributes = schema()
            .apply(&declared(&[
                ("application", "docta".into()),
                ("instance_port", "8080".into()),
            ]))
            .expect("configuration is valid");

        assert_eq!(attributes["instance_port"], AttributeValue::Int(8080));
    }

    #[rstest]
    #[case::missing(&[], "missing required attribute \"application\"")]
    #[case::unknown(
        &[("application", "docta".into()), ("owner", "me".into())],
        "unsupported attribute \"owner\""
    )]
    #[case::computed(
        &[("application", "docta".into()), ("url", "spinnaker://x".into())],
        "attribute \"url\" is computed and cannot be set"
    )]
    #[case::wrong_type(
        &[("application", "docta".into()), ("instance_port", true.into())],
        "attribute \"instance_port\" expects a int value, got true"
    )]
    #[case::invalid(
        &[("application", "my app".into())],
        "invalid value for attribute \"application\""
    )]
    fn invalid_configuration(#[case] pairs: &[(&str, AttributeValue)], #[case] expected: &str) {
        let err = schema()
            .apply(&declared(pairs))
            .expect_err("configuration is invalid");
        assert_eq!(err.to_string(), expected);
    }

    #[test]
    fn diff_suppression_only_applies_to_strings() {
        let attribute = Attribute::required(ValueType::String, "Pipeline")
            .with_diff_suppress(|old, new| old.trim() == new.trim());

        assert!(attribute.is_equivalent(Some(&"a".into()), Some(&" a ".into())));
        assert!(!attribute.is_equivalent(Some(&"a".into()), Some(&"b".into())));
        assert!(!attribute.is_equivalent(None, Some(&"a".into())));
        assert!(attribute.is_equivalent(None, None));
    }

    #[test]
    fn internal_validation_rejects_contradictions() {
        schema().internal_validate().expect("schema is consistent");

        let mut computed = Attribute::computed(ValueType::String, "URL");
        computed.force_new = true;
        let err = Schema::new()
            .attribute("url", computed)
            .internal_validate()
            .expect_err("computed attributes cannot force new");
        assert!(matches!(err, Error::ComputedForceNew { name: "url" }));

        let mut required = Attribute::required(ValueType::Int, "Port");
        required.default = Some(AttributeValue::Int(80));
        let err = Schema::new()
            .attribute("port", required)
            .internal_validate()
            .expect_err("required attributes carry no default");
        assert!(matches!(err, Error::RequiredWithDefault { name: "port" }));

        let validated =
            Attribute::optional(80, "Port").with_validator(validation::is_application_name);
        let err = Schema::new()
            .attribute("port", validated)
            .internal_validate()
            .expect_err("validators only apply to strings");
        assert!(matches!(err, Error::ValidatorOnNonString { name: "port" }));
    }
}
