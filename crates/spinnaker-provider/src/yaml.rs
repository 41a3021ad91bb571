//! Utility functions for moving configuration between YAML documents and JSON values.
use std::io::Write;

use serde_json::{Map, Number, Value};
use snafu::{ResultExt as _, Snafu};

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to parse YAML"))]
    ParseYaml { source: serde_yaml::Error },

    #[snafu(display("failed to serialize YAML"))]
    SerializeYaml { source: serde_yaml::Error },

    #[snafu(display("failed to write YAML document separator"))]
    WriteDocumentSeparator { source: std::io::Error },

    #[snafu(display("failed to write YAML to stdout"))]
    WriteToStdout { source: std::io::Error },
}

/// Parses a YAML (or JSON, which is a subset) document into a JSON value.
///
/// Mapping keys which are not strings are rendered as strings, tags are dropped and non-finite
/// floats become `null`, so every YAML document has a JSON representation.
pub fn parse(input: &str) -> Result<Value> {
    let document: serde_yaml::Value = serde_yaml::from_str(input).context(ParseYamlSnafu)?;
    Ok(to_json(document))
}

fn to_json(value: serde_yaml::Value) -> Value {
    match value {
        serde_yaml::Value::Null => Value::Null,
        serde_yaml::Value::Bool(value) => Value::Bool(value),
        serde_yaml::Value::Number(number) => {
            if let Some(number) = number.as_i64() {
                Value::from(number)
            } else if let Some(number) = number.as_u64() {
                Value::from(number)
            } else {
                number
                    .as_f64()
                    .and_then(Number::from_f64)
                    .map_or(Value::Null, Value::Number)
            }
        }
        serde_yaml::Value::String(value) => Value::String(value),
        serde_yaml::Value::Sequence(values) => {
            Value::Array(values.into_iter().map(to_json).collect())
        }
        serde_yaml::Value::Mapping(mapping) => Value::Object(
            mapping
                .into_iter()
                .map(|(key, value)| (key_to_string(key), to_json(value)))
                .collect(),
        ),
        serde_yaml::Value::Tagged(tagged) => to_json(tagged.value),
    }
}

fn key_to_string(key: serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(key) => key,
        serde_yaml::Value::Null => "null".to_owned(),
        serde_yaml::Value::Bool(key) => key.to_string(),
        serde_yaml::Value::Number(key) => key.to_string(),
        serde_yaml::Value::Tagged(tagged) => key_to_string(tagged.value),
        complex => to_json(complex).to_string(),
    }
}

/// Converts every number to a float so that `1` and `1.0` compare equal.
pub fn normalize_numbers(value: Value) -> Value {
    match value {
        Value::Number(number) => number
            .as_f64()
            .and_then(Number::from_f64)
            .map_or(Value::Null, Value::Number),
        Value::Array(values) => Value::Array(values.into_iter().map(normalize_numbers).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, value)| (key, normalize_numbers(value)))
                .collect::<Map<_, _>>(),
        ),
        other => other,
    }
}

/// Renders `value` as a YAML document without a leading separator.
pub fn to_string<T>(value: &T) -> Result<String>
where
    T: serde::Serialize + ?Sized,
{
    serde_yaml::to_string(value).context(SerializeYamlSnafu)
}

/// Serializes the given data structure as an explicit YAML document and writes it to a
/// [`Writer`](Write).
pub fn serialize<T, W>(value: &T, mut writer: W) -> Result<()>
where
    T: serde::Serialize + ?Sized,
    W: Write,
{
    writer
        .write_all(b"---\n")
        .context(WriteDocumentSeparatorSnafu)?;

    let mut serializer = serde_yaml::Serializer::new(writer);
    value
        .serialize(&mut serializer)
        .context(SerializeYamlSnafu)
}

/// Prints `value` as a YAML document to stdout.
pub fn print<T>(value: &T) -> Result<()>
where
    T: serde::Serialize + ?Sized,
{
    let mut stdout = std::io::stdout().lock();
    serialize(value, &mut stdout)?;
    stdout.flush().context(WriteToStdoutSnafu)
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use serde_json::json;

    use super::*;

    #[test]
    fn yaml_is_converted_to_json() {
        let value = parse(indoc! {"
            name: deploy
            limitConcurrent: true
            stages:
              - refId: '1'
                waitTime: 30
            1: numeric key
            ratio: 0.5
        "})
        .expect("valid YAML");

        assert_eq!(
            value,
            json!({
                "name": "deploy",
                "limitConcurrent": true,
                "stages": [{ "refId": "1", "waitTime": 30 }],
                "1": "numeric key",
                "ratio": 0.5,
            })
        );
    }

    #[test]
    fn json_documents_are_accepted() {
        let value = parse(r#"{"name": "deploy", "index": 0}"#).expect("JSON is valid YAML");
        assert_eq!(value, json!({ "name": "deploy", "index": 0 }));
    }

    #[test]
    fn invalid_yaml_is_rejected() {
        assert!(parse("name: [unterminated").is_err());
    }

    #[test]
    fn numbers_are_normalized_to_floats() {
        assert_eq!(
            normalize_numbers(json!({ "a": 1, "b": [2, 2.0] })),
            normalize_numbers(json!({ "a": 1.0, "b": [2.0, 2] }))
        );
    }

    #[test]
    fn serialized_documents_start_with_a_separator() {
        let mut buffer = Vec::new();
        serialize(&json!({ "name": "deploy" }), &mut buffer).expect("serializes");

        assert_eq!(
            String::from_utf8(buffer).expect("valid UTF-8"),
            "---\nname: deploy\n"
        );
    }
}
