//! Diff suppression for attributes carrying YAML or JSON documents.
//!
//! Gate re-serializes everything it stores, so the document read back never matches the declared
//! text byte for byte. The functions here decide whether two documents describe the same thing.

use serde_json::{Map, Value};

use crate::yaml;

/// Keys Front50 adds to or rewrites in every stored pipeline.
pub const SERVER_MANAGED_PIPELINE_KEYS: [&str; 6] = [
    "id",
    "updateTs",
    "lastModifiedBy",
    "index",
    "application",
    "name",
];

/// Parses both documents and compares them after normalizing numbers.
///
/// A document which fails to parse is never equivalent to anything.
pub fn are_semantically_equal(old: &str, new: &str) -> bool {
    match (yaml::parse(old), yaml::parse(new)) {
        (Ok(old), Ok(new)) => yaml::normalize_numbers(old) == yaml::normalize_numbers(new),
        _ => false,
    }
}

/// Removes the [server managed keys](SERVER_MANAGED_PIPELINE_KEYS) from a pipeline definition.
pub fn strip_server_managed(mut pipeline: Map<String, Value>) -> Map<String, Value> {
    for key in SERVER_MANAGED_PIPELINE_KEYS {
        pipeline.remove(key);
    }
    pipeline
}

/// Like [`are_semantically_equal`], ignoring keys the server manages.
pub fn are_equivalent_pipelines(old: &str, new: &str) -> bool {
    let strip = |document: &str| match yaml::parse(document) {
        Ok(Value::Object(pipeline)) => Some(yaml::normalize_numbers(Value::Object(
            strip_server_managed(pipeline),
        ))),
        Ok(other) => Some(yaml::normalize_numbers(other)),
        Err(_) => None,
    };

    match (strip(old), strip(new)) {
        (Some(old), Some(new)) => old == new,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::formatting(
        r#"{"name":"deploy","stages":[{"type":"wait","waitTime":30}]}"#,
        indoc! {"
            name: deploy
            stages:
              - type: wait
                waitTime: 30
        "}
    )]
    #[case::key_order("a: 1\nb: 2\n", "b: 2\na: 1\n")]
    #[case::number_representation("waitTime: 30", "waitTime: 30.0")]
    #[case::empty_documents("", "")]
    fn equivalent_documents(#[case] old: &str, #[case] new: &str) {
        assert!(are_semantically_equal(old, new));
    }

    #[rstest]
    #[case::value_changed("waitTime: 30", "waitTime: 31")]
    #[case::type_changed("refId: '1'", "refId: 1")]
    #[case::list_order("stages: [a, b]", "stages: [b, a]")]
    #[case::unparsable("name: [", "name: [")]
    fn different_documents(#[case] old: &str, #[case] new: &str) {
        assert!(!are_semantically_equal(old, new));
    }

    #[test]
    fn server_managed_keys_are_ignored_for_pipelines() {
        let stored = r#"{
            "id": "8f2c",
            "name": "deploy",
            "application": "docta",
            "index": 0,
            "updateTs": "1650000000000",
            "lastModifiedBy": "anonymous",
            "keepWaitingPipelines": false,
            "stages": []
        }"#;
        let declared = indoc! {"
            keepWaitingPipelines: false
            stages: []
        "};

        assert!(are_equivalent_pipelines(stored, declared));
        assert!(!are_semantically_equal(stored, declared));
        assert!(!are_equivalent_pipelines(stored, "keepWaitingPipelines: true\nstages: []"));
    }

    #[test]
    fn stripping_leaves_other_keys_alone() {
        let pipeline = serde_json::json!({ "id": "8f2c", "triggers": [] });
        let Value::Object(pipeline) = pipeline else {
            unreachable!("literal is an object")
        };

        let stripped = strip_server_managed(pipeline);
        assert_eq!(stripped.keys().collect::<Vec<_>>(), ["triggers"]);
    }
}
