use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Deserialize;
use snafu::{ResultExt as _, Snafu};

use crate::data::AttributeValue;

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to read manifest {path:?}"))]
    ReadManifest {
        source: std::io::Error,
        path: PathBuf,
    },

    #[snafu(display("failed to parse manifest {path:?}"))]
    ParseManifest {
        source: serde_yaml::Error,
        path: PathBuf,
    },
}

/// The declared set of resources and data sources.
///
/// ```yaml
/// resources:
///   - type: spinnaker_application
///     name: docta
///     attributes:
///       application: docta
///       email: team@example.com
/// dataSources:
///   - type: spinnaker_pipeline
///     name: deploy
///     attributes:
///       application: docta
///       name: deploy
/// ```
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct Manifest {
    pub resources: Vec<Declaration>,
    pub data_sources: Vec<Declaration>,
}

impl Manifest {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).context(ReadManifestSnafu { path })?;
        serde_yaml::from_str(&contents).context(ParseManifestSnafu { path })
    }
}

/// A single declared resource or data source.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Declaration {
    #[serde(rename = "type")]
    pub type_name: String,

    /// Local name, unique per type.
    pub name: String,

    #[serde(default)]
    pub attributes: IndexMap<String, AttributeValue>,
}

impl Declaration {
    pub fn address(&self) -> String {
        address(&self.type_name, &self.name)
    }
}

/// The key identifying an object in the manifest and the state.
pub fn address(type_name: &str, name: &str) -> String {
    format!("{type_name}.{name}")
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;

    #[test]
    fn manifest_parses() {
        let manifest: Manifest = serde_yaml::from_str(indoc! {"
            resources:
              - type: spinnaker_application
                name: docta
                attributes:
                  application: docta
                  email: team@example.com
                  instance_port: 8080
              - type: spinnaker_pipeline_template
                name: build
                attributes:
                  name: build-image
                  template: |
                    schema: '1'
                    id: build-image
            dataSources:
              - type: spinnaker_pipeline
                name: deploy
                attributes:
                  application: docta
                  name: deploy
        "})
        .expect("manifest is valid");

        assert_eq!(manifest.resources.len(), 2);
        assert_eq!(manifest.resources[0].address(), "spinnaker_application.docta");
        assert_eq!(
            manifest.resources[0].attributes["instance_port"],
            AttributeValue::Int(8080)
        );
        assert_eq!(
            manifest.resources[1].attributes["template"],
            AttributeValue::from("schema: '1'\nid: build-image\n")
        );
        assert_eq!(manifest.data_sources[0].address(), "spinnaker_pipeline.deploy");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let result = serde_yaml::from_str::<Manifest>(indoc! {"
            resources:
              - type: spinnaker_application
                name: docta
                attribute:
                  application: docta
        "});
        assert!(result.is_err());
    }

    #[test]
    fn missing_manifest_is_reported() {
        let dir = tempfile::tempdir().expect("temporary directory");
        let err = Manifest::from_file(dir.path().join("missing.yaml")).expect_err("no such file");
        assert!(matches!(err, Error::ReadManifest { .. }));
    }
}
