use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use snafu::{ResultExt as _, ensure};
use spinnaker_gate::GateClient;
use tracing::instrument;

use crate::{
    data::ResourceData,
    resource::{
        DecodePipelineConfigSnafu, GateSnafu, MissingPipelineConfigFieldSnafu, NotAMappingSnafu,
        ParseDocumentSnafu, RenderYamlSnafu, Resource, Result, split_id,
    },
    schema::{Attribute, Schema, ValueType},
    yaml,
};

pub const TYPE_NAME: &str = "spinnaker_pipeline_template_config";

/// The pipeline type of a pipeline instantiated from a template.
pub const TEMPLATED_PIPELINE_TYPE: &str = "templatedPipeline";

/// A pipeline that is rendered from a pipeline template with bound variables.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineConfig {
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "String::is_empty"
    )]
    pub id: String,

    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "String::is_empty"
    )]
    pub schema: String,

    #[serde(
        default,
        rename = "type",
        deserialize_with = "null_as_default",
        skip_serializing_if = "String::is_empty"
    )]
    pub pipeline_type: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub application: String,

    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "String::is_empty"
    )]
    pub description: String,

    #[serde(
        default,
        rename = "parameterConfig",
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub parameters: Vec<Map<String, Value>>,

    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Map::is_empty"
    )]
    pub variables: Map<String, Value>,

    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Map::is_empty"
    )]
    pub template: Map<String, Value>,
}

/// Front50 writes `null` for unset fields.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl PipelineConfig {
    /// Decodes a YAML or JSON document, numbers are normalized to floats.
    fn parse(document: &str) -> Result<Self> {
        let value = yaml::parse(document).context(ParseDocumentSnafu {
            attribute: "pipeline_config",
        })?;
        serde_json::from_value(yaml::normalize_numbers(value)).context(DecodePipelineConfigSnafu)
    }

    /// Compares the parts of two configurations a user controls.
    ///
    /// Ids are only compared when both sides carry one, since the declared configuration never
    /// knows the server side id.
    pub fn is_roughly_equal(&self, other: &Self) -> bool {
        let ids_match = self.id.is_empty() || other.id.is_empty() || self.id == other.id;

        ids_match
            && self.application == other.application
            && self.description == other.description
            && self.variables == other.variables
            && self.template == other.template
    }
}

/// Diff suppression for `pipeline_config`: a parse failure on either side is a difference.
pub fn are_roughly_equal(old: &str, new: &str) -> bool {
    match (PipelineConfig::parse(old), PipelineConfig::parse(new)) {
        (Ok(old), Ok(new)) => old.is_roughly_equal(&new),
        _ => false,
    }
}

/// Manages a templated pipeline configuration.
///
/// The resource id is `<application>:<template_name>`, `template_name` doubles as pipeline name.
#[derive(Debug, Default)]
pub struct PipelineTemplateConfigResource;

impl PipelineTemplateConfigResource {
    /// Builds the request body from the declared configuration.
    fn config(data: &ResourceData) -> Result<PipelineConfig> {
        let value = yaml::parse(data.get_str("pipeline_config")).context(ParseDocumentSnafu {
            attribute: "pipeline_config",
        })?;
        let Value::Object(document) = &value else {
            return NotAMappingSnafu {
                attribute: "pipeline_config",
            }
            .fail();
        };
        ensure!(
            document.get("name").is_some_and(Value::is_string),
            MissingPipelineConfigFieldSnafu {
                field: "pipeline name"
            }
        );
        ensure!(
            document.get("application").is_some_and(Value::is_string),
            MissingPipelineConfigFieldSnafu {
                field: "application"
            }
        );

        let mut config: PipelineConfig =
            serde_json::from_value(value).context(DecodePipelineConfigSnafu)?;
        config.pipeline_type = TEMPLATED_PIPELINE_TYPE.to_owned();
        config.name = data.get_str("template_name").to_owned();
        Ok(config)
    }

    /// Fetches the stored configuration, `None` if it does not exist.
    async fn fetch(
        client: &GateClient,
        application: &str,
        name: &str,
    ) -> Result<Option<PipelineConfig>> {
        match client.get_pipeline(application, name).await {
            Ok(pipeline) => serde_json::from_value(Value::Object(pipeline))
                .map(Some)
                .context(DecodePipelineConfigSnafu),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err).context(GateSnafu {
                action: "read pipeline configuration",
            }),
        }
    }
}

#[async_trait]
impl Resource for PipelineTemplateConfigResource {
    fn schema(&self) -> Schema {
        Schema::new()
            .attribute(
                "pipeline_config",
                Attribute::required(ValueType::String, "Templated pipeline configuration as YAML")
                    .with_diff_suppress(are_roughly_equal),
            )
            .attribute(
                "application",
                Attribute::required(
                    ValueType::String,
                    "Name of the application owning the pipeline",
                ),
            )
            .attribute(
                "template_name",
                Attribute::required(ValueType::String, "Name of the resulting pipeline")
                    .with_force_new(),
            )
    }

    #[instrument(skip_all, fields(template_name = data.get_str("template_name")))]
    async fn create(&self, client: &GateClient, data: &mut ResourceData) -> Result<()> {
        let config = Self::config(data)?;
        client
            .create_pipeline(&config)
            .await
            .context(GateSnafu {
                action: "create pipeline configuration",
            })?;

        data.set_id(format!("{}:{}", config.application, config.name));
        self.read(client, data).await
    }

    #[instrument(skip_all, fields(id = data.id()))]
    async fn read(&self, client: &GateClient, data: &mut ResourceData) -> Result<()> {
        let (application, name) = split_id(data.id())?;
        let (application, name) = (application.to_owned(), name.to_owned());

        let Some(config) = Self::fetch(client, &application, &name).await? else {
            tracing::info!("pipeline configuration no longer exists");
            data.clear_id();
            return Ok(());
        };
        let document = yaml::to_string(&config).context(RenderYamlSnafu {
            attribute: "pipeline_config",
        })?;

        data.set("template_name", name);
        data.set("application", application);
        data.set("pipeline_config", document);
        Ok(())
    }

    #[instrument(skip_all, fields(id = data.id()))]
    async fn update(&self, client: &GateClient, data: &mut ResourceData) -> Result<()> {
        let (application, name) = split_id(data.id())?;
        let application = application.to_owned();
        let Some(current) = Self::fetch(client, &application, name).await? else {
            tracing::warn!("pipeline configuration vanished before it could be updated");
            data.clear_id();
            return Ok(());
        };

        let mut config = Self::config(data)?;
        config.id = current.id;
        client
            .update_pipeline(&config.id, &config)
            .await
            .context(GateSnafu {
                action: "update pipeline configuration",
            })?;

        data.set_id(format!("{application}:{}", config.name));
        self.read(client, data).await
    }

    #[instrument(skip_all, fields(id = data.id()))]
    async fn delete(&self, client: &GateClient, data: &mut ResourceData) -> Result<()> {
        let (application, _) = split_id(data.id())?;
        client
            .delete_pipeline(application, data.get_str("template_name"))
            .await
            .context(GateSnafu {
                action: "delete pipeline configuration",
            })?;

        data.clear_id();
        Ok(())
    }

    async fn exists(&self, client: &GateClient, data: &ResourceData) -> Result<bool> {
        let (application, _) = split_id(data.id())?;
        let name = data.get_str("template_name");
        Ok(Self::fetch(client, application, name)
            .await?
            .is_some_and(|config| config.name == name))
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use rstest::rstest;
    use serde_json::json;

    use super::*;
    use crate::resource::Error;

    const DECLARED: &str = indoc! {"
        schema: v2
        application: docta
        name: placeholder
        description: Deploy with the shared template
        template:
          artifactAccount: front50ArtifactCredentials
          reference: spinnaker://build-image
          type: front50/pipelineTemplate
        variables:
          waitTime: 30
          regions: [eu-west-1]
    "};

    fn data(pipeline_config: &str) -> ResourceData {
        let mut data = ResourceData::default();
        data.set("pipeline_config", pipeline_config);
        data.set("application", "docta");
        data.set("template_name", "deploy");
        data
    }

    #[test]
    fn config_is_a_templated_pipeline_named_after_the_template_name() {
        let config = PipelineTemplateConfigResource::config(&data(DECLARED)).expect("valid");

        assert_eq!(config.pipeline_type, TEMPLATED_PIPELINE_TYPE);
        assert_eq!(config.name, "deploy");
        assert_eq!(config.application, "docta");
        assert_eq!(config.schema, "v2");
        assert_eq!(config.variables["regions"], json!(["eu-west-1"]));
    }

    #[rstest]
    #[case("application: docta", "pipeline name not set in pipeline configuration")]
    #[case("name: deploy", "application not set in pipeline configuration")]
    #[case("name: deploy\napplication: 42", "application not set in pipeline configuration")]
    fn required_fields_must_be_strings(#[case] document: &str, #[case] expected: &str) {
        let err = PipelineTemplateConfigResource::config(&data(document))
            .expect_err("configuration is incomplete");
        assert!(matches!(err, Error::MissingPipelineConfigField { .. }));
        assert_eq!(err.to_string(), expected);
    }

    #[test]
    fn stored_configuration_is_roughly_equal_to_the_declared_one() {
        let stored = json!({
            "id": "4b1d",
            "schema": "v2",
            "type": "templatedPipeline",
            "name": "deploy",
            "application": "docta",
            "description": "Deploy with the shared template",
            "template": {
                "type": "front50/pipelineTemplate",
                "artifactAccount": "front50ArtifactCredentials",
                "reference": "spinnaker://build-image",
            },
            "variables": { "waitTime": 30.0, "regions": ["eu-west-1"] },
        });

        assert!(are_roughly_equal(&stored.to_string(), DECLARED));
    }

    #[rstest]
    #[case::description(DECLARED.replace("the shared", "another"))]
    #[case::variables(DECLARED.replace("waitTime: 30", "waitTime: 60"))]
    #[case::template(DECLARED.replace("build-image", "bake-image"))]
    #[case::application(DECLARED.replace("application: docta", "application: other"))]
    fn changes_to_user_controlled_fields_are_detected(#[case] changed: String) {
        assert!(!are_roughly_equal(DECLARED, &changed));
    }

    #[test]
    fn ids_are_only_compared_when_both_are_known() {
        let with_id = |id: &str| PipelineConfig {
            id: id.to_owned(),
            application: "docta".to_owned(),
            ..PipelineConfig::default()
        };

        assert!(with_id("").is_roughly_equal(&with_id("4b1d")));
        assert!(with_id("4b1d").is_roughly_equal(&with_id("4b1d")));
        assert!(!with_id("4b1d").is_roughly_equal(&with_id("9f00")));
    }

    #[test]
    fn unparsable_configurations_are_never_equal() {
        assert!(!are_roughly_equal("variables: [", "variables: ["));
    }

    #[test]
    fn schema_is_consistent() {
        PipelineTemplateConfigResource
            .schema()
            .internal_validate()
            .expect("schema is consistent");
    }
}
