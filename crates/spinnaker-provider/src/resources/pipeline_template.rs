use async_trait::async_trait;
use serde_json::{Map, Value};
use snafu::{ResultExt as _, ensure};
use spinnaker_gate::GateClient;
use tracing::instrument;

use crate::{
    data::ResourceData,
    diff,
    resource::{
        GateSnafu, MissingTemplateSchemaSnafu, NotAMappingSnafu, ParseDocumentSnafu,
        RenderYamlSnafu, Resource, Result,
    },
    schema::{Attribute, Schema, ValueType},
    validation, yaml,
};

pub const TYPE_NAME: &str = "spinnaker_pipeline_template";

/// Keys the server adds to every stored template.
const SERVER_MANAGED_TEMPLATE_KEYS: [&str; 2] = ["updateTs", "lastModifiedBy"];

/// Manages a (v1, declarative) pipeline template. The resource id is the template name.
#[derive(Debug, Default)]
pub struct PipelineTemplateResource;

impl PipelineTemplateResource {
    fn body(data: &ResourceData) -> Result<Map<String, Value>> {
        let document = yaml::parse(data.get_str("template")).context(ParseDocumentSnafu {
            attribute: "template",
        })?;
        let Value::Object(mut body) = document else {
            return NotAMappingSnafu {
                attribute: "template",
            }
            .fail();
        };
        ensure!(body.contains_key("schema"), MissingTemplateSchemaSnafu);

        body.insert("id".to_owned(), data.get_str("name").into());
        Ok(body)
    }

    fn template_id(data: &ResourceData) -> &str {
        match data.id() {
            "" => data.get_str("name"),
            id => id,
        }
    }
}

#[async_trait]
impl Resource for PipelineTemplateResource {
    fn schema(&self) -> Schema {
        Schema::new()
            .attribute(
                "name",
                Attribute::required(ValueType::String, "Id of the pipeline template")
                    .with_force_new()
                    .with_validator(validation::is_pipeline_template_name),
            )
            .attribute(
                "template",
                Attribute::required(ValueType::String, "Pipeline template as YAML")
                    .with_diff_suppress(diff::are_semantically_equal),
            )
            .attribute(
                "url",
                Attribute::computed(
                    ValueType::String,
                    "Reference to the template for use in templated pipelines",
                ),
            )
    }

    #[instrument(skip_all, fields(template = data.get_str("name")))]
    async fn create(&self, client: &GateClient, data: &mut ResourceData) -> Result<()> {
        let body = Self::body(data)?;
        client
            .create_pipeline_template(&body)
            .await
            .context(GateSnafu {
                action: "create pipeline template",
            })?;

        data.set_id(data.get_str("name").to_owned());
        self.read(client, data).await
    }

    #[instrument(skip_all, fields(template = PipelineTemplateResource::template_id(data)))]
    async fn read(&self, client: &GateClient, data: &mut ResourceData) -> Result<()> {
        let id = Self::template_id(data).to_owned();
        let mut template = match client.get_pipeline_template(&id).await {
            Ok(template) => template,
            Err(err) if err.is_not_found() => {
                tracing::info!("pipeline template no longer exists");
                data.clear_id();
                return Ok(());
            }
            Err(err) => {
                return Err(err).context(GateSnafu {
                    action: "read pipeline template",
                });
            }
        };

        for key in SERVER_MANAGED_TEMPLATE_KEYS {
            template.remove(key);
        }
        let document = yaml::to_string(&template).context(RenderYamlSnafu {
            attribute: "template",
        })?;

        data.set("name", id.clone());
        data.set("template", document);
        data.set("url", format!("spinnaker://{id}"));
        data.set_id(id);
        Ok(())
    }

    #[instrument(skip_all, fields(template = PipelineTemplateResource::template_id(data)))]
    async fn update(&self, client: &GateClient, data: &mut ResourceData) -> Result<()> {
        let body = Self::body(data)?;
        client
            .update_pipeline_template(Self::template_id(data), &body)
            .await
            .context(GateSnafu {
                action: "update pipeline template",
            })?;

        data.set_id(data.get_str("name").to_owned());
        self.read(client, data).await
    }

    #[instrument(skip_all, fields(template = PipelineTemplateResource::template_id(data)))]
    async fn delete(&self, client: &GateClient, data: &mut ResourceData) -> Result<()> {
        client
            .delete_pipeline_template(Self::template_id(data))
            .await
            .context(GateSnafu {
                action: "delete pipeline template",
            })?;

        data.clear_id();
        Ok(())
    }

    async fn exists(&self, client: &GateClient, data: &ResourceData) -> Result<bool> {
        let id = Self::template_id(data);
        match client.get_pipeline_template(id).await {
            Ok(template) => Ok(template.get("id").and_then(Value::as_str) == Some(id)),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err).context(GateSnafu {
                action: "look up pipeline template",
            }),
        }
    }
}
