use async_trait::async_trait;
use serde_json::{Map, Value};
use snafu::ResultExt as _;
use spinnaker_gate::GateClient;
use tracing::instrument;

use crate::{
    data::ResourceData,
    diff,
    resource::{
        GateSnafu, NotAMappingSnafu, ParseDocumentSnafu, RenderJsonSnafu, Resource, Result,
        split_id,
    },
    schema::{Attribute, Schema, ValueType},
    validation, yaml,
};

pub const TYPE_NAME: &str = "spinnaker_pipeline";

/// Manages a pipeline definition of an application.
///
/// The resource id is `<application>:<name>`, the server side id is exposed as `pipeline_id`.
#[derive(Debug, Default)]
pub struct PipelineResource;

/// A stored pipeline with the server managed keys removed.
#[derive(Debug)]
pub(crate) struct StoredPipeline {
    pub id: String,
    pub document: String,
}

impl StoredPipeline {
    /// Renders a pipeline returned by Gate as JSON.
    pub(crate) fn new(pipeline: Map<String, Value>) -> Result<Self> {
        let id = pipeline
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();
        let document = serde_json::to_string(&diff::strip_server_managed(pipeline))
            .context(RenderJsonSnafu {
                attribute: "pipeline",
            })?;

        Ok(Self { id, document })
    }
}

/// Fetches a pipeline, `None` if it does not exist.
pub(crate) async fn fetch_pipeline(
    client: &GateClient,
    application: &str,
    name: &str,
) -> Result<Option<StoredPipeline>> {
    match client.get_pipeline(application, name).await {
        Ok(pipeline) => StoredPipeline::new(pipeline).map(Some),
        Err(err) if err.is_not_found() => Ok(None),
        Err(err) => Err(err).context(GateSnafu {
            action: "read pipeline",
        }),
    }
}

impl PipelineResource {
    /// Builds the request body from the declared definition, application and name.
    fn body(data: &ResourceData) -> Result<Map<String, Value>> {
        let document = yaml::parse(data.get_str("pipeline")).context(ParseDocumentSnafu {
            attribute: "pipeline",
        })?;
        let Value::Object(mut body) = document else {
            return NotAMappingSnafu {
                attribute: "pipeline",
            }
            .fail();
        };

        body.insert("application".to_owned(), data.get_str("application").into());
        body.insert("name".to_owned(), data.get_str("name").into());
        Ok(body)
    }

    async fn pipeline_id(client: &GateClient, data: &ResourceData) -> Result<String> {
        match data.get_str("pipeline_id") {
            "" => {
                let (application, name) = split_id(data.id())?;
                let stored = fetch_pipeline(client, application, name).await?;
                Ok(stored.map(|stored| stored.id).unwrap_or_default())
            }
            id => Ok(id.to_owned()),
        }
    }
}

#[async_trait]
impl Resource for PipelineResource {
    fn schema(&self) -> Schema {
        Schema::new()
            .attribute(
                "application",
                Attribute::required(
                    ValueType::String,
                    "Name of the application owning the pipeline",
                )
                .with_force_new()
                .with_validator(validation::is_application_name),
            )
            .attribute(
                "name",
                Attribute::required(ValueType::String, "Name of the pipeline"),
            )
            .attribute(
                "pipeline",
                Attribute::required(ValueType::String, "Pipeline definition as JSON or YAML")
                    .with_diff_suppress(diff::are_equivalent_pipelines),
            )
            .attribute(
                "pipeline_id",
                Attribute::computed(ValueType::String, "Id assigned to the pipeline by Spinnaker"),
            )
    }

    #[instrument(
        skip_all,
        fields(application = data.get_str("application"), pipeline = data.get_str("name"))
    )]
    async fn create(&self, client: &GateClient, data: &mut ResourceData) -> Result<()> {
        let body = Self::body(data)?;
        client
            .create_pipeline(&body)
            .await
            .context(GateSnafu {
                action: "create pipeline",
            })?;

        data.set_id(format!(
            "{}:{}",
            data.get_str("application"),
            data.get_str("name")
        ));
        self.read(client, data).await
    }

    #[instrument(skip_all, fields(id = data.id()))]
    async fn read(&self, client: &GateClient, data: &mut ResourceData) -> Result<()> {
        let (application, name) = split_id(data.id())?;
        let (application, name) = (application.to_owned(), name.to_owned());

        let Some(stored) = fetch_pipeline(client, &application, &name).await? else {
            tracing::info!("pipeline no longer exists");
            data.clear_id();
            return Ok(());
        };

        data.set("application", application);
        data.set("name", name);
        data.set("pipeline", stored.document);
        data.set("pipeline_id", stored.id);
        Ok(())
    }

    #[instrument(skip_all, fields(id = data.id()))]
    async fn update(&self, client: &GateClient, data: &mut ResourceData) -> Result<()> {
        let pipeline_id = Self::pipeline_id(client, data).await?;
        if pipeline_id.is_empty() {
            tracing::warn!("pipeline vanished before it could be updated");
            data.clear_id();
            return Ok(());
        }

        let mut body = Self::body(data)?;
        body.insert("id".to_owned(), pipeline_id.clone().into());
        client
            .update_pipeline(&pipeline_id, &body)
            .await
            .context(GateSnafu {
                action: "update pipeline",
            })?;

        data.set_id(format!(
            "{}:{}",
            data.get_str("application"),
            data.get_str("name")
        ));
        self.read(client, data).await
    }

    #[instrument(skip_all, fields(id = data.id()))]
    async fn delete(&self, client: &GateClient, data: &mut ResourceData) -> Result<()> {
        let (application, name) = split_id(data.id())?;
        client
            .delete_pipeline(application, name)
            .await
            .context(GateSnafu {
                action: "delete pipeline",
            })?;

        data.clear_id();
        Ok(())
    }

    async fn exists(&self, client: &GateClient, data: &ResourceData) -> Result<bool> {
        let (application, name) = split_id(data.id())?;
        Ok(fetch_pipeline(client, application, name).await?.is_some())
    }
}
