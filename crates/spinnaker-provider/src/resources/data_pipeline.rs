use async_trait::async_trait;
use snafu::ResultExt as _;
use spinnaker_gate::GateClient;
use tracing::instrument;

use crate::{
    data::ResourceData,
    resource::{DataSource, GateSnafu, Result},
    resources::pipeline::StoredPipeline,
    schema::{Attribute, Schema, ValueType},
};

pub const TYPE_NAME: &str = "spinnaker_pipeline";

/// Looks up an existing pipeline by application and name.
///
/// Unlike the resource, a missing pipeline is an error.
#[derive(Debug, Default)]
pub struct PipelineDataSource;

#[async_trait]
impl DataSource for PipelineDataSource {
    fn schema(&self) -> Schema {
        Schema::new()
            .attribute(
                "application",
                Attribute::required(
                    ValueType::String,
                    "Name of the application owning the pipeline",
                ),
            )
            .attribute(
                "name",
                Attribute::required(ValueType::String, "Name of the pipeline"),
            )
            .attribute(
                "pipeline",
                Attribute::computed(ValueType::String, "Pipeline definition as JSON"),
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
    async fn read(&self, client: &GateClient, data: &mut ResourceData) -> Result<()> {
        let application = data.get_str("application").to_owned();
        let name = data.get_str("name").to_owned();

        let pipeline = client
            .get_pipeline(&application, &name)
            .await
            .context(GateSnafu {
                action: "look up pipeline",
            })?;
        let stored = StoredPipeline::new(pipeline)?;

        data.set("pipeline", stored.document);
        data.set("pipeline_id", stored.id);
        data.set_id(format!("{application}:{name}"));
        Ok(())
    }
}
