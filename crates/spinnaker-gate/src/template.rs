use http::StatusCode;
use serde::Serialize;
use serde_json::{Map, Value};
use snafu::OptionExt as _;
use tracing::instrument;

use crate::{
    client::{GateClient, decode_object, ensure_status},
    error::*,
};

impl GateClient {
    #[instrument(skip_all)]
    pub async fn create_pipeline_template<T>(&self, template: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        const OPERATION: &str = "create pipeline template";

        let response = self
            .send(
                OPERATION,
                self.http.post(self.url(&["pipelineTemplates"])?).json(template),
            )
            .await?;
        ensure_status(OPERATION, &response, &[StatusCode::OK, StatusCode::ACCEPTED])
    }

    #[instrument(skip(self))]
    pub async fn get_pipeline_template(&self, id: &str) -> Result<Map<String, Value>> {
        const OPERATION: &str = "get pipeline template";

        let response = self
            .send(OPERATION, self.http.get(self.url(&["pipelineTemplates", id])?))
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return NotFoundSnafu {
                kind: "pipeline template",
                name: id,
            }
            .fail();
        }
        ensure_status(OPERATION, &response, &[StatusCode::OK])?;

        decode_object(OPERATION, response)
            .await?
            .context(NotFoundSnafu {
                kind: "pipeline template",
                name: id,
            })
    }

    #[instrument(skip(self, template))]
    pub async fn update_pipeline_template<T>(&self, id: &str, template: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        const OPERATION: &str = "update pipeline template";

        let response = self
            .send(
                OPERATION,
                self.http
                    .post(self.url(&["pipelineTemplates", id])?)
                    .json(template),
            )
            .await?;
        ensure_status(OPERATION, &response, &[StatusCode::ACCEPTED])
    }

    #[instrument(skip(self))]
    pub async fn delete_pipeline_template(&self, id: &str) -> Result<()> {
        const OPERATION: &str = "delete pipeline template";

        let response = self
            .send(
                OPERATION,
                self.http.delete(self.url(&["pipelineTemplates", id])?),
            )
            .await?;
        ensure_status(OPERATION, &response, &[StatusCode::ACCEPTED])
    }
}
