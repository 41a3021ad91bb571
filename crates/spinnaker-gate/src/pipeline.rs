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
    /// Saves a new pipeline (or templated pipeline configuration).
    #[instrument(skip_all)]
    pub async fn create_pipeline<T>(&self, pipeline: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        const OPERATION: &str = "save pipeline";

        let response = self
            .send(OPERATION, self.http.post(self.url(&["pipelines"])?).json(pipeline))
            .await?;
        ensure_status(OPERATION, &response, &[StatusCode::OK])
    }

    /// Fetches the pipeline configuration `name` of `application`.
    ///
    /// A `404` as well as an empty body are reported as [`Error::NotFound`].
    #[instrument(skip(self))]
    pub async fn get_pipeline(&self, application: &str, name: &str) -> Result<Map<String, Value>> {
        const OPERATION: &str = "get pipeline";

        let url = self.url(&["applications", application, "pipelineConfigs", name])?;
        let response = self.send(OPERATION, self.http.get(url)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return NotFoundSnafu {
                kind: "pipeline",
                name: format!("{application}/{name}"),
            }
            .fail();
        }
        ensure_status(OPERATION, &response, &[StatusCode::OK])?;

        decode_object(OPERATION, response)
            .await?
            .context(NotFoundSnafu {
                kind: "pipeline",
                name: format!("{application}/{name}"),
            })
    }

    #[instrument(skip(self, pipeline))]
    pub async fn update_pipeline<T>(&self, id: &str, pipeline: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        const OPERATION: &str = "update pipeline";

        let response = self
            .send(OPERATION, self.http.put(self.url(&["pipelines", id])?).json(pipeline))
            .await?;
        ensure_status(OPERATION, &response, &[StatusCode::OK])
    }

    #[instrument(skip(self))]
    pub async fn delete_pipeline(&self, application: &str, name: &str) -> Result<()> {
        const OPERATION: &str = "delete pipeline";

        let response = self
            .send(
                OPERATION,
                self.http.delete(self.url(&["pipelines", application, name])?),
            )
            .await?;
        ensure_status(OPERATION, &response, &[StatusCode::OK])
    }
}
