//! The lifecycle contract every managed object implements.
//!
//! The reconciler only talks to [`Resource`] and [`DataSource`] trait objects, looked up by type
//! name in the [`Provider`](crate::provider::Provider).

use async_trait::async_trait;
use snafu::Snafu;
use spinnaker_gate::GateClient;

use crate::{data::ResourceData, schema::Schema, yaml};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("failed to {action}"))]
    Gate {
        source: spinnaker_gate::Error,
        action: &'static str,
    },

    #[snafu(display("failed to parse {attribute:?}"))]
    ParseDocument {
        source: yaml::Error,
        attribute: &'static str,
    },

    #[snafu(display("{attribute:?} must contain a mapping at the top level"))]
    NotAMapping { attribute: &'static str },

    #[snafu(display("only pipeline template configurations are supported"))]
    MissingTemplateSchema,

    #[snafu(display("{field} not set in pipeline configuration"))]
    MissingPipelineConfigField { field: &'static str },

    #[snafu(display("failed to decode pipeline configuration"))]
    DecodePipelineConfig { source: serde_json::Error },

    #[snafu(display("failed to render {attribute:?}"))]
    RenderYaml {
        source: yaml::Error,
        attribute: &'static str,
    },

    #[snafu(display("failed to render {attribute:?}"))]
    RenderJson {
        source: serde_json::Error,
        attribute: &'static str,
    },

    #[snafu(display("invalid id {id:?}, expected <application>:<name>"))]
    InvalidId { id: String },
}

impl Error {
    /// Returns `true` if the error was caused by a missing remote object.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Gate { source, .. } if source.is_not_found())
    }
}

/// A Spinnaker object whose lifecycle is managed declaratively.
///
/// All callbacks receive the configured [`GateClient`] and the current [`ResourceData`]. Create
/// and update finish by reading the object back, read clears the id if the object vanished.
#[async_trait]
pub trait Resource: Send + Sync {
    fn schema(&self) -> Schema;

    async fn create(&self, client: &GateClient, data: &mut ResourceData) -> Result<()>;

    async fn read(&self, client: &GateClient, data: &mut ResourceData) -> Result<()>;

    async fn update(&self, client: &GateClient, data: &mut ResourceData) -> Result<()>;

    async fn delete(&self, client: &GateClient, data: &mut ResourceData) -> Result<()>;

    async fn exists(&self, client: &GateClient, data: &ResourceData) -> Result<bool>;

    /// Adopts an existing object whose id has been set on `data`.
    ///
    /// The default implementation passes the id through and reads the object.
    async fn import(&self, client: &GateClient, data: &mut ResourceData) -> Result<()> {
        self.read(client, data).await
    }
}

/// Read-only lookup of an object not managed by this provider.
#[async_trait]
pub trait DataSource: Send + Sync {
    fn schema(&self) -> Schema;

    async fn read(&self, client: &GateClient, data: &mut ResourceData) -> Result<()>;
}

/// Splits a `<application>:<name>` id at the first colon.
pub(crate) fn split_id(id: &str) -> Result<(&str, &str)> {
    match id.split_once(':') {
        Some((application, name)) if !application.is_empty() && !name.is_empty() => {
            Ok((application, name))
        }
        _ => InvalidIdSnafu { id }.fail(),
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("docta:deploy", ("docta", "deploy"))]
    #[case("docta:Build and Deploy", ("docta", "Build and Deploy"))]
    #[case("docta:deploy:v2", ("docta", "deploy:v2"))]
    fn ids_are_split_at_the_first_colon(#[case] id: &str, #[case] expected: (&str, &str)) {
        assert_eq!(split_id(id).expect("valid id"), expected);
    }

    #[rstest]
    #[case("docta")]
    #[case(":deploy")]
    #[case("docta:")]
    fn malformed_ids_are_rejected(#[case] id: &str) {
        assert!(matches!(split_id(id), Err(Error::InvalidId { .. })));
    }
}
