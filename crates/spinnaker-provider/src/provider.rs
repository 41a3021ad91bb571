//! The provider: its configuration and the registry of resources and data sources.

use indexmap::IndexMap;
use serde::Serialize;
use snafu::{ResultExt as _, Snafu};
use spinnaker_gate::{GateClient, GateConfig, TaskPollPolicy};

use crate::{
    resource::{DataSource, Resource},
    resources::{
        ApplicationResource, PipelineDataSource, PipelineResource, PipelineTemplateConfigResource,
        PipelineTemplateResource, application, data_pipeline, pipeline, pipeline_template,
        pipeline_template_config,
    },
    schema::{self, Attribute, Schema, ValueType},
};

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("must specify x509 cert/key pair"))]
    MissingX509Pair,

    #[snafu(display("failed to configure the Gate client for {server}"))]
    ConfigureClient {
        source: spinnaker_gate::Error,
        server: String,
    },

    #[snafu(display("the schema of {kind} {type_name:?} is invalid"))]
    InvalidSchema {
        source: schema::Error,
        kind: &'static str,
        type_name: &'static str,
    },
}

/// Connection settings for Gate, taken from the command line or the environment.
#[derive(Clone, Debug, PartialEq, Eq, clap::Args)]
pub struct ProviderConfig {
    /// URL for Gate
    #[arg(long, env = "GATE_URL")]
    pub server: String,

    /// x509 certificate (PEM) for authenticating to Gate
    #[arg(long, env = "GATE_X509_CERT", hide_env_values = true)]
    pub x509_cert: Option<String>,

    /// x509 private key (PEM) for authenticating to Gate
    #[arg(long, env = "GATE_X509_KEY", hide_env_values = true)]
    pub x509_key: Option<String>,

    /// Ignore certificate errors from Gate
    #[arg(
        long,
        env = "GATE_IGNORE_CERT_ERRORS",
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    pub ignore_cert_errors: bool,

    /// Headers to be passed to Gate on each request, in key=value,key2=value2 form
    #[arg(long, env = "GATE_DEFAULT_HEADERS", default_value = "")]
    pub default_headers: String,

    /// Number of times a submitted task is polled before giving up
    #[arg(
        long,
        env = "GATE_TASK_POLL_ATTEMPTS",
        default_value_t = TaskPollPolicy::DEFAULT_MAX_ATTEMPTS,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub task_poll_attempts: u32,
}

impl ProviderConfig {
    pub fn gate_config(&self) -> Result<GateConfig> {
        let (Some(x509_cert), Some(x509_key)) = (
            self.x509_cert.as_deref().filter(|cert| !cert.trim().is_empty()),
            self.x509_key.as_deref().filter(|key| !key.trim().is_empty()),
        ) else {
            return MissingX509PairSnafu.fail();
        };

        Ok(GateConfig {
            endpoint: self.server.clone(),
            default_headers: self.default_headers.clone(),
            x509_cert: Some(x509_cert.to_owned()),
            x509_key: Some(x509_key.to_owned()),
            ignore_cert_errors: self.ignore_cert_errors,
            task_poll: TaskPollPolicy {
                max_attempts: self.task_poll_attempts,
                ..TaskPollPolicy::default()
            },
        })
    }
}

/// The machine readable description of everything the provider offers.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSchema {
    pub provider: Schema,
    pub resources: IndexMap<&'static str, Schema>,
    pub data_sources: IndexMap<&'static str, Schema>,
}

/// Maps type names to their [`Resource`] and [`DataSource`] implementations.
pub struct Provider {
    resources: IndexMap<&'static str, Box<dyn Resource>>,
    data_sources: IndexMap<&'static str, Box<dyn DataSource>>,
}

impl Default for Provider {
    fn default() -> Self {
        let mut resources: IndexMap<&'static str, Box<dyn Resource>> = IndexMap::new();
        resources.insert(application::TYPE_NAME, Box::new(ApplicationResource));
        resources.insert(pipeline::TYPE_NAME, Box::new(PipelineResource));
        resources.insert(pipeline_template::TYPE_NAME, Box::new(PipelineTemplateResource));
        resources.insert(
            pipeline_template_config::TYPE_NAME,
            Box::new(PipelineTemplateConfigResource),
        );

        let mut data_sources: IndexMap<&'static str, Box<dyn DataSource>> = IndexMap::new();
        data_sources.insert(data_pipeline::TYPE_NAME, Box::new(PipelineDataSource));

        Self {
            resources,
            data_sources,
        }
    }
}

impl Provider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resource(&self, type_name: &str) -> Option<&dyn Resource> {
        self.resources.get(type_name).map(AsRef::as_ref)
    }

    pub fn data_source(&self, type_name: &str) -> Option<&dyn DataSource> {
        self.data_sources.get(type_name).map(AsRef::as_ref)
    }

    pub fn resource_types(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.resources.keys().copied()
    }

    pub fn data_source_types(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.data_sources.keys().copied()
    }

    /// The attributes accepted in the provider configuration, mirroring [`ProviderConfig`].
    pub fn config_schema() -> Schema {
        Schema::new()
            .attribute(
                "server",
                Attribute::required(ValueType::String, "URL for Gate"),
            )
            .attribute(
                "x509_cert",
                Attribute::required(
                    ValueType::String,
                    "x509 Certificate for authenticating to Gate",
                ),
            )
            .attribute(
                "x509_key",
                Attribute::required(
                    ValueType::String,
                    "x509 private key for authenticating to Gate",
                ),
            )
            .attribute(
                "ignore_cert_errors",
                Attribute::optional(true, "Ignore certificate errors from Gate"),
            )
            .attribute(
                "default_headers",
                Attribute::optional(
                    "",
                    "Headers to be passed to the gate endpoint by the client on each request",
                ),
            )
            .attribute(
                "task_poll_attempts",
                Attribute::optional(
                    i64::from(TaskPollPolicy::DEFAULT_MAX_ATTEMPTS),
                    "Number of times a submitted task is polled before giving up",
                ),
            )
    }

    pub fn schema(&self) -> ProviderSchema {
        ProviderSchema {
            provider: Self::config_schema(),
            resources: self
                .resources
                .iter()
                .map(|(type_name, resource)| (*type_name, resource.schema()))
                .collect(),
            data_sources: self
                .data_sources
                .iter()
                .map(|(type_name, data_source)| (*type_name, data_source.schema()))
                .collect(),
        }
    }

    /// Checks every registered schema for contradicting attribute settings.
    pub fn internal_validate(&self) -> Result<()> {
        Self::config_schema()
            .internal_validate()
            .context(InvalidSchemaSnafu {
                kind: "provider",
                type_name: "spinnaker",
            })?;
        for (type_name, resource) in &self.resources {
            resource
                .schema()
                .internal_validate()
                .context(InvalidSchemaSnafu {
                    kind: "resource",
                    type_name: *type_name,
                })?;
        }
        for (type_name, data_source) in &self.data_sources {
            data_source
                .schema()
                .internal_validate()
                .context(InvalidSchemaSnafu {
                    kind: "data source",
                    type_name: *type_name,
                })?;
        }
        Ok(())
    }

    /// Builds the Gate client and verifies that Gate is reachable.
    pub async fn configure(config: &ProviderConfig) -> Result<GateClient> {
        config
            .gate_config()?
            .connect()
            .await
            .context(ConfigureClientSnafu {
                server: config.server.clone(),
            })
    }
}
