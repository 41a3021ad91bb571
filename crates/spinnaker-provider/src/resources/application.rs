use async_trait::async_trait;
use snafu::ResultExt as _;
use spinnaker_gate::{ApplicationSpec, GateClient};
use tracing::instrument;

use crate::{
    data::ResourceData,
    resource::{GateSnafu, Resource, Result},
    schema::{Attribute, Schema, ValueType},
    validation,
};

pub const TYPE_NAME: &str = "spinnaker_application";

/// Manages a Spinnaker application through `createApplication`, `updateApplication` and
/// `deleteApplication` tasks.
///
/// The resource id is the application name.
#[derive(Debug, Default)]
pub struct ApplicationResource;

impl ApplicationResource {
    fn spec(data: &ResourceData) -> ApplicationSpec {
        ApplicationSpec {
            name: data.get_str("application").to_owned(),
            email: data.get_str("email").to_owned(),
            description: data.get_str("description").to_owned(),
            instance_port: data.get_int("instance_port"),
            cloud_providers: data.get_str("cloud_providers").to_owned(),
            platform_health_only: data.get_bool("platform_health_only"),
            platform_health_only_show_override: data.get_bool("platform_health_only_show_override"),
        }
    }

    /// The application to look up: the id once known, the declared name before that.
    fn name(data: &ResourceData) -> &str {
        match data.id() {
            "" => data.get_str("application"),
            id => id,
        }
    }
}

#[async_trait]
impl Resource for ApplicationResource {
    fn schema(&self) -> Schema {
        Schema::new()
            .attribute(
                "application",
                Attribute::required(ValueType::String, "Name of the application")
                    .with_force_new()
                    .with_validator(validation::is_application_name),
            )
            .attribute(
                "email",
                Attribute::required(ValueType::String, "Email address of the application owner"),
            )
            .attribute(
                "description",
                Attribute::optional("", "Description of the application"),
            )
            .attribute(
                "instance_port",
                Attribute::optional(80, "Port the application instances listen on"),
            )
            .attribute(
                "cloud_providers",
                Attribute::optional("", "Comma separated list of cloud providers"),
            )
            .attribute(
                "platform_health_only",
                Attribute::optional(false, "Consider only platform health when deploying"),
            )
            .attribute(
                "platform_health_only_show_override",
                Attribute::optional(false, "Show the platform health override in stages"),
            )
    }

    #[instrument(skip_all, fields(application = data.get_str("application")))]
    async fn create(&self, client: &GateClient, data: &mut ResourceData) -> Result<()> {
        client
            .create_application(&Self::spec(data))
            .await
            .context(GateSnafu {
                action: "create application",
            })?;

        data.set_id(data.get_str("application").to_owned());
        self.read(client, data).await
    }

    #[instrument(skip_all, fields(application = ApplicationResource::name(data)))]
    async fn read(&self, client: &GateClient, data: &mut ResourceData) -> Result<()> {
        let result = client.get_application(Self::name(data)).await;
        let application = match result {
            Ok(application) => application,
            Err(err) if err.is_not_found() => {
                tracing::info!("application no longer exists");
                data.clear_id();
                return Ok(());
            }
            Err(err) => {
                return Err(err).context(GateSnafu {
                    action: "read application",
                });
            }
        };

        let attributes = application.attributes;
        data.set("application", application.name.clone());
        data.set("email", attributes.email);
        data.set("description", attributes.description);
        data.set("cloud_providers", attributes.cloud_providers);
        if let Some(instance_port) = attributes.instance_port {
            data.set("instance_port", instance_port);
        }
        if let Some(platform_health_only) = attributes.platform_health_only {
            data.set("platform_health_only", platform_health_only);
        }
        if let Some(show_override) = attributes.platform_health_only_show_override {
            data.set("platform_health_only_show_override", show_override);
        }
        data.set_id(application.name);

        Ok(())
    }

    #[instrument(skip_all, fields(application = data.get_str("application")))]
    async fn update(&self, client: &GateClient, data: &mut ResourceData) -> Result<()> {
        client
            .update_application(&Self::spec(data))
            .await
            .context(GateSnafu {
                action: "update application",
            })?;

        self.read(client, data).await
    }

    #[instrument(skip_all, fields(application = ApplicationResource::name(data)))]
    async fn delete(&self, client: &GateClient, data: &mut ResourceData) -> Result<()> {
        client
            .delete_application(Self::name(data))
            .await
            .context(GateSnafu {
                action: "delete application",
            })?;

        data.clear_id();
        Ok(())
    }

    async fn exists(&self, client: &GateClient, data: &ResourceData) -> Result<bool> {
        match client.get_application(Self::name(data)).await {
            Ok(application) => Ok(!application.name.is_empty()),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err).context(GateSnafu {
                action: "look up application",
            }),
        }
    }
}
