use http::StatusCode;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Value, json};
use tracing::instrument;

use crate::{
    client::{GateClient, decode, ensure_status},
    error::*,
    task::{Task, TaskRequest},
};

/// The application properties submitted with `createApplication` and `updateApplication` jobs.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSpec {
    pub name: String,
    pub email: String,
    pub description: String,
    pub instance_port: i64,
    pub cloud_providers: String,
    pub platform_health_only: bool,
    pub platform_health_only_show_override: bool,
}

/// An application as returned by `GET /applications/{name}`.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Application {
    pub name: String,
    pub attributes: ApplicationAttributes,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct ApplicationAttributes {
    #[serde(deserialize_with = "string_or_null")]
    pub email: String,

    #[serde(deserialize_with = "string_or_null")]
    pub description: String,

    #[serde(deserialize_with = "string_or_null")]
    pub accounts: String,

    /// Front50 stores this either as a comma separated string or as a list.
    #[serde(deserialize_with = "comma_separated")]
    pub cloud_providers: String,

    #[serde(deserialize_with = "lenient_int")]
    pub instance_port: Option<i64>,

    #[serde(deserialize_with = "lenient_bool")]
    pub platform_health_only: Option<bool>,

    #[serde(deserialize_with = "lenient_bool")]
    pub platform_health_only_show_override: Option<bool>,
}

fn string_or_null<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn comma_separated<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(providers) => providers,
        Value::Array(providers) => providers
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(","),
        _ => String::new(),
    })
}

fn lenient_int<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(number) => number.as_i64(),
        Value::String(number) => number.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(flag) => Some(flag),
        Value::String(flag) => flag.trim().parse().ok(),
        _ => None,
    })
}

impl GateClient {
    #[instrument(skip(self))]
    pub async fn get_application(&self, name: &str) -> Result<Application> {
        const OPERATION: &str = "get application";

        let response = self
            .send(OPERATION, self.http.get(self.url(&["applications", name])?))
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return NotFoundSnafu {
                kind: "application",
                name,
            }
            .fail();
        }
        ensure_status(OPERATION, &response, &[StatusCode::OK])?;
        decode(OPERATION, response).await
    }

    #[instrument(skip(self, application), fields(application = %application.name))]
    pub async fn create_application(&self, application: &ApplicationSpec) -> Result<Task> {
        self.run_task(
            "create application",
            &application_task("createApplication", "Create", &application.name, json!(application)),
        )
        .await
    }

    #[instrument(skip(self, application), fields(application = %application.name))]
    pub async fn update_application(&self, application: &ApplicationSpec) -> Result<Task> {
        self.run_task(
            "update application",
            &application_task("updateApplication", "Update", &application.name, json!(application)),
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn delete_application(&self, name: &str) -> Result<Task> {
        self.run_task(
            "delete application",
            &application_task("deleteApplication", "Delete", name, json!({ "name": name })),
        )
        .await
    }
}

fn application_task(job_type: &str, verb: &str, name: &str, application: Value) -> TaskRequest {
    TaskRequest {
        job: vec![json!({
            "type": job_type,
            "application": application,
        })],
        application: name.to_owned(),
        description: format!("{verb} Application: {name}"),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn application_task_wraps_the_job() {
        let spec = ApplicationSpec {
            name: "docta".to_owned(),
            email: "team@example.com".to_owned(),
            instance_port: 8080,
            ..ApplicationSpec::default()
        };
        let task = application_task("createApplication", "Create", "docta", json!(spec));

        assert_eq!(task.description, "Create Application: docta");
        assert_eq!(
            serde_json::to_value(&task).expect("task serializes"),
            json!({
                "application": "docta",
                "description": "Create Application: docta",
                "job": [{
                    "type": "createApplication",
                    "application": {
                        "name": "docta",
                        "email": "team@example.com",
                        "description": "",
                        "instancePort": 8080,
                        "cloudProviders": "",
                        "platformHealthOnly": false,
                        "platformHealthOnlyShowOverride": false,
                    },
                }],
            })
        );
    }

    #[test]
    fn application_attributes_are_decoded_leniently() {
        let app: Application = serde_json::from_value(json!({
            "name": "docta",
            "attributes": {
                "email": "team@example.com",
                "description": null,
                "cloudProviders": ["kubernetes", "aws"],
                "instancePort": "8080",
                "platformHealthOnly": "true",
                "updateTs": "1650000000000",
            },
        }))
        .expect("application decodes");

        assert_eq!(app.name, "docta");
        assert_eq!(app.attributes.email, "team@example.com");
        assert_eq!(app.attributes.description, "");
        assert_eq!(app.attributes.cloud_providers, "kubernetes,aws");
        assert_eq!(app.attributes.instance_port, Some(8080));
        assert_eq!(app.attributes.platform_health_only, Some(true));
        assert_eq!(app.attributes.platform_health_only_show_override, None);
    }
}
