use std::time::Duration;

use serde_json::json;
use spinnaker_gate::{ApplicationSpec, Error, GateClient, GateConfig, TaskPollPolicy, USER_AGENT};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_partial_json, header, method, path},
};

fn config(server: &MockServer) -> GateConfig {
    GateConfig {
        endpoint: server.uri(),
        task_poll: TaskPollPolicy {
            max_attempts: 3,
            base_delay: Duration::ZERO,
        },
        ..GateConfig::default()
    }
}

fn client(server: &MockServer) -> GateClient {
    config(server).build().expect("client builds")
}

async fn mount_task_submission(server: &MockServer, description: &str) {
    Mock::given(method("POST"))
        .and(path("/tasks"))
        .and(body_partial_json(json!({ "description": description })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ref": "/tasks/01HXTASK" })))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn connect_checks_the_version_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/version"))
        .and(header("x-team", "platform"))
        .and(header("user-agent", USER_AGENT))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "version": "1.34.0" })))
        .expect(1)
        .mount(&server)
        .await;

    GateConfig {
        default_headers: "X-Team=platform".to_owned(),
        ..config(&server)
    }
    .connect()
    .await
    .expect("Gate is reachable");
}

#[tokio::test]
async fn connect_fails_when_gate_is_unhealthy() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/version"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = config(&server).connect().await.expect_err("Gate is unhealthy");
    assert!(matches!(err, Error::Unreachable { .. }));
}

#[tokio::test]
async fn get_application_decodes_attributes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/applications/docta"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "docta",
            "attributes": {
                "email": "team@example.com",
                "description": "My application",
                "instancePort": 8080,
                "cloudProviders": "kubernetes",
            },
        })))
        .mount(&server)
        .await;

    let application = client(&server)
        .get_application("docta")
        .await
        .expect("application exists");

    assert_eq!(application.name, "docta");
    assert_eq!(application.attributes.description, "My application");
    assert_eq!(application.attributes.instance_port, Some(8080));
}

#[tokio::test]
async fn get_application_reports_missing_applications() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/applications/ghost"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = client(&server)
        .get_application("ghost")
        .await
        .expect_err("application is missing");
    assert!(err.is_not_found());
}

#[tokio::test]
async fn create_application_polls_until_the_task_succeeds() {
    let server = MockServer::start().await;
    mount_task_submission(&server, "Create Application: docta").await;

    Mock::given(method("GET"))
        .and(path("/tasks/01HXTASK"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "RUNNING" })))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/tasks/01HXTASK"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "SUCCEEDED" })))
        .expect(1)
        .mount(&server)
        .await;

    let task = client(&server)
        .create_application(&ApplicationSpec {
            name: "docta".to_owned(),
            email: "team@example.com".to_owned(),
            instance_port: 80,
            ..ApplicationSpec::default()
        })
        .await
        .expect("task succeeds");

    assert_eq!(task["status"], "SUCCEEDED");
}

#[tokio::test]
async fn terminal_tasks_are_reported_as_failures() {
    let server = MockServer::start().await;
    mount_task_submission(&server, "Delete Application: docta").await;
    Mock::given(method("GET"))
        .and(path("/tasks/01HXTASK"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "TERMINAL" })))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server)
        .delete_application("docta")
        .await
        .expect_err("task is terminal");
    assert!(matches!(err, Error::TaskFailed { ref status, .. } if status == "TERMINAL"));
}

#[tokio::test]
async fn polling_gives_up_after_the_attempt_cap() {
    let server = MockServer::start().await;
    mount_task_submission(&server, "Update Application: docta").await;
    Mock::given(method("GET"))
        .and(path("/tasks/01HXTASK"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "RUNNING" })))
        .expect(3)
        .mount(&server)
        .await;

    let err = client(&server)
        .update_application(&ApplicationSpec {
            name: "docta".to_owned(),
            ..ApplicationSpec::default()
        })
        .await
        .expect_err("task never completes");
    assert!(matches!(err, Error::TaskIncomplete { attempts: 3, .. }));
}

#[tokio::test]
async fn task_submission_without_reference_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tasks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let err = client(&server)
        .delete_application("docta")
        .await
        .expect_err("no task reference");
    assert!(matches!(err, Error::MissingTaskRef { .. }));
}

#[tokio::test]
async fn pipeline_names_are_percent_encoded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/applications/docta/pipelineConfigs/Build%20and%20Deploy"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "8f2c",
            "name": "Build and Deploy",
            "application": "docta",
        })))
        .mount(&server)
        .await;

    let pipeline = client(&server)
        .get_pipeline("docta", "Build and Deploy")
        .await
        .expect("pipeline exists");
    assert_eq!(pipeline["id"], "8f2c");
}

#[tokio::test]
async fn empty_pipeline_bodies_are_treated_as_missing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/applications/docta/pipelineConfigs/deploy"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/applications/docta/pipelineConfigs/null"))
        .respond_with(ResponseTemplate::new(200).set_body_string("null"))
        .mount(&server)
        .await;

    let client = client(&server);
    for name in ["deploy", "null"] {
        let err = client
            .get_pipeline("docta", name)
            .await
            .expect_err("pipeline is missing");
        assert!(err.is_not_found(), "{name}: {err}");
    }
}

#[tokio::test]
async fn pipeline_writes_check_the_status_code() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/pipelines"))
        .and(body_partial_json(json!({ "name": "deploy" })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/pipelines/8f2c"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/pipelines/docta/deploy"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = client(&server);
    let pipeline = json!({ "name": "deploy", "application": "docta" });
    client.create_pipeline(&pipeline).await.expect("pipeline saved");
    client
        .update_pipeline("8f2c", &pipeline)
        .await
        .expect("pipeline updated");

    let err = client
        .delete_pipeline("docta", "deploy")
        .await
        .expect_err("server error");
    assert!(matches!(err, Error::UnexpectedStatus { status: 500, .. }));
}

#[tokio::test]
async fn pipeline_templates_expect_accepted_responses() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/pipelineTemplates"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/pipelineTemplates/build-image"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/pipelineTemplates/build-image"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/pipelineTemplates/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = client(&server);
    let template = json!({ "id": "build-image", "schema": "1" });

    client
        .create_pipeline_template(&template)
        .await
        .expect("template created");

    let err = client
        .update_pipeline_template("build-image", &template)
        .await
        .expect_err("update only accepts 202");
    assert!(matches!(err, Error::UnexpectedStatus { status: 200, .. }));

    client
        .delete_pipeline_template("build-image")
        .await
        .expect("template deleted");

    let err = client
        .get_pipeline_template("missing")
        .await
        .expect_err("template is missing");
    assert!(err.is_not_found());
}
