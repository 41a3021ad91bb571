//! A thin, authenticated client for the Spinnaker Gate REST API.
//!
//! Only the endpoints needed to manage applications, pipelines and pipeline templates are
//! covered. Every operation inspects the HTTP status code Gate answers with and maps a `404` to
//! [`Error::NotFound`], which callers use to detect objects that vanished outside of their
//! control.
//!
//! ```no_run
//! use spinnaker_gate::{GateConfig, Error};
//!
//! # async fn run() -> Result<(), Error> {
//! let client = GateConfig {
//!     endpoint: "https://gate.example.com".to_owned(),
//!     default_headers: "X-Team=platform".to_owned(),
//!     ..GateConfig::default()
//! }
//! .connect()
//! .await?;
//!
//! let application = client.get_application("docta").await?;
//! println!("{}", application.attributes.email);
//! # Ok(())
//! # }
//! ```

mod application;
mod client;
mod error;
mod pipeline;
mod task;
mod template;

pub use application::*;
pub use client::{DEFAULT_GATE_ENDPOINT, GateClient, GateConfig, USER_AGENT, parse_default_headers};
pub use error::{Error, Result};
pub use task::{Task, TaskPollPolicy, TaskRequest, TaskStatus, task_id_from_ref};
