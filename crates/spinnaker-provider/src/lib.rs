//! Declarative management of Spinnaker objects through the Gate API.
//!
//! The provider offers four resources and one data source:
//!
//! - `spinnaker_application` ([`resources::ApplicationResource`])
//! - `spinnaker_pipeline` ([`resources::PipelineResource`])
//! - `spinnaker_pipeline_template` ([`resources::PipelineTemplateResource`])
//! - `spinnaker_pipeline_template_config` ([`resources::PipelineTemplateConfigResource`])
//! - `spinnaker_pipeline` data source ([`resources::PipelineDataSource`])
//!
//! Resources are declared in a [`Manifest`](reconcile::Manifest) and converged by the
//! [`Reconciler`](reconcile::Reconciler), which records what it manages in a
//! [`State`](reconcile::State) file.

pub mod cli;
pub mod data;
pub mod diff;
pub mod provider;
pub mod reconcile;
pub mod resource;
pub mod resources;
pub mod schema;
pub mod validation;
pub mod yaml;

pub use data::{AttributeValue, ResourceData};
pub use provider::{Provider, ProviderConfig};
pub use resource::{DataSource, Resource};
pub use spinnaker_gate as gate;
