//! The resources and data sources offered by the provider.

pub mod application;
pub mod data_pipeline;
pub mod pipeline;
pub mod pipeline_template;
pub mod pipeline_template_config;

pub use application::ApplicationResource;
pub use data_pipeline::PipelineDataSource;
pub use pipeline::PipelineResource;
pub use pipeline_template::PipelineTemplateResource;
pub use pipeline_template_config::{PipelineConfig, PipelineTemplateConfigResource};
