//! Command line interface of the `spinnaker-provider` binary.
//!
//! Every subcommand that talks to Gate takes the same [`RunArguments`], which can also be supplied
//! through environment variables:
//!
//! ```console
//! $ export GATE_URL=https://gate.example.com
//! $ spinnaker-provider plan --manifest spinnaker.yaml
//! $ spinnaker-provider apply --manifest spinnaker.yaml --state spinnaker.state.json
//! ```
use std::path::PathBuf;

use clap::{Args, Parser};
use spinnaker_telemetry::tracing::TelemetryOptions;

use crate::provider::ProviderConfig;

/// The manifest read when `--manifest` is not given.
pub const DEFAULT_MANIFEST: &str = "spinnaker.yaml";

/// The state file used when `--state` is not given.
pub const DEFAULT_STATE: &str = "spinnaker.state.json";

#[derive(Debug, PartialEq, Eq, Parser)]
#[command(name = "spinnaker-provider", author, version, about)]
pub enum Command {
    /// Print the schema of the provider configuration, all resources and all data sources.
    Schema,

    /// Show which changes are needed to converge Gate towards the manifest.
    Plan(RunArguments),

    /// Create, update and delete objects until Gate matches the manifest.
    Apply(RunArguments),

    /// Delete every object recorded in the state.
    Destroy(RunArguments),

    /// Bring an existing object under management.
    Import(ImportArguments),

    /// Read the data sources declared in the manifest and print their attributes.
    ReadData(RunArguments),
}

impl Command {
    /// The arguments shared by all subcommands that talk to Gate.
    pub fn run_arguments(&self) -> Option<&RunArguments> {
        match self {
            Self::Schema => None,
            Self::Plan(run) | Self::Apply(run) | Self::Destroy(run) | Self::ReadData(run) => {
                Some(run)
            }
            Self::Import(import) => Some(&import.common),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Args)]
pub struct RunArguments {
    /// Path to the manifest declaring the desired resources
    #[arg(
        long,
        short = 'm',
        value_name = "FILE",
        default_value = DEFAULT_MANIFEST,
        env = "SPINNAKER_MANIFEST"
    )]
    pub manifest: PathBuf,

    /// Path to the file recording the managed objects
    #[arg(
        long,
        short = 's',
        value_name = "FILE",
        default_value = DEFAULT_STATE,
        env = "SPINNAKER_STATE"
    )]
    pub state: PathBuf,

    // IMPORTANT: All (flattened) sub structs should be placed at the end to ensure the help
    // headings are correct.
    #[command(flatten)]
    pub provider: ProviderConfig,

    #[command(flatten)]
    pub telemetry: TelemetryOptions,
}

#[derive(Debug, PartialEq, Eq, Args)]
pub struct ImportArguments {
    /// Resource type of the object, for example `spinnaker_pipeline`
    #[arg(value_name = "TYPE")]
    pub type_name: String,

    /// Name under which the object is recorded in the state
    pub name: String,

    /// Server side id of the object, for example `app:pipeline` for pipelines
    pub id: String,

    #[command(flatten)]
    pub common: RunArguments,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn verify_cli() {
        Command::command().debug_assert();
    }

    #[test]
    fn run_arguments_have_defaults() {
        let command = Command::parse_from([
            "spinnaker-provider",
            "plan",
            "--server",
            "https://gate.example.com",
        ]);

        let run = command.run_arguments().expect("plan talks to Gate");
        assert_eq!(run.manifest, PathBuf::from(DEFAULT_MANIFEST));
        assert_eq!(run.state, PathBuf::from(DEFAULT_STATE));
        assert_eq!(run.provider.server, "https://gate.example.com");
        assert!(!run.telemetry.console_log_disabled);
    }

    #[test]
    fn import_takes_positional_arguments() {
        let command = Command::parse_from([
            "spinnaker-provider",
            "import",
            "spinnaker_pipeline",
            "deploy",
            "docta:deploy",
            "--server",
            "https://gate.example.com",
            "--state",
            "/tmp/state.json",
        ]);

        let Command::Import(import) = &command else {
            panic!("expected the import subcommand, got {command:?}");
        };
        assert_eq!(import.type_name, "spinnaker_pipeline");
        assert_eq!(import.name, "deploy");
        assert_eq!(import.id, "docta:deploy");
        assert_eq!(
            command.run_arguments().map(|run| run.state.clone()),
            Some(PathBuf::from("/tmp/state.json"))
        );
    }

    #[test]
    fn schema_needs_no_server() {
        let command = Command::parse_from(["spinnaker-provider", "schema"]);
        assert_eq!(command, Command::Schema);
        assert!(command.run_arguments().is_none());
    }
}
