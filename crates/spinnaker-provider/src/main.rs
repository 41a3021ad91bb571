use std::path::PathBuf;

use clap::Parser;
use snafu::{ResultExt as _, Snafu};
use spinnaker_provider::{
    cli::{Command, ImportArguments, RunArguments},
    gate::GateClient,
    provider::{self, Provider},
    reconcile::{self, Manifest, Plan, Reconciler, State, manifest, state},
    yaml,
};
use spinnaker_telemetry::{Tracing, tracing as telemetry};
use tracing::info;

const APP_NAME: &str = "spinnaker-provider";

#[derive(Debug, Snafu)]
enum Error {
    #[snafu(display("failed to initialize tracing"))]
    InitTracing { source: telemetry::Error },

    #[snafu(display("failed to load the manifest"))]
    LoadManifest { source: manifest::Error },

    #[snafu(display("failed to load the state"))]
    LoadState { source: state::Error },

    #[snafu(display("failed to configure the provider"))]
    Configure { source: provider::Error },

    #[snafu(display("failed to reconcile"))]
    Reconcile { source: reconcile::Error },

    #[snafu(display("failed to print the result"))]
    Print { source: yaml::Error },
}

type Result<T, E = Error> = std::result::Result<T, E>;

/// Everything needed by the subcommands that talk to Gate.
struct Session {
    // Keeps the subscribers installed until the session ends.
    _tracing_guard: Tracing,
    provider: Provider,
    client: GateClient,
    manifest: PathBuf,
    state: PathBuf,
}

impl Session {
    async fn start(run: RunArguments) -> Result<Self> {
        let RunArguments {
            manifest,
            state,
            provider: config,
            telemetry,
        } = run;

        let tracing_guard = Tracing::pre_configured(APP_NAME, telemetry)
            .init()
            .context(InitTracingSnafu)?;

        let provider = Provider::new();
        provider.internal_validate().context(ConfigureSnafu)?;
        let client = Provider::configure(&config)
            .await
            .context(ConfigureSnafu)?;

        Ok(Self {
            _tracing_guard: tracing_guard,
            provider,
            client,
            manifest,
            state,
        })
    }

    fn reconciler(&self) -> Reconciler<'_> {
        Reconciler::new(&self.provider, &self.client)
    }

    fn load(&self) -> Result<(Manifest, State)> {
        let manifest = Manifest::from_file(&self.manifest).context(LoadManifestSnafu)?;
        let state = State::load(&self.state).context(LoadStateSnafu)?;
        Ok((manifest, state))
    }

    async fn plan(&self) -> Result<()> {
        let (manifest, state) = self.load()?;
        let plan = self
            .reconciler()
            .plan(&manifest, &state)
            .await
            .context(ReconcileSnafu)?;
        print_plan(&plan)
    }

    async fn apply(&self) -> Result<()> {
        let (manifest, mut state) = self.load()?;
        let reconciler = self.reconciler();
        let plan = reconciler
            .plan(&manifest, &state)
            .await
            .context(ReconcileSnafu)?;
        self.execute(&reconciler, plan, &mut state).await
    }

    async fn destroy(&self) -> Result<()> {
        let mut state = State::load(&self.state).context(LoadStateSnafu)?;
        let reconciler = self.reconciler();
        let plan = reconciler
            .plan_destroy(&state)
            .await
            .context(ReconcileSnafu)?;
        self.execute(&reconciler, plan, &mut state).await
    }

    async fn execute(
        &self,
        reconciler: &Reconciler<'_>,
        plan: Plan,
        state: &mut State,
    ) -> Result<()> {
        print_plan(&plan)?;
        if !plan.has_changes() {
            info!("nothing to do, refreshing the state");
        }

        let summary = plan.to_string();
        reconciler
            .apply(plan, state, &self.state)
            .await
            .context(ReconcileSnafu)?;
        println!("Applied: {summary}");
        Ok(())
    }

    async fn import(&self, type_name: &str, name: &str, id: &str) -> Result<()> {
        let mut state = State::load(&self.state).context(LoadStateSnafu)?;
        self.reconciler()
            .import(type_name, name, id, &mut state, &self.state)
            .await
            .context(ReconcileSnafu)?;
        println!("Imported {type_name}.{name} ({id})");
        Ok(())
    }

    async fn read_data(&self) -> Result<()> {
        let manifest = Manifest::from_file(&self.manifest).context(LoadManifestSnafu)?;
        let results = self
            .reconciler()
            .read_data_sources(&manifest)
            .await
            .context(ReconcileSnafu)?;
        yaml::print(&results).context(PrintSnafu)
    }
}

fn print_plan(plan: &Plan) -> Result<()> {
    yaml::print(plan).context(PrintSnafu)?;
    println!("Plan: {plan}");
    Ok(())
}

#[snafu::report]
#[tokio::main]
async fn main() -> Result<(), Error> {
    match Command::parse() {
        Command::Schema => yaml::print(&Provider::new().schema()).context(PrintSnafu),
        Command::Plan(run) => Session::start(run).await?.plan().await,
        Command::Apply(run) => Session::start(run).await?.apply().await,
        Command::Destroy(run) => Session::start(run).await?.destroy().await,
        Command::Import(ImportArguments {
            type_name,
            name,
            id,
            common,
        }) => {
            Session::start(common)
                .await?
                .import(&type_name, &name, &id)
                .await
        }
        Command::ReadData(run) => Session::start(run).await?.read_data().await,
    }
}
