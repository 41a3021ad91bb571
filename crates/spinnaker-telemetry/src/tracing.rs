//! Tracing subscriber setup for command line tools.
//!
//! Console logs go to stderr, stdout is reserved for command output such as plans and schemas.
//! Optionally, JSON formatted logs are also written to rolling files. Both outputs have their own
//! level filter, read from [`Tracing::CONSOLE_LOG_LEVEL`] and [`Tracing::FILE_LOG_LEVEL`].
//!
//! ```
//! use spinnaker_telemetry::tracing::{Error, TelemetryOptions, Tracing};
//!
//! fn main() -> Result<(), Error> {
//!     let _tracing_guard =
//!         Tracing::pre_configured("spinnaker-provider", TelemetryOptions::default()).init()?;
//!
//!     tracing::info!("log a message");
//!     Ok(())
//! }
//! ```

use std::path::PathBuf;

use snafu::{ResultExt as _, Snafu};
use tracing::{level_filters::LevelFilter, subscriber::SetGlobalDefaultError};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{InitError, RollingFileAppender, Rotation},
};
use tracing_subscriber::{EnvFilter, Layer, Registry, layer::SubscriberExt};

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to initialize rolling file appender in {directory:?}"))]
    InitRollingFileAppender {
        source: InitError,
        directory: PathBuf,
    },

    #[snafu(display("unable to set the global default subscriber"))]
    SetGlobalDefaultSubscriber { source: SetGlobalDefaultError },
}

/// Logging options of a command line tool.
///
/// This struct can be flattened into clap arguments if the feature `clap` is enabled.
#[cfg_attr(feature = "clap", derive(clap::Args))]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TelemetryOptions {
    /// Disable console logs.
    #[cfg_attr(feature = "clap", arg(long, env))]
    pub console_log_disabled: bool,

    /// Enable logging to files located in the specified DIRECTORY.
    #[cfg_attr(
        feature = "clap",
        arg(long, env, value_name = "DIRECTORY", group = "file_log")
    )]
    pub file_log_directory: Option<PathBuf>,

    /// Time PERIOD after which log files are rolled over.
    #[cfg_attr(
        feature = "clap",
        arg(long, env, value_name = "PERIOD", requires = "file_log")
    )]
    pub file_log_rotation_period: Option<RotationPeriod>,

    /// Maximum number of log files to keep, older files are deleted.
    #[cfg_attr(
        feature = "clap",
        arg(long, env, value_name = "COUNT", requires = "file_log")
    )]
    pub file_log_max_files: Option<usize>,
}

/// Supported periods when the log file is rolled over.
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "PascalCase")]
pub enum RotationPeriod {
    Minutely,
    Hourly,
    Daily,

    #[default]
    Never,
}

impl From<RotationPeriod> for Rotation {
    fn from(value: RotationPeriod) -> Self {
        match value {
            RotationPeriod::Minutely => Self::MINUTELY,
            RotationPeriod::Hourly => Self::HOURLY,
            RotationPeriod::Daily => Self::DAILY,
            RotationPeriod::Never => Self::NEVER,
        }
    }
}

/// Where and how rolling log files are written.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileLogSettings {
    pub directory: PathBuf,
    pub rotation_period: RotationPeriod,
    pub max_files: Option<usize>,
}

/// The configured subscribers.
///
/// The value returned by [`Tracing::init`] must be kept alive for the lifetime of the program, it
/// flushes buffered file logs when dropped. Do not bind it to `_`.
pub struct Tracing {
    service_name: &'static str,
    console_log_enabled: bool,
    file_log_settings: Option<FileLogSettings>,
    file_log_guard: Option<WorkerGuard>,
}

impl Tracing {
    /// The environment variable used to set the console log level filter.
    pub const CONSOLE_LOG_LEVEL: &str = "CONSOLE_LOG_LEVEL";
    /// The environment variable used to set the rolling file log level filter.
    pub const FILE_LOG_LEVEL: &str = "FILE_LOG_LEVEL";
    /// The suffix of the rolling log files, the prefix is the service name.
    pub const FILE_LOG_SUFFIX: &str = "tracing-rs.json";

    /// Console logs are enabled unless disabled in `options`, file logs only if a directory is
    /// given. Both default to the `INFO` level.
    pub fn pre_configured(service_name: &'static str, options: TelemetryOptions) -> Self {
        let TelemetryOptions {
            console_log_disabled,
            file_log_directory,
            file_log_rotation_period,
            file_log_max_files,
        } = options;

        Self {
            service_name,
            console_log_enabled: !console_log_disabled,
            file_log_settings: file_log_directory.map(|directory| FileLogSettings {
                directory,
                rotation_period: file_log_rotation_period.unwrap_or_default(),
                max_files: file_log_max_files,
            }),
            file_log_guard: None,
        }
    }

    /// Installs the configured subscribers as the global default.
    pub fn init(mut self) -> Result<Self> {
        let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

        if self.console_log_enabled {
            layers.push(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_filter(env_filter(Self::CONSOLE_LOG_LEVEL))
                    .boxed(),
            );
        }

        if let Some(settings) = &self.file_log_settings {
            let mut appender = RollingFileAppender::builder()
                .rotation(settings.rotation_period.into())
                .filename_prefix(self.service_name)
                .filename_suffix(Self::FILE_LOG_SUFFIX);
            if let Some(max_files) = settings.max_files {
                appender = appender.max_log_files(max_files);
            }
            let appender = appender
                .build(&settings.directory)
                .context(InitRollingFileAppenderSnafu {
                    directory: &settings.directory,
                })?;

            let (writer, guard) = tracing_appender::non_blocking(appender);
            self.file_log_guard = Some(guard);
            layers.push(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(writer)
                    .with_filter(env_filter(Self::FILE_LOG_LEVEL))
                    .boxed(),
            );
        }

        if !layers.is_empty() {
            tracing::subscriber::set_global_default(tracing_subscriber::registry().with(layers))
                .context(SetGlobalDefaultSubscriberSnafu)?;
        }

        Ok(self)
    }
}

/// Reads the filter directives from `env_var`, falling back to `INFO`.
fn env_filter(env_var: &str) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .with_env_var(env_var)
        .from_env_lossy()
}
