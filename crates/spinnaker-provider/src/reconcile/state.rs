use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use snafu::{ResultExt as _, Snafu};

use crate::data::ResourceData;

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to read state {path:?}"))]
    ReadState {
        source: std::io::Error,
        path: PathBuf,
    },

    #[snafu(display("failed to parse state {path:?}"))]
    ParseState {
        source: serde_json::Error,
        path: PathBuf,
    },

    #[snafu(display("failed to serialize state"))]
    SerializeState { source: serde_json::Error },

    #[snafu(display("failed to write state {path:?}"))]
    WriteState {
        source: std::io::Error,
        path: PathBuf,
    },
}

/// The objects under management, keyed by address, as last seen on the server.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    #[serde(default)]
    pub resources: IndexMap<String, StateEntry>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateEntry {
    #[serde(rename = "type")]
    pub type_name: String,

    #[serde(flatten)]
    pub data: ResourceData,
}

impl State {
    /// Loads the state file, a missing file is an empty state.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => return Err(err).context(ReadStateSnafu { path }),
        };
        serde_json::from_str(&contents).context(ParseStateSnafu { path })
    }

    /// Writes the state file, replacing the previous one in a single rename.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut contents = serde_json::to_vec_pretty(self).context(SerializeStateSnafu)?;
        contents.push(b'\n');

        let mut staging = path.as_os_str().to_owned();
        staging.push(".tmp");
        let staging = PathBuf::from(staging);

        std::fs::write(&staging, contents).context(WriteStateSnafu { path: &staging })?;
        std::fs::rename(&staging, path).context(WriteStateSnafu { path })
    }
}
