//! Drives the resource lifecycle callbacks to converge Gate towards a [`Manifest`].
//!
//! Reconciliation is split into two steps. [`Reconciler::plan`] refreshes every known object,
//! compares it against the declaration and decides on an [`Action`]. [`Reconciler::apply`] then
//! executes the plan, persisting the [`State`] after every step so an interrupted run can be
//! resumed.

use std::{collections::HashSet, fmt::Display, path::Path};

use indexmap::IndexMap;
use serde::Serialize;
use snafu::{OptionExt as _, ResultExt as _, Snafu, ensure};
use spinnaker_gate::GateClient;
use tracing::{info, instrument, warn};

use crate::{
    data::{AttributeValue, ResourceData},
    provider::Provider,
    resource::{self, DataSource, Resource},
    schema::{self, Schema},
};

pub mod manifest;
pub mod state;

pub use manifest::{Declaration, Manifest, address};
pub use state::{State, StateEntry};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("{address} is declared more than once"))]
    DuplicateAddress { address: String },

    #[snafu(display("unsupported resource type {type_name:?} ({address})"))]
    UnknownResourceType { type_name: String, address: String },

    #[snafu(display("unsupported data source type {type_name:?} ({address})"))]
    UnknownDataSourceType { type_name: String, address: String },

    #[snafu(display("invalid configuration for {address}"))]
    InvalidConfig {
        source: schema::Error,
        address: String,
    },

    #[snafu(display("failed to {action} {address}"))]
    Lifecycle {
        source: resource::Error,
        action: &'static str,
        address: String,
    },

    #[snafu(display("{address} could not be found right after it was created"))]
    CreatedObjectMissing { address: String },

    #[snafu(display("no {type_name} with id {id:?} exists"))]
    ImportNotFound { type_name: String, id: String },

    #[snafu(display("{address} is already managed, remove it from the state first"))]
    AlreadyManaged { address: String },

    #[snafu(display("failed to persist the state"))]
    PersistState { source: state::Error },
}

/// What has to happen to an object to match its declaration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, strum::Display)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    Create,
    Replace,
    Update,
    NoOp,
    Delete,
}

/// A planned action for a single address.
#[derive(Clone, Debug, Serialize)]
pub struct Change {
    pub address: String,

    #[serde(rename = "type")]
    pub type_name: String,

    pub action: Action,

    /// The attributes whose difference caused the action.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<String>,

    /// The declared attributes with defaults applied, empty for deletions.
    #[serde(skip)]
    desired: IndexMap<String, AttributeValue>,

    /// The refreshed prior state, `None` if the object does not exist (anymore).
    #[serde(skip)]
    prior: Option<StateEntry>,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct Plan {
    pub changes: Vec<Change>,
}

impl Plan {
    pub fn has_changes(&self) -> bool {
        self.changes
            .iter()
            .any(|change| change.action != Action::NoOp)
    }

    pub fn count(&self, action: Action) -> usize {
        self.changes
            .iter()
            .filter(|change| change.action == action)
            .count()
    }
}

impl Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{create} to create, {replace} to replace, {update} to update, {delete} to delete",
            create = self.count(Action::Create),
            replace = self.count(Action::Replace),
            update = self.count(Action::Update),
            delete = self.count(Action::Delete),
        )
    }
}

/// Decides how `prior` has to change to match `desired`.
///
/// Computed attributes are ignored. A difference in a `force_new` attribute requires a
/// replacement, any other difference an update.
pub fn compare(
    schema: &Schema,
    desired: &IndexMap<String, AttributeValue>,
    prior: &ResourceData,
) -> (Action, Vec<String>) {
    let changed = schema
        .iter()
        .filter(|(_, attribute)| !attribute.is_computed())
        .filter(|(name, attribute)| !attribute.is_equivalent(prior.get(name), desired.get(*name)))
        .collect::<Vec<_>>();

    let action = if changed.is_empty() {
        Action::NoOp
    } else if changed.iter().any(|(_, attribute)| attribute.force_new) {
        Action::Replace
    } else {
        Action::Update
    };

    let attributes = changed
        .into_iter()
        .map(|(name, _)| name.to_owned())
        .collect();
    (action, attributes)
}

/// Runs plans against Gate using the resources registered in a [`Provider`].
pub struct Reconciler<'a> {
    provider: &'a Provider,
    client: &'a GateClient,
}

impl<'a> Reconciler<'a> {
    pub fn new(provider: &'a Provider, client: &'a GateClient) -> Self {
        Self { provider, client }
    }

    fn resource(&self, type_name: &str, address: &str) -> Result<&'a dyn Resource> {
        self.provider
            .resource(type_name)
            .context(UnknownResourceTypeSnafu { type_name, address })
    }

    fn data_source(&self, type_name: &str, address: &str) -> Result<&'a dyn DataSource> {
        self.provider
            .data_source(type_name)
            .context(UnknownDataSourceTypeSnafu { type_name, address })
    }

    /// Reads the current server side version of a known object.
    async fn refresh(&self, address: &str, entry: &StateEntry) -> Result<Option<StateEntry>> {
        let resource = self.resource(&entry.type_name, address)?;
        let mut data = entry.data.clone();

        let exists = resource
            .exists(self.client, &data)
            .await
            .context(LifecycleSnafu {
                action: "refresh",
                address,
            })?;
        if exists {
            resource
                .read(self.client, &mut data)
                .await
                .context(LifecycleSnafu {
                    action: "refresh",
                    address,
                })?;
        } else {
            data.clear_id();
        }

        if data.is_absent() {
            info!(address, "object no longer exists on the server");
            return Ok(None);
        }
        Ok(Some(StateEntry {
            type_name: entry.type_name.clone(),
            data,
        }))
    }

    /// Compares the manifest with the refreshed state.
    ///
    /// Resources in the state but missing from the manifest are planned for deletion after all
    /// declared resources.
    #[instrument(skip_all)]
    pub async fn plan(&self, manifest: &Manifest, state: &State) -> Result<Plan> {
        let mut changes = Vec::new();
        let mut declared = HashSet::new();

        for declaration in &manifest.resources {
            let address = declaration.address();
            ensure!(
                declared.insert(address.clone()),
                DuplicateAddressSnafu { address }
            );

            let resource = self.resource(&declaration.type_name, &address)?;
            let schema = resource.schema();
            let desired = schema
                .apply(&declaration.attributes)
                .context(InvalidConfigSnafu { address: &address })?;

            let prior = match state.resources.get(&address) {
                Some(entry) => self.refresh(&address, entry).await?,
                None => None,
            };

            let (action, attributes) = match &prior {
                None => (Action::Create, desired.keys().cloned().collect()),
                Some(prior) => compare(&schema, &desired, &prior.data),
            };

            changes.push(Change {
                address,
                type_name: declaration.type_name.clone(),
                action,
                attributes,
                desired,
                prior,
            });
        }

        for (address, entry) in &state.resources {
            if declared.contains(address) {
                continue;
            }
            changes.push(Change {
                address: address.clone(),
                type_name: entry.type_name.clone(),
                action: Action::Delete,
                attributes: Vec::new(),
                desired: IndexMap::new(),
                prior: self.refresh(address, entry).await?,
            });
        }

        Ok(Plan { changes })
    }

    /// Plans the deletion of every managed object, in reverse order of creation.
    #[instrument(skip_all)]
    pub async fn plan_destroy(&self, state: &State) -> Result<Plan> {
        let mut changes = Vec::new();
        for (address, entry) in state.resources.iter().rev() {
            changes.push(Change {
                address: address.clone(),
                type_name: entry.type_name.clone(),
                action: Action::Delete,
                attributes: Vec::new(),
                desired: IndexMap::new(),
                prior: self.refresh(address, entry).await?,
            });
        }
        Ok(Plan { changes })
    }

    /// Executes `plan`, deletions last, and saves `state` to `state_path` after every step.
    #[instrument(skip_all, fields(changes = plan.changes.len()))]
    pub async fn apply(&self, plan: Plan, state: &mut State, state_path: &Path) -> Result<()> {
        let (deletions, changes): (Vec<_>, Vec<_>) = plan
            .changes
            .into_iter()
            .partition(|change| change.action == Action::Delete);

        for change in changes.into_iter().chain(deletions) {
            let Change {
                address,
                type_name,
                action,
                desired,
                prior,
                ..
            } = change;

            match (action, prior) {
                (Action::NoOp, Some(prior)) => {
                    state.resources.insert(address, prior);
                }
                (Action::Create, _) | (Action::Replace, None) | (Action::NoOp, None) => {
                    let entry = self.create(&address, &type_name, desired).await?;
                    state.resources.insert(address, entry);
                }
                (Action::Replace, Some(prior)) => {
                    self.delete(&address, prior).await?;
                    state.resources.shift_remove(&address);
                    state.save(state_path).context(PersistStateSnafu)?;

                    let entry = self.create(&address, &type_name, desired).await?;
                    state.resources.insert(address, entry);
                }
                (Action::Update, Some(prior)) => {
                    if let Some(entry) = self.update(&address, prior, desired).await? {
                        state.resources.insert(address, entry);
                    } else {
                        warn!(
                            %address,
                            "object vanished during update, dropping it from the state"
                        );
                        state.resources.shift_remove(&address);
                    }
                }
                (Action::Update, None) => {
                    warn!(%address, "object vanished before it could be updated, creating it");
                    let entry = self.create(&address, &type_name, desired).await?;
                    state.resources.insert(address, entry);
                }
                (Action::Delete, prior) => {
                    if let Some(prior) = prior {
                        self.delete(&address, prior).await?;
                    }
                    state.resources.shift_remove(&address);
                }
            }

            state.save(state_path).context(PersistStateSnafu)?;
        }

        Ok(())
    }

    async fn create(
        &self,
        address: &str,
        type_name: &str,
        desired: IndexMap<String, AttributeValue>,
    ) -> Result<StateEntry> {
        let resource = self.resource(type_name, address)?;
        let mut data = ResourceData::new(desired);

        info!(address, "creating");
        resource
            .create(self.client, &mut data)
            .await
            .context(LifecycleSnafu {
                action: "create",
                address,
            })?;
        ensure!(!data.is_absent(), CreatedObjectMissingSnafu { address });

        Ok(StateEntry {
            type_name: type_name.to_owned(),
            data,
        })
    }

    async fn update(
        &self,
        address: &str,
        prior: StateEntry,
        desired: IndexMap<String, AttributeValue>,
    ) -> Result<Option<StateEntry>> {
        let resource = self.resource(&prior.type_name, address)?;
        let mut data = prior.data;
        for (name, value) in desired {
            data.set(&name, value);
        }

        info!(address, "updating");
        resource
            .update(self.client, &mut data)
            .await
            .context(LifecycleSnafu {
                action: "update",
                address,
            })?;

        if data.is_absent() {
            return Ok(None);
        }
        Ok(Some(StateEntry {
            type_name: prior.type_name,
            data,
        }))
    }

    async fn delete(&self, address: &str, prior: StateEntry) -> Result<()> {
        let resource = self.resource(&prior.type_name, address)?;
        let mut data = prior.data;

        info!(address, "deleting");
        resource
            .delete(self.client, &mut data)
            .await
            .context(LifecycleSnafu {
                action: "delete",
                address,
            })
    }

    /// Adopts an existing object under `<type_name>.<name>`.
    #[instrument(skip(self, state, state_path))]
    pub async fn import(
        &self,
        type_name: &str,
        name: &str,
        id: &str,
        state: &mut State,
        state_path: &Path,
    ) -> Result<()> {
        let address = address(type_name, name);
        ensure!(
            !state.resources.contains_key(&address),
            AlreadyManagedSnafu { address }
        );

        let resource = self.resource(type_name, &address)?;
        let mut data = ResourceData::with_id(id);
        resource
            .import(self.client, &mut data)
            .await
            .context(LifecycleSnafu {
                action: "import",
                address: &address,
            })?;
        ensure!(!data.is_absent(), ImportNotFoundSnafu { type_name, id });

        info!(%address, "imported");
        state.resources.insert(
            address,
            StateEntry {
                type_name: type_name.to_owned(),
                data,
            },
        );
        state.save(state_path).context(PersistStateSnafu)
    }

    /// Reads every declared data source, keyed by address.
    #[instrument(skip_all)]
    pub async fn read_data_sources(
        &self,
        manifest: &Manifest,
    ) -> Result<IndexMap<String, ResourceData>> {
        let mut results = IndexMap::new();
        for declaration in &manifest.data_sources {
            let address = declaration.address();
            ensure!(
                !results.contains_key(&address),
                DuplicateAddressSnafu { address }
            );

            let data_source = self.data_source(&declaration.type_name, &address)?;
            let attributes = data_source
                .schema()
                .apply(&declaration.attributes)
                .context(InvalidConfigSnafu { address: &address })?;

            let mut data = ResourceData::new(attributes);
            data_source
                .read(self.client, &mut data)
                .await
                .context(LifecycleSnafu {
                    action: "read",
                    address: &address,
                })?;
            results.insert(address, data);
        }
        Ok(results)
    }
}
