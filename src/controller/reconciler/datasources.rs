//! # Datasources
//!
//! [`diff`] compares declared datasources with what DAS reports and returns
//! the upserts and deletes needed to converge. [`Reconciler::apply_datasource_actions`]
//! executes them and fires the change webhook for every datasource created.

use super::types::Reconciler;
use crate::provider::das::{DatasourceConfig, SystemDatasource};
use crate::provider::ClientResult;
use regex::Regex;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Category of datasources declared on Systems and Libraries
pub const DATASOURCE_CATEGORY: &str = "rest";

/// Type of datasources fed by an external loader
const DATASOURCE_TYPE_PUSH: &str = "push";

/// A datasource as currently known to DAS
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObservedDatasource {
    pub category: String,
    pub description: String,
    pub optional: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasourceAction {
    Upsert {
        id: String,
        description: String,
        /// Not observed before this reconcile
        created: bool,
    },
    Delete {
        id: String,
    },
}

/// Who owns the datasources, selects the webhook fired on creation
#[derive(Debug, Clone, Copy)]
pub enum DatasourceOwner<'a> {
    System(&'a str),
    Library(&'a str),
}

/// Compute the actions turning `observed` into `declared`
///
/// `declared` maps datasource ID to description. Without an observed set
/// (first reconcile) only upserts are produced. Observed datasources that are
/// optional or match an ignore pattern are never deleted.
pub fn diff(
    declared: &BTreeMap<String, String>,
    observed: Option<&BTreeMap<String, ObservedDatasource>>,
    ignore_patterns: &[Regex],
) -> Vec<DatasourceAction> {
    let mut actions = Vec::new();

    for (id, description) in declared {
        let current = observed.and_then(|o| o.get(id));
        let up_to_date = current.is_some_and(|c| {
            c.category == DATASOURCE_CATEGORY && &c.description == description
        });
        if !up_to_date {
            actions.push(DatasourceAction::Upsert {
                id: id.clone(),
                description: description.clone(),
                created: current.is_none(),
            });
        }
    }

    if let Some(observed) = observed {
        for (id, datasource) in observed {
            if declared.contains_key(id)
                || datasource.optional
                || ignore_patterns.iter().any(|p| p.is_match(id))
            {
                continue;
            }
            actions.push(DatasourceAction::Delete { id: id.clone() });
        }
    }

    actions
}

impl Reconciler {
    /// Collect the observed datasources referenced by a system or library
    ///
    /// The reference list carries no descriptions, so declared datasources
    /// are fetched individually. A referenced datasource that no longer exists
    /// is treated as absent.
    pub(crate) async fn observe_datasources(
        &self,
        references: &[SystemDatasource],
        declared: &BTreeMap<String, String>,
    ) -> ClientResult<BTreeMap<String, ObservedDatasource>> {
        let mut observed = BTreeMap::new();
        for reference in references {
            if declared.contains_key(&reference.id) {
                if let Some(datasource) = self.das.get_datasource(&reference.id).await? {
                    observed.insert(
                        reference.id.clone(),
                        ObservedDatasource {
                            category: datasource.category,
                            description: datasource.description,
                            optional: reference.optional,
                        },
                    );
                }
            } else {
                observed.insert(
                    reference.id.clone(),
                    ObservedDatasource {
                        category: reference.category.clone(),
                        description: String::new(),
                        optional: reference.optional,
                    },
                );
            }
        }
        Ok(observed)
    }

    pub(crate) async fn apply_datasource_actions(
        &self,
        owner: DatasourceOwner<'_>,
        actions: &[DatasourceAction],
    ) -> ClientResult<()> {
        for action in actions {
            match action {
                DatasourceAction::Upsert {
                    id,
                    description,
                    created,
                } => {
                    info!(datasource.id = id.as_str(), created, "Upserting datasource");
                    let datasource = DatasourceConfig {
                        category: DATASOURCE_CATEGORY.to_string(),
                        description: description.clone(),
                        type_: DATASOURCE_TYPE_PUSH.to_string(),
                        ..DatasourceConfig::default()
                    };
                    self.das.upsert_datasource(id, &datasource).await?;
                    if *created {
                        self.notify_datasource_created(owner, id).await;
                    }
                }
                DatasourceAction::Delete { id } => {
                    info!(datasource.id = id.as_str(), "Deleting datasource no longer declared");
                    self.das.delete_datasource(id).await?;
                }
            }
        }
        Ok(())
    }

    async fn notify_datasource_created(&self, owner: DatasourceOwner<'_>, datasource_id: &str) {
        let result = match owner {
            DatasourceOwner::System(id) => {
                self.notifier
                    .system_datasource_changed(id, datasource_id)
                    .await
            }
            DatasourceOwner::Library(id) => {
                self.notifier
                    .library_datasource_changed(id, datasource_id)
                    .await
            }
        };
        if let Err(e) = result {
            warn!(datasource.id = datasource_id, error = %e, "Datasource change notification failed");
        }
    }
}
