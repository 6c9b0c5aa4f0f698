//! # Conditions
//!
//! Each reconcile phase owns one condition type. Conditions are independent:
//! setting one never touches another, and none of them is used to skip work.
//!
//! [`Conditions`] is an immutable keyed map; [`Conditions::set`] returns the
//! updated map instead of mutating shared status in place.

use crate::crd::Condition;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConditionType {
    // Hosted plane
    CreatedInDas,
    GitCredentialsUpdated,
    SubjectsUpdated,
    DatasourcesUpdated,
    SystemConfigUpdated,
    OpaTokenUpdated,
    OpaConfigMapUpdated,
    SlpConfigMapUpdated,
    // Self-hosted plane
    SourcesUpdated,
    BundleUpdated,
    S3CredentialsUpdated,
    OpaSecretUpdated,
}

impl ConditionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionType::CreatedInDas => "CreatedInDAS",
            ConditionType::GitCredentialsUpdated => "GitCredentialsUpdated",
            ConditionType::SubjectsUpdated => "SubjectsUpdated",
            ConditionType::DatasourcesUpdated => "DatasourcesUpdated",
            ConditionType::SystemConfigUpdated => "SystemConfigUpdated",
            ConditionType::OpaTokenUpdated => "OPATokenUpdated",
            ConditionType::OpaConfigMapUpdated => "OPAConfigMapUpdated",
            ConditionType::SlpConfigMapUpdated => "SLPConfigMapUpdated",
            ConditionType::SourcesUpdated => "SourcesUpdated",
            ConditionType::BundleUpdated => "BundleUpdated",
            ConditionType::S3CredentialsUpdated => "S3CredentialsUpdated",
            ConditionType::OpaSecretUpdated => "OPASecretUpdated",
        }
    }
}

impl std::fmt::Display for ConditionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conditions(BTreeMap<String, Condition>);

impl Conditions {
    pub fn from_status(conditions: &[Condition]) -> Self {
        Self(
            conditions
                .iter()
                .map(|c| (c.r#type.clone(), c.clone()))
                .collect(),
        )
    }

    /// Return a copy with `type_` set to `status`
    ///
    /// The transition time only moves when the boolean flips, so re-applying
    /// the same outcome yields an identical map.
    #[must_use]
    pub fn set(&self, type_: ConditionType, status: bool, message: Option<&str>, now: &str) -> Self {
        let key = type_.as_str().to_string();
        let status_str = if status { "True" } else { "False" };
        let last_transition_time = match self.0.get(&key) {
            Some(existing) if existing.status == status_str => existing.last_transition_time.clone(),
            _ => Some(now.to_string()),
        };
        let condition = Condition {
            r#type: key.clone(),
            status: status_str.to_string(),
            last_transition_time,
            reason: Some(if status { "Succeeded" } else { "Failed" }.to_string()),
            message: message.map(str::to_string),
        };
        let mut next = self.0.clone();
        next.insert(key, condition);
        Self(next)
    }

    pub fn get(&self, type_: ConditionType) -> Option<bool> {
        self.0.get(type_.as_str()).map(|c| c.status == "True")
    }

    pub fn into_vec(self) -> Vec<Condition> {
        self.0.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_returns_new_state() {
        let empty = Conditions::default();
        let next = empty.set(ConditionType::CreatedInDas, true, None, "t1");
        assert_eq!(empty.get(ConditionType::CreatedInDas), None);
        assert_eq!(next.get(ConditionType::CreatedInDas), Some(true));
    }

    #[test]
    fn test_conditions_are_independent() {
        let conditions = Conditions::default()
            .set(ConditionType::CreatedInDas, true, None, "t1")
            .set(ConditionType::SubjectsUpdated, false, Some("boom"), "t1");
        assert_eq!(conditions.get(ConditionType::CreatedInDas), Some(true));
        assert_eq!(conditions.get(ConditionType::SubjectsUpdated), Some(false));
        assert_eq!(conditions.get(ConditionType::DatasourcesUpdated), None);
    }

    #[test]
    fn test_transition_time_moves_only_on_flip() {
        let first = Conditions::default().set(ConditionType::BundleUpdated, true, None, "t1");
        let same = first.set(ConditionType::BundleUpdated, true, None, "t2");
        assert_eq!(first, same);

        let flipped = same.set(ConditionType::BundleUpdated, false, Some("err"), "t3");
        let condition = flipped
            .into_vec()
            .into_iter()
            .find(|c| c.r#type == "BundleUpdated")
            .unwrap();
        assert_eq!(condition.last_transition_time.as_deref(), Some("t3"));
        assert_eq!(condition.message.as_deref(), Some("err"));
    }

    #[test]
    fn test_round_trip_through_status() {
        let conditions = Conditions::default().set(ConditionType::OpaTokenUpdated, true, None, "t1");
        let restored = Conditions::from_status(&conditions.clone().into_vec());
        assert_eq!(restored, conditions);
    }
}
