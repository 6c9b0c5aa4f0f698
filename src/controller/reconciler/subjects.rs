//! # Subjects
//!
//! Declared principals are projected into DAS subjects and bound to the
//! managed roles. Managed subject kinds (users and claims) are exclusive to
//! the managed roles: they are stripped from every other binding on the same
//! resource. Subjects of other kinds are never touched.

use super::types::Reconciler;
use crate::config::SsoConfig;
use crate::crd::{Subject as DeclaredSubject, SubjectKind};
use crate::provider::das::{
    CreateRoleBindingRequest, Subject, SUBJECT_KIND_CLAIM, SUBJECT_KIND_USER,
};
use crate::provider::ClientResult;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// Project declared subjects into DAS subjects
///
/// Users are deduplicated by ID and groups by claim value. Groups need SSO;
/// without it they are dropped.
pub fn project(subjects: &[DeclaredSubject], sso: Option<&SsoConfig>) -> Vec<Subject> {
    let mut users = BTreeSet::new();
    let mut groups = BTreeSet::new();
    let mut projected = Vec::new();
    for subject in subjects {
        match subject.kind {
            SubjectKind::User => {
                if users.insert(subject.name.as_str()) {
                    projected.push(Subject::user(&subject.name));
                }
            }
            SubjectKind::Group => {
                let Some(sso) = sso else {
                    continue;
                };
                if groups.insert(subject.name.as_str()) {
                    projected.push(Subject::claim(
                        &sso.identity_provider,
                        &sso.jwt_groups_claim,
                        &subject.name,
                    ));
                }
            }
        }
    }
    projected
}

fn same_subject(a: &Subject, b: &Subject) -> bool {
    if a.kind != b.kind {
        return false;
    }
    match a.kind.as_str() {
        SUBJECT_KIND_CLAIM => a.claim_config == b.claim_config,
        _ => a.id == b.id,
    }
}

/// Order-independent equality by kind and identity
pub fn subjects_equal(a: &[Subject], b: &[Subject]) -> bool {
    a.len() == b.len() && a.iter().all(|x| b.iter().any(|y| same_subject(x, y)))
}

/// Desired subjects of a managed binding: the projection plus whatever
/// unmanaged subjects the binding already carries
fn merge_with_unmanaged(projected: &[Subject], current: &[Subject]) -> Vec<Subject> {
    let mut merged = projected.to_vec();
    merged.extend(current.iter().filter(|s| !s.is_managed_kind()).cloned());
    merged
}

impl Reconciler {
    /// Invite declared users missing from the user directory
    async fn invite_missing_users(&self, subjects: &[Subject]) -> ClientResult<()> {
        let wanted: Vec<&str> = subjects
            .iter()
            .filter(|s| s.kind == SUBJECT_KIND_USER)
            .filter_map(|s| s.id.as_deref())
            .collect();
        if wanted.is_empty() {
            return Ok(());
        }

        let users = self.users().await?;
        for user_id in wanted {
            if users.iter().any(|u| u.id == user_id) {
                continue;
            }
            info!(user.id = user_id, "Inviting user missing from the directory");
            let result = self.das.create_invitation(user_id).await;
            // The directory may have changed even if the call failed half-way
            self.user_cache.invalidate_all();
            result?;
        }
        Ok(())
    }

    /// Bind the declared subjects to every managed role on `resource_kind/resource_id`
    pub(crate) async fn reconcile_subjects(
        &self,
        resource_kind: &str,
        resource_id: &str,
        declared: &[DeclaredSubject],
    ) -> ClientResult<()> {
        let projected = project(declared, self.config.sso.as_ref());
        if self.config.sso.is_none() && declared.iter().any(|s| s.kind == SubjectKind::Group) {
            warn!(
                resource.id = resource_id,
                "Group subjects ignored because SSO is not configured"
            );
        }
        self.invite_missing_users(&projected).await?;

        let bindings = self.das.list_role_bindings(resource_kind, resource_id).await?;
        let managed_roles = &self.config.system_user_roles;

        for role in managed_roles {
            match bindings.iter().find(|b| &b.role_id == role) {
                None => {
                    info!(resource.id = resource_id, role = role.as_str(), "Creating role binding");
                    self.das
                        .create_role_binding(&CreateRoleBindingRequest {
                            resource_kind: resource_kind.to_string(),
                            resource_id: resource_id.to_string(),
                            role_id: role.clone(),
                            subjects: projected.clone(),
                        })
                        .await?;
                }
                Some(binding) => {
                    let desired = merge_with_unmanaged(&projected, &binding.subjects);
                    if subjects_equal(&desired, &binding.subjects) {
                        debug!(role = role.as_str(), "Role binding up to date");
                        continue;
                    }
                    info!(resource.id = resource_id, role = role.as_str(), "Updating role binding subjects");
                    self.das
                        .update_role_binding_subjects(&binding.id, &desired)
                        .await?;
                }
            }
        }

        for binding in bindings.iter().filter(|b| !managed_roles.contains(&b.role_id)) {
            if !binding.subjects.iter().any(Subject::is_managed_kind) {
                continue;
            }
            let remaining: Vec<Subject> = binding
                .subjects
                .iter()
                .filter(|s| !s.is_managed_kind())
                .cloned()
                .collect();
            info!(
                resource.id = resource_id,
                role = binding.role_id.as_str(),
                "Removing managed subjects from unmanaged role binding"
            );
            self.das
                .update_role_binding_subjects(&binding.id, &remaining)
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sso() -> SsoConfig {
        SsoConfig {
            identity_provider: "azure-ad".to_string(),
            jwt_groups_claim: "groups".to_string(),
        }
    }

    #[test]
    fn test_project_dedups() {
        let declared = vec![
            DeclaredSubject::user("a@example.com"),
            DeclaredSubject::user("a@example.com"),
            DeclaredSubject::group("admins"),
            DeclaredSubject::group("admins"),
        ];
        let projected = project(&declared, Some(&sso()));
        assert_eq!(projected.len(), 2);
        assert_eq!(projected[0], Subject::user("a@example.com"));
        assert_eq!(projected[1], Subject::claim("azure-ad", "groups", "admins"));
    }

    #[test]
    fn test_project_drops_groups_without_sso() {
        let declared = vec![
            DeclaredSubject::user("a@example.com"),
            DeclaredSubject::group("admins"),
        ];
        let projected = project(&declared, None);
        assert_eq!(projected, vec![Subject::user("a@example.com")]);
    }

    #[test]
    fn test_equal_is_order_independent() {
        let a = Subject::user("a@example.com");
        let b = Subject::claim("azure-ad", "groups", "admins");
        assert!(subjects_equal(&[a.clone(), b.clone()], &[b.clone(), a.clone()]));
        assert!(subjects_equal(&[], &[]));
    }

    #[test]
    fn test_equal_detects_kind_and_identity() {
        let user = Subject::user("admins");
        let claim = Subject::claim("azure-ad", "groups", "admins");
        assert!(!subjects_equal(&[user.clone()], &[claim]));
        assert!(!subjects_equal(&[user.clone()], &[Subject::user("other")]));
        assert!(!subjects_equal(&[user.clone()], &[user.clone(), Subject::user("b")]));
    }

    #[test]
    fn test_merge_keeps_unmanaged_subjects() {
        let token: Subject =
            serde_json::from_value(serde_json::json!({"kind": "apitoken", "id": "ci"})).unwrap();
        let current = vec![Subject::user("old@example.com"), token.clone()];
        let projected = vec![Subject::user("new@example.com")];
        let merged = merge_with_unmanaged(&projected, &current);
        assert_eq!(merged, vec![Subject::user("new@example.com"), token]);
    }
}
