//! Permission evaluation over a loaded role set.
//!
//! - No IO
//! - No panics
//! - Default deny: unknown resources, actions or malformed keys answer `false`
//!
//! Authorization is the union of every active assignment's permission map, so
//! adding a role can only grant and removing one can only revoke.

use serde::Serialize;

use crate::permissions::PermissionKey;
use crate::roles::AssignedRole;

/// True iff any role grants `key` (`"resource.action"`).
///
/// The key is split at the first dot only. Extra segments are not dropped:
/// `"members.create.extra"` asks for action `create.extra`, which no
/// permission map can contain, so it is denied rather than read as
/// `members.create`.
pub fn has_permission(roles: &[AssignedRole], key: &str) -> bool {
    let Some((resource, action)) = key.split_once('.') else {
        return false;
    };
    roles.iter().any(|role| role.permissions.allows(resource, action))
}

/// True iff any assignment's role name equals `role_name` exactly.
pub fn has_role(roles: &[AssignedRole], role_name: &str) -> bool {
    roles.iter().any(|role| role.name.as_str() == role_name)
}

// ─────────────────────────────────────────────────────────────────────────────
// Authorization Explanation
// ─────────────────────────────────────────────────────────────────────────────

/// Detailed explanation of an authorization decision.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationExplanation {
    /// The permission key that was being checked.
    pub required_permission: String,

    pub granted: bool,

    /// Human-readable reason for the decision.
    pub reason: String,

    /// Names of all active roles considered.
    pub roles: Vec<String>,

    /// Roles whose map grants the key.
    pub granting_roles: Vec<String>,

    /// Every key granted by the union of roles, sorted.
    pub effective_permissions: Vec<String>,

    pub denial_reason: Option<DenialReason>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DenialReason {
    pub kind: DenialKind,
    pub message: String,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialKind {
    MalformedKey,
    NoActiveRoles,
    MissingPermission,
}

/// Explain why `key` would be granted or denied for `roles`.
///
/// Agrees with [`has_permission`] on `granted` for every input.
pub fn explain_authorization(roles: &[AssignedRole], key: &str) -> AuthorizationExplanation {
    let role_names: Vec<String> = roles.iter().map(|r| r.name.to_string()).collect();

    let mut effective: Vec<String> = roles
        .iter()
        .flat_map(|r| r.permissions.granted_keys())
        .map(|k| k.to_string())
        .collect();
    effective.sort();
    effective.dedup();

    let parsed = match PermissionKey::parse(key) {
        Ok(parsed) => parsed,
        Err(_) => {
            return AuthorizationExplanation {
                required_permission: key.to_string(),
                granted: false,
                reason: format!("'{key}' is not a 'resource.action' permission key"),
                roles: role_names,
                granting_roles: Vec::new(),
                effective_permissions: effective,
                denial_reason: Some(DenialReason {
                    kind: DenialKind::MalformedKey,
                    message: "Permission keys must have the form 'resource.action'".to_string(),
                    suggestions: vec!["Check the key passed to the guard for typos".to_string()],
                }),
            };
        }
    };

    let granting_roles: Vec<String> = roles
        .iter()
        .filter(|r| r.permissions.allows_key(&parsed))
        .map(|r| r.name.to_string())
        .collect();

    if !granting_roles.is_empty() {
        return AuthorizationExplanation {
            required_permission: key.to_string(),
            granted: true,
            reason: format!("Granted by role(s) {granting_roles:?}"),
            roles: role_names,
            granting_roles,
            effective_permissions: effective,
            denial_reason: None,
        };
    }

    let denial_reason = if roles.is_empty() {
        DenialReason {
            kind: DenialKind::NoActiveRoles,
            message: "Principal is authenticated but holds no active role".to_string(),
            suggestions: vec![format!(
                "Ask the chairman to assign a role that grants '{key}'"
            )],
        }
    } else {
        DenialReason {
            kind: DenialKind::MissingPermission,
            message: format!("Missing required permission: '{key}'"),
            suggestions: vec![
                format!("Assign a role that grants the '{key}' permission"),
                format!(
                    "Set '{}' -> '{}' to true in one of the roles {:?}",
                    parsed.resource(),
                    parsed.action(),
                    role_names
                ),
            ],
        }
    };

    AuthorizationExplanation {
        required_permission: key.to_string(),
        granted: false,
        reason: format!("No active role grants '{key}'. Current permissions: {effective:?}"),
        roles: role_names,
        granting_roles: Vec::new(),
        effective_permissions: effective,
        denial_reason: Some(denial_reason),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::PermissionMap;
    use crate::roles::RoleName;
    use chama_core::{AssignmentId, RoleId};
    use proptest::prelude::*;

    fn assigned(name: &'static str, map: PermissionMap) -> AssignedRole {
        AssignedRole {
            assignment_id: AssignmentId::new(),
            role_id: RoleId::new(),
            name: RoleName::new(name),
            permissions: map,
        }
    }

    fn treasurer() -> AssignedRole {
        assigned(
            "treasurer",
            PermissionMap::new()
                .grant("contributions", ["create", "read"])
                .unwrap(),
        )
    }

    fn chairman() -> AssignedRole {
        assigned(
            "chairman",
            PermissionMap::new().grant("members", ["create"]).unwrap(),
        )
    }

    #[test]
    fn union_of_roles_grants() {
        let roles = vec![treasurer(), chairman()];
        assert!(has_permission(&roles, "contributions.create"));
        assert!(has_permission(&roles, "members.create"));
        assert!(!has_permission(&roles, "members.delete"));
    }

    #[test]
    fn explicit_false_is_denied() {
        let mut map = PermissionMap::new();
        map.set("loans", "approve", false).unwrap();
        let roles = vec![assigned("member", map)];
        assert!(!has_permission(&roles, "loans.approve"));
    }

    #[test]
    fn malformed_keys_are_denied() {
        let roles = vec![chairman()];
        assert!(!has_permission(&roles, "members"));
        assert!(!has_permission(&roles, ""));
        assert!(!has_permission(&roles, "members.create.extra"));
        assert!(has_permission(&roles, "members.create"));
        assert!(!explain_authorization(&roles, "members.create.extra").granted);
    }

    #[test]
    fn has_role_is_case_sensitive() {
        let roles = vec![chairman()];
        assert!(has_role(&roles, "chairman"));
        assert!(!has_role(&roles, "Chairman"));
        assert!(!has_role(&roles, "treasurer"));
    }

    #[test]
    fn explanation_names_granting_roles() {
        let roles = vec![treasurer(), chairman()];
        let explanation = explain_authorization(&roles, "members.create");
        assert!(explanation.granted);
        assert_eq!(explanation.granting_roles, vec!["chairman"]);
        assert!(explanation.denial_reason.is_none());
        assert!(explanation
            .effective_permissions
            .contains(&"contributions.read".to_string()));
    }

    #[test]
    fn explanation_distinguishes_denials() {
        let none = explain_authorization(&[], "members.create");
        assert_eq!(none.denial_reason.unwrap().kind, DenialKind::NoActiveRoles);

        let missing = explain_authorization(&[treasurer()], "members.create");
        assert_eq!(missing.denial_reason.unwrap().kind, DenialKind::MissingPermission);

        let malformed = explain_authorization(&[treasurer()], "members");
        assert_eq!(malformed.denial_reason.unwrap().kind, DenialKind::MalformedKey);
    }

    fn name_strategy() -> impl Strategy<Value = String> {
        "[a-z]{1,8}"
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: with no active roles nothing is granted.
        #[test]
        fn empty_role_set_denies_everything(key in ".*", role in ".*") {
            prop_assert!(!has_permission(&[], &key));
            prop_assert!(!has_role(&[], &role));
        }

        /// Property: keys absent from every map are denied, never a panic.
        #[test]
        fn unknown_keys_default_deny(resource in name_strategy(), action in name_strategy()) {
            let roles = vec![treasurer(), chairman()];
            let known = (resource == "contributions" && (action == "create" || action == "read"))
                || (resource == "members" && action == "create");
            let key = format!("{resource}.{action}");
            prop_assert_eq!(has_permission(&roles, &key), known);
        }

        /// Property: explanation and evaluator always agree.
        #[test]
        fn explanation_agrees_with_evaluator(key in "[a-z.]{0,20}") {
            let roles = vec![treasurer(), chairman()];
            prop_assert_eq!(explain_authorization(&roles, &key).granted, has_permission(&roles, &key));
        }

        /// Property: adding a role never revokes, removing it restores the prior answer.
        #[test]
        fn adding_a_role_only_grants(resource in name_strategy(), action in name_strategy()) {
            let key = format!("{resource}.{action}");
            let base = vec![treasurer()];
            let before = has_permission(&base, &key);

            let mut extended = base.clone();
            extended.push(assigned(
                "extra",
                PermissionMap::new().grant(&resource, [action.clone()]).unwrap(),
            ));
            prop_assert!(has_permission(&extended, &key));
            prop_assert!(before <= has_permission(&extended, &key));

            extended.pop();
            prop_assert_eq!(has_permission(&extended, &key), before);
        }
    }
}
