//! Default role catalogue of the savings group.
//!
//! Roles are reference data owned by the profile store; this catalogue seeds
//! in-memory stores and documents what each role is expected to grant.

use chama_core::RoleId;

use crate::permissions::PermissionMap;
use crate::roles::{Role, RoleName};

/// The four roles every group starts with.
pub fn default_roles() -> Vec<Role> {
    vec![
        role(
            RoleName::CHAIRMAN,
            "Group chairman: registers members and administers roles",
            &[
                ("members", &["create", "read", "update", "delete"]),
                ("contributions", &["create", "read", "update"]),
                ("loans", &["create", "read", "update", "approve"]),
                ("meetings", &["create", "read", "update"]),
                ("reports", &["read", "export"]),
                ("settings", &["read", "update"]),
            ],
        ),
        role(
            RoleName::TREASURER,
            "Treasurer: records contributions and manages loans",
            &[
                ("members", &["read"]),
                ("contributions", &["create", "read", "update"]),
                ("loans", &["create", "read", "update"]),
                ("reports", &["read", "export"]),
            ],
        ),
        role(
            RoleName::SECRETARY,
            "Secretary: schedules meetings and keeps member records",
            &[
                ("members", &["read", "update"]),
                ("contributions", &["read"]),
                ("meetings", &["create", "read", "update"]),
                ("reports", &["read"]),
            ],
        ),
        role(
            RoleName::MEMBER,
            "Member: read access to own contributions, loans and meetings",
            &[
                ("contributions", &["read"]),
                ("loans", &["read"]),
                ("meetings", &["read"]),
            ],
        ),
    ]
}

fn role(name: RoleName, description: &str, entries: &[(&'static str, &[&'static str])]) -> Role {
    Role {
        id: RoleId::new(),
        name,
        permissions: PermissionMap::from_static(entries),
        description: Some(description.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalogue_maps_pass_validation() {
        for role in default_roles() {
            let json = serde_json::to_value(&role.permissions).unwrap();
            let revalidated = PermissionMap::from_json(json).unwrap();
            assert_eq!(revalidated, role.permissions, "role {}", role.name);
        }
    }

    #[test]
    fn only_chairman_creates_members() {
        let creators: Vec<String> = default_roles()
            .into_iter()
            .filter(|r| r.permissions.allows("members", "create"))
            .map(|r| r.name.to_string())
            .collect();
        assert_eq!(creators, vec!["chairman"]);
    }

    #[test]
    fn role_names_are_unique() {
        let mut names: Vec<String> = default_roles().iter().map(|r| r.name.to_string()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 4);
    }
}
