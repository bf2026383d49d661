use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use chama_core::{DomainError, DomainResult, ValueObject};

/// A `resource.action` lookup key (e.g. `"members.create"`).
///
/// The key is split at the first dot: `"a.b.c"` is resource `a`, action `b.c`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PermissionKey {
    resource: String,
    action: String,
}

impl PermissionKey {
    pub fn new(resource: impl Into<String>, action: impl Into<String>) -> DomainResult<Self> {
        let resource = resource.into();
        let action = action.into();
        if resource.is_empty() || action.is_empty() {
            return Err(DomainError::validation(
                "permission key needs a non-empty resource and action",
            ));
        }
        Ok(Self { resource, action })
    }

    /// Parse a dotted key. Keys without a dot or with an empty side are rejected.
    pub fn parse(key: &str) -> DomainResult<Self> {
        let (resource, action) = key.split_once('.').ok_or_else(|| {
            DomainError::validation(format!("permission key '{key}' is not 'resource.action'"))
        })?;
        Self::new(resource, action)
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn action(&self) -> &str {
        &self.action
    }
}

impl ValueObject for PermissionKey {}

impl core::fmt::Display for PermissionKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{}", self.resource, self.action)
    }
}

impl core::str::FromStr for PermissionKey {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

type RawPermissionMap = BTreeMap<String, BTreeMap<String, bool>>;

/// A role's permission map: `resource → action → granted`.
///
/// Shape and names are validated when the map is built or deserialized, so
/// evaluation never has to deal with malformed entries. Lookups of missing
/// resources or actions answer `false`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawPermissionMap", into = "RawPermissionMap")]
pub struct PermissionMap(RawPermissionMap);

impl PermissionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate an untyped JSON permission document.
    pub fn from_json(value: serde_json::Value) -> DomainResult<Self> {
        let raw: RawPermissionMap = serde_json::from_value(value).map_err(|e| {
            DomainError::validation(format!(
                "permission map must be an object of resource -> action -> bool: {e}"
            ))
        })?;
        Self::try_from(raw)
    }

    /// Set `resource.action` to `granted`.
    pub fn set(
        &mut self,
        resource: impl Into<String>,
        action: impl Into<String>,
        granted: bool,
    ) -> DomainResult<()> {
        let key = PermissionKey::new(resource, action)?;
        validate_name(&key.resource)?;
        validate_name(&key.action)?;
        self.0
            .entry(key.resource)
            .or_default()
            .insert(key.action, granted);
        Ok(())
    }

    /// Builder form of [`set`](Self::set) granting every listed action.
    pub fn grant<I, S>(mut self, resource: &str, actions: I) -> DomainResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for action in actions {
            self.set(resource, action, true)?;
        }
        Ok(self)
    }

    /// Build from compile-time tables; names are checked by the catalogue tests.
    pub(crate) fn from_static(entries: &[(&'static str, &[&'static str])]) -> Self {
        let mut raw = RawPermissionMap::new();
        for (resource, actions) in entries {
            let slot = raw.entry((*resource).to_string()).or_default();
            for action in *actions {
                slot.insert((*action).to_string(), true);
            }
        }
        Self(raw)
    }

    pub fn allows(&self, resource: &str, action: &str) -> bool {
        self.0
            .get(resource)
            .and_then(|actions| actions.get(action))
            .copied()
            .unwrap_or(false)
    }

    pub fn allows_key(&self, key: &PermissionKey) -> bool {
        self.allows(key.resource(), key.action())
    }

    /// All granted keys, sorted.
    pub fn granted_keys(&self) -> Vec<PermissionKey> {
        self.0
            .iter()
            .flat_map(|(resource, actions)| {
                actions
                    .iter()
                    .filter(|(_, granted)| **granted)
                    .map(move |(action, _)| PermissionKey {
                        resource: resource.clone(),
                        action: action.clone(),
                    })
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(|actions| actions.is_empty())
    }
}

impl TryFrom<RawPermissionMap> for PermissionMap {
    type Error = DomainError;

    fn try_from(raw: RawPermissionMap) -> Result<Self, Self::Error> {
        for (resource, actions) in &raw {
            validate_name(resource)?;
            for action in actions.keys() {
                validate_name(action)?;
            }
        }
        Ok(Self(raw))
    }
}

impl From<PermissionMap> for RawPermissionMap {
    fn from(value: PermissionMap) -> Self {
        value.0
    }
}

fn validate_name(name: &str) -> DomainResult<()> {
    if name.trim().is_empty() {
        return Err(DomainError::validation("permission names cannot be empty"));
    }
    if name.contains('.') {
        return Err(DomainError::validation(format!(
            "permission name '{name}' cannot contain '.'"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_splits_at_first_dot() {
        let key = PermissionKey::parse("members.create").unwrap();
        assert_eq!(key.resource(), "members");
        assert_eq!(key.action(), "create");

        let nested = PermissionKey::parse("a.b.c").unwrap();
        assert_eq!(nested.resource(), "a");
        assert_eq!(nested.action(), "b.c");
    }

    #[test]
    fn parse_rejects_malformed_keys() {
        assert!(PermissionKey::parse("members").is_err());
        assert!(PermissionKey::parse(".create").is_err());
        assert!(PermissionKey::parse("members.").is_err());
    }

    #[test]
    fn from_json_accepts_well_formed_maps() {
        let map = PermissionMap::from_json(json!({
            "members": { "create": true, "delete": false },
            "reports": { "read": true }
        }))
        .unwrap();

        assert!(map.allows("members", "create"));
        assert!(!map.allows("members", "delete"));
        assert!(map.allows("reports", "read"));
        assert!(!map.allows("loans", "approve"));
    }

    #[test]
    fn from_json_rejects_non_boolean_actions() {
        let err = PermissionMap::from_json(json!({ "members": { "create": "yes" } })).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn from_json_rejects_dotted_names() {
        assert!(PermissionMap::from_json(json!({ "members.all": { "read": true } })).is_err());
        assert!(PermissionMap::from_json(json!({ "members": { "": true } })).is_err());
    }

    #[test]
    fn granted_keys_skip_explicit_denials() {
        let mut map = PermissionMap::new().grant("loans", ["read", "approve"]).unwrap();
        map.set("loans", "delete", false).unwrap();

        let keys: Vec<String> = map.granted_keys().iter().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["loans.approve", "loans.read"]);
    }

    #[test]
    fn deserialize_validates_names() {
        let ok: PermissionMap =
            serde_json::from_value(json!({ "meetings": { "read": true } })).unwrap();
        assert!(ok.allows("meetings", "read"));

        let bad = serde_json::from_value::<PermissionMap>(json!({ "a.b": { "read": true } }));
        assert!(bad.is_err());
    }
}
