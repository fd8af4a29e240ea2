//! Tenant records and context for multi-tenancy support

use serde::{Deserialize, Serialize};
use std::fmt;

/// A configured environment (tenant) of the remote API.
///
/// Each tenant carries its own OAuth2 client credentials. The name and
/// every alias are matched case-insensitively by the registry.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantConfig {
    /// Display name, unique across tenants (case-insensitive)
    pub name: String,
    /// Opaque tenant identifier used in URLs and token endpoints
    pub id: String,
    pub client_id: String,
    #[serde(skip_serializing)]
    pub client_secret: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl TenantConfig {
    pub fn new(
        name: impl Into<String>,
        id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            aliases: Vec::new(),
        }
    }

    /// Add aliases
    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases.extend(aliases.into_iter().map(Into::into));
        self
    }

    /// Check whether the input names this tenant, by name or alias.
    ///
    /// Matching trims the input and ignores case. Empty input never matches.
    pub fn matches(&self, input: &str) -> bool {
        let needle = input.trim().to_lowercase();
        if needle.is_empty() {
            return false;
        }

        self.name.trim().to_lowercase() == needle
            || self.aliases.iter().any(|a| a.trim().to_lowercase() == needle)
    }

    /// Render "'name' (aliases: a, b)" for error messages
    pub fn describe(&self) -> String {
        if self.aliases.is_empty() {
            format!("'{}'", self.name)
        } else {
            format!("'{}' (aliases: {})", self.name, self.aliases.join(", "))
        }
    }

    pub fn context(&self) -> TenantContext {
        TenantContext {
            name: self.name.clone(),
            id: self.id.clone(),
        }
    }
}

impl fmt::Debug for TenantConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TenantConfig")
            .field("name", &self.name)
            .field("id", &self.id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("aliases", &self.aliases)
            .finish()
    }
}

/// Tenant identity attached to every normalized result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantContext {
    pub name: String,
    pub id: String,
}

/// Introspection view of a configured tenant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantSummary {
    pub name: String,
    pub id: String,
    pub aliases: Vec<String>,
    pub is_default: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn production() -> TenantConfig {
        TenantConfig::new("Production", "env-prod", "cid", "secret").with_aliases(["prod", "PRD"])
    }

    #[test]
    fn test_matches_name_and_aliases_case_insensitive() {
        let tenant = production();
        assert!(tenant.matches("production"));
        assert!(tenant.matches("  PRODUCTION "));
        assert!(tenant.matches("Prod"));
        assert!(tenant.matches("prd"));
        assert!(!tenant.matches("dev"));
        assert!(!tenant.matches(""));
        assert!(!tenant.matches("   "));
    }

    #[test]
    fn test_matches_non_ascii_case_insensitive() {
        let tenant = TenantConfig::new("Ünternehmen", "env-u", "cid", "secret")
            .with_aliases(["Übung"]);
        assert!(tenant.matches("ünternehmen"));
        assert!(tenant.matches("ÜNTERNEHMEN"));
        assert!(tenant.matches("übung"));
        assert!(!tenant.matches("unternehmen"));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let rendered = format!("{:?}", production());
        assert!(!rendered.contains("secret\""));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_serialize_skips_secret() {
        let json = serde_json::to_value(production()).unwrap();
        assert!(json.get("client_secret").is_none());
        assert_eq!(json["id"], "env-prod");
    }

    #[test]
    fn test_describe() {
        assert_eq!(production().describe(), "'Production' (aliases: prod, PRD)");
        let bare = TenantConfig::new("Dev", "env-dev", "c", "s");
        assert_eq!(bare.describe(), "'Dev'");
    }
}
