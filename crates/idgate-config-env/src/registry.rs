//! Tenant discovery, validation and resolution

use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use idgate_core::{Error, Result, TenantConfig, TenantSummary};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::region::Region;
use crate::source::SettingsSource;

pub const REGION_KEY: &str = "IDGATE_REGION";
pub const ORG_ID_KEY: &str = "IDGATE_ORG_ID";
pub const DEFAULT_ENV_KEY: &str = "IDGATE_DEFAULT_ENV";
pub const RATE_LIMIT_KEY: &str = "IDGATE_MAX_REQUESTS_PER_SECOND";
pub const MAX_RETRIES_KEY: &str = "IDGATE_MAX_RETRIES";
pub const REQUEST_TIMEOUT_KEY: &str = "IDGATE_REQUEST_TIMEOUT";
pub const DEFAULT_PAGE_SIZE_KEY: &str = "IDGATE_DEFAULT_PAGE_SIZE";
pub const MAX_PAGE_SIZE_KEY: &str = "IDGATE_MAX_PAGE_SIZE";
pub const API_BASE_URL_KEY: &str = "IDGATE_API_BASE_URL";
pub const AUTH_BASE_URL_KEY: &str = "IDGATE_AUTH_BASE_URL";

static TENANT_NAME_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^IDGATE_ENV_(\d+)_NAME$").expect("static regex"));

/// Global client settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalConfig {
    pub region: Region,
    pub organization_id: String,
    /// Canonical name of the default tenant
    pub default_tenant_name: String,
    /// Requests per second across all tenants
    #[serde(default = "default_rate_limit")]
    pub rate_limit: u32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_request_timeout", with = "duration_secs")]
    pub request_timeout: Duration,
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,
    /// Replaces the regional API base URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base_override: Option<String>,
    /// Replaces the regional auth base URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_base_override: Option<String>,
}

impl GlobalConfig {
    /// Create settings with default limits
    pub fn new(
        region: Region,
        organization_id: impl Into<String>,
        default_tenant_name: impl Into<String>,
    ) -> Self {
        Self {
            region,
            organization_id: organization_id.into(),
            default_tenant_name: default_tenant_name.into(),
            rate_limit: default_rate_limit(),
            max_retries: default_max_retries(),
            request_timeout: default_request_timeout(),
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
            api_base_override: None,
            auth_base_override: None,
        }
    }

    pub fn with_rate_limit(mut self, requests_per_second: u32) -> Self {
        self.rate_limit = requests_per_second;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_page_sizes(mut self, default_page_size: u32, max_page_size: u32) -> Self {
        self.default_page_size = default_page_size;
        self.max_page_size = max_page_size;
        self
    }

    /// Point API and auth calls at custom base URLs
    pub fn with_base_urls(mut self, api_base: impl Into<String>, auth_base: impl Into<String>) -> Self {
        self.api_base_override = Some(api_base.into());
        self.auth_base_override = Some(auth_base.into());
        self
    }

    /// Base URL for resource endpoints, without trailing slash
    pub fn api_base_url(&self) -> &str {
        self.api_base_override
            .as_deref()
            .unwrap_or(self.region.api_base_url())
            .trim_end_matches('/')
    }

    /// Base URL for token endpoints, without trailing slash
    pub fn auth_base_url(&self) -> &str {
        self.auth_base_override
            .as_deref()
            .unwrap_or(self.region.auth_base_url())
            .trim_end_matches('/')
    }

    /// Check numeric bounds
    ///
    /// # Errors
    /// - `Error::Config` naming the first setting out of range
    pub fn validate(&self) -> Result<()> {
        check_range("max_requests_per_second", self.rate_limit, 1, 100)?;
        check_range("max_retries", self.max_retries, 0, 10)?;

        let timeout = self.request_timeout.as_secs();
        if !(1..=300).contains(&timeout) || self.request_timeout.subsec_nanos() != 0 {
            return Err(Error::Config(
                "request_timeout must be between 1 and 300 seconds".to_string(),
            ));
        }

        check_range("default_page_size", self.default_page_size, 1, 1000)?;
        check_range("max_page_size", self.max_page_size, 1, 1000)?;

        if self.default_page_size > self.max_page_size {
            return Err(Error::Config(format!(
                "default_page_size ({}) cannot be greater than max_page_size ({})",
                self.default_page_size, self.max_page_size
            )));
        }

        Ok(())
    }
}

fn check_range(name: &str, value: u32, min: u32, max: u32) -> Result<()> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "{} must be between {} and {}, got {}",
            name, min, max, value
        )))
    }
}

/// Validated tenants plus global settings.
///
/// Tenants keep their discovery order, which is also the order `resolve`
/// walks them in.
#[derive(Debug, Clone)]
pub struct EnvironmentRegistry {
    global: GlobalConfig,
    tenants: Vec<TenantConfig>,
}

impl EnvironmentRegistry {
    /// Build a registry from already-parsed parts
    ///
    /// The default tenant name may be an alias; it is rewritten to the
    /// tenant's canonical name.
    ///
    /// # Errors
    /// - `Error::Config` if no tenants are given, a numeric setting is out of
    ///   range, names/aliases collide, or the default tenant does not resolve
    pub fn new(mut global: GlobalConfig, tenants: Vec<TenantConfig>) -> Result<Self> {
        if tenants.is_empty() {
            return Err(Error::Config(
                "No environments configured. Set IDGATE_ENV_1_NAME, IDGATE_ENV_1_ID, IDGATE_ENV_1_CLIENT_ID and IDGATE_ENV_1_CLIENT_SECRET".to_string(),
            ));
        }

        global.validate()?;
        check_unique_names(&tenants)?;

        let default_name = tenants
            .iter()
            .find(|t| t.matches(&global.default_tenant_name))
            .map(|t| t.name.clone())
            .ok_or_else(|| {
                let available: Vec<String> = tenants.iter().map(TenantConfig::describe).collect();
                Error::Config(format!(
                    "Default environment '{}' not found. Available environments: {}",
                    global.default_tenant_name,
                    available.join(", ")
                ))
            })?;
        global.default_tenant_name = default_name;

        info!(
            region = %global.region,
            tenants = tenants.len(),
            default = %global.default_tenant_name,
            "Configuration validation passed"
        );

        Ok(Self { global, tenants })
    }

    /// Load global settings and discover tenants from a settings source
    ///
    /// Tenant groups missing a required key are skipped with a warning.
    ///
    /// # Errors
    /// - `Error::Config` for missing required globals (all are listed),
    ///   an unknown region, unparsable numbers, or any `new` failure
    pub fn load(source: &dyn SettingsSource) -> Result<Self> {
        let region = source.get_non_empty(REGION_KEY);
        let org_id = source.get_non_empty(ORG_ID_KEY);
        let default_env = source.get_non_empty(DEFAULT_ENV_KEY);

        let (Some(region), Some(org_id), Some(default_env)) = (region, org_id, default_env) else {
            let missing: Vec<&str> = [REGION_KEY, ORG_ID_KEY, DEFAULT_ENV_KEY]
                .into_iter()
                .filter(|k| source.get_non_empty(k).is_none())
                .collect();
            return Err(Error::Config(format!(
                "Missing required settings: {}",
                missing.join(", ")
            )));
        };

        let region: Region = region.parse()?;
        let tenants = discover_tenants(source);

        let mut global = GlobalConfig::new(region, org_id, default_env);
        global.rate_limit = parse_setting(source, RATE_LIMIT_KEY, global.rate_limit)?;
        global.max_retries = parse_setting(source, MAX_RETRIES_KEY, global.max_retries)?;
        global.request_timeout = Duration::from_secs(parse_setting(
            source,
            REQUEST_TIMEOUT_KEY,
            global.request_timeout.as_secs(),
        )?);
        global.default_page_size =
            parse_setting(source, DEFAULT_PAGE_SIZE_KEY, global.default_page_size)?;
        global.max_page_size = parse_setting(source, MAX_PAGE_SIZE_KEY, global.max_page_size)?;
        global.api_base_override = source.get_non_empty(API_BASE_URL_KEY);
        global.auth_base_override = source.get_non_empty(AUTH_BASE_URL_KEY);

        Self::new(global, tenants)
    }

    /// Resolve user input to a tenant
    ///
    /// Empty input selects the default tenant. Otherwise the input is matched
    /// case-insensitively against each tenant's name and aliases, in
    /// discovery order.
    ///
    /// # Errors
    /// - `Error::TenantNotFound` listing every name and alias
    pub fn resolve(&self, input: &str) -> Result<&TenantConfig> {
        if input.trim().is_empty() {
            return Ok(self.default_tenant());
        }

        if let Some(tenant) = self.tenants.iter().find(|t| t.matches(input)) {
            debug!(input = %input, tenant = %tenant.name, "Resolved tenant");
            return Ok(tenant);
        }

        Err(Error::TenantNotFound {
            input: input.to_string(),
            available: self.tenants.iter().map(TenantConfig::describe).collect(),
        })
    }

    pub fn is_valid_tenant(&self, input: &str) -> bool {
        self.resolve(input).is_ok()
    }

    pub fn default_tenant(&self) -> &TenantConfig {
        // `new` guarantees the default name is canonical and present
        self.tenants
            .iter()
            .find(|t| t.name == self.global.default_tenant_name)
            .unwrap_or(&self.tenants[0])
    }

    pub fn global(&self) -> &GlobalConfig {
        &self.global
    }

    pub fn tenants(&self) -> &[TenantConfig] {
        &self.tenants
    }

    /// Introspection view of every tenant
    pub fn list_tenants(&self) -> Vec<TenantSummary> {
        self.tenants
            .iter()
            .map(|t| TenantSummary {
                name: t.name.clone(),
                id: t.id.clone(),
                aliases: t.aliases.clone(),
                is_default: t.name == self.global.default_tenant_name,
            })
            .collect()
    }
}

fn discover_tenants(source: &dyn SettingsSource) -> Vec<TenantConfig> {
    let indices: BTreeMap<u32, ()> = source
        .keys()
        .iter()
        .filter_map(|key| TENANT_NAME_KEY.captures(key))
        .filter_map(|caps| caps[1].parse::<u32>().ok())
        .map(|index| (index, ()))
        .collect();

    info!(indices = ?indices.keys().collect::<Vec<_>>(), "Found environment indices");

    indices
        .into_keys()
        .filter_map(|index| build_tenant(source, index))
        .collect()
}

fn build_tenant(source: &dyn SettingsSource, index: u32) -> Option<TenantConfig> {
    let key = |field: &str| format!("IDGATE_ENV_{}_{}", index, field);

    let name = source.get_non_empty(&key("NAME"));
    let id = source.get_non_empty(&key("ID"));
    let client_id = source.get_non_empty(&key("CLIENT_ID"));
    let client_secret = source.get_non_empty(&key("CLIENT_SECRET"));

    let (Some(name), Some(id), Some(client_id), Some(client_secret)) =
        (name, id, client_id, client_secret)
    else {
        let missing: Vec<String> = ["NAME", "ID", "CLIENT_ID", "CLIENT_SECRET"]
            .into_iter()
            .map(key)
            .filter(|k| source.get_non_empty(k).is_none())
            .collect();
        warn!(index, missing = ?missing, "Environment missing required fields, skipping");
        return None;
    };

    let aliases: Vec<String> = source
        .get(&key("ALIAS"))
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    info!(tenant = %name, aliases = ?aliases, "Loaded environment");
    Some(TenantConfig::new(name, id, client_id, client_secret).with_aliases(aliases))
}

fn check_unique_names(tenants: &[TenantConfig]) -> Result<()> {
    let mut seen: HashSet<String> = HashSet::new();

    for tenant in tenants {
        if !seen.insert(tenant.name.trim().to_lowercase()) {
            return Err(Error::Config(format!(
                "Environment name '{}' conflicts with another name or alias",
                tenant.name
            )));
        }
    }

    for tenant in tenants {
        for alias in &tenant.aliases {
            if !seen.insert(alias.trim().to_lowercase()) {
                return Err(Error::Config(format!(
                    "Alias '{}' in environment '{}' conflicts with another name or alias",
                    alias, tenant.name
                )));
            }
        }
    }

    Ok(())
}

fn parse_setting<T>(source: &dyn SettingsSource, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
{
    match source.get_non_empty(key) {
        None => Ok(default),
        Some(raw) => raw
            .parse::<T>()
            .map_err(|_| Error::Config(format!("{} must be a non-negative integer, got '{}'", key, raw))),
    }
}

fn default_rate_limit() -> u32 {
    50
}

fn default_max_retries() -> u32 {
    3
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_page_size() -> u32 {
    100
}

fn default_max_page_size() -> u32 {
    1000
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
