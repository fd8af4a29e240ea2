//! Environment-variable configuration for idgate
//!
//! Tenants are declared as numbered key groups (`IDGATE_ENV_<n>_NAME`,
//! `_ID`, `_CLIENT_ID`, `_CLIENT_SECRET`, `_ALIAS`) next to a handful of
//! global settings. [`EnvironmentRegistry::load`] reads them once from a
//! [`SettingsSource`], validates them and resolves user input to tenants.

pub mod region;
pub mod registry;
pub mod source;

pub use region::Region;
pub use registry::{EnvironmentRegistry, GlobalConfig};
pub use source::{FileSource, MapSource, ProcessEnv, SettingsSource};
