//! Regional endpoints of the remote API

use idgate_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    NorthAmerica,
    Europe,
    AsiaPacific,
}

impl Region {
    pub const ALL: [Region; 3] = [Region::NorthAmerica, Region::Europe, Region::AsiaPacific];

    pub fn as_str(&self) -> &'static str {
        match self {
            Region::NorthAmerica => "north_america",
            Region::Europe => "europe",
            Region::AsiaPacific => "asia_pacific",
        }
    }

    /// Base URL for resource endpoints
    pub fn api_base_url(&self) -> &'static str {
        match self {
            Region::NorthAmerica => "https://api.pingone.com",
            Region::Europe => "https://api.pingone.eu",
            Region::AsiaPacific => "https://api.pingone.asia",
        }
    }

    /// Base URL for token endpoints
    pub fn auth_base_url(&self) -> &'static str {
        match self {
            Region::NorthAmerica => "https://auth.pingone.com",
            Region::Europe => "https://auth.pingone.eu",
            Region::AsiaPacific => "https://auth.pingone.asia",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Region {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let needle = s.trim().to_lowercase();
        Region::ALL
            .into_iter()
            .find(|r| r.as_str() == needle)
            .ok_or_else(|| {
                let valid: Vec<&str> = Region::ALL.iter().map(Region::as_str).collect();
                Error::Config(format!(
                    "Invalid region '{}'. Valid regions: {}",
                    s,
                    valid.join(", ")
                ))
            })
    }
}
