//! Server configuration from the environment, plus the region profile set.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::recon::{Region, RegionProfile};

pub const BIND_ENV: &str = "SKULEDGER_BIND";
pub const MAX_UPLOAD_ENV: &str = "SKULEDGER_MAX_UPLOAD_MB";
pub const PROFILES_ENV: &str = "SKULEDGER_PROFILES";

pub const DEFAULT_BIND: &str = "127.0.0.1:8080";
pub const DEFAULT_MAX_UPLOAD_MB: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {name} '{value}': expected a positive number of megabytes")]
    InvalidUploadLimit { name: &'static str, value: String },
    #[error("failed to read profiles file {}: {source}", .path.display())]
    ReadProfiles {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse profiles file {}: {source}", .path.display())]
    ParseProfiles {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("profile listed under '{key}' declares region '{declared}'")]
    RegionMismatch { key: Region, declared: Region },
}

/// One profile per supported region.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionProfiles {
    pub indonesia: RegionProfile,
    pub malaysia: RegionProfile,
}

impl Default for RegionProfiles {
    fn default() -> Self {
        Self {
            indonesia: RegionProfile::indonesia(),
            malaysia: RegionProfile::malaysia(),
        }
    }
}

impl RegionProfiles {
    pub fn get(&self, region: Region) -> &RegionProfile {
        match region {
            Region::Indonesia => &self.indonesia,
            Region::Malaysia => &self.malaysia,
        }
    }

    pub fn from_yaml(text: &str, path: &Path) -> Result<Self, ConfigError> {
        let profiles: Self =
            serde_yaml::from_str(text).map_err(|source| ConfigError::ParseProfiles {
                path: path.to_path_buf(),
                source,
            })?;
        for key in [Region::Indonesia, Region::Malaysia] {
            let declared = profiles.get(key).region;
            if declared != key {
                return Err(ConfigError::RegionMismatch { key, declared });
            }
        }
        Ok(profiles)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::ReadProfiles {
            path: path.to_path_buf(),
            source,
        })?;
        let profiles = Self::from_yaml(&text, path)?;
        tracing::info!(path = %path.display(), "loaded region profiles");
        Ok(profiles)
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub max_upload_bytes: usize,
    pub profiles: RegionProfiles,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND.to_string(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_MB * 1024 * 1024,
            profiles: RegionProfiles::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the config from an arbitrary variable source; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let bind_addr = get(BIND_ENV).unwrap_or_else(|| DEFAULT_BIND.to_string());
        let max_upload_mb = match get(MAX_UPLOAD_ENV) {
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(mb) if mb > 0 => mb,
                _ => {
                    return Err(ConfigError::InvalidUploadLimit {
                        name: MAX_UPLOAD_ENV,
                        value: raw,
                    })
                }
            },
            None => DEFAULT_MAX_UPLOAD_MB,
        };
        let profiles = match get(PROFILES_ENV) {
            Some(path) => RegionProfiles::load(Path::new(&path))?,
            None => RegionProfiles::default(),
        };

        Ok(Self {
            bind_addr,
            max_upload_bytes: max_upload_mb.saturating_mul(1024 * 1024),
            profiles,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = ServerConfig::from_lookup(lookup(&[])).expect("defaults");
        assert_eq!(config.bind_addr, DEFAULT_BIND);
        assert_eq!(config.max_upload_bytes, 100 * 1024 * 1024);
        assert_eq!(config.profiles.get(Region::Malaysia).region, Region::Malaysia);
    }

    #[test]
    fn overrides_are_read() {
        let config = ServerConfig::from_lookup(lookup(&[
            (BIND_ENV, "0.0.0.0:9000"),
            (MAX_UPLOAD_ENV, "5"),
        ]))
        .expect("config");
        assert_eq!(config.bind_addr, "0.0.0.0:9000");
        assert_eq!(config.max_upload_bytes, 5 * 1024 * 1024);
    }

    #[test]
    fn bad_upload_limit_is_rejected() {
        let err = ServerConfig::from_lookup(lookup(&[(MAX_UPLOAD_ENV, "lots")]))
            .expect_err("should fail");
        assert!(err.to_string().contains("lots"));
    }

    #[test]
    fn profiles_round_trip_through_yaml() {
        let mut profiles = RegionProfiles::default();
        profiles.malaysia.currency.local_per_reference = 0.65;
        let text = serde_yaml::to_string(&profiles).expect("serialize");

        let parsed = RegionProfiles::from_yaml(&text, Path::new("profiles.yaml")).expect("parse");
        assert_eq!(parsed.malaysia.currency.local_per_reference, 0.65);
        assert_eq!(parsed.indonesia.orders.id, profiles.indonesia.orders.id);
    }

    #[test]
    fn swapped_profiles_are_rejected() {
        let profiles = RegionProfiles {
            indonesia: RegionProfile::malaysia(),
            malaysia: RegionProfile::indonesia(),
        };
        let text = serde_yaml::to_string(&profiles).expect("serialize");
        let err = RegionProfiles::from_yaml(&text, Path::new("p.yaml")).expect_err("mismatch");
        assert!(matches!(err, ConfigError::RegionMismatch { .. }));
    }
}
