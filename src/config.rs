use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "rfp-extraction";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const ENV_DATA_DIR: &str = "RFP_EXTRACT_DATA_DIR";
pub const ENV_STORAGE_ROOT: &str = "RFP_EXTRACT_STORAGE_ROOT";
pub const ENV_DATABASE: &str = "RFP_EXTRACT_DB";

/// Default tracing filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    if cfg!(debug_assertions) {
        "info,rfp_extraction=debug"
    } else {
        "info"
    }
}

/// Default data directory: the platform's local data dir, or a
/// directory next to the working directory when none exists.
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join(APP_NAME))
        .unwrap_or_else(|| PathBuf::from("rfp-extraction-data"))
}

/// Runtime configuration resolved from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    /// Root that storage locators are resolved against.
    pub storage_root: PathBuf,
    /// SQLite file holding extraction records.
    pub database_path: PathBuf,
    pub log_filter: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve configuration through an arbitrary lookup (tests pass a map).
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let data_dir = non_empty(ENV_DATA_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(default_data_dir);
        let storage_root = non_empty(ENV_STORAGE_ROOT)
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("storage"));
        let database_path = non_empty(ENV_DATABASE)
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("extractions.db"));
        let log_filter = non_empty("RUST_LOG").unwrap_or_else(|| default_log_filter().to_string());

        Self {
            data_dir,
            storage_root,
            database_path,
            log_filter,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_derive_from_data_dir() {
        let config = AppConfig::from_lookup(lookup_from(&[(ENV_DATA_DIR, "/srv/rfp")]));
        assert_eq!(config.data_dir, PathBuf::from("/srv/rfp"));
        assert_eq!(config.storage_root, PathBuf::from("/srv/rfp/storage"));
        assert_eq!(config.database_path, PathBuf::from("/srv/rfp/extractions.db"));
        assert_eq!(config.log_filter, default_log_filter());
    }

    #[test]
    fn explicit_paths_override_defaults() {
        let config = AppConfig::from_lookup(lookup_from(&[
            (ENV_DATA_DIR, "/srv/rfp"),
            (ENV_STORAGE_ROOT, "/mnt/blobs"),
            (ENV_DATABASE, "/var/lib/rfp.db"),
            ("RUST_LOG", "warn"),
        ]));
        assert_eq!(config.storage_root, PathBuf::from("/mnt/blobs"));
        assert_eq!(config.database_path, PathBuf::from("/var/lib/rfp.db"));
        assert_eq!(config.log_filter, "warn");
    }

    #[test]
    fn blank_values_are_ignored() {
        let config = AppConfig::from_lookup(lookup_from(&[(ENV_DATA_DIR, "  ")]));
        assert_eq!(config.data_dir, default_data_dir());
    }

    #[test]
    fn default_data_dir_ends_with_app_name() {
        assert!(default_data_dir().ends_with(APP_NAME) || default_data_dir().ends_with("rfp-extraction-data"));
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, "0.3.0");
    }
}
