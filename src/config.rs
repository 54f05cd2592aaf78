use std::{env, fs, path::PathBuf, time::Duration};

use crate::prelude::*;
use crate::snapshot::ProviderKind;
use nestify::nest;
use proctree_shared::{DEFAULT_MAX_DEPTH, ProcessDataFlags};
use serde::{Deserialize, Serialize};

nest! {
    #[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]*
    #[serde(rename_all = "kebab-case", default)]*
    /// Persistent configuration of the proctree CLI.
    ///
    /// Stored at `~/.config/proctree/config.yaml` following the XDG Base Directory
    /// Specification. Every key is optional; a missing file yields
    /// [`ProctreeConfig::default`].
    pub struct ProctreeConfig {
        pub query: pub struct QueryConfig {
            /// Depth bound of tree and list queries
            pub max_depth: i32,
            /// Attributes requested when no CLI flag asks for any
            pub flags: ProcessDataFlags,
        },
        pub cpu: pub struct CpuConfig {
            pub sample_interval_ms: u64,
        },
        pub provider: ProviderKind,
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            flags: ProcessDataFlags::NONE,
        }
    }
}

impl Default for CpuConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: 1000,
        }
    }
}

impl Default for ProctreeConfig {
    fn default() -> Self {
        Self {
            query: QueryConfig::default(),
            cpu: CpuConfig::default(),
            provider: ProviderKind::default(),
        }
    }
}

/// Get the path to the configuration file, following the XDG Base Directory Specification
/// at https://specifications.freedesktop.org/basedir-spec/basedir-spec-latest.html
///
/// If config_name is None, returns ~/.config/proctree/config.yaml (default)
/// If config_name is Some, returns ~/.config/proctree/{config_name}.yaml
fn get_configuration_file_path(config_name: Option<&str>) -> Result<PathBuf> {
    let config_dir = match env::var("XDG_CONFIG_HOME") {
        Ok(config_home) => PathBuf::from(config_home),
        Err(_) => {
            let home = env::var("HOME").context("Neither XDG_CONFIG_HOME nor HOME is set")?;
            PathBuf::from(home).join(".config")
        }
    };
    let config_dir = config_dir.join("proctree");

    Ok(match config_name {
        Some(name) => config_dir.join(format!("{name}.yaml")),
        None => config_dir.join("config.yaml"),
    })
}

impl ProctreeConfig {
    /// Load the configuration. If it does not exist, return a default configuration.
    ///
    /// A `max_depth_override` replaces the configured `query.max-depth`.
    pub fn load_with_override(
        config_name: Option<&str>,
        max_depth_override: Option<i32>,
    ) -> Result<Self> {
        let config_path = get_configuration_file_path(config_name)?;

        let mut config = match fs::read(&config_path) {
            Ok(config_str) => {
                let config: ProctreeConfig =
                    serde_yaml::from_slice(&config_str).context(format!(
                        "Failed to parse proctree config at {}",
                        config_path.display()
                    ))?;
                debug!("Config loaded from {}", config_path.display());
                config
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Config file not found at {}", config_path.display());
                ProctreeConfig::default()
            }
            Err(e) => bail!("Failed to load config: {e}"),
        };

        if let Some(max_depth) = max_depth_override {
            config.query.max_depth = max_depth;
        }

        Ok(config)
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.cpu.sample_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use temp_env::with_vars;
    use tempfile::TempDir;

    fn write_config(config_home: &Path, file_name: &str, content: &str) {
        let dir = config_home.join("proctree");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(file_name), content).unwrap();
    }

    fn load_from(config_home: &Path, config_name: Option<&str>) -> Result<ProctreeConfig> {
        with_vars(
            [("XDG_CONFIG_HOME", Some(config_home.as_os_str()))],
            || ProctreeConfig::load_with_override(config_name, None),
        )
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let config_home = TempDir::new().unwrap();
        let config = load_from(config_home.path(), None).unwrap();

        assert_eq!(config, ProctreeConfig::default());
        assert_eq!(config.query.max_depth, 10);
        assert_eq!(config.sample_interval(), Duration::from_secs(1));
        assert_eq!(config.provider, ProviderKind::Auto);
    }

    #[test]
    fn test_default_serialization() {
        insta::assert_json_snapshot!(ProctreeConfig::default(), @r#"
        {
          "query": {
            "max-depth": 10,
            "flags": 0
          },
          "cpu": {
            "sample-interval-ms": 1000
          },
          "provider": "auto"
        }
        "#);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let config_home = TempDir::new().unwrap();
        write_config(
            config_home.path(),
            "config.yaml",
            "query:\n  max-depth: 3\nprovider: sysinfo\n",
        );

        let config = load_from(config_home.path(), None).unwrap();
        assert_eq!(config.query.max_depth, 3);
        assert_eq!(config.query.flags, ProcessDataFlags::NONE);
        assert_eq!(config.cpu.sample_interval_ms, 1000);
        assert_eq!(config.provider, ProviderKind::Sysinfo);
    }

    #[test]
    fn test_named_config_and_flags() {
        let config_home = TempDir::new().unwrap();
        write_config(
            config_home.path(),
            "ci.yaml",
            "query:\n  flags: 3\ncpu:\n  sample-interval-ms: 250\n",
        );

        let config = load_from(config_home.path(), Some("ci")).unwrap();
        assert_eq!(
            config.query.flags,
            ProcessDataFlags::MEMORY | ProcessDataFlags::COMMAND_LINE
        );
        assert_eq!(config.sample_interval(), Duration::from_millis(250));

        // The default file is untouched by the named one
        let config = load_from(config_home.path(), None).unwrap();
        assert_eq!(config, ProctreeConfig::default());
    }

    #[test]
    fn test_max_depth_override_wins() {
        let config_home = TempDir::new().unwrap();
        write_config(config_home.path(), "config.yaml", "query:\n  max-depth: 3\n");

        let config = with_vars(
            [("XDG_CONFIG_HOME", Some(config_home.path().as_os_str()))],
            || ProctreeConfig::load_with_override(None, Some(-1)),
        )
        .unwrap();
        assert_eq!(config.query.max_depth, -1);
    }

    #[test]
    fn test_parse_error_names_the_file() {
        let config_home = TempDir::new().unwrap();
        write_config(config_home.path(), "config.yaml", "query: [not, a, map]\n");

        let err = load_from(config_home.path(), None).unwrap_err();
        assert!(format!("{err:#}").contains("proctree/config.yaml"));
    }

    #[test]
    fn test_home_fallback() {
        let home = TempDir::new().unwrap();
        write_config(&home.path().join(".config"), "config.yaml", "provider: procfs\n");

        let config = with_vars(
            [
                ("XDG_CONFIG_HOME", None),
                ("HOME", Some(home.path().as_os_str())),
            ],
            || ProctreeConfig::load_with_override(None, None),
        )
        .unwrap();
        assert_eq!(config.provider, ProviderKind::Procfs);
    }
}
