//! Settings for the wsh shell: gateway connection, prompt, history and logging.
//!
//! Later sources override earlier ones:
//!
//! - built-in defaults
//! - `/etc/wsh/wsh.yaml`, then `~/.config/wsh/wsh.yaml`, then `./wsh.yaml`
//! - or only the file named by `WSH_CONFIG` / `--config`, when given
//! - `WSH_ENDPOINT`, `WSH_TOKEN`, `WSH_HISTORY_FILE`, `WSH_HISTORY_SIZE`, `WSH_LOG_LEVEL`
//!
//! `${VAR}` inside a file is replaced from the environment before parsing.
//!
//! ```yaml
//! remote:
//!   endpoint: "http://10.0.0.7:4000"
//!   token: "${WSH_GATEWAY_TOKEN}"
//!
//! shell:
//!   home: /home/ubuntu
//!   history:
//!     file: "~/.wsh_history"
//!     max_entries: 500
//!
//! logging:
//!   level: debug
//! ```

#![allow(missing_docs)]

mod error;
mod loader;
mod types;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use types::*;

/// Merge every config file found in the standard locations.
pub fn load() -> Result<WshConfig, ConfigError> {
    ConfigLoader::new().load()
}

/// Read a single file, skipping the search path.
pub fn load_from_file(path: &str) -> Result<WshConfig, ConfigError> {
    ConfigLoader::new().with_file(path).load()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = WshConfig::default();
        assert_eq!(config.remote.endpoint, "http://localhost:4000");
        assert_eq!(config.shell.history.max_entries, 1000);
        assert_eq!(config.logging.level, LogLevel::Warn);
    }

    #[test]
    fn endpoint_only_yaml() {
        let yaml = r"
remote:
  endpoint: http://gateway:8080
";
        let config: WshConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.remote.endpoint, "http://gateway:8080");
        assert_eq!(config.remote.timeout_secs, 30); // default
    }

    #[test]
    fn every_field_yaml() {
        let yaml = r#"
remote:
  endpoint: "http://127.0.0.1:9000"
  token: "secret"
  timeout_secs: 5

shell:
  prompt: "> "
  home: /home/app
  user: app
  history:
    enabled: false
    file: /tmp/wsh_history
    max_entries: 50

logging:
  level: debug
  filter: "wsh=trace"
"#;
        let config: WshConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.remote.token.as_deref(), Some("secret"));
        assert_eq!(config.remote.timeout_secs, 5);
        assert_eq!(config.shell.user, "app");
        assert!(!config.shell.history.enabled);
        assert_eq!(config.shell.history.max_entries, 50);
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.logging.directive(), "wsh=trace");
    }

    #[test]
    fn log_level_parses_case_insensitively() {
        assert_eq!("WARNING".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn absolute_history_file_is_untouched() {
        let history = HistoryConfig {
            file: "/var/tmp/h".to_string(),
            ..HistoryConfig::default()
        };
        assert_eq!(history.resolved_file(), std::path::PathBuf::from("/var/tmp/h"));
    }
}
