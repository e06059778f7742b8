use crate::{ConfigError, WshConfig};
use regex::Regex;
use std::path::PathBuf;

pub struct ConfigLoader {
    explicit_file: Option<PathBuf>,
    search_paths: Vec<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        let mut search_paths = Vec::new();

        if let Some(home) = dirs::home_dir() {
            search_paths.push(home.join(".config/wsh/wsh.yaml"));
        }
        search_paths.push(PathBuf::from("./wsh.yaml"));

        #[cfg(unix)]
        search_paths.insert(0, PathBuf::from("/etc/wsh/wsh.yaml"));

        Self {
            explicit_file: None,
            search_paths,
        }
    }

    pub fn with_file(mut self, path: &str) -> Self {
        self.explicit_file = Some(PathBuf::from(path));
        self
    }

    pub fn load(&self) -> Result<WshConfig, ConfigError> {
        let mut config = WshConfig::default();

        if let Ok(env_path) = std::env::var("WSH_CONFIG") {
            config = self.read_file(&PathBuf::from(env_path))?;
        } else if let Some(ref explicit) = self.explicit_file {
            config = self.read_file(explicit)?;
        } else {
            for path in &self.search_paths {
                if !path.exists() {
                    continue;
                }
                match std::fs::read_to_string(path) {
                    Ok(content) => {
                        tracing::debug!(path = %path.display(), "Merging config file");
                        config = self.merge_yaml(&config, path, &content)?;
                    }
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable config file");
                    }
                }
            }
        }

        self.apply_env_overrides(&mut config);
        Self::validate(&config)?;
        Ok(config)
    }

    fn validate(config: &WshConfig) -> Result<(), ConfigError> {
        let endpoint = config.remote.endpoint.trim();
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            Ok(())
        } else {
            Err(ConfigError::BadEndpoint(endpoint.to_string()))
        }
    }

    fn read_file(&self, path: &PathBuf) -> Result<WshConfig, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.clone(),
            source: e,
        })?;
        self.parse_yaml(path, &content)
    }

    fn parse_yaml(&self, path: &std::path::Path, content: &str) -> Result<WshConfig, ConfigError> {
        let expanded = self.expand_env_vars(content);
        serde_yaml::from_str(&expanded).map_err(|source| ConfigError::Syntax {
            path: path.to_path_buf(),
            source,
        })
    }

    fn merge_yaml(
        &self,
        base: &WshConfig,
        path: &std::path::Path,
        content: &str,
    ) -> Result<WshConfig, ConfigError> {
        let overlay = self.parse_yaml(path, content)?;
        Ok(Self::merge_configs(base, &overlay))
    }

    /// Later files win field-group by field-group, but only where they differ
    /// from the compiled-in defaults.
    fn merge_configs(base: &WshConfig, overlay: &WshConfig) -> WshConfig {
        let defaults = WshConfig::default();
        let mut result = base.clone();

        if overlay.remote.endpoint != defaults.remote.endpoint {
            result.remote.endpoint.clone_from(&overlay.remote.endpoint);
        }
        if overlay.remote.token.is_some() {
            result.remote.token.clone_from(&overlay.remote.token);
        }
        if overlay.remote.timeout_secs != defaults.remote.timeout_secs {
            result.remote.timeout_secs = overlay.remote.timeout_secs;
        }
        if overlay.shell.prompt != defaults.shell.prompt {
            result.shell.prompt.clone_from(&overlay.shell.prompt);
        }
        if overlay.shell.home != defaults.shell.home {
            result.shell.home.clone_from(&overlay.shell.home);
        }
        if overlay.shell.user != defaults.shell.user {
            result.shell.user.clone_from(&overlay.shell.user);
        }
        if overlay.shell.history != defaults.shell.history {
            result.shell.history = overlay.shell.history.clone();
        }
        if overlay.logging != defaults.logging {
            result.logging = overlay.logging.clone();
        }

        result
    }

    fn expand_env_vars(&self, content: &str) -> String {
        let Ok(re) = Regex::new(r"\$\{([^}]+)\}") else {
            return content.to_string();
        };
        re.replace_all(content, |caps: &regex::Captures| {
            std::env::var(&caps[1]).unwrap_or_default()
        })
        .to_string()
    }

    fn apply_env_overrides(&self, config: &mut WshConfig) {
        if let Ok(endpoint) = std::env::var("WSH_ENDPOINT") {
            if !endpoint.is_empty() {
                config.remote.endpoint = endpoint;
            }
        }
        if let Ok(token) = std::env::var("WSH_TOKEN") {
            if !token.is_empty() {
                config.remote.token = Some(token);
            }
        }
        if let Ok(file) = std::env::var("WSH_HISTORY_FILE") {
            config.shell.history.file = file;
        }
        if let Ok(size) = std::env::var("WSH_HISTORY_SIZE") {
            match size.parse() {
                Ok(n) => config.shell.history.max_entries = n,
                Err(_) => tracing::warn!(value = %size, "Ignoring invalid WSH_HISTORY_SIZE"),
            }
        }
        if let Ok(level) = std::env::var("WSH_LOG_LEVEL") {
            match level.parse() {
                Ok(l) => config.logging.level = l,
                Err(e) => tracing::warn!(error = %e, "Ignoring invalid WSH_LOG_LEVEL"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LogLevel;
    use std::io::Write;

    #[test]
    fn expand_env_vars_works() {
        std::env::set_var("WSH_TEST_VAR_123", "hello");
        let loader = ConfigLoader::new();
        let result = loader.expand_env_vars("value: ${WSH_TEST_VAR_123}");
        assert_eq!(result, "value: hello");
        std::env::remove_var("WSH_TEST_VAR_123");
    }

    #[test]
    fn missing_env_var_becomes_empty() {
        let loader = ConfigLoader::new();
        let result = loader.expand_env_vars("value: ${WSH_NONEXISTENT_VAR_XYZ}");
        assert_eq!(result, "value: ");
    }

    #[test]
    fn history_size_override() {
        std::env::set_var("WSH_HISTORY_SIZE", "42");
        let mut config = WshConfig::default();
        ConfigLoader::new().apply_env_overrides(&mut config);
        assert_eq!(config.shell.history.max_entries, 42);
        std::env::remove_var("WSH_HISTORY_SIZE");
    }

    #[test]
    fn overlay_keeps_base_where_defaulted() {
        let mut base = WshConfig::default();
        base.remote.endpoint = "http://base:1".to_string();
        let mut overlay = WshConfig::default();
        overlay.logging.level = LogLevel::Debug;

        let merged = ConfigLoader::merge_configs(&base, &overlay);
        assert_eq!(merged.remote.endpoint, "http://base:1");
        assert_eq!(merged.logging.level, LogLevel::Debug);
    }

    #[test]
    fn explicit_file_is_loaded() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "shell:\n  home: /home/ubuntu\n  prompt: \"$ \"").unwrap();

        let config = ConfigLoader::new()
            .with_file(file.path().to_str().unwrap())
            .load()
            .unwrap();
        assert_eq!(config.shell.home, "/home/ubuntu");
        assert_eq!(config.shell.prompt, "$ ");
        assert!(config.shell.history.enabled);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let err = ConfigLoader::new()
            .with_file("/nonexistent/wsh-test.yaml")
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }

    #[test]
    fn malformed_file_names_its_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "remote: [unclosed").unwrap();
        let err = ConfigLoader::new()
            .with_file(file.path().to_str().unwrap())
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigError::Syntax { .. }));
        assert!(err.to_string().contains(&file.path().display().to_string()));
    }

    #[test]
    fn endpoint_without_scheme_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "remote:\n  endpoint: gateway:4000").unwrap();
        let err = ConfigLoader::new()
            .with_file(file.path().to_str().unwrap())
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigError::BadEndpoint(ref e) if e == "gateway:4000"));
    }
}
