//! Loads [`agent_manager::AgentManagerOptions`] from a TOML file, layered
//! with `AGENT_MANAGER_*` environment variable overrides.

use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use agent_manager::AgentManagerOptions;
use agent_model_registry::ModelSettings;

use crate::error::ConfigError;
use crate::schema::AgentManagerConfigFile;

/// Default location a host looks for its config file, relative to the
/// process's working directory.
#[must_use]
pub fn default_config_path() -> PathBuf {
    PathBuf::from("./agent_manager.toml")
}

/// Loads [`AgentManagerOptions`] from `path`, falling back to defaults for
/// any field the file omits, then applies `AGENT_MANAGER_*` environment
/// overrides, then validates the result.
///
/// A missing file at `path` is not an error: the file is treated as empty so
/// every field falls back to its default (or env override).
///
/// `fallback_model_settings` is used as `defaultModelSettings` when neither
/// the file nor the environment sets one.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] if `path` exists but cannot be read,
/// [`ConfigError::Parse`] if its contents are not valid TOML or do not match
/// the expected schema, [`ConfigError::InvalidEnvVar`] if an override
/// variable is set but cannot be parsed, or [`ConfigError::Invalid`] if the
/// merged configuration fails validation (e.g. `maxAgents == 0`).
pub fn load(path: impl AsRef<Path>, fallback_model_settings: ModelSettings) -> Result<AgentManagerOptions, ConfigError> {
    let path = path.as_ref();
    let file = match std::fs::read_to_string(path) {
        Ok(contents) => toml::from_str::<AgentManagerConfigFile>(&contents).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source: Box::new(source),
        })?,
        Err(source) if source.kind() == std::io::ErrorKind::NotFound => AgentManagerConfigFile::default(),
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.display().to_string(),
                source,
            });
        }
    };

    let default_model_settings = file.default_model_settings.unwrap_or(fallback_model_settings);
    let mut options = AgentManagerOptions::new(default_model_settings);

    if let Some(max_agents) = file.max_agents {
        options.max_agents = max_agents;
    }
    if let Some(max_agents_per_namespace) = file.max_agents_per_namespace {
        options.max_agents_per_namespace = max_agents_per_namespace;
    }
    if let Some(default_max_steps) = file.default_max_steps {
        options.default_max_steps = default_max_steps;
    }
    if let Some(max_steps_cap) = file.max_steps_cap {
        options.max_steps_cap = max_steps_cap;
    }
    if let Some(agent_data_directory) = file.agent_data_directory {
        options.agent_data_directory = agent_data_directory;
    }
    if let Some(auto_save_conversations) = file.auto_save_conversations {
        options.auto_save_conversations = auto_save_conversations;
    }
    if let Some(default_kernel_type) = file.default_kernel_type {
        options.default_kernel_type = Some(default_kernel_type);
    }
    if let Some(allow_custom_models) = file.allow_custom_models {
        options.allow_custom_models = allow_custom_models;
    }
    if let Some(allowed_models) = file.allowed_models {
        options.allowed_models = Some(allowed_models);
    }
    if let Some(default_model_id) = file.default_model_id {
        options.default_model_id = Some(default_model_id);
    }

    apply_env_overrides(&mut options)?;
    validate(&options)?;
    Ok(options)
}

fn env_var<T>(name: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(value) => value
            .parse()
            .map(Some)
            .map_err(|err: T::Err| ConfigError::InvalidEnvVar {
                name: name.to_owned(),
                value,
                reason: err.to_string(),
            }),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(env::VarError::NotUnicode(_)) => Err(ConfigError::InvalidEnvVar {
            name: name.to_owned(),
            value: String::from("<non-unicode>"),
            reason: String::from("environment variable is not valid UTF-8"),
        }),
    }
}

fn apply_env_overrides(options: &mut AgentManagerOptions) -> Result<(), ConfigError> {
    if let Some(value) = env_var::<usize>("AGENT_MANAGER_MAX_AGENTS")? {
        options.max_agents = value;
    }
    if let Some(value) = env_var::<usize>("AGENT_MANAGER_MAX_AGENTS_PER_NAMESPACE")? {
        options.max_agents_per_namespace = value;
    }
    if let Some(value) = env_var::<u32>("AGENT_MANAGER_DEFAULT_MAX_STEPS")? {
        options.default_max_steps = value;
    }
    if let Some(value) = env_var::<u32>("AGENT_MANAGER_MAX_STEPS_CAP")? {
        options.max_steps_cap = value;
    }
    if let Some(value) = env_var::<PathBuf>("AGENT_MANAGER_AGENT_DATA_DIRECTORY")? {
        options.agent_data_directory = value;
    }
    if let Some(value) = env_var::<bool>("AGENT_MANAGER_AUTO_SAVE_CONVERSATIONS")? {
        options.auto_save_conversations = value;
    }
    if let Some(value) = env_var::<bool>("AGENT_MANAGER_ALLOW_CUSTOM_MODELS")? {
        options.allow_custom_models = value;
    }
    if let Some(value) = env_var::<String>("AGENT_MANAGER_DEFAULT_MODEL_ID")? {
        options.default_model_id = Some(value);
    }
    Ok(())
}

fn validate(options: &AgentManagerOptions) -> Result<(), ConfigError> {
    if options.max_agents == 0 {
        return Err(ConfigError::Invalid(String::from("maxAgents must be greater than 0")));
    }
    if options.max_agents_per_namespace == 0 {
        return Err(ConfigError::Invalid(String::from(
            "maxAgentsPerNamespace must be greater than 0",
        )));
    }
    if options.default_max_steps == 0 {
        return Err(ConfigError::Invalid(String::from("defaultMaxSteps must be greater than 0")));
    }
    if options.max_steps_cap == 0 {
        return Err(ConfigError::Invalid(String::from("maxStepsCap must be greater than 0")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    fn settings() -> ModelSettings {
        ModelSettings::new("fallback", "https://fallback.example", "sk-test", 0.2)
    }

    // Environment variables are process-global; serialize tests that touch
    // `AGENT_MANAGER_*` so they cannot observe each other's overrides.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let _guard = ENV_LOCK.lock().unwrap();
        let options = load("/nonexistent/agent_manager.toml", settings()).unwrap();
        assert_eq!(options.max_agents, 50);
        assert_eq!(options.max_steps_cap, 10);
    }

    #[test]
    fn file_values_override_defaults() {
        let _guard = ENV_LOCK.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent_manager.toml");
        std::fs::write(&path, "maxAgents = 5\nallowCustomModels = false\n").unwrap();

        let options = load(&path, settings()).unwrap();
        assert_eq!(options.max_agents, 5);
        assert!(!options.allow_custom_models);
    }

    #[test]
    fn env_override_wins_over_file() {
        let _guard = ENV_LOCK.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent_manager.toml");
        std::fs::write(&path, "maxAgents = 5\n").unwrap();

        env::set_var("AGENT_MANAGER_MAX_AGENTS", "7");
        let result = load(&path, settings());
        env::remove_var("AGENT_MANAGER_MAX_AGENTS");

        assert_eq!(result.unwrap().max_agents, 7);
    }

    #[test]
    fn zero_max_agents_is_rejected_at_load_time() {
        let _guard = ENV_LOCK.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent_manager.toml");
        std::fs::write(&path, "maxAgents = 0\n").unwrap();

        let err = load(&path, settings()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn invalid_env_value_is_a_descriptive_error() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::set_var("AGENT_MANAGER_MAX_AGENTS", "not-a-number");
        let result = load("/nonexistent/agent_manager.toml", settings());
        env::remove_var("AGENT_MANAGER_MAX_AGENTS");

        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar { .. }));
    }
}
