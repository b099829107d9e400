use std::{
    env,
    path::{Path, PathBuf},
};

use anyhow::Result;

use crate::infra::{
    config::{loader::load, AppConfig},
    contracts::ConfigAdapter,
    error::AppError,
};

/// Overrides `[server] url` without touching the config file.
pub const SERVER_URL_ENV: &str = "TRADELINK_SERVER_URL";

#[derive(Debug, Clone, Default)]
pub struct FileConfigAdapter {
    path: Option<PathBuf>,
}

impl FileConfigAdapter {
    pub fn new(path: Option<&Path>) -> Self {
        Self {
            path: path.map(Path::to_path_buf),
        }
    }
}

impl ConfigAdapter for FileConfigAdapter {
    fn load(&self) -> Result<AppConfig> {
        let mut config = load(self.path.as_deref())?;
        apply_env_overrides(&mut config)?;
        Ok(config)
    }
}

fn apply_env_overrides(config: &mut AppConfig) -> Result<(), AppError> {
    let Some(url) = env::var(SERVER_URL_ENV)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
    else {
        return Ok(());
    };

    url::Url::parse(&url).map_err(|error| AppError::ConfigInvalid {
        field: SERVER_URL_ENV,
        details: error.to_string(),
    })?;
    config.server.url = url;

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::test_support::env_lock;

    #[test]
    fn env_url_wins_over_file() {
        let _guard = env_lock();
        let temp = tempfile::tempdir().expect("tempdir");
        let config_path = temp.path().join("config.toml");
        fs::write(&config_path, "[server]\nurl = \"http://file.example\"\n").expect("write");
        // SAFETY: env is guarded by process-wide test mutex.
        unsafe { env::set_var(SERVER_URL_ENV, " http://env.example:5000 ") };

        let loaded = FileConfigAdapter::new(Some(&config_path)).load();
        unsafe { env::remove_var(SERVER_URL_ENV) };

        assert_eq!(
            loaded.expect("config must load").server.url,
            "http://env.example:5000"
        );
    }

    #[test]
    fn invalid_env_url_is_rejected() {
        let _guard = env_lock();
        // SAFETY: env is guarded by process-wide test mutex.
        unsafe { env::set_var(SERVER_URL_ENV, "not a url") };

        let loaded = FileConfigAdapter::new(Some(Path::new("./missing-config.toml"))).load();
        unsafe { env::remove_var(SERVER_URL_ENV) };

        let error = loaded.expect_err("invalid override must fail");
        assert!(error.to_string().contains(SERVER_URL_ENV));
    }

    #[test]
    fn file_values_apply_without_override() {
        let _guard = env_lock();
        unsafe { env::remove_var(SERVER_URL_ENV) };

        let config = FileConfigAdapter::new(Some(Path::new("./missing-config.toml")))
            .load()
            .expect("config must load");

        assert_eq!(config, AppConfig::default());
    }
}
