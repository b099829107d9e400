use std::path::Path;

use crate::{
    infra::{
        self, config::FileConfigAdapter, contracts::ConfigAdapter, error::AppError,
        logging::LogGuard, storage_layout::StorageLayout,
    },
    usecases::context::AppContext,
};

/// Loads config, prepares storage and starts logging. Keep the guard alive
/// for as long as logs should be written.
pub fn bootstrap(config_path: Option<&Path>) -> Result<(AppContext, LogGuard), AppError> {
    let context = build_context(config_path)?;
    let guard = infra::logging::init(&context.config.logging)?;

    tracing::debug!(
        server = %context.config.server.url,
        storage = %context.layout.config_dir.display(),
        "application context ready"
    );

    Ok((context, guard))
}

fn build_context(config_path: Option<&Path>) -> Result<AppContext, AppError> {
    let config_adapter = FileConfigAdapter::new(config_path);
    let config = config_adapter.load().map_err(AppError::Other)?;

    let layout = StorageLayout::resolve()?;
    layout.ensure_dirs()?;

    Ok(AppContext::new(config, layout))
}

#[cfg(test)]
mod tests {
    use std::{env, fs};

    use super::*;
    use crate::test_support::env_lock;

    #[test]
    fn builds_context_with_defaults_and_creates_storage() {
        let _guard = env_lock();
        let root = tempfile::tempdir().expect("tempdir");
        let old_xdg = env::var_os("XDG_CONFIG_HOME");
        // SAFETY: env is guarded by process-wide test mutex.
        unsafe { env::set_var("XDG_CONFIG_HOME", root.path()) };

        let context = build_context(Some(Path::new("./missing-config.toml")))
            .expect("context should build from defaults");

        assert_eq!(context.config, crate::infra::config::AppConfig::default());
        assert!(context.layout.session_dir.is_dir());
        assert!(context.layout.config_dir.starts_with(root.path()));

        match old_xdg {
            // SAFETY: restoring env while guard is held.
            Some(value) => unsafe { env::set_var("XDG_CONFIG_HOME", value) },
            // SAFETY: restoring env while guard is held.
            None => unsafe { env::remove_var("XDG_CONFIG_HOME") },
        }
    }

    #[test]
    fn invalid_config_fails_the_bootstrap() {
        let root = tempfile::tempdir().expect("tempdir");
        let config_path = root.path().join("config.toml");
        fs::write(&config_path, "[server]\nurl = \"not a url\"\n").expect("write config");

        let error = build_context(Some(&config_path)).expect_err("config must be rejected");

        assert!(error.to_string().contains("server.url"));
    }
}
