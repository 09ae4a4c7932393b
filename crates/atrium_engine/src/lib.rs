use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

mod convert;
pub mod engine;
mod env;
pub mod local_usage;
mod replay;

pub use convert::{action_from_event, app_snapshot, conversation_snapshot};
pub use replay::{ReplayReport, replay_lines};

pub const DEFAULT_COMMAND_BUFFER: usize = 256;
pub const DEFAULT_EVENT_BUFFER: usize = 256;

#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub command_buffer: usize,
    pub event_buffer: usize,
    pub usage_days: Option<u32>,
    pub codex_home: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            command_buffer: DEFAULT_COMMAND_BUFFER,
            event_buffer: DEFAULT_EVENT_BUFFER,
            usage_days: None,
            codex_home: None,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let mut out = Self::default();

        if let Some(buffer) = env::optional_u32_from_env("ATRIUM_COMMAND_BUFFER")? {
            out.command_buffer = (buffer as usize).max(1);
        }
        if let Some(buffer) = env::optional_u32_from_env("ATRIUM_EVENT_BUFFER")? {
            out.event_buffer = (buffer as usize).max(1);
        }
        out.usage_days = env::optional_u32_from_env("ATRIUM_USAGE_DAYS")?;
        out.codex_home = env::optional_trimmed_path_from_env("CODEX_HOME")?;

        Ok(out)
    }
}

pub(crate) fn now_unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::tests::{EnvVarGuard, lock_env};

    #[test]
    fn config_from_env_uses_defaults_when_unset() {
        let _guard = lock_env();
        let _a = EnvVarGuard::set("ATRIUM_COMMAND_BUFFER", None);
        let _b = EnvVarGuard::set("ATRIUM_EVENT_BUFFER", None);
        let _c = EnvVarGuard::set("ATRIUM_USAGE_DAYS", None);
        let _d = EnvVarGuard::set("CODEX_HOME", None);

        let config = EngineConfig::from_env().expect("config");
        assert_eq!(config.command_buffer, DEFAULT_COMMAND_BUFFER);
        assert_eq!(config.event_buffer, DEFAULT_EVENT_BUFFER);
        assert_eq!(config.usage_days, None);
        assert_eq!(config.codex_home, None);
    }

    #[test]
    fn config_from_env_reads_overrides() {
        let _guard = lock_env();
        let _a = EnvVarGuard::set("ATRIUM_COMMAND_BUFFER", Some("0"));
        let _b = EnvVarGuard::set("ATRIUM_EVENT_BUFFER", Some("8"));
        let _c = EnvVarGuard::set("ATRIUM_USAGE_DAYS", Some("7"));
        let _d = EnvVarGuard::set("CODEX_HOME", Some(" /srv/codex "));

        let config = EngineConfig::from_env().expect("config");
        assert_eq!(config.command_buffer, 1);
        assert_eq!(config.event_buffer, 8);
        assert_eq!(config.usage_days, Some(7));
        assert_eq!(config.codex_home, Some(PathBuf::from("/srv/codex")));
    }

    #[test]
    fn config_from_env_rejects_bad_numbers() {
        let _guard = lock_env();
        let _a = EnvVarGuard::set("ATRIUM_COMMAND_BUFFER", Some("-3"));

        let err = EngineConfig::from_env().expect_err("negative buffer should fail");
        assert!(
            err.to_string().contains("ATRIUM_COMMAND_BUFFER"),
            "unexpected error: {err:?}"
        );
    }
}
