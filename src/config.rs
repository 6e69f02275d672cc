//! Adaptor configuration: what the CLI (or any other front-end) passes
//! down to a registry-backed root. The core itself persists nothing
//! (spec §6, "Environment/persisted state: None produced by the core");
//! this module only collects what an adaptor is allowed to consume.

use std::env;

/// `PW_REMOTE` names the remote daemon to connect to when `-r` is not
/// given on the command line, matching the original tool's own
/// `PW_KEY_REMOTE_NAME` fallback.
const REMOTE_ENV: &str = "PW_REMOTE";

/// Never accepted as a CLI flag — the original tool doesn't take
/// secrets on the command line either.
const TOKEN_ENV: &str = "OT_QUERY_TOKEN";

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub remote: Option<String>,
    pub auth_token: Option<String>,
}

impl Config {
    /// Build from an explicit `--remote` flag value (if any), falling
    /// back to the environment for both the remote name and the auth
    /// token.
    pub fn from_cli(remote_flag: Option<String>) -> Self {
        Config {
            remote: remote_flag.or_else(|| env::var(REMOTE_ENV).ok()),
            auth_token: env::var(TOKEN_ENV).ok(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_flag_wins_over_env() {
        let cfg = Config::from_cli(Some("studio".into()));
        assert_eq!(cfg.remote.as_deref(), Some("studio"));
    }

    #[test]
    fn falls_back_to_none_without_flag_or_env() {
        // SAFETY-equivalent: this only reads process env, doesn't rely
        // on test ordering beyond "don't set PW_REMOTE in CI".
        if env::var(REMOTE_ENV).is_err() {
            let cfg = Config::from_cli(None);
            assert_eq!(cfg.remote, None);
        }
    }
}
