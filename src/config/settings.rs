use crate::config::domains::{Domain, DomainConfig, SUPPORTED_DOMAINS};
use crate::error::{ConfigError, Result};
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

const DEFAULT_CONFIG_ROOT: &str = "keepers";
const DEFAULT_ABI_DIR: &str = "abis";
const DEFAULT_CODE_INDEX_PATH: &str = "code-index.json";

/// Run-wide settings resolved from the environment exactly once, then passed
/// by reference everywhere. No module-level mutable state.
#[derive(Debug, Clone)]
pub struct Settings {
    pub private_key: Option<String>,
    pub keystore_path: Option<PathBuf>,
    pub keystore_password_path: Option<PathBuf>,
    pub config_root: PathBuf,
    pub abi_dir: PathBuf,
    pub code_index_path: PathBuf,
    pub deployed_state_path: Option<PathBuf>,
    pub task_api_url: String,
    pub notify_webhook_url: Option<String>,
    pub auto_approve: bool,
    pub rpc_urls: HashMap<Domain, String>,
}

fn parse_bool_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn validate_http_url(name: &str, raw: &str) -> Result<()> {
    let parsed = raw.parse::<reqwest::Url>().map_err(|e| {
        ConfigError::InvalidConfig(format!("{name} must be a valid URL, got `{raw}`: {e}"))
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ConfigError::InvalidConfig(format!(
            "{name} must use http(s) scheme, got `{other}`"
        ))
        .into()),
    }
}

impl Settings {
    pub fn load() -> Result<Self> {
        let private_key = env::var("KEEPER_PRIVATE_KEY")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        let keystore_path = env::var("KEEPER_KEYSTORE_PATH").ok().map(PathBuf::from);
        let keystore_password_path = env::var("KEEPER_KEYSTORE_PASSWORD_PATH")
            .ok()
            .map(PathBuf::from);

        let config_root = env::var("KEEPER_CONFIG_ROOT")
            .unwrap_or_else(|_| DEFAULT_CONFIG_ROOT.to_string())
            .into();
        let abi_dir = env::var("KEEPER_ABI_DIR")
            .unwrap_or_else(|_| DEFAULT_ABI_DIR.to_string())
            .into();
        let code_index_path = env::var("CODE_INDEX_PATH")
            .unwrap_or_else(|_| DEFAULT_CODE_INDEX_PATH.to_string())
            .into();
        let deployed_state_path = env::var("DEPLOYED_STATE_PATH").ok().map(PathBuf::from);

        let task_api_url = env::var("TASK_API_URL").map_err(|_| {
            ConfigError::MissingConfig("TASK_API_URL must be set".to_string())
        })?;
        validate_http_url("TASK_API_URL", &task_api_url)?;

        let notify_webhook_url = env::var("NOTIFY_WEBHOOK_URL")
            .ok()
            .filter(|v| !v.trim().is_empty());
        if let Some(url) = notify_webhook_url.as_deref() {
            validate_http_url("NOTIFY_WEBHOOK_URL", url)?;
        }

        let auto_approve = env::var("AUTO_APPROVE")
            .map(|raw| parse_bool_flag(&raw))
            .unwrap_or(false);

        let mut rpc_urls = HashMap::new();
        for domain in SUPPORTED_DOMAINS {
            let env_name = DomainConfig::get(domain).rpc_url_env;
            let url = env::var(env_name).map_err(|_| {
                ConfigError::MissingConfig(format!("{env_name} must be set"))
            })?;
            validate_http_url(env_name, &url)?;
            rpc_urls.insert(domain, url);
        }

        Ok(Self {
            private_key,
            keystore_path,
            keystore_password_path,
            config_root,
            abi_dir,
            code_index_path,
            deployed_state_path,
            task_api_url,
            notify_webhook_url,
            auto_approve,
            rpc_urls,
        })
    }

    pub fn rpc_url(&self, domain: Domain) -> Result<&str> {
        self.rpc_urls
            .get(&domain)
            .map(String::as_str)
            .ok_or_else(|| {
                ConfigError::MissingConfig(format!("no RPC URL configured for {domain}")).into()
            })
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_bool_flag, validate_http_url, Settings};
    use std::sync::{Mutex, OnceLock};

    fn env_lock() -> &'static Mutex<()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_settings_env() {
        for key in [
            "KEEPER_PRIVATE_KEY",
            "KEEPER_KEYSTORE_PATH",
            "KEEPER_KEYSTORE_PASSWORD_PATH",
            "KEEPER_CONFIG_ROOT",
            "KEEPER_ABI_DIR",
            "CODE_INDEX_PATH",
            "DEPLOYED_STATE_PATH",
            "TASK_API_URL",
            "NOTIFY_WEBHOOK_URL",
            "AUTO_APPROVE",
            "MAINNET_RPC_URL",
            "SEPOLIA_RPC_URL",
        ] {
            std::env::remove_var(key);
        }
    }

    fn set_minimal_env() {
        std::env::set_var("TASK_API_URL", "https://api.example.invalid");
        std::env::set_var("MAINNET_RPC_URL", "https://rpc.example.invalid/mainnet");
        std::env::set_var("SEPOLIA_RPC_URL", "https://rpc.example.invalid/sepolia");
    }

    #[test]
    fn parse_bool_flag_accepts_common_truthy_spellings() {
        for raw in ["1", "true", " YES ", "on"] {
            assert!(parse_bool_flag(raw), "{raw} should parse as true");
        }
        for raw in ["0", "false", "off", "definitely"] {
            assert!(!parse_bool_flag(raw), "{raw} should parse as false");
        }
    }

    #[test]
    fn validate_http_url_rejects_non_http_schemes() {
        assert!(validate_http_url("X", "https://example.invalid").is_ok());
        assert!(validate_http_url("X", "ws://example.invalid").is_err());
        assert!(validate_http_url("X", "not a url").is_err());
    }

    #[test]
    fn load_fails_without_task_api_url() {
        let _guard = env_lock().lock().expect("env lock");
        clear_settings_env();
        std::env::set_var("MAINNET_RPC_URL", "https://rpc.example.invalid/mainnet");
        std::env::set_var("SEPOLIA_RPC_URL", "https://rpc.example.invalid/sepolia");

        let err = Settings::load().expect_err("load should fail");
        assert!(err.to_string().contains("TASK_API_URL"));
        clear_settings_env();
    }

    #[test]
    fn load_fails_when_an_rpc_url_is_missing() {
        let _guard = env_lock().lock().expect("env lock");
        clear_settings_env();
        std::env::set_var("TASK_API_URL", "https://api.example.invalid");
        std::env::set_var("MAINNET_RPC_URL", "https://rpc.example.invalid/mainnet");

        let err = Settings::load().expect_err("load should fail");
        assert!(err.to_string().contains("SEPOLIA_RPC_URL"));
        clear_settings_env();
    }

    #[test]
    fn load_resolves_defaults_and_flags() {
        let _guard = env_lock().lock().expect("env lock");
        clear_settings_env();
        set_minimal_env();
        std::env::set_var("AUTO_APPROVE", "yes");

        let settings = Settings::load().expect("load should succeed");
        assert_eq!(settings.config_root, std::path::PathBuf::from("keepers"));
        assert_eq!(settings.abi_dir, std::path::PathBuf::from("abis"));
        assert!(settings.auto_approve);
        assert!(settings.private_key.is_none());
        assert!(settings.deployed_state_path.is_none());
        clear_settings_env();
    }
}
