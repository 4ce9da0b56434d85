// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
//! requiem-config
#![deny(unsafe_code)]
#![warn(missing_docs)]

use requiem_id::Environment;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during configuration loading or validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The requested configuration file was not found.
    #[error("config file not found: {path}")]
    FileNotFound {
        /// Path that was requested.
        path: String,
    },

    /// The file could not be parsed as valid TOML.
    #[error("failed to parse config: {reason}")]
    ParseError {
        /// Human-readable parse error detail.
        reason: String,
    },

    /// Semantic validation failed (one or more problems).
    #[error("config validation failed: {reasons:?}")]
    ValidationError {
        /// Individual validation failure messages.
        reasons: Vec<String>,
    },

    /// Two configs could not be merged because of conflicting constraints.
    #[error("merge conflict: {reason}")]
    MergeConflict {
        /// Description of the conflict.
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// Warnings
// ---------------------------------------------------------------------------

/// Advisory-level issues that do not prevent operation but deserve attention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    /// A deprecated field was used in the configuration.
    DeprecatedField {
        /// Name of the deprecated field.
        field: String,
        /// Suggested replacement, if any.
        suggestion: Option<String>,
    },
    /// A recommended optional field is missing.
    MissingOptionalField {
        /// Name of the missing field.
        field: String,
        /// Why it matters.
        hint: String,
    },
    /// A provider timeout is unusually large.
    LargeTimeout {
        /// Provider name.
        provider: String,
        /// Timeout value in seconds.
        secs: u64,
    },
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigWarning::DeprecatedField { field, suggestion } => {
                write!(f, "deprecated field '{field}'")?;
                if let Some(s) = suggestion {
                    write!(f, " — use '{s}' instead")?;
                }
                Ok(())
            }
            ConfigWarning::MissingOptionalField { field, hint } => {
                write!(f, "missing optional field '{field}': {hint}")
            }
            ConfigWarning::LargeTimeout { provider, secs } => {
                write!(f, "provider '{provider}' has a large timeout ({secs}s)")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Config types
// ---------------------------------------------------------------------------

/// The arbitration/decision backend selected by `DECISION_ENGINE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DecisionEngine {
    /// The deterministic, in-process reference implementation.
    #[default]
    Reference,
    /// A native adapter (e.g. compiled acceleration of the same rules).
    Native,
}

impl DecisionEngine {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "reference" => Some(Self::Reference),
            "native" => Some(Self::Native),
            _ => None,
        }
    }
}

/// Log verbosity, recognized by `REQUIEM_LOG_LEVEL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    /// Suppresses all non-essential log output.
    Silent,
}

impl LogLevel {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "debug" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "warn" => Some(Self::Warn),
            "error" => Some(Self::Error),
            "silent" => Some(Self::Silent),
            _ => None,
        }
    }
}

fn default_environment() -> Environment {
    Environment::Development
}

/// Top-level runtime configuration for the control-plane.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Deployment environment; gates whether `auth_secret` may be absent.
    #[serde(default = "default_environment")]
    pub environment: Environment,

    /// `REQUIEM_MINIMAL`: disables replay cache writes, arbitration, and
    /// non-essential telemetry for a fast help/bench path.
    #[serde(default)]
    pub minimal: bool,

    /// `FORCE_RUST`: selects the reference deterministic engine over any
    /// native adapter regardless of `decision_engine`.
    #[serde(default)]
    pub force_rust: bool,

    /// `DECISION_ENGINE`: the arbitration backend to use.
    #[serde(default)]
    pub decision_engine: DecisionEngine,

    /// `REQUIEM_LOG_LEVEL`.
    #[serde(default)]
    pub log_level: LogLevel,

    /// `REQUIEM_AUTH_SECRET`. Required unless `environment` is
    /// [`Environment::Development`]; never logged or serialized back out.
    #[serde(default, skip_serializing)]
    pub auth_secret: Option<String>,

    /// Named model-provider definitions consulted by arbitration.
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderEntry>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            minimal: false,
            force_rust: false,
            decision_engine: DecisionEngine::default(),
            log_level: LogLevel::default(),
            auth_secret: None,
            providers: BTreeMap::new(),
        }
    }
}

/// Configuration for a single model provider consulted by arbitration.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct ProviderEntry {
    /// Model identifier this provider serves.
    pub model: String,
    /// Name of the environment variable holding the API key — never the
    /// key itself, so config files and their serialized form stay secret-free.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    /// Optional timeout in seconds (1–86 400).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    /// Advisory cost estimate in cents, used by arbitration's cost weighting.
    #[serde(default)]
    pub cost_hint_cents: u32,
}

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Maximum allowed timeout in seconds (24 hours).
const MAX_TIMEOUT_SECS: u64 = 86_400;

/// Threshold above which a timeout generates a warning.
const LARGE_TIMEOUT_THRESHOLD: u64 = 3_600;

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load a [`RuntimeConfig`] from an optional TOML file path.
///
/// * If `path` is `Some`, reads and parses the file.
/// * If `path` is `None`, returns [`RuntimeConfig::default()`].
///
/// Environment variable overrides are applied on top in both cases.
pub fn load_config(path: Option<&Path>) -> Result<RuntimeConfig, ConfigError> {
    let mut config = match path {
        Some(p) => {
            let content = std::fs::read_to_string(p).map_err(|_| ConfigError::FileNotFound {
                path: p.display().to_string(),
            })?;
            parse_toml(&content)?
        }
        None => RuntimeConfig::default(),
    };
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Parse a TOML string into a [`RuntimeConfig`].
pub fn parse_toml(content: &str) -> Result<RuntimeConfig, ConfigError> {
    toml::from_str::<RuntimeConfig>(content).map_err(|e| ConfigError::ParseError {
        reason: e.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Env overrides
// ---------------------------------------------------------------------------

/// Apply the environment-variable overrides recognized by the core (spec §6):
/// `REQUIEM_MINIMAL`, `FORCE_RUST`, `DECISION_ENGINE`, `REQUIEM_LOG_LEVEL`,
/// `REQUIEM_AUTH_SECRET`. Unrecognized values are ignored, leaving the prior
/// setting (file value or default) in place.
pub fn apply_env_overrides(config: &mut RuntimeConfig) {
    if let Ok(val) = std::env::var("REQUIEM_MINIMAL") {
        config.minimal = val == "1" || val.eq_ignore_ascii_case("true");
    }
    if std::env::var("FORCE_RUST").is_ok() {
        config.force_rust = true;
    }
    if let Ok(val) = std::env::var("DECISION_ENGINE")
        && let Some(engine) = DecisionEngine::parse(&val)
    {
        config.decision_engine = engine;
    }
    if let Ok(val) = std::env::var("REQUIEM_LOG_LEVEL")
        && let Some(level) = LogLevel::parse(&val)
    {
        config.log_level = level;
    }
    if let Ok(val) = std::env::var("REQUIEM_AUTH_SECRET") {
        config.auth_secret = Some(val);
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a parsed configuration, returning advisory warnings.
///
/// Hard errors (empty provider models, out-of-range timeouts, a production
/// deployment with no auth secret) are returned as a
/// [`ConfigError::ValidationError`]; soft issues come back as warnings.
pub fn validate_config(config: &RuntimeConfig) -> Result<Vec<ConfigWarning>, ConfigError> {
    let mut errors: Vec<String> = Vec::new();
    let mut warnings: Vec<ConfigWarning> = Vec::new();

    // Production deployments must carry an auth secret; dev-mode permissive
    // auth is only permitted when environment = development.
    if config.environment == Environment::Production && config.auth_secret.is_none() {
        errors.push("auth_secret is required when environment = production".into());
    }

    // Validate each provider entry.
    for (name, provider) in &config.providers {
        if name.is_empty() {
            errors.push("provider name must not be empty".into());
        }
        if provider.model.trim().is_empty() {
            errors.push(format!("provider '{name}': model must not be empty"));
        }
        if let Some(t) = provider.timeout_secs {
            if t == 0 || t > MAX_TIMEOUT_SECS {
                errors.push(format!(
                    "provider '{name}': timeout {t}s out of range (1..{MAX_TIMEOUT_SECS})"
                ));
            } else if t > LARGE_TIMEOUT_THRESHOLD {
                warnings.push(ConfigWarning::LargeTimeout {
                    provider: name.clone(),
                    secs: t,
                });
            }
        }
    }

    // Advisory: missing optional fields.
    if config.providers.is_empty() {
        warnings.push(ConfigWarning::MissingOptionalField {
            field: "providers".into(),
            hint: "arbitration has no candidates to choose among".into(),
        });
    }
    if config.environment != Environment::Development && config.auth_secret.is_none() {
        warnings.push(ConfigWarning::MissingOptionalField {
            field: "auth_secret".into(),
            hint: "non-development environments should set REQUIEM_AUTH_SECRET".into(),
        });
    }

    if errors.is_empty() {
        Ok(warnings)
    } else {
        Err(ConfigError::ValidationError { reasons: errors })
    }
}

// ---------------------------------------------------------------------------
// Merging
// ---------------------------------------------------------------------------

/// Merge two configurations. Values in `overlay` take precedence over `base`.
///
/// Provider maps are combined; on name collisions the overlay entry wins.
pub fn merge_configs(base: RuntimeConfig, overlay: RuntimeConfig) -> RuntimeConfig {
    let mut providers = base.providers;
    providers.extend(overlay.providers);
    RuntimeConfig {
        environment: overlay.environment,
        minimal: overlay.minimal || base.minimal,
        force_rust: overlay.force_rust || base.force_rust,
        decision_engine: overlay.decision_engine,
        log_level: overlay.log_level,
        auth_secret: overlay.auth_secret.or(base.auth_secret),
        providers,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
#[allow(clippy::field_reassign_with_default)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;

    // Environment variables are process-global; serialize the tests that
    // touch them so they don't trample each other under parallel test runs.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_env() {
        for key in [
            "REQUIEM_MINIMAL",
            "FORCE_RUST",
            "DECISION_ENGINE",
            "REQUIEM_LOG_LEVEL",
            "REQUIEM_AUTH_SECRET",
        ] {
            unsafe { std::env::remove_var(key) };
        }
    }

    #[test]
    fn default_config_is_valid() {
        let cfg = RuntimeConfig::default();
        let warnings = validate_config(&cfg).expect("default config should be valid");
        assert!(!warnings.is_empty(), "should have advisory warnings");
    }

    #[test]
    fn default_config_has_sensible_defaults() {
        let cfg = RuntimeConfig::default();
        assert_eq!(cfg.log_level, LogLevel::Info);
        assert_eq!(cfg.decision_engine, DecisionEngine::Reference);
        assert_eq!(cfg.environment, Environment::Development);
        assert!(cfg.providers.is_empty());
    }

    #[test]
    fn parse_valid_toml_string() {
        let toml = r#"
            environment = "production"
            log_level = "debug"
            decision_engine = "native"

            [providers.gpt]
            model = "gpt-ref"
        "#;
        let cfg = parse_toml(toml).unwrap();
        assert_eq!(cfg.environment, Environment::Production);
        assert_eq!(cfg.log_level, LogLevel::Debug);
        assert_eq!(cfg.decision_engine, DecisionEngine::Native);
        assert_eq!(cfg.providers.len(), 1);
    }

    #[test]
    fn parse_invalid_toml_gives_parse_error() {
        let bad = "this is [not valid toml =";
        let err = parse_toml(bad).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn parse_wrong_types_gives_parse_error() {
        let toml = r#"log_level = 42"#;
        let err = parse_toml(toml).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn parse_unknown_enum_variant_gives_parse_error() {
        let toml = r#"log_level = "verbose""#;
        let err = parse_toml(toml).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn validation_requires_auth_secret_in_production() {
        let cfg = RuntimeConfig {
            environment: Environment::Production,
            ..Default::default()
        };
        let err = validate_config(&cfg).unwrap_err();
        match err {
            ConfigError::ValidationError { reasons } => {
                assert!(reasons.iter().any(|r| r.contains("auth_secret")));
            }
            other => panic!("expected ValidationError, got {other:?}"),
        }
    }

    #[test]
    fn validation_passes_production_with_auth_secret() {
        let cfg = RuntimeConfig {
            environment: Environment::Production,
            auth_secret: Some("s3cr3t".into()),
            ..Default::default()
        };
        validate_config(&cfg).expect("should pass");
    }

    #[test]
    fn validation_catches_empty_provider_model() {
        let mut cfg = RuntimeConfig::default();
        cfg.providers.insert(
            "bad".into(),
            ProviderEntry {
                model: "  ".into(),
                api_key_env: None,
                timeout_secs: None,
                cost_hint_cents: 0,
            },
        );
        let err = validate_config(&cfg).unwrap_err();
        match err {
            ConfigError::ValidationError { reasons } => {
                assert!(reasons.iter().any(|r| r.contains("model must not be empty")));
            }
            other => panic!("expected ValidationError, got {other:?}"),
        }
    }

    #[test]
    fn validation_catches_zero_timeout() {
        let mut cfg = RuntimeConfig::default();
        cfg.providers.insert(
            "p".into(),
            ProviderEntry {
                model: "m".into(),
                api_key_env: None,
                timeout_secs: Some(0),
                cost_hint_cents: 0,
            },
        );
        let err = validate_config(&cfg).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { .. }));
    }

    #[test]
    fn validation_catches_timeout_exceeding_max() {
        let mut cfg = RuntimeConfig::default();
        cfg.providers.insert(
            "p".into(),
            ProviderEntry {
                model: "m".into(),
                api_key_env: None,
                timeout_secs: Some(MAX_TIMEOUT_SECS + 1),
                cost_hint_cents: 0,
            },
        );
        let err = validate_config(&cfg).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { .. }));
    }

    #[test]
    fn valid_config_with_providers_passes() {
        let mut cfg = RuntimeConfig::default();
        cfg.providers.insert(
            "gpt".into(),
            ProviderEntry {
                model: "gpt-ref".into(),
                api_key_env: Some("GPT_API_KEY".into()),
                timeout_secs: Some(30),
                cost_hint_cents: 5,
            },
        );
        validate_config(&cfg).expect("should pass");
    }

    #[test]
    fn large_timeout_produces_warning() {
        let mut cfg = RuntimeConfig::default();
        cfg.providers.insert(
            "gpt".into(),
            ProviderEntry {
                model: "gpt-ref".into(),
                api_key_env: None,
                timeout_secs: Some(7200),
                cost_hint_cents: 0,
            },
        );
        let warnings = validate_config(&cfg).unwrap();
        assert!(warnings.iter().any(|w| matches!(w, ConfigWarning::LargeTimeout { .. })));
    }

    #[test]
    fn merge_overlay_overrides_base() {
        let base = RuntimeConfig {
            log_level: LogLevel::Info,
            ..Default::default()
        };
        let overlay = RuntimeConfig {
            log_level: LogLevel::Debug,
            ..Default::default()
        };
        let merged = merge_configs(base, overlay);
        assert_eq!(merged.log_level, LogLevel::Debug);
    }

    #[test]
    fn merge_combines_provider_maps() {
        let base = RuntimeConfig {
            providers: BTreeMap::from([(
                "a".into(),
                ProviderEntry { model: "m-a".into(), api_key_env: None, timeout_secs: None, cost_hint_cents: 0 },
            )]),
            ..Default::default()
        };
        let overlay = RuntimeConfig {
            providers: BTreeMap::from([(
                "b".into(),
                ProviderEntry { model: "m-b".into(), api_key_env: None, timeout_secs: None, cost_hint_cents: 0 },
            )]),
            ..Default::default()
        };
        let merged = merge_configs(base, overlay);
        assert!(merged.providers.contains_key("a"));
        assert!(merged.providers.contains_key("b"));
    }

    #[test]
    fn merge_overlay_provider_wins_on_collision() {
        let base = RuntimeConfig {
            providers: BTreeMap::from([(
                "gpt".into(),
                ProviderEntry { model: "old-model".into(), api_key_env: None, timeout_secs: None, cost_hint_cents: 0 },
            )]),
            ..Default::default()
        };
        let overlay = RuntimeConfig {
            providers: BTreeMap::from([(
                "gpt".into(),
                ProviderEntry { model: "new-model".into(), api_key_env: None, timeout_secs: Some(60), cost_hint_cents: 10 },
            )]),
            ..Default::default()
        };
        let merged = merge_configs(base, overlay);
        assert_eq!(merged.providers["gpt"].model, "new-model");
    }

    #[test]
    fn merge_auth_secret_falls_back_to_base() {
        let base = RuntimeConfig {
            auth_secret: Some("base-secret".into()),
            ..Default::default()
        };
        let overlay = RuntimeConfig::default();
        let merged = merge_configs(base, overlay);
        assert_eq!(merged.auth_secret.as_deref(), Some("base-secret"));
    }

    #[test]
    fn empty_string_toml_parses_to_defaults() {
        let cfg = parse_toml("").unwrap();
        assert_eq!(cfg.environment, Environment::Development);
        assert!(cfg.providers.is_empty());
    }

    #[test]
    fn auth_secret_is_never_serialized() {
        let cfg = RuntimeConfig {
            auth_secret: Some("leak-me-not".into()),
            ..Default::default()
        };
        let serialized = toml::to_string(&cfg).unwrap();
        assert!(!serialized.contains("leak-me-not"));
    }

    #[test]
    fn load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("requiem.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "environment = \"test\"\nlog_level = \"warn\"").unwrap();
        let cfg = load_config(Some(&path)).unwrap();
        assert_eq!(cfg.environment, Environment::Test);
        assert_eq!(cfg.log_level, LogLevel::Warn);
    }

    #[test]
    fn load_missing_file_gives_file_not_found() {
        let err = load_config(Some(Path::new("/nonexistent/requiem.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }

    #[test]
    fn load_none_returns_default() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        let cfg = load_config(None).unwrap();
        assert_eq!(cfg.log_level, LogLevel::Info);
    }

    #[test]
    fn env_override_minimal_accepts_true_and_1() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        let mut cfg = RuntimeConfig::default();
        unsafe { std::env::set_var("REQUIEM_MINIMAL", "1") };
        apply_env_overrides(&mut cfg);
        assert!(cfg.minimal);
        clear_env();
    }

    #[test]
    fn env_override_decision_engine() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        let mut cfg = RuntimeConfig::default();
        unsafe { std::env::set_var("DECISION_ENGINE", "native") };
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.decision_engine, DecisionEngine::Native);
        clear_env();
    }

    #[test]
    fn env_override_ignores_unrecognized_decision_engine() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        let mut cfg = RuntimeConfig::default();
        unsafe { std::env::set_var("DECISION_ENGINE", "quantum") };
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.decision_engine, DecisionEngine::Reference);
        clear_env();
    }

    #[test]
    fn env_override_auth_secret() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        let mut cfg = RuntimeConfig::default();
        unsafe { std::env::set_var("REQUIEM_AUTH_SECRET", "from-env") };
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.auth_secret.as_deref(), Some("from-env"));
        clear_env();
    }

    #[test]
    fn config_error_display() {
        let e = ConfigError::FileNotFound { path: "/foo".into() };
        assert!(e.to_string().contains("/foo"));

        let e = ConfigError::ParseError { reason: "bad toml".into() };
        assert!(e.to_string().contains("bad toml"));

        let e = ConfigError::MergeConflict { reason: "oops".into() };
        assert!(e.to_string().contains("oops"));
    }

    #[test]
    fn config_warning_display() {
        let w = ConfigWarning::DeprecatedField { field: "old_field".into(), suggestion: Some("new_field".into()) };
        let s = w.to_string();
        assert!(s.contains("old_field"));
        assert!(s.contains("new_field"));

        let w = ConfigWarning::MissingOptionalField { field: "f".into(), hint: "h".into() };
        assert!(w.to_string().contains('f'));

        let w = ConfigWarning::LargeTimeout { provider: "p".into(), secs: 9999 };
        assert!(w.to_string().contains("9999"));
    }
}
