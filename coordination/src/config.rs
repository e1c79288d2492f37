//! Orchestrator configuration, env-driven with documented fallbacks.
//!
//! Modeled on the teacher's `SwarmConfig::default()` in `config.rs`: a
//! `serde`-friendly struct whose `Default` impl reads named environment
//! variables and falls back to a constant when unset, with each field
//! naming its source env var.

use std::env;

use serde::{Deserialize, Serialize};

fn env_flag(name: &str) -> bool {
    env::var(name)
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

fn env_u32(name: &str, default: u32) -> u32 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Verbose,
    Info,
}

impl LogLevel {
    fn from_env() -> Self {
        match env::var("LOG_LEVEL").map(|v| v.to_lowercase()).as_deref() {
            Ok("debug") => LogLevel::Debug,
            Ok("verbose") => LogLevel::Verbose,
            _ => LogLevel::Info,
        }
    }

    /// `tracing_subscriber::EnvFilter` directive string for this level.
    pub fn as_filter_directive(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Verbose => "info,agneto_cli=debug,coordination=debug",
            LogLevel::Info => "info",
        }
    }
}

/// Runtime options for one orchestrator invocation.
///
/// Covers §3's `options` (`autoMerge`, `nonInteractive`) plus the
/// ambient-stack additions this expansion calls for: attempt maxima,
/// the Curmudgeon simplify bound, console verbosity, and the optional
/// dashboard forwarding endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorOptions {
    pub auto_merge: bool,
    pub non_interactive: bool,

    /// §9 Open Question resolved: default 7 (see DESIGN.md).
    /// Override via `AGNETO_MAX_PLAN_ATTEMPTS`.
    pub max_plan_attempts: u32,
    /// Same resolution as `max_plan_attempts`.
    /// Override via `AGNETO_MAX_CODE_ATTEMPTS`.
    pub max_code_attempts: u32,
    /// §4.3 Curmudgeon simplify-loop bound, default 4.
    /// Override via `AGNETO_MAX_SIMPLIFICATIONS`.
    pub max_simplifications: u32,

    pub log_level: LogLevel,
    pub debug: bool,
    pub dashboard_endpoint: Option<String>,
}

impl OrchestratorOptions {
    pub fn new(auto_merge: bool, non_interactive: bool) -> Self {
        Self {
            auto_merge,
            non_interactive,
            ..Self::default()
        }
    }
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            auto_merge: false,
            non_interactive: false,
            max_plan_attempts: env_u32("AGNETO_MAX_PLAN_ATTEMPTS", 7),
            max_code_attempts: env_u32("AGNETO_MAX_CODE_ATTEMPTS", 7),
            max_simplifications: env_u32("AGNETO_MAX_SIMPLIFICATIONS", 4),
            log_level: LogLevel::from_env(),
            debug: env_flag("DEBUG"),
            dashboard_endpoint: env::var("AGNETO_DASHBOARD_ENDPOINT")
                .ok()
                .filter(|url| url.starts_with("http://") || url.starts_with("https://")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_resolved_open_questions() {
        // Isolated from the process environment: exercise the pure
        // parsing helpers directly rather than relying on ambient
        // env vars, since tests run concurrently in one process.
        assert_eq!(env_u32("AGNETO_DOES_NOT_EXIST", 7), 7);
        assert_eq!(env_u32("AGNETO_DOES_NOT_EXIST", 4), 4);
    }

    #[test]
    fn dashboard_endpoint_rejects_non_http_scheme() {
        env::set_var("AGNETO_DASHBOARD_ENDPOINT", "not-a-url");
        let options = OrchestratorOptions::default();
        assert!(options.dashboard_endpoint.is_none());
        env::remove_var("AGNETO_DASHBOARD_ENDPOINT");
    }

    #[test]
    fn dashboard_endpoint_accepts_https() {
        env::set_var("AGNETO_DASHBOARD_ENDPOINT", "https://dash.example/events");
        let options = OrchestratorOptions::default();
        assert_eq!(options.dashboard_endpoint.as_deref(), Some("https://dash.example/events"));
        env::remove_var("AGNETO_DASHBOARD_ENDPOINT");
    }
}
