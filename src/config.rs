// ===============================
// src/config.rs
// ===============================
/*
=============================================================================
Project : trade_console — async terminal console for a trade-management backend
Module  : config.rs
Version : 0.5.0
Author  : Kukuh Tripamungkas Wicaksono (Kukuh TW)
License : MIT (see LICENSE)

Summary : Role page shells (middle office, trader sales, support) hosting
          trade search, a self-refreshing trading dashboard and trade
          validation against the backend REST API; exposes Prometheus
          metrics for API calls, notifications and dashboard refreshes.

(c) 2025 Kukuh TW. All rights reserved where applicable.
=============================================================================
*/
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use dotenvy::dotenv;
use thiserror::Error;
use url::Url;

use crate::api::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT_MS};
use crate::dashboard::DEFAULT_REFRESH_SECS;
use crate::pages::{view_from_query, Role, View};

/// Command-line flags; each one overrides the matching environment variable.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "trade-console", version, about = "Trading operations console")]
pub struct Cli {
    /// middle-office | trader-sales | support
    #[arg(long, default_value = "middle-office")]
    pub role: String,

    /// Initial view: a name or a `view=<name>` query string
    #[arg(long)]
    pub view: Option<String>,

    /// Sign in on start-up (TRADE_CONSOLE_LOGIN)
    #[arg(long)]
    pub login: Option<String>,

    /// Password for --login (TRADE_CONSOLE_PASSWORD)
    #[arg(long)]
    pub password: Option<String>,

    /// JSON file with the trade to validate
    #[arg(long)]
    pub trade: Option<PathBuf>,

    /// Backend base URL (API_BASE_URL)
    #[arg(long)]
    pub base_url: Option<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0}")]
    Role(String),
    #[error("unknown view '{0}'")]
    View(String),
    #[error("invalid API base url '{url}': {reason}")]
    BaseUrl { url: String, reason: String },
    #[error("--password given without --login")]
    PasswordWithoutLogin,
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub login: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub role: Role,
    pub view: View,
    pub base_url: String,
    pub timeout: Duration,
    pub refresh_every: Duration,
    pub metrics_port: Option<u16>,
    pub color: bool,
    pub credentials: Option<Credentials>,
    pub trade_file: Option<PathBuf>,
}

impl Settings {
    /// Builds settings from flags plus a variable lookup (the environment in `load`).
    pub fn from_lookup(
        cli: &Cli,
        var: impl Fn(&str) -> Option<String>,
    ) -> Result<Settings, ConfigError> {
        let role: Role = cli.role.parse().map_err(ConfigError::Role)?;
        let view = match cli.view.as_deref() {
            // accepts a bare name or a `view=...` query string
            Some(v) if v.contains('=') => {
                view_from_query(v).ok_or_else(|| ConfigError::View(v.to_string()))?
            }
            Some(v) => View::parse(v).ok_or_else(|| ConfigError::View(v.to_string()))?,
            None => View::Default,
        };

        // ===== Backend =====
        let base_url = cli
            .base_url
            .clone()
            .or_else(|| var("API_BASE_URL"))
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        if let Err(e) = Url::parse(&base_url) {
            return Err(ConfigError::BaseUrl {
                url: base_url,
                reason: e.to_string(),
            });
        }
        let timeout_ms = var("API_TIMEOUT_MS")
            .and_then(|s| s.trim().parse().ok())
            .filter(|ms: &u64| *ms > 0)
            .unwrap_or(DEFAULT_TIMEOUT_MS);

        // ===== Dashboard / metrics =====
        let refresh_secs = var("DASHBOARD_REFRESH_SECS")
            .and_then(|s| s.trim().parse().ok())
            .filter(|s: &u64| *s > 0)
            .unwrap_or(DEFAULT_REFRESH_SECS);
        // METRICS_PORT unset or 0: no metrics server
        let metrics_port = var("METRICS_PORT")
            .and_then(|s| s.trim().parse().ok())
            .filter(|p: &u16| *p != 0);
        let color = var("NO_COLOR").map_or(true, |v| v.is_empty());

        // ===== Sign-in =====
        let login = cli
            .login
            .clone()
            .or_else(|| var("TRADE_CONSOLE_LOGIN"))
            .filter(|s| !s.trim().is_empty());
        let password = cli
            .password
            .clone()
            .or_else(|| var("TRADE_CONSOLE_PASSWORD"));
        let credentials = match (login, password) {
            (Some(login), password) => Some(Credentials {
                login,
                password: password.unwrap_or_default(),
            }),
            (None, Some(_)) if cli.password.is_some() => {
                return Err(ConfigError::PasswordWithoutLogin)
            }
            (None, _) => None,
        };

        Ok(Settings {
            role,
            view,
            base_url,
            timeout: Duration::from_millis(timeout_ms),
            refresh_every: Duration::from_secs(refresh_secs),
            metrics_port,
            color,
            credentials,
            trade_file: cli.trade.clone(),
        })
    }
}

/// Reads `.env`, then flags and environment.
pub fn load(cli: &Cli) -> Result<Settings, ConfigError> {
    let _ = dotenv();
    Settings::from_lookup(cli, |key| env::var(key).ok())
}
