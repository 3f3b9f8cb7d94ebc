// ===============================
// src/main.rs
// ===============================
/*
 # start as trader-sales on the dashboard, with metrics
 METRICS_PORT=9898 cargo run -- --role trader-sales --view dashboard --login jsmith --password secret

 # what the console has been doing
curl -s localhost:9898/metrics | egrep '^(api_requests_total|notifications_total|dashboard_refreshes_total)'

*/
/*
=============================================================================
Project : trade_console — async terminal console for a trade-management backend
Module  : main.rs
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
mod api;
mod config;
mod console;
mod dashboard;
mod domain;
mod mapping;
mod metrics;
mod notify;
mod pages;
mod render;
mod search;
mod session;
mod store;
mod validation;

#[cfg(test)]
mod testkit;

use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::select;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::api::HttpTradeApi;
use crate::console::{Command, Shell, ShellOptions, Step};
use crate::render::Palette;
use crate::session::{sign_in, Session};

fn print_out(text: &str) {
    if text.is_empty() {
        return;
    }
    let mut out = std::io::stdout().lock();
    let _ = out.write_all(text.as_bytes());
    let _ = out.flush();
}

#[tokio::main]
async fn main() -> ExitCode {
    // ---- Logging (stderr, so screens on stdout stay clean) ----
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(std::env::var("LOG_LEVEL").unwrap_or_default()))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // ---- Config ----
    let cli = config::Cli::parse();
    let settings = match config::load(&cli) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    // ---- Metrics ----
    metrics::init();
    metrics::CONFIG_ROLE
        .with_label_values(&[settings.role.as_str()])
        .set(1);
    if let Some(port) = settings.metrics_port {
        tokio::spawn(metrics::serve_metrics(port));
    }

    // ---- Backend client + session ----
    let api = match HttpTradeApi::new(&settings.base_url, settings.timeout) {
        Ok(api) => Arc::new(api),
        Err(e) => {
            error!(error = %e, "cannot build API client");
            return ExitCode::FAILURE;
        }
    };
    info!(
        role = %settings.role,
        view = %settings.view,
        base_url = %api.base_url(),
        timeout_ms = settings.timeout.as_millis() as u64,
        refresh_secs = settings.refresh_every.as_secs(),
        metrics_port = ?settings.metrics_port,
        "startup config"
    );
    let session = Session::anonymous();
    if let Some(creds) = &settings.credentials {
        if let Err(e) = sign_in(api.as_ref(), &session, &creds.login, &creds.password).await {
            warn!(login = %creds.login, error = %e, "start-up sign-in failed; continuing signed out");
        }
    }

    let trade = match &settings.trade_file {
        Some(path) => match validation::load_trade(path) {
            Ok(t) => Some(t),
            Err(e) => {
                error!(path = %path.display(), error = %e, "cannot load trade");
                return ExitCode::FAILURE;
            }
        },
        None => None,
    };

    // ---- Shell ----
    let options = ShellOptions {
        refresh_every: settings.refresh_every,
        palette: if settings.color {
            Palette::ansi()
        } else {
            Palette::plain()
        },
        trade,
    };
    let mut shell = Shell::new(api, session, settings.role, options);
    print_out(&shell.open(settings.view).await);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let updates = shell.updates();
        select! {
            _ = updates.changed() => {
                print_out(&shell.refresh_view(false));
            }
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(l)) => l,
                    Ok(None) => break,
                    Err(e) => {
                        warn!(error = %e, "stdin read failed");
                        break;
                    }
                };
                let cmd = match Command::parse(&line) {
                    Ok(Some(c)) => c,
                    Ok(None) => continue,
                    Err(e) => {
                        print_out(&format!("{e}\n"));
                        continue;
                    }
                };
                match shell.execute(cmd).await {
                    Ok(Step::Continue(out)) => print_out(&out),
                    Ok(Step::Quit) => break,
                    Err(e) => print_out(&format!("{e}\n")),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        }
    }

    shell.shutdown().await;
    info!("bye");
    ExitCode::SUCCESS
}
