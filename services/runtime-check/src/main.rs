//! Secret Network runtime check
//!
//! Builds the tool runtime from configuration and prints its status as JSON:
//! selected network, pool counters, spending limits and rate-limit usage.
//!
//! Flags:
//! - `--config <path>`: config file (else `CONFIG_PATH`, else `scrt-runtime.toml`)
//! - `--probe`: check out a pooled client and query the LCD node info
//! - `--metrics`: print the Prometheus exposition after the status

mod metrics;

use std::time::Instant;

use anyhow::{Context, Result};
use common::{ErrorReport, Remediation};
use runtime::{Runtime, RuntimeConfig, RuntimeStatus};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Default, PartialEq, Eq)]
struct Args {
    config: Option<String>,
    probe: bool,
    metrics: bool,
}

impl Args {
    fn parse(args: &[String]) -> Self {
        let config = args
            .iter()
            .position(|a| a == "--config")
            .and_then(|i| args.get(i + 1))
            .cloned();
        Self {
            config,
            probe: args.iter().any(|a| a == "--probe"),
            metrics: args.iter().any(|a| a == "--metrics"),
        }
    }
}

#[derive(Debug, Serialize)]
struct ProbeReport {
    ok: bool,
    latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    node_network: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorReport>,
}

#[derive(Debug, Serialize)]
struct Report {
    #[serde(flatten)]
    status: RuntimeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    probe: Option<ProbeReport>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // JSON logs on stderr; stdout carries the report
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        )
        .init();

    info!("starting scrt-runtime-check");

    let prometheus_handle = metrics::install_recorder()?;

    let argv: Vec<String> = std::env::args().skip(1).collect();
    let args = Args::parse(&argv);

    let config = load_config(args.config.as_deref())?;
    let runtime = Runtime::new(&config)
        .await
        .context("failed to initialize runtime")?;
    runtime.session().start();

    let probe = if args.probe {
        Some(probe(&runtime).await)
    } else {
        None
    };

    let report = Report {
        status: runtime.status().await,
        probe,
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("failed to serialize report")?
    );

    runtime.shutdown();

    if args.metrics {
        println!("{}", prometheus_handle.render());
    }

    Ok(())
}

/// Load the config file, falling back to defaults when the implicit default
/// path does not exist.
fn load_config(cli_path: Option<&str>) -> Result<RuntimeConfig> {
    let explicit = cli_path.is_some() || std::env::var_os("CONFIG_PATH").is_some();
    let path = RuntimeConfig::resolve_path(cli_path);

    if !explicit && !path.exists() {
        warn!(path = %path.display(), "config file not found, using defaults");
        return RuntimeConfig::from_toml("").context("invalid default configuration");
    }

    info!(path = %path.display(), "loading configuration");
    let config = RuntimeConfig::load(&path)
        .with_context(|| format!("failed to load config from {}", path.display()))?;
    info!(
        network = %config.network.name,
        max_connections = config.pool.max_connections,
        rate_limits = config.rate_limits.len(),
        "configuration loaded"
    );
    Ok(config)
}

async fn probe(runtime: &Runtime) -> ProbeReport {
    let started = Instant::now();
    let result = match runtime.acquire_client("probe").await {
        Ok(client) => client.node_info().await.map_err(runtime::Error::from),
        Err(e) => Err(e),
    };
    let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    match result {
        Ok(node_info) => {
            let node_network = node_info["default_node_info"]["network"]
                .as_str()
                .map(str::to_owned);
            info!(latency_ms, node_network = ?node_network, "probe succeeded");
            ProbeReport {
                ok: true,
                latency_ms,
                node_network,
                error: None,
            }
        }
        Err(e) => {
            warn!(error = %e, latency_ms, "probe failed");
            ProbeReport {
                ok: false,
                latency_ms,
                node_network: None,
                error: Some(e.report()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_all_flags() {
        let args = Args::parse(&argv(&["--config", "/etc/rt.toml", "--probe", "--metrics"]));
        assert_eq!(
            args,
            Args {
                config: Some("/etc/rt.toml".into()),
                probe: true,
                metrics: true,
            }
        );
    }

    #[test]
    fn no_flags_means_defaults() {
        assert_eq!(Args::parse(&[]), Args::default());
    }

    #[test]
    fn dangling_config_flag_is_ignored() {
        let args = Args::parse(&argv(&["--probe", "--config"]));
        assert!(args.config.is_none());
        assert!(args.probe);
    }

    #[test]
    fn explicit_missing_config_is_an_error() {
        let err = load_config(Some("/nonexistent/scrt-runtime.toml")).unwrap_err();
        assert!(
            err.to_string().contains("failed to load config"),
            "got: {err}"
        );
    }

    #[test]
    fn explicit_config_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rt.toml");
        std::fs::write(
            &path,
            "[pool]\nmax_connections = 3\n\n[wallet_storage]\nenabled = false\n",
        )
        .unwrap();

        let config = load_config(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(config.pool.max_connections, 3);
        assert!(!config.wallet_storage.enabled);
    }

    #[tokio::test]
    async fn report_flattens_status() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = RuntimeConfig::default();
        config.vault.kdf_iterations = 1_000;
        config.wallet_storage.path = dir.path().to_path_buf();
        let runtime = Runtime::new(&config).await.unwrap();

        let report = Report {
            status: runtime.status().await,
            probe: Some(ProbeReport {
                ok: false,
                latency_ms: 3,
                node_network: None,
                error: Some(runtime::Error::NoWallet.report()),
            }),
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["network"]["chain_id"], "pulsar-3");
        assert_eq!(json["probe"]["ok"], false);
        assert_eq!(json["probe"]["error"]["code"], "VALIDATION_ERROR");
        assert!(json["probe"].get("node_network").is_none());
    }
}
