//! Subcommand handlers.

use crate::{Commands, ConfigAction};
use a11ybot_core::browser::BrowserLauncher;
use a11ybot_core::config::A11yConfig;
use a11ybot_core::error::ConfigError;
use a11ybot_core::{
    install_shutdown_hook, validate_url, AuditError, AuditResult, Auditor,
    AxeRuleEngine, BrowserSession, RuleEngine,
};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

pub async fn handle_command(command: Commands, workspace: &Path, quiet: bool) -> anyhow::Result<()> {
    match command {
        Commands::Audit {
            url,
            output,
            json,
            no_report,
        } => handle_audit(&url, output, json, no_report, quiet, workspace).await,
        Commands::Config { action } => handle_config(action, workspace).await,
    }
}

/// Boundary kind of a command failure, for the error line.
pub fn error_kind(err: &anyhow::Error) -> String {
    match err.downcast_ref::<AuditError>() {
        Some(e) => e.kind().to_string(),
        None if err.downcast_ref::<ConfigError>().is_some() => "config-failure".to_string(),
        None => "error".to_string(),
    }
}

async fn handle_config(action: ConfigAction, workspace: &Path) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let config_dir = workspace.join(".a11ybot");
            std::fs::create_dir_all(&config_dir)?;

            let config_path = config_dir.join("config.toml");
            if config_path.exists() {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(());
            }

            let toml_str = toml::to_string_pretty(&A11yConfig::default())?;
            std::fs::write(&config_path, &toml_str)?;
            println!(
                "Created default configuration at: {}",
                config_path.display()
            );
            Ok(())
        }
        ConfigAction::Show => {
            let config = load(workspace)?;
            let toml_str = toml::to_string_pretty(&config)?;
            println!("{}", toml_str);
            Ok(())
        }
    }
}

async fn handle_audit(
    url: &str,
    output: Option<PathBuf>,
    json: bool,
    no_report: bool,
    quiet: bool,
    workspace: &Path,
) -> anyhow::Result<()> {
    // Reject bad input before any config or browser work.
    let parsed = validate_url(url)?;
    let config = load(workspace)?;
    config.validate()?;

    let rule_engine = load_rule_engine(&config, workspace).await?;
    let session = Arc::new(BrowserSession::new(launcher(&config)?));
    install_shutdown_hook(session.clone());
    let auditor = Auditor::new(session.clone(), rule_engine, &config.audit);

    let outcome = async {
        let result = auditor.run_audit(parsed.as_str()).await?;
        let report_path = if no_report {
            None
        } else {
            let path = output.unwrap_or_else(|| default_report_path(&config, workspace, &result));
            let document = auditor.render_report(&result);
            auditor.render_artifact(&document, &path).await?;
            Some(path)
        };
        print_result(&result, report_path.as_deref(), json, quiet)
    }
    .await;

    if let Err(e) = session.shutdown().await {
        warn!(error = %e, "Browser shutdown failed");
    }
    outcome
}

fn load(workspace: &Path) -> anyhow::Result<A11yConfig> {
    let config = a11ybot_core::config::load_config(Some(workspace), None).map_err(|e| {
        ConfigError::ParseError {
            message: e.to_string(),
        }
    })?;
    Ok(config)
}

async fn load_rule_engine(
    config: &A11yConfig,
    workspace: &Path,
) -> anyhow::Result<Arc<dyn RuleEngine>> {
    let path = config
        .rule_engine
        .script_path
        .as_ref()
        .ok_or_else(|| ConfigError::MissingField {
            field: "rule_engine.script_path".into(),
        })?;
    let path = if path.is_absolute() {
        path.clone()
    } else {
        workspace.join(path)
    };
    Ok(Arc::new(AxeRuleEngine::from_file(&path).await?))
}

#[cfg(feature = "browser")]
fn launcher(config: &A11yConfig) -> anyhow::Result<Arc<dyn BrowserLauncher>> {
    Ok(Arc::new(a11ybot_core::browser::ChromiumLauncher::new(
        config.browser.clone(),
    )))
}

#[cfg(not(feature = "browser"))]
fn launcher(_config: &A11yConfig) -> anyhow::Result<Arc<dyn BrowserLauncher>> {
    anyhow::bail!("a11ybot was built without browser support; rebuild with --features browser")
}

/// `<output_dir>/<host>/<timestamp>.pdf`, with a relative output dir taken
/// from the workspace.
fn default_report_path(config: &A11yConfig, workspace: &Path, result: &AuditResult) -> PathBuf {
    let base = if config.report.output_dir.is_absolute() {
        config.report.output_dir.clone()
    } else {
        workspace.join(&config.report.output_dir)
    };
    base.join(host_dir(&result.url))
        .join(report_file_name(result.audited_at))
}

fn host_dir(url: &str) -> String {
    let host = url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| "unknown-host".to_string());
    host.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn report_file_name(at: DateTime<Utc>) -> String {
    format!("{}.pdf", at.format("%Y%m%dT%H%M%SZ"))
}

fn print_result(
    result: &AuditResult,
    report_path: Option<&Path>,
    json: bool,
    quiet: bool,
) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }
    if quiet {
        match report_path {
            Some(path) => println!("{} {}", result.score, path.display()),
            None => println!("{}", result.score),
        }
        return Ok(());
    }

    let counts = &result.impact_counts;
    println!("Audited {}", result.url);
    println!("  Score:      {}/100", result.score);
    println!(
        "  Violations: {} (critical {}, serious {}, moderate {}, minor {}, unknown {})",
        result.violations.len(),
        counts.critical,
        counts.serious,
        counts.moderate,
        counts.minor,
        counts.unknown
    );
    println!("  Suggestions: {}", result.suggestions.len());
    println!("  Focus trap:");
    for issue in &result.focus_trap {
        println!("    - {:?}: {}", issue.kind, issue.message);
    }
    if let Some(path) = report_path {
        println!("Report: {}", path.display());
    }
    Ok(())
}
