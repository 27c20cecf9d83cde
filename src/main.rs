use std::io::{BufRead, Read};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use futures::future::join_all;
use tracing::{info, warn};

use ccui_state::config::{Settings, data_dir, db_path, log_path};
use ccui_state::document::{self, ConfigDocument, ConfigLocator};
use ccui_state::env::{
    self, CheckTargets, EnvVarSet, apply_account, check_environment, default_launcher_dir,
    ensure_bin_on_path, install_launcher, mask_secret, platform_store,
};
use ccui_state::{logging, process};
use ccui_state::version::cache::{CacheOptions, VersionCache};
use ccui_state::version::resolver::create_default_resolvers;
use ccui_state::version::store::SqliteStatusStore;
use ccui_state::version::types::VersionStatus;

#[derive(Parser)]
#[command(name = "ccui-state")]
#[command(version, about = "Version and environment state manager for the Claude Code CLI")]
struct Cli {
    /// Also print logs to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the last known installed and latest versions
    Status {
        #[arg(long)]
        json: bool,
    },
    /// Look up installed and latest versions now
    Check {
        #[arg(long)]
        json: bool,
    },
    /// Keep refreshing in the background and print statuses until interrupted
    Watch {
        /// Seconds between refresh cycles
        #[arg(long)]
        interval_secs: Option<u64>,
    },
    /// Persist account environment variables
    Env {
        #[command(subcommand)]
        action: EnvAction,
    },
    /// Inspect or edit the layered config document
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum EnvAction {
    /// Write the env file and mirror it into the user environment store
    Apply {
        #[arg(long)]
        base_url: String,
        /// Auth token; prefer `CCUI_AUTH_TOKEN` or `--auth-token-stdin` over argv
        #[arg(long, env = "CCUI_AUTH_TOKEN", hide_env_values = true)]
        auth_token: Option<String>,
        /// Read the auth token from the first line of stdin instead
        #[arg(long)]
        auth_token_stdin: bool,
        /// Only write the env file
        #[arg(long)]
        no_user_store: bool,
    },
    /// Report whether the env file, launcher and PATH are set up
    Check {
        #[arg(long)]
        json: bool,
        #[arg(long)]
        bin_dir: Option<PathBuf>,
    },
    /// Put a directory on PATH through the shell profiles
    Path {
        #[arg(long)]
        bin_dir: Option<PathBuf>,
    },
    /// Install the `ccui` launcher script
    Launcher {
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective config path and its layer
    Path,
    /// Print the effective config document
    Show {
        /// Substitute managed `${VAR}` placeholders from the environment
        #[arg(long)]
        resolve: bool,
    },
    /// Replace a top-level section with JSON read from a file (`-` for stdin)
    SetSection { key: String, file: PathBuf },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _guard = logging::init(&log_path(), cli.verbose)?;
    let settings = Settings::load()?;

    match cli.command {
        Command::Status { json } => runtime()?.block_on(status(&settings, json)),
        Command::Check { json } => runtime()?.block_on(check(&settings, json)),
        Command::Watch { interval_secs } => runtime()?.block_on(watch(&settings, interval_secs)),
        Command::Env { action } => env_command(&settings, action),
        Command::Config { action } => config_command(&settings, action),
    }
}

fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?)
}

fn build_cache(settings: &Settings) -> Arc<VersionCache> {
    let resolvers = create_default_resolvers(&settings.providers);
    let mut cache = VersionCache::new(resolvers, CacheOptions::from(&settings.cache));

    let store = std::fs::create_dir_all(data_dir())
        .map_err(anyhow::Error::from)
        .and_then(|_| Ok(SqliteStatusStore::new(&db_path())?));
    match store {
        Ok(store) => cache = cache.with_store(Arc::new(store)),
        Err(e) => warn!("Status store unavailable, starting empty: {}", e),
    }

    cache.apply_overrides(&settings.overrides);
    Arc::new(cache)
}

fn print_statuses(statuses: &[VersionStatus], json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(statuses)?);
        return Ok(());
    }

    for status in statuses {
        let update = if status.is_update_available {
            " (update available)"
        } else {
            ""
        };
        println!(
            "{:<18} {} -> {}{} [{}]",
            status.component.as_str(),
            status.current_version,
            status.latest_version,
            update,
            status.source.as_str()
        );
    }
    Ok(())
}

async fn status(settings: &Settings, json: bool) -> anyhow::Result<()> {
    let cache = build_cache(settings);
    print_statuses(&cache.statuses(), json)?;

    // Let refreshes scheduled by stale reads reach the status store before exit
    if !cache.wait_idle(cache.options().check_timeout).await {
        warn!("Exiting with refreshes still in flight");
    }
    Ok(())
}

async fn check(settings: &Settings, json: bool) -> anyhow::Result<()> {
    let cache = build_cache(settings);
    let statuses: Vec<VersionStatus> = join_all(
        cache
            .components()
            .into_iter()
            .map(|component| cache.check_now(component)),
    )
    .await
    .into_iter()
    .flatten()
    .collect();

    print_statuses(&statuses, json)
}

async fn watch(settings: &Settings, interval_secs: Option<u64>) -> anyhow::Result<()> {
    let interval = Duration::from_secs(
        interval_secs
            .unwrap_or(settings.cache.refresh_interval_secs)
            .max(1),
    );
    let cache = build_cache(settings);
    let handle = cache.start_background_refresh(interval);
    if handle.is_none() {
        warn!("Background refresh is disabled; statuses only reflect stale reads");
    }

    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => {
                cache.wait_idle(cache.options().check_timeout).await;
                print_statuses(&cache.statuses(), false)?;
            }
        }
    }

    info!("Interrupted, stopping background refresh");
    if let Some(handle) = handle {
        handle.shutdown().await;
    }
    Ok(())
}

fn env_command(settings: &Settings, action: EnvAction) -> anyhow::Result<()> {
    match action {
        EnvAction::Apply {
            base_url,
            auth_token,
            auth_token_stdin,
            no_user_store,
        } => {
            let auth_token = if auth_token_stdin {
                read_secret_line()?
            } else {
                auth_token.context(
                    "No auth token given: pass --auth-token-stdin or set CCUI_AUTH_TOKEN",
                )?
            };
            let vars = EnvVarSet::for_account(&base_url, &auth_token)?;
            let store: Box<dyn env::UserEnvironment> = if no_user_store {
                Box::new(env::user_store::NoopUserEnvironment)
            } else {
                platform_store()
            };

            let report = apply_account(&settings.env_file_path(), &vars, store.as_ref())?;
            println!("Wrote {}", report.env_file.display());
            if let Some(name) = report.user_store {
                println!("Synced {} variables to {}", report.synced, name);
            }
            println!("Auth token: {}", mask_secret(&auth_token, 4));
        }
        EnvAction::Path { bin_dir } => {
            let bin_dir = bin_dir.unwrap_or_else(default_launcher_dir);
            let profiles = if cfg!(windows) {
                Vec::new()
            } else {
                settings.shell_profiles()
            };

            let report = ensure_bin_on_path(&bin_dir, &profiles, platform_store().as_ref())?;
            for profile in &report.updated_profiles {
                println!("Updated {}", profile.display());
            }
            if report.user_path_updated {
                println!("Added {} to the user PATH", bin_dir.display());
            }
            if report.updated_profiles.is_empty() && !report.user_path_updated {
                println!("{} is already on PATH", bin_dir.display());
            }
        }
        EnvAction::Check { json, bin_dir } => {
            let bin_dir = bin_dir.unwrap_or_else(default_launcher_dir);
            let env_file = settings.env_file_path();
            let path_var = std::env::var_os("PATH");
            let report = check_environment(&CheckTargets {
                env_file: &env_file,
                launcher_dir: &bin_dir,
                cli_command: &settings.providers.cli_command,
                path_var: path_var.as_deref(),
                cli_path: process::find_command(&settings.providers.cli_command),
            })?;

            let issues = report.issues();
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else if issues.is_empty() {
                println!("Environment is set up");
            } else {
                for issue in &issues {
                    println!("- {}", issue);
                }
            }
            if !issues.is_empty() {
                anyhow::bail!("{} environment issue(s) found", issues.len());
            }
        }
        EnvAction::Launcher { dir } => {
            let dir = dir.unwrap_or_else(default_launcher_dir);
            let path = install_launcher(
                &dir,
                &settings.env_file_path(),
                &settings.providers.cli_command,
            )?;
            println!("Installed {}", path.display());
        }
    }
    Ok(())
}

fn read_secret_line() -> anyhow::Result<String> {
    read_secret_line_from(std::io::stdin().lock())
}

fn read_secret_line_from(mut reader: impl BufRead) -> anyhow::Result<String> {
    let mut line = String::new();
    reader
        .read_line(&mut line)
        .context("Failed to read auth token from stdin")?;
    let token = line.trim_end_matches(['\r', '\n']).to_string();
    if token.is_empty() {
        anyhow::bail!("Empty auth token on stdin");
    }
    Ok(token)
}

fn config_command(settings: &Settings, action: ConfigAction) -> anyhow::Result<()> {
    let locator = ConfigLocator::from_settings(settings);

    match action {
        ConfigAction::Path => {
            let resolved = locator.resolve_path();
            println!("{} ({})", resolved.path.display(), resolved.layer.as_str());
        }
        ConfigAction::Show { resolve } => {
            let document = ConfigDocument::load(&locator)?;
            let value = if resolve {
                document.presentation(|name| std::env::var(name).ok())
            } else {
                serde_json::Value::Object(document.content)
            };
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        ConfigAction::SetSection { key, file } => {
            let raw = if file.as_os_str() == "-" {
                let mut raw = String::new();
                std::io::stdin().read_to_string(&mut raw)?;
                raw
            } else {
                std::fs::read_to_string(&file)
                    .with_context(|| format!("Failed to read {}", file.display()))?
            };
            let value: serde_json::Value = serde_json::from_str(&raw)
                .with_context(|| format!("Invalid JSON for section {}", key))?;

            let resolved = document::update_section(&locator, &key, value)?;
            println!("Updated {} in {}", key, resolved.path.display());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::unix("sk-ant-123\n", "sk-ant-123")]
    #[case::windows("sk-ant-123\r\n", "sk-ant-123")]
    #[case::no_newline("sk-ant-123", "sk-ant-123")]
    #[case::first_line_only("sk-ant-123\nrest\n", "sk-ant-123")]
    fn read_secret_line_takes_first_line(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(read_secret_line_from(input.as_bytes()).unwrap(), expected);
    }

    #[test]
    fn read_secret_line_rejects_empty_input() {
        assert!(read_secret_line_from("\n".as_bytes()).is_err());
    }

    #[test]
    fn env_apply_accepts_token_from_stdin_flag() {
        let cli = Cli::try_parse_from([
            "ccui-state",
            "env",
            "apply",
            "--base-url",
            "https://api.example.com",
            "--auth-token-stdin",
        ])
        .unwrap();

        match cli.command {
            Command::Env {
                action:
                    EnvAction::Apply {
                        auth_token_stdin, ..
                    },
            } => assert!(auth_token_stdin),
            _ => panic!("expected env apply"),
        }
    }

    #[test]
    fn env_check_parses_options() {
        let cli =
            Cli::try_parse_from(["ccui-state", "env", "check", "--json", "--bin-dir", "/opt/bin"])
                .unwrap();

        match cli.command {
            Command::Env {
                action: EnvAction::Check { json, bin_dir },
            } => {
                assert!(json);
                assert_eq!(bin_dir, Some(PathBuf::from("/opt/bin")));
            }
            _ => panic!("expected env check"),
        }
    }
}
