use std::io;
use std::io::IsTerminal;
use std::io::Read;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};

use crate::client::{AnalysisClient, ClientMode};
use crate::ui::UiConfig;

#[derive(Debug, Parser)]
#[command(
    name = "geoscreen",
    version,
    about = "Screen feature descriptions for geo-compliance findings: analyze, triage, export"
)]
pub struct Cli {
    #[arg(long, global = true)]
    pub json: bool,
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,
    #[arg(long, global = true)]
    pub verbose: bool,
    #[arg(long, global = true)]
    pub quiet: bool,
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    #[arg(long, default_value_t = 30, global = true)]
    pub timeout: u64,
    #[arg(long, global = true)]
    pub mock: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    Analyze(AnalyzeArgs),
    Export(ExportArgs),
    History(HistoryArgs),
    Ui(UiArgs),
    Config(ConfigArgs),
    Completion(CompletionArgs),
}

#[derive(Debug, Args)]
pub struct AnalyzeArgs {
    #[arg(long)]
    pub text: Option<String>,
    #[arg(long)]
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Csv,
    Json,
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    #[arg(value_enum)]
    pub format: ExportFormat,
    #[arg(long)]
    pub feature_id: Option<String>,
    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct HistoryArgs {
    #[arg(long, default_value_t = 20)]
    pub limit: usize,
}

#[derive(Debug, Args)]
pub struct UiArgs {}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[arg(long)]
    pub show: bool,
}

#[derive(Debug, Args)]
pub struct CompletionArgs {
    pub shell: String,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let stdin_is_tty = io::stdin().is_terminal();
    let stdout_is_tty = io::stdout().is_terminal();
    let stderr_is_tty = io::stderr().is_terminal();

    let home_dir = crate::config::effective_home_dir()?;

    let env_config_path = std::env::var_os("GEOSCREEN_CONFIG").map(PathBuf::from);
    let mut cfg = crate::config::load(
        cli.config.as_deref().or(env_config_path.as_deref()),
        &home_dir,
    )
    .map_err(crate::exit::invalid_args_err)?;

    // The run-mode override is explicit and per-invocation; nothing below
    // reads the environment to decide mock vs live.
    if cli.mock {
        cfg.client.mode = ClientMode::Mock;
    }

    let color = stdout_is_tty && cfg.ui.color && !cli.no_color;

    let ui_cfg = UiConfig {
        color,
        stdin_is_tty,
        stdout_is_tty,
        stderr_is_tty,
        max_table_rows: cfg.ui.max_table_rows,
        truncate_chars: cfg.ui.truncate_chars,
        quiet: cli.quiet,
        verbose: cli.verbose,
    };

    let timeout = Duration::from_secs(cli.timeout);

    match cli.command {
        Commands::Analyze(args) => {
            let raw_text = read_feature_text(&args, stdin_is_tty)?;
            let client = crate::client::from_mode(cfg.client.mode, &cfg.client.base_url, timeout)
                .map_err(crate::exit::invalid_args_err)?;

            let result = run_analysis(
                client.as_ref(),
                &raw_text,
                &home_dir,
                cfg.history.keep,
                &ui_cfg,
                cli.json,
            )?;

            if cli.json {
                write_json(&result)?;
            } else {
                crate::ui::print_analysis(&result, &ui_cfg);
            }
        }
        Commands::Export(args) => {
            let client = crate::client::from_mode(cfg.client.mode, &cfg.client.base_url, timeout)
                .map_err(crate::exit::invalid_args_err)?;

            let feature_id = match (args.feature_id, cfg.client.mode) {
                (Some(id), _) => id,
                (None, ClientMode::Mock) => crate::mock::sample_result().feature_id,
                (None, ClientMode::Live) => {
                    return Err(crate::exit::invalid_args(
                        "export: --feature-id is required in live mode",
                    ));
                }
            };

            let payload = match args.format {
                ExportFormat::Csv => client
                    .export_csv(&feature_id)
                    .map_err(crate::exit::export_failed_err)?,
                ExportFormat::Json => client
                    .export_json(&feature_id)
                    .map_err(crate::exit::export_failed_err)?,
            };

            match args.output {
                Some(path) => {
                    std::fs::write(&path, &payload)
                        .with_context(|| {
                            format!("export: failed to write output: {}", path.display())
                        })
                        .map_err(crate::exit::export_failed_err)?;
                    if !ui_cfg.quiet {
                        eprintln!("wrote {}", path.display());
                    }
                }
                None => {
                    let mut out = io::stdout().lock();
                    let _ = writeln!(out, "{payload}");
                }
            }
        }
        Commands::History(args) => {
            let entries =
                crate::history::list(&home_dir).map_err(crate::exit::invalid_args_err)?;
            print_history(&entries, args.limit, cli.json, &ui_cfg)?;
        }
        Commands::Ui(_) => {
            if !(stdin_is_tty && stdout_is_tty) {
                return Err(crate::exit::invalid_args(
                    "ui requires a TTY (stdin + stdout)",
                ));
            }
            let client = crate::client::from_mode(cfg.client.mode, &cfg.client.base_url, timeout)
                .map_err(crate::exit::invalid_args_err)?;
            crate::tui::run(
                client.into(),
                home_dir,
                color,
                cfg.ui.page_size,
                cfg.ui.truncate_chars,
                cfg.history.keep,
            )?;
        }
        Commands::Config(args) => {
            if cli.json {
                write_json(&cfg)?;
            } else if args.show {
                let rendered =
                    toml::to_string(&cfg).context("failed to render effective config as TOML")?;
                let mut out = io::stdout().lock();
                let _ = writeln!(out, "{rendered}");
            } else if !ui_cfg.quiet {
                let mut out = io::stdout().lock();
                let _ = writeln!(out, "mode: {}", cfg.client.mode);
                let _ = writeln!(out, "base_url: {}", cfg.client.base_url);
                let _ = writeln!(
                    out,
                    "config file: {}",
                    cfg.config_path.as_deref().unwrap_or("(defaults)")
                );
                let _ = writeln!(out, "hint: use `config --show` for the full effective config");
            }
        }
        Commands::Completion(args) => {
            let shell = parse_shell(&args.shell)?;
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            clap_complete::generate(shell, &mut cmd, name, &mut io::stdout());
        }
    }

    Ok(())
}

fn run_analysis(
    client: &dyn AnalysisClient,
    raw_text: &str,
    home_dir: &std::path::Path,
    keep_history: bool,
    ui_cfg: &UiConfig,
    json: bool,
) -> Result<crate::core::AnalysisResult> {
    let show_spinner = ui_cfg.stderr_is_tty && !ui_cfg.quiet && !json;
    let pb = if show_spinner {
        let pb = indicatif::ProgressBar::new_spinner();
        pb.set_draw_target(indicatif::ProgressDrawTarget::stderr());
        pb.set_message("analyzing feature description...");
        pb.enable_steady_tick(Duration::from_millis(120));
        Some(pb)
    } else {
        None
    };

    let started_at = time::OffsetDateTime::now_utc();
    let result = client.analyze(raw_text);
    let finished_at = time::OffsetDateTime::now_utc();

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    let result = result.map_err(crate::exit::analysis_failed_err)?;

    // History is best-effort: a write failure must not fail the analysis.
    if keep_history {
        if let Err(err) = crate::history::write_analysis(
            home_dir,
            started_at,
            finished_at,
            &client.mode().to_string(),
            raw_text,
            &result,
        ) {
            if !ui_cfg.quiet {
                eprintln!("warning: could not save analysis to history: {err}");
            }
        }
    }

    Ok(result)
}

fn read_feature_text(args: &AnalyzeArgs, stdin_is_tty: bool) -> Result<String> {
    let raw = if let Some(text) = &args.text {
        text.clone()
    } else if let Some(path) = &args.file {
        std::fs::read_to_string(path)
            .with_context(|| format!("analyze: failed to read file: {}", path.display()))
            .map_err(crate::exit::invalid_args_err)?
    } else if !stdin_is_tty {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("analyze: failed to read stdin")
            .map_err(crate::exit::invalid_args_err)?;
        buf
    } else {
        return Err(crate::exit::invalid_args(
            "analyze: provide the feature text via --text, --file, or stdin",
        ));
    };

    // Empty input is blocked before anything is submitted to the backend.
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(crate::exit::invalid_args("analyze: feature text is empty"));
    }
    Ok(trimmed.to_string())
}

fn print_history(
    entries: &[crate::history::HistoryFile],
    limit: usize,
    json: bool,
    ui_cfg: &UiConfig,
) -> Result<()> {
    let limit = limit.max(1);
    let shown = entries.iter().take(limit);

    if json {
        let mut items = Vec::new();
        for file in shown {
            match crate::history::load(&file.path) {
                Ok(entry) => items.push(serde_json::json!({
                    "file": file.file_name,
                    "finished_at": entry.finished_at,
                    "mode": entry.mode,
                    "feature_id": entry.result.feature_id,
                    "findings": entry.result.findings.len(),
                    "prompt_excerpt": entry.prompt_excerpt,
                })),
                Err(err) => items.push(serde_json::json!({
                    "file": file.file_name,
                    "error": err.to_string(),
                })),
            }
        }
        return write_json(&items);
    }

    if ui_cfg.quiet {
        return Ok(());
    }

    let mut out = io::stdout().lock();
    if entries.is_empty() {
        let _ = writeln!(out, "no saved analyses.");
        return Ok(());
    }

    if entries.len() > limit {
        let _ = writeln!(out, "saved analyses ({limit} shown of {}):", entries.len());
    } else {
        let _ = writeln!(out, "saved analyses ({} shown):", entries.len());
    }
    for file in entries.iter().take(limit) {
        match crate::history::load(&file.path) {
            Ok(entry) => {
                let _ = writeln!(
                    out,
                    "- {}  [{}] {} findings  {}",
                    entry.finished_at,
                    entry.mode,
                    entry.result.findings.len(),
                    entry.prompt_excerpt
                );
            }
            Err(_) => {
                let _ = writeln!(out, "- {} (unreadable)", file.file_name);
            }
        }
    }
    Ok(())
}

fn parse_shell(s: &str) -> Result<clap_complete::Shell> {
    match s.trim().to_ascii_lowercase().as_str() {
        "bash" => Ok(clap_complete::Shell::Bash),
        "zsh" => Ok(clap_complete::Shell::Zsh),
        "fish" => Ok(clap_complete::Shell::Fish),
        "elvish" => Ok(clap_complete::Shell::Elvish),
        "powershell" => Ok(clap_complete::Shell::PowerShell),
        other => Err(crate::exit::invalid_args(format!(
            "completion: unknown shell: {other} (expected bash|zsh|fish|elvish|powershell)"
        ))),
    }
}

fn write_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let mut out = io::stdout().lock();
    serde_json::to_writer_pretty(&mut out, value).context("failed to serialize output JSON")?;
    let _ = writeln!(out);
    Ok(())
}
