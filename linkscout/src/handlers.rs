use anyhow::{Context, Result, bail};
use clap::ArgMatches;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use linkscout_core::config::RunConfig;
use linkscout_core::domain::normalize_domain;
use linkscout_core::report::{
    Report, ReportFormat, generate_json_report, generate_text_report, save_report,
};
use linkscout_core::run::{Mode, RunProgressCallback, RunRequest, execute_run};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{Level, warn};

// Helper functions for target loading

/// Load targets from positional arguments and/or a domains file
pub fn load_domains_from_source(
    domains: Vec<String>,
    domains_file: Option<&PathBuf>,
) -> Result<Vec<String>> {
    let mut targets = domains;
    if let Some(path) = domains_file {
        targets.extend(load_domains_from_file(path)?);
    }
    if targets.is_empty() {
        bail!("Provide at least one domain or --domains-file");
    }
    Ok(targets)
}

/// Load and normalize domains from a newline-delimited file
pub fn load_domains_from_file(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read domains file {}", path.display()))?;

    let domains: Vec<String> = content.lines().filter_map(parse_domain_line).collect();

    if domains.is_empty() {
        bail!("No valid domains found in {}", path.display());
    }

    Ok(domains)
}

/// Parse a single line as a domain. Blank lines and `#` comments yield `None`.
pub fn parse_domain_line(line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    match normalize_domain(line) {
        Ok(domain) => Some(domain),
        Err(_) => {
            eprintln!("{}  Skipping invalid domain '{}'", "⚠".yellow(), line);
            None
        }
    }
}

/// WARN by default, INFO with `-v`, DEBUG with `-vv` and above.
pub fn log_level(verbosity: u8) -> Level {
    match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    }
}

pub fn init_tracing(verbosity: u8) {
    tracing_subscriber::fmt()
        .with_max_level(log_level(verbosity))
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

pub fn load_config(path: Option<&PathBuf>) -> Result<RunConfig> {
    let config = RunConfig::load_or_default(path.map(PathBuf::as_path))
        .context("Failed to load configuration")?;
    Ok(config)
}

fn override_value<T: Clone + Send + Sync + 'static>(args: &ArgMatches, id: &str, target: &mut T) {
    if let Ok(Some(value)) = args.try_get_one::<T>(id) {
        *target = value.clone();
    }
}

/// Apply the threshold flags a subcommand defines on top of the loaded config.
pub fn apply_overrides(config: &mut RunConfig, args: &ArgMatches) {
    override_value(args, "min-shared", &mut config.min_shared);
    override_value(args, "max-referrers", &mut config.max_referrers);
    override_value(args, "max-outlinks", &mut config.max_outlinks_per_referrer);
    override_value(args, "max-second-level", &mut config.max_second_level);
    override_value(args, "link-cap", &mut config.link_cap);
    override_value(args, "context-window", &mut config.context_window);
    override_value(args, "top-k", &mut config.top_k);
    override_value(args, "max-per-tier", &mut config.max_per_tier);
    override_value(args, "min-confidence", &mut config.confidence_threshold);
}

pub fn build_request(mode: Mode, args: &ArgMatches, targets: Vec<String>) -> RunRequest {
    let mut request = RunRequest::new(mode, targets);
    if let Ok(Some(referrer)) = args.try_get_one::<String>("referrer") {
        request = request.with_referrer(referrer.clone());
    }
    if let Ok(Some(term)) = args.try_get_one::<String>("term") {
        request = request.with_term(term.clone());
    }
    request
}

pub fn render_report(report: &Report, format: ReportFormat) -> Result<String> {
    match format {
        ReportFormat::Text => Ok(generate_text_report(report)),
        ReportFormat::Json => {
            generate_json_report(report).context("Failed to serialize JSON report")
        }
    }
}

fn progress_spinner(quiet: bool) -> Option<ProgressBar> {
    if quiet {
        return None;
    }
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message("Starting...");
    Some(spinner)
}

pub async fn handle_run(mode: Mode, args: &ArgMatches) -> Result<()> {
    let mut config = load_config(args.get_one::<PathBuf>("config"))?;
    apply_overrides(&mut config, args);

    let domains: Vec<String> = args
        .get_many::<String>("DOMAINS")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();
    let targets = load_domains_from_source(domains, args.get_one::<PathBuf>("domains-file"))?;
    let format = args
        .get_one::<String>("format")
        .and_then(|f| ReportFormat::from_str(f))
        .unwrap_or(ReportFormat::Text);
    let output = args.get_one::<PathBuf>("output");

    let sources = config
        .build_sources()
        .context("Failed to set up data sources")?;
    let request = build_request(mode, args, targets);

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing with partial results");
            interrupt.cancel();
        }
    });

    let spinner = progress_spinner(args.get_flag("quiet"));
    let progress_callback = spinner.clone().map(|pb| {
        Arc::new(move |msg: String| pb.set_message(msg)) as RunProgressCallback
    });

    let outcome = execute_run(request, &config, sources, cancel, progress_callback).await;
    if let Some(pb) = &spinner {
        pb.finish_and_clear();
    }
    let report = outcome?;

    if output.is_some() {
        colored::control::set_override(false);
    }
    let rendered = render_report(&report, format)?;

    match output {
        Some(path) => {
            save_report(&rendered, path)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            eprintln!(
                "{} Report saved to {}",
                "✓".green().bold(),
                path.display().to_string().bright_white()
            );
        }
        None => print!("{}", rendered),
    }

    if report.diagnostics.cancelled {
        eprintln!("{} Run interrupted, report is partial", "⚠".yellow().bold());
    }
    Ok(())
}

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

fn print_prompt(msg: &str) -> Result<String> {
    print!("{} ", msg.bright_cyan().bold());
    io::stdout().flush()?;
    let mut response = String::new();
    io::stdin().read_line(&mut response)?;
    Ok(response.trim().to_lowercase())
}

/// Write the built-in configuration to `path`. Returns `false` without touching
/// anything when the file exists and `overwrite` is not set.
pub fn write_default_config(path: &Path, overwrite: bool) -> Result<bool> {
    if path.exists() && !overwrite {
        return Ok(false);
    }
    RunConfig::default()
        .save(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(true)
}

pub fn handle_init(args: &ArgMatches) -> Result<()> {
    print_divider();
    println!("{}", "  LINKSCOUT INITIALIZATION".bright_white().bold());
    print_divider();
    println!();

    let raw_path = args
        .get_one::<String>("PATH")
        .map(String::as_str)
        .unwrap_or("~/.config/linkscout/config.json");
    let force = args.get_flag("force");
    let config_path = PathBuf::from(shellexpand::tilde(raw_path).as_ref());

    println!(
        "{} Target: {}",
        "→".blue(),
        config_path.display().to_string().bright_white()
    );
    println!();

    let mut overwrite = force;
    if config_path.exists() && !force {
        println!("{}", "⚠ WARNING".yellow().bold());
        println!("Configuration already exists:");
        println!(
            "  {} {}",
            "•".yellow(),
            config_path.display().to_string().bright_white()
        );
        println!();

        let response = print_prompt("Overwrite it with the defaults? [y/N]:")?;
        println!();

        if response != "y" && response != "yes" {
            println!("{} Initialization cancelled.", "✗".red().bold());
            return Ok(());
        }
        overwrite = true;
    }

    write_default_config(&config_path, overwrite)?;

    print_divider();
    println!("{}", "  INITIALIZATION COMPLETE".green().bold());
    print_divider();
    println!();
    println!(
        "{} Config: {}",
        "✓".green().bold(),
        config_path.display().to_string().bright_white()
    );
    println!(
        "{} Add a link provider, NER service and search engines under \"sources\",",
        "ℹ".blue()
    );
    println!("  or point \"sources.fixtures\" at a fixture file for offline runs.");
    println!();
    Ok(())
}
