use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use colored::Colorize;
use serde::Serialize;
use sfpr_registry::{
    IntakeOutcome, IntakeRequest, Registry, RegistryConfig, Submission, SubmissionId,
    SubmissionState,
};
use sfpr_server::RegistryServer;
use tracing::debug;

use crate::cli::*;

const DEFAULT_CONFIG: &str = "sfpr.toml";

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let format = cli.format;
    let config = cli.config;
    match cli.command {
        Command::Init(args) => cmd_init(config, args),
        Command::Submit(args) => cmd_submit(&open(config)?, format, args),
        Command::List(args) => cmd_list(&open(config)?, format, args),
        Command::Show(args) => cmd_show(&open(config)?, format, args),
        Command::Approve(args) => cmd_approve(&open(config)?, format, args),
        Command::Reject(args) => cmd_reject(&open(config)?, format, args),
        Command::Adjudicate(args) => cmd_adjudicate(&open(config)?, format, args),
        Command::Conflicts => cmd_conflicts(&open(config)?, format),
        Command::Publish => cmd_publish(&open(config)?, format),
        Command::Index(args) => cmd_index(&open(config)?, args),
        Command::Fsck => cmd_fsck(&open(config)?, format),
        Command::Serve(args) => cmd_serve(config, args),
    }
}

fn open(config: Option<PathBuf>) -> anyhow::Result<Registry> {
    let config = load_config(config.as_deref())?;
    Registry::open(config).context("cannot open registry")
}

fn load_config(path: Option<&Path>) -> anyhow::Result<RegistryConfig> {
    debug!(config = ?path, "loading configuration");
    match path {
        Some(path) => RegistryConfig::load(path)
            .with_context(|| format!("cannot load {}", path.display())),
        None if Path::new(DEFAULT_CONFIG).is_file() => {
            RegistryConfig::load(Path::new(DEFAULT_CONFIG)).context("cannot load ./sfpr.toml")
        }
        None => Ok(RegistryConfig::default()),
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_id(raw: &str) -> anyhow::Result<SubmissionId> {
    raw.parse()
        .map_err(|_| anyhow::anyhow!("not a submission id: {raw}"))
}

fn state_label(state: &SubmissionState) -> colored::ColoredString {
    let label = state.label();
    let label = label.as_str();
    match state {
        SubmissionState::Approved | SubmissionState::Published => label.green(),
        SubmissionState::Rejected => label.red(),
        SubmissionState::Classified(sfpr_staging::ClassKind::MetadataConflict) => label.yellow().bold(),
        _ => label.cyan(),
    }
}

fn print_submission_line(s: &Submission) {
    println!(
        "{}  {:<18} {} / {} / {}  {}",
        s.id.to_string().yellow(),
        state_label(&s.state),
        s.metadata.vendor,
        s.metadata.model,
        s.metadata.serial,
        s.digest.short_hex().dimmed(),
    );
}

fn cmd_init(config_path: Option<PathBuf>, args: InitArgs) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
    if path.exists() && !args.force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }

    let mut config = RegistryConfig::with_data_dir(&args.data_dir);
    config.policy.auto_approve_new = args.auto_approve;
    std::fs::write(&path, config.to_toml_string()?)
        .with_context(|| format!("cannot write {}", path.display()))?;

    // Resolve the data dir the same way a later load will.
    let config = RegistryConfig::load(&path)?;
    let registry = Registry::open(config)?;
    println!(
        "{} Initialized registry in {}",
        "✓".green().bold(),
        registry.config().data_dir.display().to_string().bold()
    );
    println!("  Config: {}", path.display());
    println!(
        "  Auto-approve new submissions: {}",
        if args.auto_approve { "yes".green() } else { "no".yellow() }
    );
    Ok(())
}

fn cmd_submit(registry: &Registry, format: OutputFormat, args: SubmitArgs) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(&args.metadata)
        .with_context(|| format!("cannot read {}", args.metadata.display()))?;
    let metadata: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("{} is not JSON", args.metadata.display()))?;
    let blob = std::fs::read(&args.blob)
        .with_context(|| format!("cannot read {}", args.blob.display()))?;

    let receipt = registry.submit(IntakeRequest {
        metadata,
        blob,
        submitted_by: args.submitted_by,
    })?;

    if format == OutputFormat::Json {
        return print_json(&receipt);
    }

    match &receipt.outcome {
        IntakeOutcome::Queued { submission, state } => {
            println!("{} Queued {} ({})", "✓".green().bold(), submission.to_string().yellow(), state_label(state));
        }
        IntakeOutcome::Duplicate {
            existing,
            confirmations,
        } => {
            println!(
                "{} Duplicate of {} (confirmations: {})",
                "=".cyan().bold(),
                existing.to_string().yellow(),
                confirmations
            );
        }
        IntakeOutcome::Conflict {
            submission,
            existing,
        } => {
            println!(
                "{} Conflict: {} disagrees with {}; pending review",
                "!".yellow().bold(),
                submission.to_string().yellow(),
                existing
            );
        }
        IntakeOutcome::Rejected => {
            println!("{} Rejected", "✗".red().bold());
            for issue in &receipt.validation.errors {
                println!("  {} {}", "error:".red(), issue.message);
            }
        }
    }
    if let Some(digest) = receipt.digest {
        println!("  sha256: {}", digest.to_string().dimmed());
    }
    for issue in &receipt.validation.warnings {
        println!("  {} {}", "warning:".yellow(), issue.message);
    }
    if receipt.outcome == IntakeOutcome::Rejected {
        bail!("submission rejected");
    }
    Ok(())
}

fn cmd_list(registry: &Registry, format: OutputFormat, args: ListArgs) -> anyhow::Result<()> {
    let submissions: Vec<Submission> = registry
        .submissions()?
        .into_iter()
        .filter(|s| args.all || s.state != SubmissionState::Rejected)
        .collect();
    if format == OutputFormat::Json {
        return print_json(&submissions);
    }
    if submissions.is_empty() {
        println!("No staged submissions.");
    }
    for s in &submissions {
        print_submission_line(s);
    }
    Ok(())
}

fn cmd_show(registry: &Registry, format: OutputFormat, args: ShowArgs) -> anyhow::Result<()> {
    let s = registry.submission(&parse_id(&args.id)?)?;
    if format == OutputFormat::Json {
        return print_json(&s);
    }
    println!("Submission {}", s.id.to_string().yellow().bold());
    println!("  State:        {}", state_label(&s.state));
    println!("  Name:         {}", s.metadata.name);
    println!("  Device:       {}", s.device_key());
    println!("  sha256:       {}", s.digest);
    println!("  Size:         {} bytes", s.size);
    println!("  Submitted by: {}", s.submitted_by);
    println!("  Created:      {}", s.created_at.to_rfc3339());
    if s.confirmations > 0 {
        println!("  Confirmations: {}", s.confirmations);
    }
    if let Some(old) = s.supersedes {
        println!("  Supersedes:   {old}");
    }
    for w in &s.warnings {
        println!("  {} {}", "warning:".yellow(), w.message);
    }
    println!("  History:");
    for t in &s.history {
        let mut line = format!("    {}  {} -> {}", t.at.to_rfc3339(), t.from, t.to);
        if let Some(actor) = &t.actor {
            line.push_str(&format!("  by {actor}"));
        }
        if let Some(reason) = &t.reason {
            line.push_str(&format!("  ({reason})"));
        }
        println!("{}", line.dimmed());
    }
    Ok(())
}

fn cmd_approve(registry: &Registry, format: OutputFormat, args: DecisionArgs) -> anyhow::Result<()> {
    let s = registry.approve(&parse_id(&args.id)?, Some(&args.actor))?;
    if format == OutputFormat::Json {
        return print_json(&s);
    }
    println!("{} Approved {}", "✓".green().bold(), s.id.to_string().yellow());
    Ok(())
}

fn cmd_reject(registry: &Registry, format: OutputFormat, args: RejectArgs) -> anyhow::Result<()> {
    let s = registry.reject(&parse_id(&args.id)?, Some(&args.actor), &args.reason)?;
    if format == OutputFormat::Json {
        return print_json(&s);
    }
    println!("{} Rejected {}", "✗".red().bold(), s.id.to_string().yellow());
    Ok(())
}

fn cmd_adjudicate(registry: &Registry, format: OutputFormat, args: AdjudicateArgs) -> anyhow::Result<()> {
    let s = registry.adjudicate(
        &parse_id(&args.id)?,
        args.ruling,
        Some(&args.actor),
        args.reason.as_deref(),
    )?;
    if format == OutputFormat::Json {
        return print_json(&s);
    }
    println!("{} {} is now {}", "✓".green().bold(), s.id.to_string().yellow(), state_label(&s.state));
    if let Some(old) = s.supersedes {
        println!("  Will supersede module {old} on publish");
    }
    Ok(())
}

fn cmd_conflicts(registry: &Registry, format: OutputFormat) -> anyhow::Result<()> {
    let conflicts = registry.conflicts()?;
    if format == OutputFormat::Json {
        return print_json(&conflicts);
    }
    if conflicts.is_empty() {
        println!("{} No conflicts.", "✓".green().bold());
    }
    for report in &conflicts {
        println!("{} {}", "!".yellow().bold(), report.key.to_string().bold());
        for entry in &report.entries {
            let state = entry
                .state
                .as_ref()
                .map(|s| state_label(s).to_string())
                .unwrap_or_else(|| "published".green().to_string());
            println!("    {}  {}  {}", entry.reference, entry.digest.short_hex().dimmed(), state);
        }
    }
    Ok(())
}

fn cmd_publish(registry: &Registry, format: OutputFormat) -> anyhow::Result<()> {
    let report = registry.publish()?;
    if format == OutputFormat::Json {
        return print_json(&report);
    }
    if report.committed {
        println!(
            "{} Published index version {} ({} new records)",
            "✓".green().bold(),
            report.version.to_string().bold(),
            report.published.len()
        );
    } else {
        println!("Nothing to publish (index version {}).", report.version);
    }
    Ok(())
}

fn cmd_index(registry: &Registry, args: IndexArgs) -> anyhow::Result<()> {
    match args.version {
        None => print_json(registry.index()?.as_ref()),
        Some(version) => match registry.index_version(version)? {
            Some(snapshot) => print_json(&snapshot),
            None => bail!("index version {version} is not available"),
        },
    }
}

fn cmd_fsck(registry: &Registry, format: OutputFormat) -> anyhow::Result<()> {
    let report = registry.fsck()?;
    if format == OutputFormat::Json {
        print_json(&report)?;
    } else {
        println!(
            "Checked {} blobs and {} records",
            report.blobs_checked, report.records_checked
        );
        for issue in &report.store_issues {
            println!("  {} {}", "store:".red(), issue);
        }
        for digest in &report.missing_blobs {
            println!("  {} {}", "missing blob:".red(), digest);
        }
        if report.is_clean() {
            println!("{} No issues.", "✓".green().bold());
        }
    }
    if !report.is_clean() {
        bail!("integrity check failed");
    }
    Ok(())
}

fn cmd_serve(config: Option<PathBuf>, args: ServeArgs) -> anyhow::Result<()> {
    let mut config = load_config(config.as_deref())?;
    if let Some(bind) = args.bind {
        config.server.bind_addr = bind;
    }
    let registry = Registry::open(config).context("cannot open registry")?;
    let server = RegistryServer::new(Arc::new(registry));
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(server.serve())?;
    Ok(())
}
