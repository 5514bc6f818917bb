//! `audit`: read the hash-chained trail of keyring and purge operations.

use crate::cli::CliContext;
use crate::core::audit_log::{self, AuditEntry};
use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Color, Table};
use std::process::ExitCode;

#[derive(Subcommand, Debug)]
pub enum AuditCommand {
    /// Show recent keyring and purge operations
    Log(AuditLogArgs),
    /// Check that no entry was altered, dropped or reordered
    Verify,
}

#[derive(Args, Debug)]
pub struct AuditLogArgs {
    /// Show at most this many of the newest matching entries
    #[arg(long, default_value_t = 50)]
    pub limit: usize,

    /// Only operations that failed
    #[arg(long)]
    pub failed: bool,

    /// Only entries for this role (or `node` for purges)
    #[arg(long, value_name = "SUBJECT")]
    pub subject: Option<String>,

    /// Print entries as JSON lines instead of a table
    #[arg(long)]
    pub json: bool,
}

pub fn run(ctx: &CliContext, cmd: AuditCommand) -> Result<ExitCode> {
    match cmd {
        AuditCommand::Log(args) => run_log(ctx, args).map(|()| ExitCode::SUCCESS),
        AuditCommand::Verify => run_verify(ctx),
    }
}

fn run_log(ctx: &CliContext, args: AuditLogArgs) -> Result<()> {
    let all = audit_log::read_log(&ctx.paths.audit_log, None)?;
    let entries = select(all, &args);

    if args.json {
        for entry in &entries {
            println!("{}", serde_json::to_string(entry).context("encode audit entry")?);
        }
        return Ok(());
    }
    if entries.is_empty() {
        println!("Audit trail {} has no matching entries.", ctx.paths.audit_log.display());
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(
        ["When (UTC)", "Operation", "Target", "By", "Status"]
            .into_iter()
            .map(|h| Cell::new(h).add_attribute(Attribute::Bold)),
    );
    for entry in &entries {
        let status = match &entry.error {
            _ if entry.success => Cell::new("ok").fg(Color::Green),
            Some(err) => Cell::new(format!("failed: {}", err)).fg(Color::Red),
            None => Cell::new("failed").fg(Color::Red),
        };
        table.add_row(vec![
            Cell::new(entry.timestamp.format("%Y-%m-%dT%H:%M:%SZ")),
            Cell::new(&entry.action),
            Cell::new(target(entry)),
            Cell::new(&entry.actor),
            status,
        ]);
    }
    println!("{}", table);
    Ok(())
}

/// Filter, then keep the newest `limit` entries in log order.
fn select(entries: Vec<AuditEntry>, args: &AuditLogArgs) -> Vec<AuditEntry> {
    let mut kept: Vec<AuditEntry> = entries
        .into_iter()
        .filter(|e| !args.failed || !e.success)
        .filter(|e| args.subject.iter().all(|s| &e.subject == s))
        .collect();
    if kept.len() > args.limit {
        kept.drain(..kept.len() - args.limit);
    }
    kept
}

/// `subject@cluster`, with the affected path on a second line.
fn target(entry: &AuditEntry) -> String {
    let mut out = match &entry.cluster {
        Some(cluster) => format!("{}@{}", entry.subject, cluster),
        None => entry.subject.clone(),
    };
    if let Some(path) = &entry.target_path {
        out.push('\n');
        out.push_str(path);
    }
    out
}

fn run_verify(ctx: &CliContext) -> Result<ExitCode> {
    let log = &ctx.paths.audit_log;
    let (total, problems) = audit_log::verify_chain(log)?;
    if total == 0 {
        println!("{}: empty, nothing to verify", log.display());
        return Ok(ExitCode::SUCCESS);
    }

    for problem in &problems {
        println!("  broken: {}", problem);
    }
    let head = audit_log::read_log(log, Some(1))?
        .pop()
        .and_then(|entry| entry.entry_hash)
        .unwrap_or_else(|| "-".to_string());
    println!("{}: {} entries, head {}", log.display(), total, head);

    if problems.is_empty() {
        println!("chain intact");
        Ok(ExitCode::SUCCESS)
    } else {
        println!("chain broken in {} place(s)", problems.len());
        Ok(ExitCode::FAILURE)
    }
}
