use crate::cli::CliContext;
use crate::core::audit_log::AuditEvent;
use crate::core::discovery::LsblkDiscovery;
use crate::core::teardown::{PhaseOutcome, PurgeReport, PurgeTarget, Purger};
use anyhow::{bail, Context, Result};
use clap::Args;
use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Table};
use dialoguer::Confirm;

#[derive(Args, Debug)]
pub struct PurgeArgs {
    /// Skip confirmation
    #[arg(long)]
    pub yes: bool,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run(ctx: &CliContext, args: PurgeArgs) -> Result<()> {
    let target = PurgeTarget {
        cluster_name: ctx
            .cluster
            .clone()
            .or_else(|| ctx.config.cluster.name.clone()),
        fsid: ctx.fsid(),
        host_name: ctx.host.clone(),
    };
    let cluster_label = target
        .cluster_name
        .clone()
        .or_else(|| target.fsid.as_ref().map(|f| format!("fsid {}", f)))
        .unwrap_or_else(|| crate::constants::DEFAULT_CLUSTER_NAME.to_string());

    if !args.yes {
        if ctx.non_interactive {
            bail!("--non-interactive requires --yes for purge");
        }
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Purge all Ceph state of cluster {} from {}? This cannot be undone",
                cluster_label,
                ctx.paths.root.display()
            ))
            .default(false)
            .interact()
            .context("read confirmation")?;
        if !confirmed {
            println!("Aborted.");
            return Ok(());
        }
    }

    let discovery = LsblkDiscovery::new(&ctx.runner, &ctx.config.tools.lsblk);
    let purger = Purger::new(&ctx.paths, &ctx.runner, &ctx.config);
    let report = match purger.run(&target, &discovery) {
        Ok(report) => report,
        Err(e) => {
            ctx.audit(
                AuditEvent::new("purge", "node")
                    .cluster(target.cluster_name.as_deref())
                    .failed(&e),
            );
            return Err(e).context("purge aborted");
        }
    };

    let mut event = AuditEvent::new("purge", "node").cluster(report.cluster_name.as_deref());
    let problems = problem_count(&report);
    if problems > 0 {
        event = event.failed(format!("{} phase problem(s)", problems));
    }
    ctx.audit(event);

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("serialize purge report")?
        );
    } else {
        print_report(&report);
    }
    Ok(())
}

fn problem_count(report: &PurgeReport) -> usize {
    report
        .phases
        .iter()
        .map(|r| match &r.outcome {
            PhaseOutcome::Degraded(problems) => problems.len(),
            PhaseOutcome::Failed(_) => 1,
            _ => 0,
        })
        .sum()
}

fn print_report(report: &PurgeReport) {
    println!(
        "cluster: {}",
        report.cluster_name.as_deref().unwrap_or("<unknown>")
    );
    println!("host: {}", report.host_name.as_deref().unwrap_or("<unknown>"));
    if let Some(fsid) = &report.fsid {
        println!("fsid: {}", fsid);
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![
        Cell::new("Phase").add_attribute(Attribute::Bold),
        Cell::new("Outcome").add_attribute(Attribute::Bold),
    ]);
    for record in &report.phases {
        let outcome = match &record.outcome {
            PhaseOutcome::Completed => "ok".to_string(),
            PhaseOutcome::Skipped(why) => format!("skipped: {}", why),
            PhaseOutcome::Degraded(problems) => format!("degraded: {}", problems.join("; ")),
            PhaseOutcome::Failed(e) => format!("failed: {}", e),
        };
        table.add_row(vec![record.phase.name().to_string(), outcome]);
    }
    println!("{}", table);

    let keyrings: Vec<&str> = report.removed_keyrings.iter().map(|r| r.name()).collect();
    println!(
        "\nremoved keyrings: {}",
        if keyrings.is_empty() { "none".to_string() } else { keyrings.join(", ") }
    );
    println!("unmounted volumes: {}", report.unmounted.len());
    println!(
        "removed {} file(s) and {} directory(ies); kept {} non-empty",
        report.removed_files.len(),
        report.removed_dirs.len(),
        report.kept_dirs.len()
    );
}
