use colored::Colorize;
use plugreg_registration::{
    AssemblyInfo, ProgressReporter, RegistrationEvent, RegistrationPlan, RunSummary,
    TracingReporter,
};
use serde::Serialize;
use tabled::builder::Builder;
use tabled::settings::Style;

use crate::cli::OutputFormat;

pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Logs every event and, in text mode, prints a progress line for it.
pub struct ConsoleReporter {
    format: OutputFormat,
}

impl ConsoleReporter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }
}

impl ProgressReporter for ConsoleReporter {
    fn report(&self, event: &RegistrationEvent) {
        TracingReporter.report(event);
        if self.format != OutputFormat::Text {
            return;
        }
        match event {
            RegistrationEvent::Planned { .. } | RegistrationEvent::Associated { .. } => {}
            RegistrationEvent::Deleted { kind, key, .. } => {
                println!("{} {} {}", "-".red(), kind.to_string().dimmed(), key);
            }
            RegistrationEvent::Upserted {
                kind, key, outcome, ..
            } => {
                let marker = if matches!(outcome, plugreg_registration::Outcome::Created) {
                    "+".green()
                } else {
                    "~".yellow()
                };
                println!("{} {} {}", marker, kind.to_string().dimmed(), key);
            }
            RegistrationEvent::Skipped { kind, key, reason } => {
                println!(
                    "{} {} {} ({})",
                    "·".dimmed(),
                    kind.to_string().dimmed(),
                    key,
                    reason.as_str()
                );
            }
        }
    }
}

pub fn print_summary(summary: &RunSummary, format: OutputFormat) -> anyhow::Result<()> {
    if format == OutputFormat::Json {
        return print_json(summary);
    }
    let mut builder = Builder::default();
    builder.push_record(["Component", "Created", "Updated", "Deleted"]);
    for (label, counts) in summary.rows() {
        builder.push_record([
            label.to_string(),
            counts.created.to_string(),
            counts.updated.to_string(),
            counts.deleted.to_string(),
        ]);
    }
    println!("{}", builder.build().with(Style::rounded()));
    if summary.associations > 0 {
        println!("Solution components added: {}", summary.associations);
    }
    print_success(&format!("Registration complete ({} writes)", summary.total_writes()));
    Ok(())
}

pub fn print_plan(plan: &RegistrationPlan, format: OutputFormat) -> anyhow::Result<()> {
    if format == OutputFormat::Json {
        return print_json(plan);
    }
    println!("{}: {}", "Mode".cyan(), plan.mode);
    println!("{}: {}", "Assembly".cyan(), plan.desired.name);
    if let Some(solution) = &plan.solution_name {
        println!("{}: {}", "Solution".cyan(), solution);
    }

    if plan.is_upsert_only() {
        println!("No deletions.");
    } else {
        let mut builder = Builder::default();
        builder.push_record(["Delete", "Key", "Id"]);
        for deletion in plan.deletions.iter() {
            builder.push_record([
                deletion.kind.to_string(),
                deletion.key.clone(),
                deletion.id.to_string(),
            ]);
        }
        println!("{}", builder.build().with(Style::rounded()));
    }

    let mut builder = Builder::default();
    builder.push_record(["Assembly", "Version", "Types", "Steps", "Images"]);
    for unit in plan.upserts.units() {
        let steps: usize = unit.types.iter().map(|t| t.steps().len()).sum();
        let images: usize = unit
            .types
            .iter()
            .flat_map(|t| t.steps())
            .map(|s| s.images().len())
            .sum();
        builder.push_record([
            unit.assembly.name.clone(),
            unit.assembly.version.clone(),
            unit.types.len().to_string(),
            steps.to_string(),
            images.to_string(),
        ]);
    }
    println!("{}", builder.build().with(Style::rounded()));
    Ok(())
}

pub fn print_assembly(info: &AssemblyInfo, format: OutputFormat) -> anyhow::Result<()> {
    if format == OutputFormat::Json {
        return print_json(info);
    }
    println!("{}: {}", "Name".cyan(), info.name);
    println!("{}: {}", "Version".cyan(), info.version);
    println!(
        "{}: {}",
        "Culture".cyan(),
        info.culture.as_deref().unwrap_or("neutral")
    );
    println!(
        "{}: {}",
        "PublicKeyToken".cyan(),
        info.public_key_token.as_deref().unwrap_or("null")
    );
    println!("{}: {} bytes", "Size".cyan(), info.content_len());
    Ok(())
}
