//! Run summary rendering.
//!
//! This module renders the synchronization summary as plain text for the
//! console or as JSON for scripts and archives.

use crate::models::{LabelOutcome, SyncState, SyncSummary};
use anyhow::{Context, Result};
use std::path::Path;

/// Generate the human-readable summary.
pub fn generate_text_summary(summary: &SyncSummary) -> String {
    let mut output = String::new();

    output.push_str(&generate_header(summary));
    output.push_str(&generate_counts_section(summary));
    output.push_str(&generate_outcomes_section(&summary.outcomes));

    output
}

fn generate_header(summary: &SyncSummary) -> String {
    let mut section = String::new();

    if summary.dry_run {
        section.push_str("📊 Synchronization Plan (dry run, nothing was changed):\n");
    } else {
        section.push_str("📊 Synchronization Summary:\n");
    }
    section.push_str(&format!(
        "   Started: {}\n",
        summary.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("   Duration: {:.1}s\n", summary.duration_seconds()));

    section
}

fn generate_counts_section(summary: &SyncSummary) -> String {
    let mut section = String::new();

    let verb = if summary.dry_run { "to update" } else { "updated" };

    section.push_str(&format!(
        "   Analyses: {} | Supporting assets: {}\n",
        summary.analyses, summary.labels
    ));
    section.push_str(&format!(
        "   Groups reconciled: {}\n",
        summary.groups_reconciled
    ));
    section.push_str(&format!("   Servers {}: {}\n", verb, summary.updated));
    if summary.failed > 0 {
        section.push_str(&format!("   Server updates failed: {}\n", summary.failed));
    }
    if summary.group_failures > 0 {
        section.push_str(&format!(
            "   Groups not listable: {}\n",
            summary.group_failures
        ));
    }
    section.push_str(&format!(
        "   Skipped: {} (no group: {} | no tier: {})\n",
        summary.skipped(),
        summary.skipped_no_group,
        summary.skipped_no_tier
    ));

    section
}

fn generate_outcomes_section(outcomes: &[LabelOutcome]) -> String {
    if outcomes.is_empty() {
        return String::new();
    }

    let mut section = String::new();
    section.push_str("\n   Supporting assets:\n");

    for outcome in outcomes {
        section.push_str(&generate_outcome_line(outcome));
    }

    section
}

fn generate_outcome_line(outcome: &LabelOutcome) -> String {
    let badge = match outcome.state {
        SyncState::Reconciled if outcome.failed == 0 => "✅",
        SyncState::Reconciled => "⚠️ ",
        SyncState::SkippedNoGroup | SyncState::SkippedNoTier => "⏭️ ",
        state if !state.is_terminal() => "📝",
        _ => "❔",
    };

    let sigma = outcome
        .sigma
        .map(|s| format!("{:.2}", s))
        .unwrap_or_else(|| "-".to_string());
    let tier = outcome
        .tier
        .map(|t| t.to_string())
        .unwrap_or_else(|| "-".to_string());

    let mut line = format!(
        "     {} {} (sigma {}, tier {}): {}",
        badge, outcome.label, sigma, tier, outcome.state
    );
    if outcome.assets > 0 {
        line.push_str(&format!(
            ", {}/{} servers",
            outcome.updated, outcome.assets
        ));
    }
    line.push('\n');
    line
}

/// Generate a JSON summary.
pub fn generate_json_summary(summary: &SyncSummary) -> Result<String> {
    serde_json::to_string_pretty(summary).map_err(Into::into)
}

/// Write the JSON summary to a file.
pub fn write_json_summary(summary: &SyncSummary, path: &Path) -> Result<()> {
    let content = generate_json_summary(summary)?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write summary to {}", path.display()))
}
