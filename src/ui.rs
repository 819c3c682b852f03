//! Terminal output: the workstation board, spinners and colored messages.
//!
//! Uses `indicatif` for the fetch spinner and `console` for styling. The
//! board itself is rendered to a `String` by [`render_board`] so it can be
//! redrawn in place by `watch` and checked in tests.

use std::fmt::Write as _;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use console::{Style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::warn;

use crate::error::{ErrorClass, WriteError};
use crate::model::WorkstationSnapshot;
use crate::progress::EfficiencyTier;
use crate::roles::Role;
use crate::view::{Notice, ViewState};

const BAR_WIDTH: usize = 20;

/// Spinner shown while the board is loading.
pub struct FetchProgress {
    pb: ProgressBar,
}

impl FetchProgress {
    pub fn start(message: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(message.to_string());
        pb.enable_steady_tick(StdDuration::from_millis(100));
        Self { pb }
    }

    pub fn finish(self) {
        self.pb.finish_and_clear();
    }
}

fn tier_style(tier: EfficiencyTier) -> Style {
    match tier {
        EfficiencyTier::Good => Style::new().green().bold(),
        EfficiencyTier::Warning => Style::new().yellow().bold(),
        EfficiencyTier::Critical => Style::new().red().bold(),
        EfficiencyTier::Unknown => Style::new().dim(),
    }
}

/// Fixed-width bar; over-production fills it completely.
pub fn progress_bar(ratio: f64, width: usize) -> String {
    let filled = if ratio.is_finite() {
        ((ratio.clamp(0.0, 1.0) * width as f64).round() as usize).min(width)
    } else {
        0
    };
    format!("[{}{}]", "█".repeat(filled), "░".repeat(width - filled))
}

/// `HH:MM:SS`, hours unbounded.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.num_seconds().max(0);
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

fn render_card(out: &mut String, snap: &WorkstationSnapshot, now: DateTime<Utc>) {
    let bold = Style::new().bold();
    let dim = Style::new().dim();

    let process = snap
        .workstation
        .process_name
        .as_deref()
        .map(|p| format!("  ({p})"))
        .unwrap_or_default();
    let Some(timer) = &snap.active_timer else {
        let _ = writeln!(
            out,
            "{}{}  {}",
            bold.apply_to(&snap.workstation.name),
            process,
            dim.apply_to("IDLE")
        );
        let _ = writeln!(out, "  {}", dim.apply_to("No active production"));
        return;
    };

    let _ = writeln!(
        out,
        "{}{}  {}  {}",
        bold.apply_to(&snap.workstation.name),
        process,
        Style::new().cyan().apply_to(timer.status),
        format_elapsed(timer.elapsed(now))
    );

    match &snap.order {
        Some(order) => {
            let product = order
                .product
                .as_ref()
                .map(|p| match &p.reference {
                    Some(reference) => format!(" · {} ({reference})", p.name),
                    None => format!(" · {}", p.name),
                })
                .unwrap_or_default();
            let _ = writeln!(out, "  {}{}", order.code, product);
        }
        None => {
            let _ = writeln!(out, "  {}", dim.apply_to("Order unavailable"));
        }
    }

    let _ = writeln!(
        out,
        "  {}  {}/{}  {}%  · {} left",
        progress_bar(snap.progress_ratio, BAR_WIDTH),
        snap.produced_total,
        snap.ordered_total,
        snap.progress_percent(),
        snap.remaining_units()
    );

    let tier = snap.efficiency_tier();
    let efficiency = match snap.efficiency_percent() {
        Some(pct) => format!("{pct}% {tier}"),
        None => format!("-- {tier}"),
    };
    let throughput = snap
        .throughput_per_hour(now)
        .map(|rate| format!("  · {rate:.1} u/h"))
        .unwrap_or_default();
    let _ = writeln!(
        out,
        "  Efficiency {}{}",
        tier_style(tier).apply_to(efficiency),
        throughput
    );

    let team = if timer.team.is_empty() {
        "none".to_string()
    } else {
        timer
            .team
            .iter()
            .map(|m| m.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    };
    let _ = writeln!(out, "  Team: {team}");
}

/// Renders one card per snapshot, in order.
pub fn render_board(snapshots: &[WorkstationSnapshot], now: DateTime<Utc>) -> String {
    if snapshots.is_empty() {
        return format!("{}\n", Style::new().dim().apply_to("No workstations"));
    }
    let mut out = String::new();
    for (i, snap) in snapshots.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        render_card(&mut out, snap, now);
    }
    out
}

/// Header line of the `watch` screen.
pub fn render_status_line(state: ViewState, refreshed_at: Option<DateTime<Utc>>) -> String {
    let refreshed = refreshed_at
        .map(|at| at.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "never".to_string());
    format!(
        "{}  refreshed {}",
        Style::new().cyan().bold().apply_to(state),
        refreshed
    )
}

/// Redraws the board in place.
pub fn redraw(term: &Term, header: &str, board: &str) -> std::io::Result<()> {
    term.clear_screen()?;
    term.write_line(header)?;
    term.write_line("")?;
    term.write_str(board)?;
    term.flush()
}

pub fn print_notices(notices: &[Notice]) {
    let yellow = Style::new().yellow();
    for notice in notices {
        println!("  {} {}", yellow.apply_to("!"), notice.message);
    }
}

/// Reports the outcome of a user action where it was taken.
pub fn print_write_result(action: &str, result: &Result<(), WriteError>) {
    match result {
        Ok(()) => {
            println!("  {} {action}", Style::new().green().bold().apply_to("✓"));
        }
        Err(err) => {
            warn!(class = %ErrorClass::WriteFailure, action, error = %err, "action failed");
            println!(
                "  {} {action} failed: {err}",
                Style::new().red().bold().apply_to("✗")
            );
        }
    }
}

/// Lists the navigation entries visible to `role`.
pub fn render_modules(role: Role) -> String {
    let mut out = format!("Modules for {role}:\n");
    for module in role.visible_modules() {
        let _ = writeln!(out, "  - {}", module.title());
    }
    out
}
