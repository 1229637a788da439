// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

//! Plain-text rendering of analysis groups, plus JSON output for scripting.

use std::io::{IsTerminal, Write};

use anyhow::Result;
use crossterm::style::{Color, ResetColor, SetForegroundColor};
use crossterm::ExecutableCommand;
use serde_json::json;

use super::{row_tone, ColorMap, Tone, CMAP_PENDING, CMAP_RUNNING};
use crate::analysis::{AnalysisGroup, Table};

fn str_width(value: &str) -> usize {
    value.chars().count()
}

/// Column widths over header and all rows, for aligned output.
fn column_widths(table: &Table) -> Vec<usize> {
    let mut widths: Vec<usize> = table.columns.iter().map(|c| str_width(c)).collect();
    for row in &table.rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(str_width(&cell.render()));
        }
    }
    widths
}

fn format_line(values: &[String], widths: &[usize]) -> String {
    let mut line = String::new();
    for (i, (value, width)) in values.iter().zip(widths).enumerate() {
        if i > 0 {
            line.push_str("  ");
        }
        line.push_str(value);
        line.extend(std::iter::repeat(' ').take(width.saturating_sub(str_width(value))));
    }
    line.truncate(line.trim_end().len());
    line.push('\n');
    line
}

/// Render a table as column-aligned text, one header line plus one line per
/// row.
pub fn format_table(table: &Table) -> String {
    let widths = column_widths(table);
    let mut output = format_line(&table.columns, &widths);
    for row in &table.rows {
        let values: Vec<String> = row.iter().map(|cell| cell.render()).collect();
        output.push_str(&format_line(&values, &widths));
    }
    output
}

fn tone_color(tone: Tone) -> Color {
    match tone {
        Tone::Red => Color::Red,
        Tone::Orange => Color::DarkYellow,
        Tone::Yellow => Color::Yellow,
        Tone::Green => Color::Green,
    }
}

/// Print one group pair: a rule with the group name, the Running and
/// Pending summaries, then both allocation tables with percentage-colored
/// rows. Colors apply only when stdout is a terminal and `color` is set.
pub fn print_group_block(
    out: &mut impl Write,
    running: &AnalysisGroup,
    pending: &AnalysisGroup,
    color: bool,
) -> Result<()> {
    writeln!(out, "=== {} ===", running.name.to_uppercase())?;
    writeln!(out)?;
    writeln!(out, "Running Summary")?;
    out.write_all(format_table(&running.summary).as_bytes())?;
    writeln!(out)?;
    writeln!(out, "Pending Summary")?;
    out.write_all(format_table(&pending.summary).as_bytes())?;
    writeln!(out)?;
    writeln!(out, "Running Allocation")?;
    write_allocation_table(out, &running.allocation, &CMAP_RUNNING, color)?;
    writeln!(out)?;
    writeln!(out, "Pending Allocation")?;
    write_allocation_table(out, &pending.allocation, &CMAP_PENDING, color)?;
    writeln!(out)?;
    Ok(())
}

fn write_allocation_table(
    out: &mut impl Write,
    table: &Table,
    cmap: &ColorMap,
    color: bool,
) -> Result<()> {
    let widths = column_widths(table);
    let percent_idx = table.column_index("Allocation %");

    out.write_all(format_line(&table.columns, &widths).as_bytes())?;
    for row in &table.rows {
        let values: Vec<String> = row.iter().map(|cell| cell.render()).collect();
        let line = format_line(&values, &widths);
        let tone = percent_idx
            .and_then(|idx| row.get(idx))
            .and_then(|cell| cell.as_int())
            .and_then(|percent| row_tone(percent, cmap));
        match tone {
            Some(tone) if color => {
                out.execute(SetForegroundColor(tone_color(tone)))?;
                out.write_all(line.as_bytes())?;
                out.execute(ResetColor)?;
            }
            _ => out.write_all(line.as_bytes())?,
        }
    }
    Ok(())
}

/// Print every group pair to stdout.
pub fn print_groups(pairs: &[(AnalysisGroup, AnalysisGroup)], color: bool) -> Result<()> {
    let mut stdout = std::io::stdout();
    let color = color && stdout.is_terminal();
    for (running, pending) in pairs {
        print_group_block(&mut stdout, running, pending, color)?;
    }
    Ok(())
}

/// All five tables of every (group, state) pair as one JSON document.
pub fn groups_to_json(pairs: &[(AnalysisGroup, AnalysisGroup)]) -> serde_json::Value {
    let groups: Vec<serde_json::Value> = pairs
        .iter()
        .flat_map(|(running, pending)| [running, pending])
        .map(|group| {
            json!({
                "name": group.name,
                "state": group.state.to_string(),
                "summary": group.summary.to_json(),
                "allocation": group.allocation.to_json(),
                "by_user": group.by_user.to_json(),
                "by_partition": group.by_partition.to_json(),
                "pending_by_reason": group.pending_by_reason.to_json(),
            })
        })
        .collect();
    json!({ "analysis_groups": groups })
}

pub fn print_groups_json(pairs: &[(AnalysisGroup, AnalysisGroup)]) -> Result<()> {
    let output = serde_json::to_string_pretty(&groups_to_json(pairs))?;
    println!("{output}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::Cell;
    use crate::slurm::JobState;

    fn sample_group(state: JobState) -> AnalysisGroup {
        AnalysisGroup::new(
            "general",
            state,
            Vec::new(),
            vec![("cpu".to_string(), 100.0), ("mem_gb".to_string(), 400.0)],
        )
    }

    #[test]
    fn format_table_aligns_columns() {
        let mut table = Table::new(["Resource", "Allocation %"]);
        table.push_row(vec![Cell::text("cpu"), Cell::Int(7)]);
        table.push_row(vec![Cell::text("mem_gb"), Cell::Int(100)]);
        let output = format_table(&table);
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines[0], "Resource  Allocation %");
        assert_eq!(lines[1], "cpu       7");
        assert_eq!(lines[2], "mem_gb    100");
    }

    #[test]
    fn group_block_contains_all_sections() {
        let running = sample_group(JobState::Running);
        let pending = sample_group(JobState::Pending);
        let mut out = Vec::new();
        print_group_block(&mut out, &running, &pending, false).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("=== GENERAL ==="));
        assert!(text.contains("Running Summary"));
        assert!(text.contains("Pending Summary"));
        assert!(text.contains("Running Allocation"));
        assert!(text.contains("Pending Allocation"));
        assert!(text.contains("N/A"));
    }

    #[test]
    fn json_output_covers_both_states_and_all_views() {
        let pairs = vec![(
            sample_group(JobState::Running),
            sample_group(JobState::Pending),
        )];
        let json = groups_to_json(&pairs);
        let groups = json["analysis_groups"].as_array().unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0]["state"], "RUNNING");
        assert_eq!(groups[1]["state"], "PENDING");
        for group in groups {
            for view in ["summary", "allocation", "by_user", "by_partition", "pending_by_reason"] {
                assert!(group[view].is_array(), "missing view {view}");
            }
        }
    }
}
