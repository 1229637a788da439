// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

//! Full-screen tabbed viewer for analysis groups: one tab per group, with
//! Summary / Users / Partitions / Queue Times sub-views showing Running and
//! Pending side by side.

use anyhow::{bail, Result};
use crossterm::{
    cursor,
    event::{self, Event, KeyCode},
    execute, terminal,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Cell as WidgetCell, Paragraph, Row, Table as TableWidget, Tabs},
    Frame, Terminal,
};

use super::{row_tone, ColorMap, Tone, CMAP_PENDING, CMAP_RUNNING};
use crate::analysis::group::PRIORITY_REASONS;
use crate::analysis::{AnalysisGroup, Table};

const VIEW_TITLES: [&str; 4] = ["Summary", "Users", "Partitions", "Queue Times"];

struct TerminalGuard;

impl TerminalGuard {
    fn enter() -> Result<Self> {
        terminal::enable_raw_mode()?;
        let mut stdout = std::io::stdout();
        if let Err(err) = execute!(stdout, EnterAlternateScreen, cursor::Hide) {
            let _ = terminal::disable_raw_mode();
            return Err(err.into());
        }
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let mut stdout = std::io::stdout();
        let _ = execute!(stdout, cursor::Show, LeaveAlternateScreen);
        let _ = terminal::disable_raw_mode();
    }
}

struct App<'a> {
    pairs: &'a [(AnalysisGroup, AnalysisGroup)],
    group: usize,
    view: usize,
    done: bool,
}

impl<'a> App<'a> {
    fn new(pairs: &'a [(AnalysisGroup, AnalysisGroup)]) -> Self {
        Self {
            pairs,
            group: 0,
            view: 0,
            done: false,
        }
    }

    fn handle_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => self.done = true,
            KeyCode::Left => {
                self.group = self.group.checked_sub(1).unwrap_or(self.pairs.len() - 1);
            }
            KeyCode::Right => {
                self.group = (self.group + 1) % self.pairs.len();
            }
            KeyCode::Tab => {
                self.view = (self.view + 1) % VIEW_TITLES.len();
            }
            KeyCode::BackTab => {
                self.view = self.view.checked_sub(1).unwrap_or(VIEW_TITLES.len() - 1);
            }
            KeyCode::Char(c @ '1'..='4') => {
                self.view = (c as usize) - ('1' as usize);
            }
            _ => {}
        }
    }

    fn render(&self, frame: &mut Frame) {
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Length(1),
                Constraint::Min(1),
                Constraint::Length(1),
            ])
            .split(frame.area());

        let group_titles: Vec<&str> = self.pairs.iter().map(|(r, _)| r.name.as_str()).collect();
        let group_tabs = Tabs::new(group_titles)
            .select(self.group)
            .highlight_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD));
        frame.render_widget(group_tabs, layout[0]);

        let view_tabs = Tabs::new(VIEW_TITLES.to_vec())
            .select(self.view)
            .highlight_style(Style::default().add_modifier(Modifier::BOLD | Modifier::UNDERLINED));
        frame.render_widget(view_tabs, layout[1]);

        let (running, pending) = &self.pairs[self.group];
        match self.view {
            0 => self.render_summary(frame, layout[2], running, pending),
            1 => render_side_by_side(
                frame,
                layout[2],
                ("Running Jobs by User", &running.by_user),
                ("Pending Jobs by User", &pending.by_user),
            ),
            2 => render_side_by_side(
                frame,
                layout[2],
                ("Running Jobs by Partition", &running.by_partition),
                ("Pending Jobs by Partition", &pending.by_partition),
            ),
            _ => render_queue_times(frame, layout[2], pending),
        }

        let footer = Paragraph::new("←/→ group · Tab/1-4 view · q quit").style(
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::DIM),
        );
        frame.render_widget(footer, layout[3]);
    }

    fn render_summary(
        &self,
        frame: &mut Frame,
        area: Rect,
        running: &AnalysisGroup,
        pending: &AnalysisGroup,
    ) {
        let halves = split_horizontal(area);
        for (half, group, cmap) in [
            (halves.0, running, &CMAP_RUNNING),
            (halves.1, pending, &CMAP_PENDING),
        ] {
            let rows = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Length(5), Constraint::Min(1)])
                .split(half);
            let label = state_label(group);
            render_table(frame, rows[0], &format!("{label} Summary"), &group.summary, None);
            render_table(
                frame,
                rows[1],
                &format!("{label} Allocation"),
                &group.allocation,
                Some(cmap),
            );
        }
    }
}

fn state_label(group: &AnalysisGroup) -> &'static str {
    match group.state {
        crate::slurm::JobState::Pending => "Pending",
        _ => "Running",
    }
}

fn split_horizontal(area: Rect) -> (Rect, Rect) {
    let halves = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);
    (halves[0], halves[1])
}

fn render_side_by_side(
    frame: &mut Frame,
    area: Rect,
    left: (&str, &Table),
    right: (&str, &Table),
) {
    let halves = split_horizontal(area);
    render_table(frame, halves.0, left.0, left.1, None);
    render_table(frame, halves.1, right.0, right.1, None);
}

fn render_queue_times(frame: &mut Frame, area: Rect, pending: &AnalysisGroup) {
    let (top, bottom) = split_pending(&pending.pending_by_reason);
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);
    render_table(frame, rows[0], "Priority/Resources", &top, None);
    render_table(frame, rows[1], "Other reasons", &bottom, None);
}

/// Split the pending-time view into Priority/Resources rows and the rest.
fn split_pending(table: &Table) -> (Table, Table) {
    let mut top = Table::new(table.columns.iter().map(String::as_str));
    let mut bottom = Table::new(table.columns.iter().map(String::as_str));
    let reason_idx = table.column_index("reason");
    for row in &table.rows {
        let is_priority = reason_idx
            .and_then(|idx| row.get(idx))
            .map(|cell| PRIORITY_REASONS.contains(&cell.render().as_str()))
            .unwrap_or(false);
        if is_priority {
            top.push_row(row.clone());
        } else {
            bottom.push_row(row.clone());
        }
    }
    (top, bottom)
}

fn tone_color(tone: Tone) -> Color {
    match tone {
        Tone::Red => Color::Red,
        Tone::Orange => Color::LightRed,
        Tone::Yellow => Color::Yellow,
        Tone::Green => Color::Green,
    }
}

fn render_table(
    frame: &mut Frame,
    area: Rect,
    title: &str,
    table: &Table,
    highlight: Option<&ColorMap>,
) {
    let widths: Vec<Constraint> = table
        .columns
        .iter()
        .enumerate()
        .map(|(i, column)| {
            let mut width = column.chars().count();
            for row in &table.rows {
                if let Some(cell) = row.get(i) {
                    width = width.max(cell.render().chars().count());
                }
            }
            Constraint::Length(width as u16)
        })
        .collect();

    let percent_idx = table.column_index("Allocation %");
    let rows: Vec<Row> = table
        .rows
        .iter()
        .map(|row| {
            let style = highlight
                .and_then(|cmap| {
                    let percent = percent_idx.and_then(|idx| row.get(idx))?.as_int()?;
                    row_tone(percent, cmap)
                })
                .map(|tone| Style::default().fg(tone_color(tone)))
                .unwrap_or_default();
            Row::new(row.iter().map(|cell| WidgetCell::from(cell.render()))).style(style)
        })
        .collect();

    let header = Row::new(
        table
            .columns
            .iter()
            .map(|column| WidgetCell::from(column.as_str())),
    )
    .style(Style::default().add_modifier(Modifier::BOLD));

    let widget = TableWidget::new(rows, widths)
        .header(header)
        .column_spacing(2)
        .block(Block::default().borders(Borders::ALL).title(title.to_string()));
    frame.render_widget(widget, area);
}

/// Run the viewer until the user quits. Raw mode and the alternate screen
/// are restored on every exit path by the drop guard.
pub fn run(pairs: &[(AnalysisGroup, AnalysisGroup)]) -> Result<()> {
    if pairs.is_empty() {
        bail!("no analysis groups to display");
    }
    let _guard = TerminalGuard::enter()?;
    let mut terminal = Terminal::new(CrosstermBackend::new(std::io::stdout()))?;
    let mut app = App::new(pairs);
    while !app.done {
        terminal.draw(|frame| app.render(frame))?;
        if let Event::Key(key) = event::read()? {
            app.handle_key(key.code);
        }
    }
    Ok(())
}
