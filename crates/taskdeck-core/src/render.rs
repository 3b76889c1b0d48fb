use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::datetime::format_date;
use crate::task::{Priority, Stats, Task};

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self { color })
    }

    /// Stats cards, one line each, mirroring the dashboard header.
    #[tracing::instrument(skip(self, stats))]
    pub fn print_stats(&mut self, stats: &Stats) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        writeln!(out, "Total tasks     {}", stats.total_tasks)?;
        writeln!(out, "Completed       {}", stats.completed_tasks)?;
        writeln!(out, "Pending         {}", stats.pending_tasks)?;
        writeln!(
            out,
            "High priority   {}  (medium {}, low {}, pending only)",
            stats.priority_breakdown.high,
            stats.priority_breakdown.medium,
            stats.priority_breakdown.low
        )?;
        Ok(())
    }

    /// Render the projected list. `total` is the size of the unfiltered
    /// collection, used to pick the right empty-state hint.
    #[tracing::instrument(skip(self, tasks, now))]
    pub fn print_task_table(
        &mut self,
        tasks: &[Task],
        total: usize,
        now: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        if tasks.is_empty() {
            writeln!(out, "No tasks found.")?;
            if total == 0 {
                writeln!(out, "Get started by creating your first task: td add <title>")?;
            } else {
                writeln!(out, "Try adjusting your search or filter criteria.")?;
            }
            return Ok(());
        }

        let headers = vec![
            "ID".to_string(),
            "".to_string(),
            "Pri".to_string(),
            "Due".to_string(),
            "Created".to_string(),
            "Title".to_string(),
            "Description".to_string(),
        ];

        let mut rows = Vec::with_capacity(tasks.len());
        for task in tasks {
            let id = self.paint(&task.id.to_string(), "33");
            let done = if task.completed { "x" } else { "" }.to_string();

            let priority_code = match task.priority {
                Priority::High => "31",
                Priority::Medium => "33",
                Priority::Low => "32",
            };
            let priority = self.paint(task.priority.as_str(), priority_code);

            let due = match task.due_date {
                Some(due) if !task.completed && due < now => self.paint(&format_date(due), "31"),
                Some(due) => format_date(due),
                None => String::new(),
            };

            rows.push(vec![
                id,
                done,
                priority,
                due,
                format_date(task.created_at),
                task.title.clone(),
                task.description.clone(),
            ]);
        }

        write_table(&mut out, headers, rows)?;
        Ok(())
    }

    /// Dismissible-banner analog: one line on stderr.
    pub fn print_banner(&mut self, message: &str) -> anyhow::Result<()> {
        let painted = if self.color && io::stderr().is_terminal() {
            format!("\x1b[31m{message}\x1b[0m")
        } else {
            message.to_string()
        };
        eprintln!("{painted}");
        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for idx in 0..column_count {
        write!(writer, "{:-<width$} ", "", width = widths[idx])?;
    }
    writeln!(writer)?;

    for row in rows {
        for idx in 0..column_count {
            let cell = &row[idx];
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
