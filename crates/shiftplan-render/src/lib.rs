//! # shiftplan-render
//!
//! Rendering backends for shiftplan calendars.
//!
//! This crate provides:
//! - Plain-text calendar tables (terminal output)
//! - Excel workbooks with one block per ISO week
//!
//! ## Example
//!
//! ```rust,ignore
//! use shiftplan_core::Renderer;
//! use shiftplan_render::{ExcelRenderer, TextRenderer};
//!
//! println!("{}", TextRenderer::new().render(&calendar)?);
//! std::fs::write("plan.xlsx", ExcelRenderer::new().render(&calendar)?)?;
//! ```

pub mod excel;

pub use excel::ExcelRenderer;

use shiftplan_core::{Calendar, RenderError, Renderer};
use std::fmt::Write;

/// Plain-text renderer: a day × shift-label table, the per-person summary and
/// the objective line
#[derive(Clone, Debug)]
pub struct TextRenderer {
    /// Placeholder for unassigned or missing shifts
    pub empty_cell: String,
    /// Columns are separated by this many spaces
    pub gap: usize,
    /// Append the per-person summary
    pub include_summary: bool,
}

impl Default for TextRenderer {
    fn default() -> Self {
        Self {
            empty_cell: "-".into(),
            gap: 2,
            include_summary: true,
        }
    }
}

impl TextRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn no_summary(mut self) -> Self {
        self.include_summary = false;
        self
    }

    fn push_row(&self, out: &mut String, cells: &[String], widths: &[usize]) {
        let mut line = String::new();
        for (i, (cell, width)) in cells.iter().zip(widths).enumerate() {
            if i > 0 {
                line.push_str(&" ".repeat(self.gap));
            }
            let _ = write!(line, "{cell:<width$}");
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }
}

impl Renderer for TextRenderer {
    type Output = String;

    fn render(&self, calendar: &Calendar) -> Result<String, RenderError> {
        let labels = calendar.shift_labels();

        let mut rows: Vec<Vec<String>> = Vec::with_capacity(calendar.days.len() + 1);
        let mut header = vec!["Day".to_string()];
        header.extend(labels.iter().cloned());
        rows.push(header);

        for day in &calendar.days {
            let mut row = vec![day.date.format("%a %Y-%m-%d").to_string()];
            for label in &labels {
                let cell = day
                    .shifts
                    .iter()
                    .find(|e| &e.label == label)
                    .and_then(|e| e.assignee.as_deref())
                    .map_or(self.empty_cell.as_str(), |id| calendar.display_name(id));
                row.push(cell.to_string());
            }
            rows.push(row);
        }

        let mut widths = vec![0usize; labels.len() + 1];
        for row in &rows {
            for (w, cell) in widths.iter_mut().zip(row) {
                *w = (*w).max(cell.chars().count());
            }
        }

        let mut out = String::new();
        let _ = writeln!(out, "{} ({})", calendar.name, calendar.variant);
        out.push('\n');
        for row in &rows {
            self.push_row(&mut out, row, &widths);
        }

        if self.include_summary {
            let loads = calendar.loads();
            let name_width = loads
                .iter()
                .map(|l| l.name.chars().count())
                .chain(std::iter::once("Person".len()))
                .max()
                .unwrap_or(0);
            out.push('\n');
            self.push_row(
                &mut out,
                &["Person".to_string(), "Shifts".to_string()],
                &[name_width, 0],
            );
            for load in &loads {
                self.push_row(
                    &mut out,
                    &[load.name.clone(), load.shifts.to_string()],
                    &[name_width, 0],
                );
            }
        }

        let unassigned = calendar.unassigned().len();
        if unassigned > 0 {
            let _ = writeln!(out, "\nUnassigned shifts: {unassigned}");
        }
        if let Some(objective) = calendar.objective {
            let _ = writeln!(out, "\nObjective: {objective}");
        }

        Ok(out)
    }
}
