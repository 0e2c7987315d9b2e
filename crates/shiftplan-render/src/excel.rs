//! Excel calendar renderer
//!
//! Writes the calendar as a single worksheet named after the problem:
//!
//! ```text
//! |          Automatic assignment for Lab shifts          |
//! |       | Mon   | Tue   | Wed   | Thu   | Fri   |
//! |       | 03/03 | 04/03 | 05/03 | 06/03 | 07/03 |   ← one block per ISO week
//! | 09:00 | Alice | Bob   | -     | Alice | Bob   |
//! | 14:00 | Bob   |       | Alice |       |       |
//!
//! | Person | Nr. Shifts |
//! | Alice  | 3          |
//! ```
//!
//! Only weekdays that occur in the calendar get a column. A `-` marks a shift
//! nobody could take; an empty cell means no such shift on that day.
//!
//! The layout is computed first as a list of [`Cell`]s, then written with
//! `rust_xlsxwriter` into an in-memory buffer.

use chrono::{Datelike, IsoWeek, NaiveDate, Weekday};
use rust_xlsxwriter::{Format, FormatAlign, FormatBorder, Workbook, Worksheet};
use shiftplan_core::{Calendar, CalendarDay, RenderError, Renderer};
use std::collections::BTreeMap;
use std::path::Path;

/// Worksheet names are capped by Excel
const MAX_SHEET_NAME: usize = 31;
const MAX_COLUMN_WIDTH: f64 = 255.0;

const WEEK: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// What goes into a cell
#[derive(Clone, Debug, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(f64),
}

/// Cell formatting class
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CellStyle {
    Title,
    Header,
    Body,
}

/// A positioned cell of the worksheet
#[derive(Clone, Debug, PartialEq)]
pub struct Cell {
    pub row: u32,
    pub col: u16,
    pub value: CellValue,
    pub style: CellStyle,
}

impl Cell {
    fn text(row: u32, col: u16, value: impl Into<String>, style: CellStyle) -> Self {
        Self {
            row,
            col,
            value: CellValue::Text(value.into()),
            style,
        }
    }
}

/// Excel calendar renderer
#[derive(Clone, Debug)]
pub struct ExcelRenderer {
    /// Blank rows between week blocks
    pub week_gap: u32,
    /// Blank rows between the calendar and the summary
    pub summary_gap: u32,
    /// Whether to append the per-person summary table
    pub include_summary: bool,
}

impl Default for ExcelRenderer {
    fn default() -> Self {
        Self {
            week_gap: 1,
            summary_gap: 2,
            include_summary: true,
        }
    }
}

impl ExcelRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Disable the summary table
    pub fn no_summary(mut self) -> Self {
        self.include_summary = false;
        self
    }

    /// Compute every cell of the worksheet
    pub fn layout(&self, calendar: &Calendar) -> Vec<Cell> {
        let weekdays: Vec<Weekday> = WEEK
            .into_iter()
            .filter(|&w| calendar.days.iter().any(|d| d.date.weekday() == w))
            .collect();
        let column = |weekday: Weekday| -> u16 {
            weekdays.iter().position(|&w| w == weekday).map_or(0, |i| i as u16 + 1)
        };
        let labels = calendar.shift_labels();

        let mut weeks: BTreeMap<IsoWeek, Vec<&CalendarDay>> = BTreeMap::new();
        for day in &calendar.days {
            weeks.entry(day.date.iso_week()).or_default().push(day);
        }

        let mut cells = vec![Cell::text(
            0,
            0,
            format!("Automatic assignment for {}", calendar.name),
            CellStyle::Title,
        )];
        for &weekday in &weekdays {
            cells.push(Cell::text(1, column(weekday), weekday.to_string(), CellStyle::Header));
        }

        let mut row = 2u32;
        for (i, (week, days)) in weeks.iter().enumerate() {
            if i > 0 {
                row += self.week_gap;
            }
            for &weekday in &weekdays {
                if let Some(date) = NaiveDate::from_isoywd_opt(week.year(), week.week(), weekday) {
                    cells.push(Cell::text(
                        row,
                        column(weekday),
                        date.format("%d/%m").to_string(),
                        CellStyle::Header,
                    ));
                }
            }
            for (offset, label) in labels.iter().enumerate() {
                let label_row = row + 1 + offset as u32;
                cells.push(Cell::text(label_row, 0, label.as_str(), CellStyle::Header));
                for day in days {
                    let Some(entry) = day.shifts.iter().find(|e| &e.label == label) else {
                        continue;
                    };
                    let name = entry
                        .assignee
                        .as_deref()
                        .map_or("-", |id| calendar.display_name(id));
                    cells.push(Cell::text(
                        label_row,
                        column(day.date.weekday()),
                        name,
                        CellStyle::Body,
                    ));
                }
            }
            row += 1 + labels.len() as u32;
        }

        if self.include_summary {
            row += self.summary_gap;
            cells.push(Cell::text(row, 0, "Person", CellStyle::Header));
            cells.push(Cell::text(row, 1, "Nr. Shifts", CellStyle::Header));
            for load in calendar.loads() {
                row += 1;
                cells.push(Cell::text(row, 0, load.name, CellStyle::Body));
                cells.push(Cell {
                    row,
                    col: 1,
                    value: CellValue::Number(load.shifts as f64),
                    style: CellStyle::Body,
                });
            }
        }

        cells
    }

    /// Render and write the workbook to `path`
    pub fn write_to(&self, calendar: &Calendar, path: &Path) -> Result<(), RenderError> {
        let bytes = self.render(calendar)?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    /// Generate workbook bytes
    pub fn render_to_bytes(&self, calendar: &Calendar) -> Result<Vec<u8>, RenderError> {
        let cells = self.layout(calendar);
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet
            .set_name(sheet_name(&calendar.name).as_str())
            .map_err(|e| RenderError::Format(e.to_string()))?;

        let formats = Formats::new();
        let last_col = cells.iter().map(|c| c.col).max().unwrap_or(0).max(1);
        let width = column_width(&cells);
        for col in 0..=last_col {
            sheet
                .set_column_width(col, width)
                .map_err(|e| RenderError::Format(e.to_string()))?;
        }

        for cell in &cells {
            write_cell(sheet, cell, &formats, last_col)?;
        }

        workbook
            .save_to_buffer()
            .map_err(|e| RenderError::Format(format!("Failed to create Excel: {e}")))
    }
}

/// Shared column width: longest non-title text plus padding, within Excel's limit
fn column_width(cells: &[Cell]) -> f64 {
    let longest = cells
        .iter()
        .filter(|c| c.style != CellStyle::Title)
        .filter_map(|c| match &c.value {
            CellValue::Text(text) => Some(text.chars().count()),
            CellValue::Number(_) => None,
        })
        .max()
        .unwrap_or(8)
        .max(8);
    (longest as f64 + 2.0).min(MAX_COLUMN_WIDTH)
}

impl Renderer for ExcelRenderer {
    type Output = Vec<u8>;

    fn render(&self, calendar: &Calendar) -> Result<Vec<u8>, RenderError> {
        if calendar.days.is_empty() {
            return Err(RenderError::InvalidData("No days to render".into()));
        }
        self.render_to_bytes(calendar)
    }
}

struct Formats {
    title: Format,
    header: Format,
    body: Format,
}

impl Formats {
    fn new() -> Self {
        Self {
            title: Format::new()
                .set_bold()
                .set_font_size(14)
                .set_align(FormatAlign::Center)
                .set_align(FormatAlign::VerticalCenter),
            header: Format::new()
                .set_bold()
                .set_align(FormatAlign::Center)
                .set_background_color(0xDDEBF7)
                .set_border(FormatBorder::Thin),
            body: Format::new()
                .set_align(FormatAlign::Center)
                .set_border(FormatBorder::Thin),
        }
    }
}

fn write_cell(
    sheet: &mut Worksheet,
    cell: &Cell,
    formats: &Formats,
    last_col: u16,
) -> Result<(), RenderError> {
    let format = match cell.style {
        CellStyle::Title => &formats.title,
        CellStyle::Header => &formats.header,
        CellStyle::Body => &formats.body,
    };
    let result = match (&cell.value, cell.style) {
        (CellValue::Text(text), CellStyle::Title) => sheet
            .merge_range(cell.row, cell.col, cell.row, last_col, text, format)
            .map(|_| ()),
        (CellValue::Text(text), _) => sheet
            .write_with_format(cell.row, cell.col, text.as_str(), format)
            .map(|_| ()),
        (CellValue::Number(n), _) => sheet
            .write_with_format(cell.row, cell.col, *n, format)
            .map(|_| ()),
    };
    result.map_err(|e| RenderError::Format(e.to_string()))
}

/// Worksheet name Excel accepts
fn sheet_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '[' | ']' | ':' | '*' | '?' | '/' | '\\' => '_',
            c => c,
        })
        .take(MAX_SHEET_NAME)
        .collect();
    let cleaned = cleaned.trim_matches('\'').trim().to_string();
    if cleaned.is_empty() {
        "Shifts".to_string()
    } else {
        cleaned
    }
}
