//! Tab-to-column text transform.
//!
//! A copied spreadsheet range arrives as rows separated by newlines and
//! cells separated by tabs. The transform flattens it into one cell per
//! line, row-major, and strips thousands separators from numeric cells.

use std::sync::OnceLock;

use regex::Regex;

/// Options controlling which cells survive and what content qualifies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransformOptions {
    /// Keep only cells that contain a digit, dropping labels and blanks.
    pub numeric_only: bool,
    /// Also rewrite tab-free multi-line text (a single copied column).
    pub single_column: bool,
}

/// One scalar pulled out of a delimited grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell<'a> {
    pub raw: &'a str,
    pub normalized: String,
}

impl<'a> Cell<'a> {
    pub fn new(raw: &'a str) -> Self {
        Self {
            raw,
            normalized: normalize(raw),
        }
    }

    pub fn has_digit(&self) -> bool {
        self.raw.chars().any(|c| c.is_ascii_digit())
    }
}

/// Plain or accounting-style number with optional comma grouping.
fn numeric_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?:-?\d(?:[\d,]*\d)?(?:\.\d*)?|\(\d(?:[\d,]*\d)?(?:\.\d*)?\))%?$")
            .expect("numeric pattern is valid")
    })
}

/// Whether `text` looks like a number, ignoring surrounding whitespace.
pub fn is_numeric_shaped(text: &str) -> bool {
    numeric_pattern().is_match(text.trim())
}

/// Strip thousands separators from numeric-shaped cells; leave others alone.
pub fn normalize(raw: &str) -> String {
    if is_numeric_shaped(raw) {
        raw.trim().replace(',', "")
    } else {
        raw.to_string()
    }
}

/// Split content into cells, row by row and left to right.
pub fn split_cells(content: &str) -> Vec<Cell<'_>> {
    // Spreadsheets append one row terminator when copying a grid; it does not
    // start another row. Tab-free text is already a column, where a trailing
    // newline is an empty last value.
    let body = if content.contains('\t') {
        content
            .strip_suffix('\n')
            .map(|s| s.strip_suffix('\r').unwrap_or(s))
            .unwrap_or(content)
    } else {
        content
    };

    body.split('\n')
        .map(|row| row.strip_suffix('\r').unwrap_or(row))
        .flat_map(|row| row.split('\t'))
        .map(Cell::new)
        .collect()
}

/// Whether `content` looks like delimited data worth rewriting.
pub fn qualifies(content: &str, options: TransformOptions) -> bool {
    if content.is_empty() {
        return false;
    }
    content.contains('\t') || (options.single_column && content.contains('\n'))
}

/// Flatten `content` into one normalized value per line.
pub fn to_column(content: &str, options: TransformOptions) -> String {
    let cells = split_cells(content);
    let mut values = Vec::with_capacity(cells.len());
    for cell in cells {
        if options.numeric_only {
            if !cell.has_digit() {
                continue;
            }
            values.push(cell.raw.replace(',', "").trim().to_string());
        } else {
            values.push(cell.normalized);
        }
    }
    values.join("\n")
}
