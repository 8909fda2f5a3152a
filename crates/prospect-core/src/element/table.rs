//! Table interpretation on top of the raw cell grid.
//!
//! A [`ParsedTable`] adds the reading conventions resolvers rely on: header
//! detection, column resolution by label, key-value pairing, and row/column
//! predicate intersection. It borrows the grid and never mutates it.

use lazy_static::lazy_static;
use regex::Regex;

use crate::element::{Cell, Element, TableGrid};
use crate::normalize::text::clean_text;
use crate::pattern::PatternSet;

lazy_static! {
    static ref NUMERIC_CELL: Regex =
        Regex::new(r"^[\d,，.．%％\-—()（）\s]+$").unwrap();
}

/// Direction for key-value pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KvDirection {
    /// Key on the left, value on the right.
    LeftAndRight,
    /// Key on top, value below.
    UpAndDown,
}

/// A key-value cell pair with its grid coordinates.
#[derive(Debug, Clone)]
pub struct KvPair<'a> {
    pub key: &'a Cell,
    pub value: &'a Cell,
    /// Row of the key cell.
    pub row: u32,
    /// Column of the key cell.
    pub col: u32,
}

/// A table element with derived reading structure.
#[derive(Debug)]
pub struct ParsedTable<'a> {
    pub element: &'a Element,
    pub grid: &'a TableGrid,
    header_rows: u32,
}

impl<'a> ParsedTable<'a> {
    /// Interpret a table element. Returns `None` for non-table elements.
    ///
    /// `header_regs` overrides detection: the header ends at the last
    /// top row containing a matching cell.
    pub fn new(element: &'a Element, header_regs: &PatternSet) -> Option<Self> {
        let grid = element.grid.as_ref()?;
        let header_rows = if header_regs.is_empty() {
            detect_header_rows(grid)
        } else {
            detect_header_rows_by_regs(grid, header_regs)
        };
        Some(Self {
            element,
            grid,
            header_rows,
        })
    }

    /// Number of leading header rows (possibly zero for kv-style tables).
    pub fn header_rows(&self) -> u32 {
        self.header_rows
    }

    /// Row indexes of the data region.
    pub fn data_rows(&self) -> impl Iterator<Item = u32> + '_ {
        self.header_rows..self.grid.rows
    }

    /// Label of one column: header cell texts joined top-down.
    pub fn column_label(&self, col: u32) -> String {
        let depth = self.header_rows.max(1).min(self.grid.rows);
        let mut parts: Vec<String> = Vec::new();
        for row in 0..depth {
            if let Some(cell) = self.grid.cell(row, col) {
                let text = clean_text(&cell.text);
                if !text.is_empty() && parts.last() != Some(&text) {
                    parts.push(text);
                }
            }
        }
        parts.join("|")
    }

    /// Resolve the column whose label matches the pattern set, or, with an
    /// empty set, whose label contains the cleaned fallback name.
    pub fn find_column(&self, patterns: &PatternSet, fallback_name: &str) -> Option<u32> {
        let name = clean_text(fallback_name);
        (0..self.grid.cols).find(|&col| {
            let label = self.column_label(col);
            if patterns.is_empty() {
                !name.is_empty() && label.contains(name.as_str())
            } else {
                patterns.is_match(&label)
            }
        })
    }

    /// Columns whose label matches a neglect pattern set.
    pub fn neglected_columns(&self, neglect: &PatternSet) -> Vec<u32> {
        if neglect.is_empty() {
            return Vec::new();
        }
        (0..self.grid.cols)
            .filter(|&col| neglect.is_match(&self.column_label(col)))
            .collect()
    }

    /// Key-value pairs of the table.
    ///
    /// With `complete` false only the leftmost pair of each row (or topmost
    /// pair of each column) is produced; with `complete` true every adjacent
    /// pair is.
    pub fn kv_pairs(&self, direction: KvDirection, complete: bool) -> Vec<KvPair<'a>> {
        let mut pairs = Vec::new();
        match direction {
            KvDirection::LeftAndRight => {
                for row in 0..self.grid.rows {
                    let cols: Vec<u32> = if complete {
                        (0..self.grid.cols.saturating_sub(1)).collect()
                    } else {
                        vec![0]
                    };
                    for col in cols {
                        if let (Some(key), Some(value)) =
                            (self.grid.cell(row, col), self.grid.cell(row, col + 1))
                        {
                            pairs.push(KvPair {
                                key,
                                value,
                                row,
                                col,
                            });
                        }
                    }
                }
            }
            KvDirection::UpAndDown => {
                for col in 0..self.grid.cols {
                    let rows: Vec<u32> = if complete {
                        (0..self.grid.rows.saturating_sub(1)).collect()
                    } else {
                        vec![0]
                    };
                    for row in rows {
                        if let (Some(key), Some(value)) =
                            (self.grid.cell(row, col), self.grid.cell(row + 1, col))
                        {
                            pairs.push(KvPair {
                                key,
                                value,
                                row,
                                col,
                            });
                        }
                    }
                }
            }
        }
        pairs
    }

    /// Rows whose leading cell matches the row predicate.
    pub fn rows_matching(&self, predicate: &PatternSet) -> Vec<u32> {
        self.data_rows()
            .filter(|&row| {
                self.grid
                    .cell(row, 0)
                    .is_some_and(|cell| predicate.is_match(&clean_text(&cell.text)))
            })
            .collect()
    }

    /// Columns whose header label matches the column predicate.
    pub fn columns_matching(&self, predicate: &PatternSet) -> Vec<u32> {
        (0..self.grid.cols)
            .filter(|&col| predicate.is_match(&self.column_label(col)))
            .collect()
    }
}

/// Header depth: the topmost run of rows whose non-empty cells are
/// predominantly non-numeric, always leaving at least one data row.
fn detect_header_rows(grid: &TableGrid) -> u32 {
    let mut depth = 0;
    for row in 0..grid.rows.saturating_sub(1) {
        if !is_header_like(grid, row) {
            break;
        }
        depth = row + 1;
    }
    depth
}

fn detect_header_rows_by_regs(grid: &TableGrid, header_regs: &PatternSet) -> u32 {
    let mut depth = 0;
    for row in 0..grid.rows.saturating_sub(1) {
        let hit = grid
            .row(row)
            .iter()
            .any(|cell| header_regs.is_match(&clean_text(&cell.text)));
        if hit {
            depth = row + 1;
        } else if depth > 0 {
            break;
        }
    }
    depth
}

fn is_header_like(grid: &TableGrid, row: u32) -> bool {
    let cells = grid.row(row);
    let non_empty: Vec<_> = cells.iter().filter(|c| !c.text.trim().is_empty()).collect();
    if non_empty.is_empty() {
        return false;
    }
    let numeric = non_empty
        .iter()
        .filter(|c| NUMERIC_CELL.is_match(c.text.trim()))
        .count();
    (numeric as f64) / (non_empty.len() as f64) < 0.5
}
