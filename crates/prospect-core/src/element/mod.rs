//! Parsed-document element model.
//!
//! Elements are the input contract of the engine: an ordered sequence of
//! typed blocks produced by an upstream parser. They are read-only once
//! admitted into an [`index::ElementIndex`].

pub mod index;
pub mod syllabus;
pub mod table;
pub mod window;

use std::collections::BTreeMap;

use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

use crate::error::InputError;

/// Closed set of element classes the parser may emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ElementClass {
    Paragraph,
    Table,
    Syllabus,
    PageHeader,
    PageFooter,
}

impl ElementClass {
    /// Paragraph-like classes carry plain running text.
    pub fn like_paragraph(self) -> bool {
        matches!(
            self,
            ElementClass::Paragraph | ElementClass::Syllabus | ElementClass::PageHeader | ElementClass::PageFooter
        )
    }
}

/// A single table cell after merged-cell expansion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cell {
    /// Normalized cell text.
    pub text: String,

    /// Cell styles as reported by the parser (font flags, alignment, ...).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub styles: BTreeMap<String, serde_json::Value>,

    /// True when this position was filled in by merged-cell expansion and
    /// mirrors the text of the anchor cell.
    #[serde(default)]
    pub dummy: bool,
}

impl Cell {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            styles: BTreeMap::new(),
            dummy: false,
        }
    }
}

/// Raw cell as supplied by the parser; spans describe merged regions.
#[derive(Debug, Clone, Deserialize)]
struct RawCell {
    #[serde(default)]
    text: String,
    #[serde(default)]
    styles: BTreeMap<String, serde_json::Value>,
    #[serde(default = "one")]
    row_span: u32,
    #[serde(default = "one")]
    col_span: u32,
}

fn one() -> u32 {
    1
}

/// A dense rectangular grid of cells keyed by `(row, col)`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TableGrid {
    pub rows: u32,
    pub cols: u32,
    #[serde(serialize_with = "serialize_cells")]
    cells: BTreeMap<(u32, u32), Cell>,
}

/// Cells serialize back under their `"row_col"` wire keys.
fn serialize_cells<S: Serializer>(
    cells: &BTreeMap<(u32, u32), Cell>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(cells.len()))?;
    for ((row, col), cell) in cells {
        map.serialize_entry(&format!("{row}_{col}"), cell)?;
    }
    map.end()
}

impl TableGrid {
    /// Build a grid from parser cells keyed `"row_col"`, expanding merged
    /// cells into dummies and checking the result is a rectangle.
    fn from_raw(
        element: usize,
        raw: BTreeMap<String, RawCell>,
    ) -> Result<Self, InputError> {
        let mut cells: BTreeMap<(u32, u32), Cell> = BTreeMap::new();
        let mut rows = 0;
        let mut cols = 0;

        for (key, cell) in raw {
            let (row, col) = parse_cell_key(&key)?;
            for dr in 0..cell.row_span.max(1) {
                for dc in 0..cell.col_span.max(1) {
                    let coords = (row + dr, col + dc);
                    rows = rows.max(coords.0 + 1);
                    cols = cols.max(coords.1 + 1);
                    cells.insert(
                        coords,
                        Cell {
                            text: cell.text.clone(),
                            styles: cell.styles.clone(),
                            dummy: dr != 0 || dc != 0,
                        },
                    );
                }
            }
        }

        for row in 0..rows {
            for col in 0..cols {
                if !cells.contains_key(&(row, col)) {
                    return Err(InputError::RaggedGrid { element });
                }
            }
        }

        Ok(Self { rows, cols, cells })
    }

    /// Grid from row-major text, convenient for construction in tests
    /// and from non-merged parser output.
    pub fn from_rows<S: AsRef<str>>(rows: &[Vec<S>]) -> Self {
        let mut cells = BTreeMap::new();
        let mut cols = 0;
        for (r, row) in rows.iter().enumerate() {
            cols = cols.max(row.len() as u32);
            for (c, text) in row.iter().enumerate() {
                cells.insert((r as u32, c as u32), Cell::new(text.as_ref()));
            }
        }
        Self {
            rows: rows.len() as u32,
            cols,
            cells,
        }
    }

    pub fn cell(&self, row: u32, col: u32) -> Option<&Cell> {
        self.cells.get(&(row, col))
    }

    /// Cells of one row in column order.
    pub fn row(&self, row: u32) -> Vec<&Cell> {
        (0..self.cols).filter_map(|col| self.cell(row, col)).collect()
    }

    /// Cells of one column in row order.
    pub fn column(&self, col: u32) -> Vec<&Cell> {
        (0..self.rows).filter_map(|row| self.cell(row, col)).collect()
    }

    /// Concatenated text of a row, cells separated by a single space.
    pub fn row_text(&self, row: u32) -> String {
        self.row(row)
            .iter()
            .map(|c| c.text.as_str())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn parse_cell_key(key: &str) -> Result<(u32, u32), InputError> {
    let mut parts = key.splitn(2, '_');
    let row = parts.next().and_then(|p| p.parse().ok());
    let col = parts.next().and_then(|p| p.parse().ok());
    match (row, col) {
        (Some(row), Some(col)) => Ok((row, col)),
        _ => Err(InputError::MalformedCellKey(key.to_string())),
    }
}

/// Immutable record produced by the parser.
#[derive(Debug, Clone, Serialize)]
pub struct Element {
    /// Stable position in the document total order.
    pub index: usize,
    /// Zero-based page number.
    pub page: u32,
    pub class: ElementClass,
    /// Normalized UTF-8 text. For tables, the concatenated cell text.
    pub text: String,
    /// Cell grid, present for `Table` elements.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grid: Option<TableGrid>,
    /// Heading depth for `Syllabus` elements (1 = top level).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub syllabus_level: Option<u32>,
    /// Relevance score from upstream coarse matching, in [0, 1].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
    /// Bounding box `[left, top, right, bottom]` in page coordinates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outline: Option<[f64; 4]>,
    /// True when the parser merged this element across a page break.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub merged_across_pages: bool,
}

impl Element {
    pub fn paragraph(index: usize, page: u32, text: impl Into<String>) -> Self {
        Self::with_class(index, page, ElementClass::Paragraph, text)
    }

    pub fn syllabus(index: usize, page: u32, level: u32, text: impl Into<String>) -> Self {
        let mut element = Self::with_class(index, page, ElementClass::Syllabus, text);
        element.syllabus_level = Some(level);
        element
    }

    pub fn table(index: usize, page: u32, grid: TableGrid) -> Self {
        let text = (0..grid.rows).map(|r| grid.row_text(r)).collect::<Vec<_>>().join("\n");
        let mut element = Self::with_class(index, page, ElementClass::Table, text);
        element.grid = Some(grid);
        element
    }

    fn with_class(index: usize, page: u32, class: ElementClass, text: impl Into<String>) -> Self {
        Self {
            index,
            page,
            class,
            text: text.into(),
            grid: None,
            syllabus_level: None,
            score: None,
            outline: None,
            merged_across_pages: false,
        }
    }

    pub fn with_score(mut self, score: f32) -> Self {
        self.score = Some(score);
        self
    }

    pub fn is_table(&self) -> bool {
        self.class == ElementClass::Table
    }
}

/// Parser-facing element shape; converted into [`Element`] with validation.
#[derive(Debug, Deserialize)]
struct RawElement {
    index: usize,
    page: u32,
    class: ElementClass,
    #[serde(default)]
    text: String,
    #[serde(default)]
    cells: Option<BTreeMap<String, RawCell>>,
    #[serde(default)]
    syllabus_level: Option<u32>,
    #[serde(default)]
    score: Option<f32>,
    #[serde(default)]
    outline: Option<[f64; 4]>,
    #[serde(default)]
    merged_across_pages: bool,
}

/// Deserialize and validate a parser element stream.
pub fn elements_from_json(json: &str) -> Result<Vec<Element>, InputError> {
    let raw: Vec<RawElement> =
        serde_json::from_str(json).map_err(|err| InputError::Parse(err.to_string()))?;
    raw.into_iter().map(admit_element).collect()
}

fn admit_element(raw: RawElement) -> Result<Element, InputError> {
    if let Some(score) = raw.score {
        if !(0.0..=1.0).contains(&score) {
            return Err(InputError::ScoreOutOfRange {
                element: raw.index,
                score,
            });
        }
    }
    let grid = match raw.cells {
        Some(cells) if raw.class == ElementClass::Table => {
            Some(TableGrid::from_raw(raw.index, cells)?)
        }
        _ => None,
    };
    Ok(Element {
        index: raw.index,
        page: raw.page,
        class: raw.class,
        text: raw.text,
        grid,
        syllabus_level: raw.syllabus_level,
        score: raw.score,
        outline: raw.outline,
        merged_across_pages: raw.merged_across_pages,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_grid_from_raw_expands_merged_cells() {
        let mut raw = BTreeMap::new();
        raw.insert(
            "0_0".to_string(),
            RawCell {
                text: "项目".to_string(),
                styles: BTreeMap::new(),
                row_span: 2,
                col_span: 1,
            },
        );
        raw.insert(
            "0_1".to_string(),
            RawCell {
                text: "金额".to_string(),
                styles: BTreeMap::new(),
                row_span: 1,
                col_span: 1,
            },
        );
        raw.insert(
            "1_1".to_string(),
            RawCell {
                text: "100".to_string(),
                styles: BTreeMap::new(),
                row_span: 1,
                col_span: 1,
            },
        );

        let grid = TableGrid::from_raw(0, raw).unwrap();
        assert_eq!(grid.rows, 2);
        assert_eq!(grid.cols, 2);
        assert_eq!(grid.cell(1, 0).unwrap().text, "项目");
        assert!(grid.cell(1, 0).unwrap().dummy);
        assert!(!grid.cell(0, 0).unwrap().dummy);
    }

    #[test]
    fn test_ragged_grid_rejected() {
        let mut raw = BTreeMap::new();
        raw.insert(
            "0_0".to_string(),
            RawCell {
                text: "a".to_string(),
                styles: BTreeMap::new(),
                row_span: 1,
                col_span: 1,
            },
        );
        raw.insert(
            "1_1".to_string(),
            RawCell {
                text: "b".to_string(),
                styles: BTreeMap::new(),
                row_span: 1,
                col_span: 1,
            },
        );
        let err = TableGrid::from_raw(7, raw).unwrap_err();
        assert!(matches!(err, InputError::RaggedGrid { element: 7 }));
    }

    #[test]
    fn test_malformed_cell_key() {
        assert!(parse_cell_key("3_4").is_ok());
        assert!(parse_cell_key("3-4").is_err());
        assert!(parse_cell_key("x_4").is_err());
    }

    #[test]
    fn test_elements_from_json() {
        let json = r#"[
            {"index": 0, "page": 0, "class": "PARAGRAPH", "text": "公司代码:600001"},
            {"index": 1, "page": 0, "class": "TABLE",
             "cells": {"0_0": {"text": "项目"}, "0_1": {"text": "金额"}}}
        ]"#;
        let elements = elements_from_json(json).unwrap();
        assert_eq!(elements.len(), 2);
        assert!(elements[1].grid.is_some());
        assert_eq!(elements[1].grid.as_ref().unwrap().cols, 2);
    }

    #[test]
    fn test_score_out_of_range() {
        let json = r#"[{"index": 0, "page": 0, "class": "PARAGRAPH", "text": "x", "score": 1.5}]"#;
        assert!(elements_from_json(json).is_err());
    }
}
