//! Row-oriented table extraction.
//!
//! `table_row` emits the cell under the field's column for every data row;
//! `table_column_content` emits a whole column. Both pick their tables by
//! title and share the header conventions of [`ParsedTable`].

use tracing::debug;

use crate::element::index::ElementIndex;
use crate::element::table::ParsedTable;
use crate::element::Element;
use crate::error::ConfigError;
use crate::normalize::text::clean_text;
use crate::pattern::PatternSet;
use crate::resolve::{Candidate, ElementFilter, FieldContext, FieldDefaults};
use crate::schema::params::ParamReader;

/// Axis selection: `parse_by = "col"` reads a transposed table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseBy {
    Row,
    Col,
}

/// Shared table selection by caption/title.
#[derive(Debug, Default)]
pub(crate) struct TableSelect {
    title_patterns: PatternSet,
    neglect_title_patterns: PatternSet,
}

impl TableSelect {
    pub(crate) fn from_params(reader: &ParamReader<'_>) -> Result<Self, ConfigError> {
        Ok(Self {
            title_patterns: reader.patterns("title_patterns")?,
            neglect_title_patterns: reader.patterns("neglect_title_patterns")?,
        })
    }

    /// Tables passing the shared element filter and the title policy.
    pub(crate) fn tables<'a>(
        &self,
        index: &'a ElementIndex,
        filter: &ElementFilter,
    ) -> Vec<&'a Element> {
        index
            .iter()
            .filter(|e| e.is_table())
            .filter(|e| filter.keep(e, index))
            .filter(|e| self.title_allowed(e, index))
            .collect()
    }

    fn title_allowed(&self, table: &Element, index: &ElementIndex) -> bool {
        let title = index
            .table_title(table)
            .map(clean_text)
            .unwrap_or_else(|| clean_text(&table.text));
        if !self.neglect_title_patterns.is_empty() && self.neglect_title_patterns.is_match(&title) {
            return false;
        }
        self.title_patterns.is_empty() || self.title_patterns.is_match(&title)
    }
}

#[derive(Debug)]
pub struct TableRow {
    select: TableSelect,
    /// Header detection override.
    header_regs: PatternSet,
    /// Target column override; empty = resolve by field name.
    column_regs: PatternSet,
    /// Columns to drop entirely.
    neglect_header_regs: PatternSet,
    /// Rows whose primary-column cell matches are dropped (totals etc.).
    neglect_patterns: PatternSet,
    parse_by: ParseBy,
    multi: bool,
}

impl TableRow {
    pub fn from_params(
        reader: &ParamReader<'_>,
        defaults: &FieldDefaults,
    ) -> Result<Self, ConfigError> {
        let parse_by = match reader.string("parse_by").as_deref() {
            Some("col") => ParseBy::Col,
            _ => ParseBy::Row,
        };
        Ok(Self {
            select: TableSelect::from_params(reader)?,
            header_regs: reader.patterns("header_regs")?,
            column_regs: reader.patterns("column_regs")?,
            neglect_header_regs: reader.patterns("neglect_header_regs")?,
            neglect_patterns: reader.patterns("neglect_patterns")?,
            parse_by,
            multi: reader.bool("multi", defaults.multi),
        })
    }

    pub fn resolve(
        &self,
        ctx: FieldContext<'_>,
        index: &ElementIndex,
        filter: &ElementFilter,
    ) -> Vec<Candidate> {
        let mut candidates = Vec::new();
        for element in self.select.tables(index, filter) {
            let Some(table) = ParsedTable::new(element, &self.header_regs) else {
                continue;
            };
            let found = match self.parse_by {
                ParseBy::Row => self.read_rows(ctx, element, &table),
                ParseBy::Col => self.read_transposed(ctx, element, &table),
            };
            if found.is_empty() {
                continue;
            }
            candidates.extend(found);
            if !self.multi {
                candidates.truncate(1);
            }
            break;
        }
        debug!(field = ctx.name, candidates = candidates.len(), "table_row resolved");
        candidates
    }

    fn read_rows(
        &self,
        ctx: FieldContext<'_>,
        element: &Element,
        table: &ParsedTable<'_>,
    ) -> Vec<Candidate> {
        let Some(col) = table.find_column(&self.column_regs, ctx.name) else {
            return Vec::new();
        };
        if table.neglected_columns(&self.neglect_header_regs).contains(&col) {
            return Vec::new();
        }
        let mut out = Vec::new();
        for row in table.data_rows() {
            let primary = table
                .grid
                .cell(row, 0)
                .map(|c| clean_text(&c.text))
                .unwrap_or_default();
            if !self.neglect_patterns.is_empty() && self.neglect_patterns.is_match(&primary) {
                continue;
            }
            if let Some(cell) = table.grid.cell(row, col) {
                if cell.text.trim().is_empty() {
                    continue;
                }
                out.push(
                    Candidate::from_text(cell.text.clone(), element.index)
                        .with_score(element.score.unwrap_or(1.0))
                        .with_row(row),
                );
            }
        }
        out
    }

    /// `parse_by = "col"`: the field name labels a row; values run rightward.
    fn read_transposed(
        &self,
        ctx: FieldContext<'_>,
        element: &Element,
        table: &ParsedTable<'_>,
    ) -> Vec<Candidate> {
        let name = clean_text(ctx.name);
        let row = (0..table.grid.rows).find(|&row| {
            table.grid.cell(row, 0).is_some_and(|cell| {
                let label = clean_text(&cell.text);
                if self.column_regs.is_empty() {
                    !name.is_empty() && label.contains(name.as_str())
                } else {
                    self.column_regs.is_match(&label)
                }
            })
        });
        let Some(row) = row else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for col in 1..table.grid.cols {
            if let Some(cell) = table.grid.cell(row, col) {
                if cell.text.trim().is_empty() || cell.dummy {
                    continue;
                }
                out.push(
                    Candidate::from_text(cell.text.clone(), element.index)
                        .with_score(element.score.unwrap_or(1.0))
                        .with_row(row),
                );
            }
        }
        out
    }
}

/// Whole-column extraction: the value is the column vector.
#[derive(Debug)]
pub struct TableColumnContent {
    select: TableSelect,
    header_regs: PatternSet,
    column_regs: PatternSet,
    neglect_patterns: PatternSet,
    multi: bool,
}

impl TableColumnContent {
    pub fn from_params(
        reader: &ParamReader<'_>,
        defaults: &FieldDefaults,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            select: TableSelect::from_params(reader)?,
            header_regs: reader.patterns("header_regs")?,
            column_regs: reader.patterns("column_regs")?,
            neglect_patterns: reader.patterns("neglect_patterns")?,
            multi: reader.bool("multi", defaults.multi),
        })
    }

    pub fn resolve(
        &self,
        ctx: FieldContext<'_>,
        index: &ElementIndex,
        filter: &ElementFilter,
    ) -> Vec<Candidate> {
        for element in self.select.tables(index, filter) {
            let Some(table) = ParsedTable::new(element, &self.header_regs) else {
                continue;
            };
            let Some(col) = table.find_column(&self.column_regs, ctx.name) else {
                continue;
            };
            let mut cells: Vec<(u32, String)> = Vec::new();
            for row in table.data_rows() {
                let primary = table
                    .grid
                    .cell(row, 0)
                    .map(|c| clean_text(&c.text))
                    .unwrap_or_default();
                if !self.neglect_patterns.is_empty() && self.neglect_patterns.is_match(&primary) {
                    continue;
                }
                if let Some(cell) = table.grid.cell(row, col) {
                    if !cell.text.trim().is_empty() {
                        cells.push((row, cell.text.clone()));
                    }
                }
            }
            if cells.is_empty() {
                continue;
            }
            return if self.multi {
                cells
                    .into_iter()
                    .map(|(row, text)| {
                        Candidate::from_text(text, element.index)
                            .with_score(element.score.unwrap_or(1.0))
                            .with_row(row)
                    })
                    .collect()
            } else {
                let joined = cells.iter().map(|(_, t)| t.as_str()).collect::<Vec<_>>().join("\n");
                vec![Candidate::from_text(joined, element.index).with_score(element.score.unwrap_or(1.0))]
            };
        }
        Vec::new()
    }
}
