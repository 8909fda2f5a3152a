//! Cell selection by row/column predicate intersection.
//!
//! Registered as `table_tuple` and `table_tuple_select`: a row predicate
//! picks rows by their leading cell, a column predicate picks columns by
//! their header label, and the answer is the intersection cell(s). A
//! negative cell pattern reports the field as absent for that row.

use crate::element::index::ElementIndex;
use crate::element::table::ParsedTable;
use crate::error::ConfigError;
use crate::normalize::text::clean_text;
use crate::pattern::PatternSet;
use crate::resolve::table_row::TableSelect;
use crate::resolve::{Candidate, ElementFilter, FieldContext, FieldDefaults};
use crate::schema::params::ParamReader;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SelectBy {
    Row,
    Column,
    Both,
}

#[derive(Debug)]
pub struct TableTuple {
    select: TableSelect,
    header_regs: PatternSet,
    row_patterns: PatternSet,
    column_patterns: PatternSet,
    select_by: SelectBy,
    /// Cells matching this are treated as absent (`—`, `N/A`, `0`, `nil`).
    cell_neg_pattern: PatternSet,
    multi_elements: bool,
}

impl TableTuple {
    pub fn from_params(
        reader: &ParamReader<'_>,
        defaults: &FieldDefaults,
    ) -> Result<Self, ConfigError> {
        let select_by = match reader.string("select_by").as_deref() {
            Some("row") => SelectBy::Row,
            Some("column") => SelectBy::Column,
            _ => SelectBy::Both,
        };
        Ok(Self {
            select: TableSelect::from_params(reader)?,
            header_regs: reader.patterns("header_regs")?,
            row_patterns: reader.patterns("row_patterns")?,
            column_patterns: reader.patterns("column_patterns")?,
            select_by,
            cell_neg_pattern: reader.patterns("cell_neg_pattern")?,
            multi_elements: reader.bool("multi_elements", defaults.multi_elements),
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

            let rows: Vec<u32> = match self.select_by {
                SelectBy::Column => table.data_rows().collect(),
                _ => table.rows_matching(&self.row_patterns),
            };
            let cols: Vec<u32> = match self.select_by {
                SelectBy::Row => match table.find_column(&self.column_patterns, ctx.name) {
                    Some(col) => vec![col],
                    None => Vec::new(),
                },
                _ => table.columns_matching(&self.column_patterns),
            };

            for &row in &rows {
                for &col in &cols {
                    let Some(cell) = table.grid.cell(row, col) else {
                        continue;
                    };
                    let text = cell.text.trim();
                    if text.is_empty() {
                        continue;
                    }
                    if !self.cell_neg_pattern.is_empty()
                        && self.cell_neg_pattern.is_match(&clean_text(text))
                    {
                        // Absent in this row.
                        continue;
                    }
                    candidates.push(
                        Candidate::from_text(text, element.index)
                            .with_score(element.score.unwrap_or(1.0))
                            .with_row(row),
                    );
                    if !self.multi_elements {
                        return candidates;
                    }
                }
            }
            if !candidates.is_empty() {
                break;
            }
        }
        candidates
    }
}
