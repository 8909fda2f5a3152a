//! Key-value table extraction.
//!
//! Many filing tables are really forms: the left cell names an attribute,
//! the right cell carries its value. The field name (or a configured key
//! white list) selects the key cell; the adjacent cell is the answer.

use tracing::debug;

use crate::element::index::ElementIndex;
use crate::element::table::{KvDirection, ParsedTable};
use crate::error::ConfigError;
use crate::normalize::text::clean_text;
use crate::pattern::PatternSet;
use crate::resolve::table_row::TableSelect;
use crate::resolve::{Candidate, ElementFilter, FieldContext, FieldDefaults};
use crate::schema::params::ParamReader;

/// Built-in key features of the `trading_exchange_kv` alias.
pub const TRADING_EXCHANGE_KEYS: &[&str] = &["交易所", "上市地点", "上市交易所", "挂牌交易所"];

#[derive(Debug)]
pub struct TableKv {
    select: TableSelect,
    /// Key regexes accepted in addition to the field name.
    feature_white_list: PatternSet,
    /// Skip pairs whose value cell is empty and keep searching.
    skip_empty_cell: bool,
    /// Pair every adjacent cell, not only the leftmost column.
    use_complete_table: bool,
    /// Rows whose text matches are dropped entirely.
    neglect_patterns: PatternSet,
    /// Refine the value cell text through these regexes.
    regs: PatternSet,
    directions: Vec<KvDirection>,
    multi: bool,
}

impl TableKv {
    pub fn from_params(
        reader: &ParamReader<'_>,
        defaults: &FieldDefaults,
        preset_keys: Option<&[&str]>,
    ) -> Result<Self, ConfigError> {
        let mut feature_white_list = reader.patterns("feature_white_list")?;
        if feature_white_list.is_empty() {
            if let Some(preset) = preset_keys {
                feature_white_list = PatternSet::compile(preset)?;
            }
        }
        let directions = {
            let names = reader.str_list("kv_directions");
            if names.is_empty() {
                vec![KvDirection::LeftAndRight]
            } else {
                names
                    .iter()
                    .filter_map(|name| match name.as_str() {
                        "left_and_right" => Some(KvDirection::LeftAndRight),
                        "up_and_down" => Some(KvDirection::UpAndDown),
                        _ => None,
                    })
                    .collect()
            }
        };
        Ok(Self {
            select: TableSelect::from_params(reader)?,
            feature_white_list,
            skip_empty_cell: reader.bool("skip_empty_cell", false),
            use_complete_table: reader.bool("use_complete_table", false),
            neglect_patterns: reader.patterns("neglect_patterns")?,
            regs: reader.patterns("regs")?,
            directions,
            multi: reader.bool("multi", defaults.multi),
        })
    }

    pub fn resolve(
        &self,
        ctx: FieldContext<'_>,
        index: &ElementIndex,
        filter: &ElementFilter,
    ) -> Vec<Candidate> {
        let name = clean_text(ctx.name);
        let mut candidates = Vec::new();

        for element in self.select.tables(index, filter) {
            let Some(table) = ParsedTable::new(element, &PatternSet::default()) else {
                continue;
            };
            for &direction in &self.directions {
                for pair in table.kv_pairs(direction, self.use_complete_table) {
                    let row_text = clean_text(&table.grid.row_text(pair.row));
                    if !self.neglect_patterns.is_empty() && self.neglect_patterns.is_match(&row_text) {
                        debug!(row = pair.row, "kv row dropped by neglect_patterns");
                        continue;
                    }
                    if !self.key_matches(&clean_text(&pair.key.text), &name) {
                        continue;
                    }
                    let value_text = pair.value.text.trim();
                    if value_text.is_empty() {
                        if self.skip_empty_cell {
                            continue;
                        }
                        break;
                    }
                    let candidate = match self.regs.first_match(&clean_text(value_text)) {
                        Some(found) if !self.regs.is_empty() => {
                            Candidate::from_text(found.text, element.index)
                                .with_span(found.span)
                                .with_priority(found.priority)
                                .with_row(pair.row)
                        }
                        None if !self.regs.is_empty() => continue,
                        _ => Candidate::from_text(value_text, element.index)
                            .with_score(element.score.unwrap_or(1.0))
                            .with_row(pair.row),
                    };
                    candidates.push(candidate);
                    if !self.multi {
                        return candidates;
                    }
                }
            }
        }
        candidates
    }

    fn key_matches(&self, key: &str, field_name: &str) -> bool {
        if key.is_empty() {
            return false;
        }
        if key == field_name {
            return true;
        }
        self.feature_white_list.is_match(key)
    }
}
