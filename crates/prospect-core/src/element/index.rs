//! Addressable, ordered view over the parsed document.

use std::collections::BTreeMap;

use tracing::debug;

use crate::element::syllabus::SyllabusTree;
use crate::element::window::{AnchorWindow, WindowSlice};
use crate::element::{Element, ElementClass};
use crate::error::InputError;

/// An element pre-tagged by the upstream coarse matcher, used as a prior.
#[derive(Debug, Clone)]
pub struct CrudeTag {
    pub element: usize,
    pub score: f32,
}

/// Append-only ordered sequence of elements with derived lookups.
///
/// Built once per document and shared read-only; every query borrows.
#[derive(Debug, Default)]
pub struct ElementIndex {
    elements: Vec<Element>,
    pages: BTreeMap<u32, Vec<usize>>,
    syllabus: SyllabusTree,
    /// Crude-answer priors keyed by the field path (segments joined by `|`).
    crude: BTreeMap<String, Vec<CrudeTag>>,
}

impl ElementIndex {
    /// Admit a parsed element sequence, validating the input contract.
    pub fn from_elements(elements: Vec<Element>) -> Result<Self, InputError> {
        for (expected, element) in elements.iter().enumerate() {
            if element.index != expected {
                return Err(InputError::IndexOutOfOrder {
                    expected,
                    found: element.index,
                });
            }
            if let Some(score) = element.score {
                if !(0.0..=1.0).contains(&score) {
                    return Err(InputError::ScoreOutOfRange {
                        element: element.index,
                        score,
                    });
                }
            }
        }

        let mut pages: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
        for element in &elements {
            pages.entry(element.page).or_default().push(element.index);
        }
        let syllabus = SyllabusTree::build(&elements);
        debug!(
            elements = elements.len(),
            pages = pages.len(),
            syllabus_nodes = syllabus.nodes().len(),
            "element index built"
        );

        Ok(Self {
            elements,
            pages,
            syllabus,
            crude: BTreeMap::new(),
        })
    }

    /// Attach crude-answer priors from the upstream coarse matcher.
    pub fn with_crude_answers(mut self, crude: BTreeMap<String, Vec<CrudeTag>>) -> Self {
        self.crude = crude;
        self
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Element> {
        self.elements.get(index)
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn iter(&self) -> impl Iterator<Item = &Element> {
        self.elements.iter()
    }

    pub fn syllabus(&self) -> &SyllabusTree {
        &self.syllabus
    }

    /// Element indexes on one page, document order.
    pub fn page_elements(&self, page: u32) -> &[usize] {
        self.pages.get(&page).map_or(&[], Vec::as_slice)
    }

    /// Pages present in the document, ascending.
    pub fn pages(&self) -> impl Iterator<Item = u32> + '_ {
        self.pages.keys().copied()
    }

    /// Resolve a possibly-negative page number (`-1` = last page).
    pub fn resolve_page(&self, page: i64) -> Option<u32> {
        if page >= 0 {
            return Some(page as u32);
        }
        let pages: Vec<u32> = self.pages().collect();
        let offset = pages.len() as i64 + page;
        if offset < 0 {
            return None;
        }
        pages.get(offset as usize).copied()
    }

    /// Resolve a possibly-negative element position (`-1` = last element).
    pub fn resolve_position(&self, position: i64) -> Option<usize> {
        if position >= 0 {
            let position = position as usize;
            return (position < self.elements.len()).then_some(position);
        }
        let offset = self.elements.len() as i64 + position;
        (offset >= 0).then_some(offset as usize)
    }

    /// Walk from an element in `step` direction collecting up to `amount`
    /// paragraph-like elements. The starting element is excluded.
    pub fn paragraphs_near(&self, index: usize, step: i64, amount: usize) -> Vec<&Element> {
        let mut found = Vec::new();
        let mut cursor = index as i64;
        loop {
            cursor += step;
            if cursor < 0 || cursor as usize >= self.elements.len() {
                break;
            }
            let element = &self.elements[cursor as usize];
            if element.class.like_paragraph() {
                found.push(element);
                if found.len() >= amount {
                    break;
                }
            }
        }
        found
    }

    /// A table's title: the nearest preceding paragraph within two elements,
    /// skipping page furniture.
    pub fn table_title(&self, table: &Element) -> Option<&str> {
        for element in self.paragraphs_near(table.index, -1, 2) {
            if table.index - element.index > 2 {
                break;
            }
            if element.class == ElementClass::Paragraph && !element.text.trim().is_empty() {
                return Some(&element.text);
            }
        }
        None
    }

    /// Crude-tagged candidate elements for a field path, best score first,
    /// ties broken by document order.
    pub fn crude_candidates(&self, path_key: &str, threshold: f32, limit: usize) -> Vec<&Element> {
        let Some(tags) = self.crude.get(path_key) else {
            return Vec::new();
        };
        let mut tags: Vec<&CrudeTag> = tags.iter().filter(|t| t.score >= threshold).collect();
        tags.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.element.cmp(&b.element))
        });
        tags.into_iter()
            .take(limit)
            .filter_map(|t| self.get(t.element))
            .collect()
    }

    /// Whether the element is tagged by the crude matcher for the path.
    pub fn is_crude_tagged(&self, path_key: &str, element: usize) -> bool {
        self.crude
            .get(path_key)
            .is_some_and(|tags| tags.iter().any(|t| t.element == element))
    }

    /// Run an anchor-window query over the whole document.
    pub fn window(&self, query: &AnchorWindow) -> Vec<WindowSlice<'_>> {
        let candidates: Vec<&Element> = self.elements.iter().collect();
        query.select(&candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn build() -> ElementIndex {
        ElementIndex::from_elements(vec![
            Element::paragraph(0, 0, "标题"),
            Element::paragraph(1, 0, "担保金额表"),
            Element::table(
                2,
                1,
                crate::element::TableGrid::from_rows(&[vec!["项目", "金额"], vec!["利息", "30"]]),
            ),
            Element::paragraph(3, 1, "尾部"),
        ])
        .unwrap()
    }

    #[test]
    fn test_contiguous_index_enforced() {
        let err = ElementIndex::from_elements(vec![Element::paragraph(1, 0, "x")]).unwrap_err();
        assert!(matches!(err, InputError::IndexOutOfOrder { expected: 0, found: 1 }));
    }

    #[test]
    fn test_page_buckets_and_negative_resolution() {
        let index = build();
        assert_eq!(index.page_elements(0), &[0, 1]);
        assert_eq!(index.page_elements(1), &[2, 3]);
        assert_eq!(index.resolve_page(-1), Some(1));
        assert_eq!(index.resolve_position(-1), Some(3));
        assert_eq!(index.resolve_position(99), None);
    }

    #[test]
    fn test_table_title_is_preceding_paragraph() {
        let index = build();
        let table = index.get(2).unwrap();
        assert_eq!(index.table_title(table), Some("担保金额表"));
    }

    #[test]
    fn test_crude_candidates_ranked() {
        let mut crude = BTreeMap::new();
        crude.insert(
            "担保|金额".to_string(),
            vec![
                CrudeTag { element: 3, score: 0.4 },
                CrudeTag { element: 1, score: 0.9 },
                CrudeTag { element: 0, score: 0.9 },
            ],
        );
        let index = build().with_crude_answers(crude);
        let found = index.crude_candidates("担保|金额", 0.5, 10);
        let indexes: Vec<_> = found.iter().map(|e| e.index).collect();
        assert_eq!(indexes, vec![0, 1]);
    }
}
