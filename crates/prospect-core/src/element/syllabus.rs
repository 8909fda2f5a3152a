//! Heading tree reconstructed from syllabus elements.
//!
//! The parser emits `SYLLABUS` elements carrying a positive heading level.
//! Rebuilding parent/child links from levels and document order yields a
//! forest with one root per top-level heading. Each node owns the element
//! range from its heading up to (excluding) the next heading of equal or
//! higher rank, which is exactly the slice a syllabus-scoped resolver reads.

use crate::element::{Element, ElementClass};
use crate::pattern::PatternSet;

/// One heading in the reconstructed tree.
#[derive(Debug, Clone)]
pub struct SyllabusNode {
    /// Element index of the heading itself.
    pub element: usize,
    /// Heading depth, 1 = top level.
    pub level: u32,
    /// Heading text.
    pub title: String,
    /// Index of the parent node in the tree's node list.
    pub parent: Option<usize>,
    /// Element range of the subtree: `(element, end)` exclusive of the
    /// heading, exclusive of the next sibling.
    pub range: (usize, usize),
}

/// Forest of syllabus nodes in document order.
#[derive(Debug, Clone, Default)]
pub struct SyllabusTree {
    nodes: Vec<SyllabusNode>,
}

impl SyllabusTree {
    /// Reconstruct the forest from the ordered element sequence.
    ///
    /// Deterministic: a heading's subtree ends at the first later heading
    /// whose level is equal or higher (numerically lower or equal).
    pub fn build(elements: &[Element]) -> Self {
        let doc_end = elements.len();
        let mut nodes: Vec<SyllabusNode> = Vec::new();
        let mut stack: Vec<usize> = Vec::new();

        for element in elements {
            if element.class != ElementClass::Syllabus {
                continue;
            }
            let level = element.syllabus_level.unwrap_or(1);

            // Close finished subtrees.
            while let Some(&open) = stack.last() {
                if nodes[open].level >= level {
                    nodes[open].range.1 = element.index;
                    stack.pop();
                } else {
                    break;
                }
            }

            let parent = stack.last().copied();
            nodes.push(SyllabusNode {
                element: element.index,
                level,
                title: element.text.clone(),
                parent,
                range: (element.index, doc_end),
            });
            stack.push(nodes.len() - 1);
        }

        // Ranges of still-open nodes already run to the document end.
        Self { nodes }
    }

    pub fn nodes(&self) -> &[SyllabusNode] {
        &self.nodes
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes whose heading text matches any feature pattern, document order.
    pub fn find_by_title(&self, features: &PatternSet) -> Vec<&SyllabusNode> {
        self.nodes.iter().filter(|n| features.is_match(&n.title)).collect()
    }

    /// The innermost node whose subtree contains the element index.
    pub fn node_for_element(&self, index: usize) -> Option<&SyllabusNode> {
        self.nodes
            .iter()
            .filter(|n| n.range.0 <= index && index < n.range.1)
            .max_by_key(|n| n.level)
    }

    /// Chain of headings from a node up to its root, innermost first.
    pub fn ancestors(&self, node: &SyllabusNode) -> Vec<&SyllabusNode> {
        let mut chain = Vec::new();
        let mut current = node.parent;
        while let Some(idx) = current {
            chain.push(&self.nodes[idx]);
            current = self.nodes[idx].parent;
        }
        chain
    }

    /// Element indexes strictly inside the node's subtree, capped at
    /// `max_range` elements when given.
    pub fn subtree_elements(&self, node: &SyllabusNode, max_range: Option<usize>) -> Vec<usize> {
        let start = node.range.0 + 1;
        let mut end = node.range.1;
        if let Some(cap) = max_range {
            end = end.min(start + cap);
        }
        (start..end).collect()
    }

    /// Element indexes directly under the heading, stopping before the
    /// first nested heading.
    pub fn direct_child_elements(&self, node: &SyllabusNode, elements: &[Element]) -> Vec<usize> {
        let mut out = Vec::new();
        for index in node.range.0 + 1..node.range.1 {
            if let Some(element) = elements.get(index) {
                if element.class == ElementClass::Syllabus {
                    break;
                }
                out.push(index);
            }
        }
        out
    }
}
