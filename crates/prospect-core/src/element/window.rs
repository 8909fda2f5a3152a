//! Anchor-window retrieval.
//!
//! A window is the contiguous run of elements between a top anchor and a
//! bottom anchor, each located by a regex set. Missing anchors yield an
//! empty window, not an error.

use crate::element::Element;
use crate::normalize::text::clean_text;
use crate::pattern::PatternSet;

/// An element inside a window, with the text it contributes.
///
/// Normally the full element text; for the top anchor with
/// `top_content_regs` configured, only the captured `content` group.
#[derive(Debug, Clone)]
pub struct WindowSlice<'a> {
    pub element: &'a Element,
    pub text: String,
}

/// Anchor-window query policies.
#[derive(Debug, Clone, Default)]
pub struct AnchorWindow {
    pub top_anchors: PatternSet,
    pub bottom_anchors: PatternSet,
    /// Include the top anchor element itself.
    pub include_top_anchor: bool,
    /// Include the bottom anchor element itself.
    pub include_bottom_anchor: bool,
    /// Prefer the last matching top anchor over the first.
    pub top_greed: bool,
    /// Prefer the last matching bottom anchor over the first.
    pub bottom_greed: bool,
    /// When the top anchor is missing, fall back to the document start.
    pub top_default: bool,
    /// When the bottom anchor is missing, fall back to the document end.
    pub bottom_default: bool,
    /// Restrict the top anchor's contribution to its `content` capture.
    pub top_content_regs: PatternSet,
    /// Skip elements the parser merged across page breaks.
    pub skip_merged_para: bool,
}

impl AnchorWindow {
    /// Select the window over an ordered candidate slice.
    pub fn select<'a>(&self, candidates: &[&'a Element]) -> Vec<WindowSlice<'a>> {
        let candidates: Vec<&Element> = if self.skip_merged_para {
            candidates.iter().copied().filter(|e| !e.merged_across_pages).collect()
        } else {
            candidates.to_vec()
        };
        if candidates.is_empty() {
            return Vec::new();
        }

        let top = self.locate(&candidates, &self.top_anchors, self.top_greed, 0);
        let top = match top {
            Some(found) => Some(found),
            None if self.top_default => None, // window starts at the first candidate
            None => return Vec::new(),
        };
        let search_from = top.map_or(0, |i| i + 1);

        let bottom = self.locate(&candidates, &self.bottom_anchors, self.bottom_greed, search_from);
        let bottom = match bottom {
            Some(found) => found,
            None if self.bottom_default => candidates.len(),
            None => return Vec::new(),
        };

        let mut window = Vec::new();
        if self.include_top_anchor {
            if let Some(top) = top {
                let element = candidates[top];
                let text = match self.top_content_regs.content_capture(&clean_text(&element.text)) {
                    Some(found) if !self.top_content_regs.is_empty() => found.text,
                    _ if !self.top_content_regs.is_empty() => String::new(),
                    _ => element.text.clone(),
                };
                if !text.is_empty() {
                    window.push(WindowSlice { element, text });
                }
            }
        }
        for &element in candidates.iter().take(bottom).skip(search_from) {
            window.push(WindowSlice {
                element,
                text: element.text.clone(),
            });
        }
        if self.include_bottom_anchor {
            if let Some(&element) = candidates.get(bottom) {
                window.push(WindowSlice {
                    element,
                    text: element.text.clone(),
                });
            }
        }
        window
    }

    /// Position of the anchor within the candidate slice, or `None`.
    fn locate(
        &self,
        candidates: &[&Element],
        anchors: &PatternSet,
        greed: bool,
        from: usize,
    ) -> Option<usize> {
        if anchors.is_empty() {
            return None;
        }
        let mut found = None;
        for (pos, element) in candidates.iter().enumerate().skip(from) {
            if anchors.is_match(&clean_text(&element.text)) {
                found = Some(pos);
                if !greed {
                    break;
                }
            }
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn docs() -> Vec<Element> {
        vec![
            Element::paragraph(0, 0, "目录"),
            Element::paragraph(1, 0, "基金的投资"),
            Element::paragraph(2, 0, "投资范围:A、B"),
            Element::paragraph(3, 0, "投资策略"),
        ]
    }

    fn refs(elements: &[Element]) -> Vec<&Element> {
        elements.iter().collect()
    }

    #[test]
    fn test_exclusive_window() {
        let elements = docs();
        let window = AnchorWindow {
            top_anchors: PatternSet::compile(&["基金的投资"]).unwrap(),
            bottom_anchors: PatternSet::compile(&["投资策略"]).unwrap(),
            include_top_anchor: false,
            ..Default::default()
        };
        let slices = window.select(&refs(&elements));
        let indexes: Vec<_> = slices.iter().map(|s| s.element.index).collect();
        assert_eq!(indexes, vec![2]);
    }

    #[test]
    fn test_inclusive_anchors() {
        let elements = docs();
        let window = AnchorWindow {
            top_anchors: PatternSet::compile(&["基金的投资"]).unwrap(),
            bottom_anchors: PatternSet::compile(&["投资策略"]).unwrap(),
            include_top_anchor: true,
            include_bottom_anchor: true,
            ..Default::default()
        };
        let indexes: Vec<_> = window.select(&refs(&elements)).iter().map(|s| s.element.index).collect();
        assert_eq!(indexes, vec![1, 2, 3]);
    }

    #[test]
    fn test_missing_anchor_yields_empty() {
        let elements = docs();
        let window = AnchorWindow {
            top_anchors: PatternSet::compile(&["不存在"]).unwrap(),
            bottom_anchors: PatternSet::compile(&["投资策略"]).unwrap(),
            ..Default::default()
        };
        assert!(window.select(&refs(&elements)).is_empty());
    }

    #[test]
    fn test_defaults_extend_to_document_bounds() {
        let elements = docs();
        let window = AnchorWindow {
            top_anchors: PatternSet::compile(&["不存在"]).unwrap(),
            bottom_anchors: PatternSet::compile(&["也不存在"]).unwrap(),
            top_default: true,
            bottom_default: true,
            ..Default::default()
        };
        let indexes: Vec<_> = window.select(&refs(&elements)).iter().map(|s| s.element.index).collect();
        assert_eq!(indexes, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_top_greed_prefers_last_occurrence() {
        let elements = vec![
            Element::paragraph(0, 0, "担保情况概述"),
            Element::paragraph(1, 0, "其他"),
            Element::paragraph(2, 0, "担保情况概述"),
            Element::paragraph(3, 0, "被担保人:甲"),
            Element::paragraph(4, 0, "审议程序"),
        ];
        let base = AnchorWindow {
            top_anchors: PatternSet::compile(&["担保情况概述"]).unwrap(),
            bottom_anchors: PatternSet::compile(&["审议程序"]).unwrap(),
            ..Default::default()
        };

        let greedy = AnchorWindow { top_greed: true, ..base.clone() };
        let indexes: Vec<_> = greedy.select(&refs(&elements)).iter().map(|s| s.element.index).collect();
        assert_eq!(indexes, vec![3]);

        let indexes: Vec<_> = base.select(&refs(&elements)).iter().map(|s| s.element.index).collect();
        assert_eq!(indexes, vec![1, 2, 3]);
    }

    #[test]
    fn test_top_content_capture() {
        let elements = vec![
            Element::paragraph(0, 0, "担保对象:甲公司"),
            Element::paragraph(1, 0, "金额100万元"),
            Element::paragraph(2, 0, "审议程序"),
        ];
        let window = AnchorWindow {
            top_anchors: PatternSet::compile(&["担保对象"]).unwrap(),
            bottom_anchors: PatternSet::compile(&["审议程序"]).unwrap(),
            include_top_anchor: true,
            top_content_regs: PatternSet::compile(&["担保对象:(?P<content>.+)"]).unwrap(),
            ..Default::default()
        };
        let slices = window.select(&refs(&elements));
        assert_eq!(slices[0].text, "甲公司");
        assert_eq!(slices[1].element.index, 1);
    }

    #[test]
    fn test_window_monotone_under_anchor_superset() {
        // Adding top-anchor patterns may only extend the window upward:
        // the original window survives as an ordered suffix.
        let elements = docs();
        let base = AnchorWindow {
            top_anchors: PatternSet::compile(&["基金的投资"]).unwrap(),
            bottom_anchors: PatternSet::compile(&["投资策略"]).unwrap(),
            ..Default::default()
        };
        let superset = AnchorWindow {
            top_anchors: PatternSet::compile(&["目录", "基金的投资"]).unwrap(),
            ..base.clone()
        };
        let narrow: Vec<_> = base.select(&refs(&elements)).iter().map(|s| s.element.index).collect();
        let wide: Vec<_> = superset.select(&refs(&elements)).iter().map(|s| s.element.index).collect();
        assert!(wide.len() >= narrow.len());
        assert_eq!(wide[wide.len() - narrow.len()..], narrow[..]);
    }
}
