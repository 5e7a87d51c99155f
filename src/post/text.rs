use scraper::{ElementRef, Node, Selector};

/// Candidate selectors tried in priority order; the first tier with a match wins.
///
/// A tier may itself be a selector group, in which case the earliest element in document order
/// matching any member of the group is taken.
#[derive(Clone, Debug)]
pub struct SelectorChain {
    tiers: Vec<(Selector, &'static str)>,
}

#[derive(Copy, Clone, Debug)]
pub struct ChainMatch<'a> {
    pub element: ElementRef<'a>,
    pub rank: usize,
    pub label: &'static str,
}

impl ChainMatch<'_> {
    pub fn is_fallback(&self) -> bool {
        self.rank > 0
    }
}

impl SelectorChain {
    pub fn new(tiers: &[(&str, &'static str)]) -> Self {
        Self {
            tiers: tiers
                .iter()
                .map(|&(selector, label)| (Selector::parse(selector).unwrap(), label))
                .collect(),
        }
    }

    pub fn first_match<'a>(&self, root: ElementRef<'a>) -> Option<ChainMatch<'a>> {
        self.tiers
            .iter()
            .enumerate()
            .find_map(|(rank, (selector, label))| {
                root.select(selector).next().map(|element| ChainMatch {
                    element,
                    rank,
                    label: *label,
                })
            })
    }
}

/// Text of every descendant, each piece trimmed, concatenated without separators.
pub fn inline_text(element: ElementRef) -> String {
    element.text().map(str::trim).collect()
}

/// Text of every descendant, each non-blank piece trimmed, one piece per line.
pub fn block_text(element: ElementRef) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Rebuilds text from direct children only: paragraphs become lines, bare text nodes are kept,
/// and runs of `<br>` collapse into a single line break.
pub fn loose_text(element: ElementRef) -> String {
    let mut parts: Vec<String> = Vec::new();

    for child in element.children() {
        match child.value() {
            Node::Element(inner) if inner.name() == "p" => {
                if let Some(paragraph) = ElementRef::wrap(child) {
                    parts.push(inline_text(paragraph));
                }
            }
            Node::Element(inner) if inner.name() == "br" => {
                if parts.last().map_or(false, |last| last != "\n") {
                    parts.push("\n".into());
                }
            }
            Node::Text(text) => {
                let text = text.trim();
                if !text.is_empty() {
                    parts.push(text.into());
                }
            }
            _ => {}
        }
    }

    parts
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
