pub mod dedup;
pub mod images;
pub mod text;

use std::{
    collections::HashSet,
    fmt::{self, Display},
};

use scraper::{ElementRef, Html, Selector};

use crate::{config::Limits, fetch::Fetcher, fetch::Transport};

use self::{
    dedup::{Deduplicator, QualityTier},
    images::ImageScanner,
    text::SelectorChain,
};

pub static UNTITLED: &str = "Untitled";
pub static MISSING_BODY: &str = "Error: Could not find OP main text content element.";

/// Everything we keep from one topic page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PostRecord {
    pub title: String,
    pub body: String,
    pub original_images: Vec<String>,
    pub reply_images: Vec<String>,
}

impl PostRecord {
    /// The text persisted alongside the images.
    pub fn prompt(&self) -> String {
        format!("Title: {}\n\n{}", self.title, self.body)
    }
}

/// Things that went sideways while reading a page without being worth failing over.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Diagnostic {
    MissingTitle,
    MissingBody,
    BodyFallback(&'static str),
    BlankBody,
    BadPhotoConfig(String),
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Diagnostic::MissingTitle => f.write_str("no title element; using placeholder"),
            Diagnostic::MissingBody => f.write_str("no body text element"),
            Diagnostic::BodyFallback(label) => {
                write!(f, "body text found with fallback selector ({})", label)
            }
            Diagnostic::BlankBody => {
                f.write_str("body text element was blank; rebuilt from child nodes")
            }
            Diagnostic::BadPhotoConfig(message) => {
                write!(f, "unreadable embedded photo list: {}", message)
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct Extraction {
    pub post: PostRecord,
    pub diagnostics: Vec<Diagnostic>,
}

pub struct PostExtractor {
    limits: Limits,
    scanner: ImageScanner,
    dedup: Deduplicator,
    title: SelectorChain,
    body: SelectorChain,
    reply_content: SelectorChain,
    comment_selector: Selector,
}

impl PostExtractor {
    pub fn new(limits: Limits) -> Self {
        Self {
            limits,
            scanner: ImageScanner::new(),
            dedup: Deduplicator::new(),
            title: SelectorChain::new(&[
                ("div.article h1", "article heading"),
                ("div.title h1", "title heading"),
            ]),
            body: SelectorChain::new(&[
                (
                    "#link-report .topic-content, #link-report .topic-richtext, \
                     div.article .topic-content, div.article .topic-doc, \
                     .topic-content.clearfix, .topic-richtext",
                    "topic content",
                ),
                ("div.article div.richtext, div.article div.note", "article richtext"),
            ]),
            reply_content: SelectorChain::new(&[(
                "div.reply-doc > div.bd, div.comment-content, div.richtext, \
                 div.cmt-img-wrapper, div.cmt-img",
                "reply content",
            )]),
            comment_selector: Selector::parse(
                "ul#comments > li.comment-item, div.comment-list > div.comment-item, \
                 li.clearfix.comment-item",
            )
            .unwrap(),
        }
    }

    /// Fetches a topic page and extracts it.
    ///
    /// Only a failed fetch is an error. A page that doesn't look the way we expect still yields
    /// a record, with the problems listed in its diagnostics.
    pub fn fetch<T: Transport>(&self, fetcher: &Fetcher<T>, url: &str) -> crate::Result<Extraction> {
        let html = fetcher.fetch(url)?;
        Ok(self.extract(&html))
    }

    pub fn extract(&self, html: &str) -> Extraction {
        let document = Html::parse_document(html);
        let root = document.root_element();
        let mut diagnostics = Vec::new();

        let title = match self.title.first_match(root) {
            Some(found) => text::inline_text(found.element),
            None => {
                diagnostics.push(Diagnostic::MissingTitle);
                UNTITLED.to_string()
            }
        };

        let body_region = self.body.first_match(root);
        let body = match body_region {
            Some(found) => {
                if found.is_fallback() {
                    diagnostics.push(Diagnostic::BodyFallback(found.label));
                }

                let body = text::block_text(found.element);
                if body.trim().is_empty() {
                    diagnostics.push(Diagnostic::BlankBody);
                    text::loose_text(found.element)
                } else {
                    body
                }
            }
            None => {
                diagnostics.push(Diagnostic::MissingBody);
                MISSING_BODY.to_string()
            }
        };

        let original_images = self.original_images(
            &document,
            body_region.map(|found| found.element),
            html,
            &mut diagnostics,
        );
        let reply_images = self.reply_images(&document, &original_images);

        Extraction {
            post: PostRecord {
                title,
                body,
                original_images,
                reply_images,
            },
            diagnostics,
        }
    }

    fn original_images(
        &self,
        document: &Html,
        region: Option<ElementRef>,
        html: &str,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Vec<String> {
        let mut candidates = Vec::new();

        if !self.scanner.has_gallery(document) {
            match self.scanner.embedded_photos(html) {
                Ok(photos) => candidates.extend(photos),
                Err(e) => diagnostics.push(Diagnostic::BadPhotoConfig(e.to_string())),
            }
        }

        if let Some(region) = region {
            self.scanner.scan(region, &mut candidates);
        }

        let mut selected = self.dedup.dedup(&candidates);
        selected.truncate(self.limits.max_original);
        selected
    }

    /// Collects reply images until the cap is hit.
    ///
    /// Pictures already among the original images never count. A larger copy of a picture
    /// that's already been picked replaces it in place.
    fn reply_images(&self, document: &Html, original: &[String]) -> Vec<String> {
        let max = self.limits.max_reply;
        let excluded: HashSet<String> = original
            .iter()
            .filter_map(|url| self.dedup.identity(url))
            .collect();
        let mut selected: Vec<(String, String, QualityTier)> = Vec::new();

        for comment in document.select(&self.comment_selector) {
            if selected.len() >= max {
                break;
            }

            let region = self
                .reply_content
                .first_match(comment)
                .map(|found| found.element)
                .unwrap_or(comment);

            let mut found = Vec::new();
            self.scanner.scan(region, &mut found);

            for url in found {
                let id = match self.dedup.identity(&url) {
                    Some(id) => id,
                    None => continue,
                };
                if excluded.contains(&id) {
                    continue;
                }

                let tier = self.dedup.tier(&url);
                if let Some(existing) = selected.iter_mut().find(|(other, ..)| *other == id) {
                    if tier > existing.2 {
                        existing.1 = url;
                        existing.2 = tier;
                    }
                    continue;
                }

                if selected.len() >= max {
                    break;
                }
                selected.push((id, url, tier));
            }
        }

        selected.into_iter().map(|(_, url, _)| url).collect()
    }
}
