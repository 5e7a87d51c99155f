//! Finds image urls in a topic page.
//!
//! Douban lazy-loads most pictures, so the real address may be in `data-src` or `data-original`
//! while `src` holds a placeholder. Topics posted from the app sometimes have no photo strip in
//! the markup at all; their pictures only exist in a json array assigned in an inline script.

use regex::Regex;
use scraper::{node::Element, ElementRef, Selector};
use serde::Deserialize;

static MEDIA_HOST: &str = "doubanio.com";

// Site chrome that lives on the media host but isn't content.
static EXCLUDED_FRAGMENTS: &[&str] = &["/icon/", "/small/", "/bn/", "grey.gif"];

#[derive(Clone, Debug)]
pub struct ImageScanner {
    image_selector: Selector,
    gallery_selector: Selector,
    photo_config_pattern: Regex,
}

impl ImageScanner {
    pub fn new() -> Self {
        Self {
            image_selector: Selector::parse(
                "div.img-container img, div.image-wrapper img, div.photo-item img, \
                 div.photo-img img, div.horizontal-photos img, img",
            )
            .unwrap(),
            gallery_selector: Selector::parse("div.horizontal-photos").unwrap(),
            photo_config_pattern: Regex::new(
                r#"window\._CONFIG\.topic\['photos'\]\s*=\s*(\[[^\]]+\])"#,
            )
            .unwrap(),
        }
    }

    /// Whether the page has the photo strip the dom scan expects.
    pub fn has_gallery(&self, document: &scraper::Html) -> bool {
        document.select(&self.gallery_selector).next().is_some()
    }

    /// Appends every acceptable image in `region` to `found`, skipping urls already in it.
    pub fn scan(&self, region: ElementRef, found: &mut Vec<String>) {
        for image in region.select(&self.image_selector) {
            let url = match resolve_source(image.value()) {
                Some(url) => normalize(url),
                None => continue,
            };

            if is_content_image(&url) && !found.contains(&url) {
                found.push(url);
            }
        }
    }

    /// Reads the photo list out of `window._CONFIG.topic['photos']`.
    ///
    /// Returns an empty list when the assignment isn't present.
    pub fn embedded_photos(&self, html: &str) -> crate::Result<Vec<String>> {
        let packet = match self
            .photo_config_pattern
            .captures(html)
            .and_then(|captures| captures.get(1))
        {
            Some(packet) => packet.as_str(),
            None => return Ok(Vec::new()),
        };

        let photos: Vec<EmbeddedPhoto> = serde_json::from_str(packet)?;
        Ok(photos
            .into_iter()
            .filter_map(EmbeddedPhoto::best_url)
            .map(normalize)
            .collect())
    }
}

impl Default for ImageScanner {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Debug, Deserialize)]
struct EmbeddedPhoto {
    image: EmbeddedSizes,
}

#[derive(Clone, Debug, Deserialize)]
struct EmbeddedSizes {
    raw: Option<EmbeddedVariant>,
    large: Option<EmbeddedVariant>,
}

#[derive(Clone, Debug, Deserialize)]
struct EmbeddedVariant {
    url: Option<String>,
}

impl EmbeddedPhoto {
    fn best_url(self) -> Option<String> {
        let EmbeddedSizes { raw, large } = self.image;
        let non_empty = |variant: Option<EmbeddedVariant>| {
            variant
                .and_then(|variant| variant.url)
                .filter(|url| !url.is_empty())
        };
        non_empty(raw).or_else(|| non_empty(large))
    }
}

/// Picks the attribute holding the real image address.
///
/// Lazy-load attributes always beat `src`, which also takes care of `blank.gif` and the other
/// placeholders Douban parks in `src`. Inline `data:image` sources are never usable.
fn resolve_source(element: &Element) -> Option<&str> {
    let attr = |name: &str| element.attr(name).filter(|value: &&str| !value.is_empty());
    attr("data-src")
        .or_else(|| attr("data-original"))
        .or_else(|| attr("src").filter(|src| !src.starts_with("data:image")))
}

fn normalize(url: impl Into<String>) -> String {
    let url = url.into();
    if url.starts_with("//") {
        format!("https:{}", url)
    } else {
        url
    }
}

fn is_content_image(url: &str) -> bool {
    url.contains(MEDIA_HOST)
        && !url.to_ascii_lowercase().contains("avatar")
        && !EXCLUDED_FRAGMENTS
            .iter()
            .any(|fragment| url.contains(fragment))
}
