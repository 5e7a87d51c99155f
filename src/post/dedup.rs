/*!
Douban serves every uploaded picture at several sizes, and a topic page tends to reference more
than one of them: a `/m/` preview in the body, an `/l/` copy in the photo strip, maybe an `/xl/`
link somewhere else. All of them carry the same `p<digits>` file name, which is what we use as the
picture's identity.

Keeping the first URL seen for an identity is not good enough, because the first one is very often
the preview. So we make two passes: the first finds the best tier for every identity, the second
emits those winners in the order their identities first appeared.
*/

use std::collections::HashMap;

use regex::Regex;

/// Resolution class encoded in a media path segment.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum QualityTier {
    Unknown,
    Low,
    Medium,
    High,
}

impl QualityTier {
    fn from_token(token: &str) -> Self {
        match token.to_ascii_lowercase().as_str() {
            "xl" => QualityTier::High,
            "l" => QualityTier::Medium,
            "m" => QualityTier::Low,
            _ => QualityTier::Unknown,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Deduplicator {
    identity_pattern: Regex,
    tier_pattern: Regex,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self {
            identity_pattern: Regex::new(r"(?i)p(\d+)\.(?:jpe?g|webp|png|gif)").unwrap(),
            tier_pattern: Regex::new(r"(?i)/(xl|l|m)/").unwrap(),
        }
    }

    /// The numeric picture id, e.g. `689889440` for `.../xl/public/p689889440.jpg`.
    pub fn identity(&self, url: &str) -> Option<String> {
        let path = url_path(url);
        self.identity_pattern
            .captures(&path)
            .and_then(|captures| captures.get(1))
            .map(|id| id.as_str().to_owned())
    }

    pub fn tier(&self, url: &str) -> QualityTier {
        let path = url_path(url);
        self.tier_pattern
            .captures(&path)
            .and_then(|captures| captures.get(1))
            .map(|token| QualityTier::from_token(token.as_str()))
            .unwrap_or(QualityTier::Unknown)
    }

    /// Collapses size variants to one URL per picture.
    ///
    /// URLs without a picture id are dropped.
    pub fn dedup<S: AsRef<str>>(&self, urls: &[S]) -> Vec<String> {
        let mut order = Vec::new();
        let mut best: HashMap<String, (&str, QualityTier)> = HashMap::new();

        for url in urls {
            let url = url.as_ref();
            let id = match self.identity(url) {
                Some(id) => id,
                None => continue,
            };

            let tier = self.tier(url);
            match best.get_mut(&id) {
                Some(current) => {
                    if tier > current.1 {
                        *current = (url, tier);
                    }
                }
                None => {
                    order.push(id.clone());
                    best.insert(id, (url, tier));
                }
            }
        }

        order
            .iter()
            .filter_map(|id| best.get(id).map(|&(url, _)| url.to_owned()))
            .collect()
    }
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self::new()
    }
}

fn url_path(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(parsed) => parsed.path().to_owned(),
        Err(_) => url.to_owned(),
    }
}
