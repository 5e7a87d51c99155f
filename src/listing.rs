use regex::Regex;
use scraper::{Html, Selector};

/// Douban lists 25 topics per discussion page.
pub const TOPICS_PER_PAGE: usize = 25;

pub fn listing_url(group: &str, page: usize) -> String {
    format!(
        "https://www.douban.com/group/{}/discussion?start={}",
        group,
        page * TOPICS_PER_PAGE
    )
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TopicLink {
    pub id: String,
    pub url: String,
}

pub struct ListingReader {
    link_selector: Selector,
    topic_id_pattern: Regex,
}

impl ListingReader {
    pub fn new() -> Self {
        Self {
            link_selector: Selector::parse(r#"table.olt td.title a[href*="/group/topic/"]"#)
                .unwrap(),
            topic_id_pattern: Regex::new(r"/topic/(\d+)/?").unwrap(),
        }
    }

    /// Topic urls on one discussion page, query strings removed, in page order.
    pub fn topic_urls(&self, html: &str) -> Vec<String> {
        let document = Html::parse_document(html);
        let mut urls: Vec<String> = Vec::new();

        for href in document
            .select(&self.link_selector)
            .filter_map(|anchor| anchor.value().attr("href"))
        {
            let url = strip_query(href);
            if !url.is_empty() && !urls.iter().any(|known| known == url) {
                urls.push(url.to_owned());
            }
        }

        urls
    }

    pub fn topic(&self, url: &str) -> Option<TopicLink> {
        let id = self
            .topic_id_pattern
            .captures(url)
            .and_then(|captures| captures.get(1))?
            .as_str();

        Some(TopicLink {
            id: id.to_owned(),
            url: url.to_owned(),
        })
    }
}

impl Default for ListingReader {
    fn default() -> Self {
        Self::new()
    }
}

fn strip_query(href: &str) -> &str {
    match href.find('?') {
        Some(idx) => &href[..idx],
        None => href,
    }
}

#[cfg(test)]
mod tests {
    use super::{listing_url, ListingReader};

    static LISTING: &str = r#"<table class="olt">
        <tr><td class="title">
            <a href="https://www.douban.com/group/topic/300000001/?_i=123">first</a>
        </td></tr>
        <tr><td class="title">
            <a href="https://www.douban.com/group/topic/300000002/">second</a>
        </td></tr>
        <tr><td class="title">
            <a href="https://www.douban.com/group/topic/300000001/?_i=456">first again</a>
        </td></tr>
        <tr><td class="author">
            <a href="https://www.douban.com/people/someone/">someone</a>
        </td></tr>
    </table>
    <a href="https://www.douban.com/group/topic/399999999/">sidebar</a>"#;

    #[test]
    fn listing_page_urls() {
        assert_eq!(
            listing_url("12345", 0),
            "https://www.douban.com/group/12345/discussion?start=0"
        );
        assert_eq!(
            listing_url("12345", 3),
            "https://www.douban.com/group/12345/discussion?start=75"
        );
    }

    #[test]
    fn reads_topic_urls_in_order() {
        let urls = ListingReader::new().topic_urls(LISTING);
        assert_eq!(
            urls,
            [
                "https://www.douban.com/group/topic/300000001/",
                "https://www.douban.com/group/topic/300000002/",
            ]
        );
    }

    #[test]
    fn empty_page_has_no_topics() {
        assert!(ListingReader::new().topic_urls("<html></html>").is_empty());
    }

    #[test]
    fn topic_ids() {
        let reader = ListingReader::new();
        let topic = reader
            .topic("https://www.douban.com/group/topic/300000002/")
            .unwrap();
        assert_eq!(topic.id, "300000002");
        assert_eq!(reader.topic("https://www.douban.com/group/topic/abc/"), None);
    }
}
