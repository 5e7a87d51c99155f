use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::post::PostRecord;

static IMAGE_EXTENSIONS: &[&str] = &["gif", "jpeg", "jpg", "png", "webp"];
static DEFAULT_EXTENSION: &str = ".jpg";
static REPLY_DIR: &str = "edited_images";
static PROMPT_FILE: &str = "prompt.txt";

/// Output layout for a single topic:
///
/// ```text
/// <root>/<topic id>/prompt.txt
/// <root>/<topic id>/original_0.jpg ...
/// <root>/<topic id>/edited_images/edited_<topic id>_0.jpg ...
/// ```
#[derive(Clone, Debug)]
pub struct TopicStorage {
    topic_id: String,
    path: PathBuf,
    reply_path: PathBuf,
}

impl TopicStorage {
    pub fn create(root: impl AsRef<Path>, topic_id: &str) -> crate::Result<Self> {
        let path = root.as_ref().join(topic_id);
        let reply_path = path.join(REPLY_DIR);
        fs::create_dir_all(&reply_path)?;

        Ok(Self {
            topic_id: topic_id.into(),
            path,
            reply_path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn reply_path(&self) -> &Path {
        &self.reply_path
    }

    pub fn write_prompt(&self, post: &PostRecord) -> crate::Result<()> {
        fs::write(self.path.join(PROMPT_FILE), post.prompt())?;
        Ok(())
    }

    pub fn original_name(&self, idx: usize) -> String {
        format!("original_{}", idx)
    }

    pub fn reply_name(&self, idx: usize) -> String {
        format!("edited_{}_{}", self.topic_id, idx)
    }
}

/// Builds a file name from a base name and the extension of the image url.
pub fn file_name(url: &str, base_name: &str) -> String {
    sanitize(&format!("{}{}", base_name, extension(url)))
}

fn extension(url: &str) -> String {
    // Query strings and fragments don't belong to the extension.
    let path = match url::Url::parse(url) {
        Ok(url) => url.path().to_owned(),
        Err(_) => url.to_owned(),
    };

    let name = match path.rfind('/') {
        Some(idx) => &path[idx + 1..],
        None => &path[..],
    };

    name.rfind('.')
        .map(|idx| &name[idx..])
        .filter(|ext| {
            IMAGE_EXTENSIONS
                .binary_search(&ext[1..].to_ascii_lowercase().as_str())
                .is_ok()
        })
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_owned())
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|u| match u {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            u => u,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::TopicStorage;
    use crate::post::PostRecord;

    #[test]
    fn extension_from_url() {
        let cases = &[
            ("https://img1.doubanio.com/view/group_topic/l/public/p1.webp", ".webp"),
            ("https://img1.doubanio.com/view/group_topic/l/public/p1.JPG?x=y.png", ".JPG"),
            ("https://img1.doubanio.com/view/group_topic/l/public/p1", ".jpg"),
            ("https://img1.doubanio.com/view/photo.php", ".jpg"),
            ("https://img1.doubanio.com/a.b/p1.gif#frag", ".gif"),
        ];

        for &(url, expected) in cases {
            assert_eq!(super::extension(url), expected, "{}", url);
        }
    }

    #[test]
    fn file_names_are_sanitized() {
        assert_eq!(
            super::file_name("https://x/p1.png", "a:b/c*d"),
            "a_b_c_d.png"
        );
        assert_eq!(super::file_name("https://x/p1", "original_3"), "original_3.jpg");
    }

    #[test]
    fn creates_topic_layout() {
        let root = tempfile::tempdir().unwrap();
        let storage = TopicStorage::create(root.path(), "274001234").unwrap();

        assert!(storage.path().is_dir());
        assert!(storage.reply_path().is_dir());
        assert_eq!(storage.reply_path(), root.path().join("274001234/edited_images"));
        assert_eq!(storage.original_name(0), "original_0");
        assert_eq!(storage.reply_name(4), "edited_274001234_4");

        // Creating it again is fine.
        TopicStorage::create(root.path(), "274001234").unwrap();
    }

    #[test]
    fn writes_prompt() {
        let root = tempfile::tempdir().unwrap();
        let storage = TopicStorage::create(root.path(), "1").unwrap();
        let post = PostRecord {
            title: "hello".into(),
            body: "line one\nline two".into(),
            original_images: Vec::new(),
            reply_images: Vec::new(),
        };

        storage.write_prompt(&post).unwrap();
        let text = fs::read_to_string(storage.path().join("prompt.txt")).unwrap();
        assert_eq!(text, "Title: hello\n\nline one\nline two");
    }
}
