use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use clap::Parser;

use crate::config::{Limits, RetryPolicy};

/// A program for saving the posts and pictures of a Douban group.
///
/// Each topic is saved to its own directory: the title and text of the opening post go to
/// prompt.txt, the post's own pictures sit beside it, and pictures from replies are saved to
/// edited_images. Rerunning skips pictures already on disk.
///
/// Douban limits anonymous clients quickly. Put your cookie in ~/.topicgrab.conf as
/// `cookie=...` rather than on the command line.
#[derive(Debug, Parser)]
#[command(version)]
pub struct Opt {
    /// The group id, as it appears in https://www.douban.com/group/<id>/.
    group: String,

    /// A directory for saved topics.
    #[arg(short = 'd', long = "dir", default_value = "douban_dataset")]
    directory: PathBuf,

    /// First discussion page to read (zero-based).
    #[arg(long, default_value_t = 0)]
    start_page: usize,

    /// How many discussion pages to read, counting from --start-page.
    #[arg(short, long, default_value_t = 100)]
    pages: usize,

    /// Seconds between requests to douban.com.
    #[arg(short, long, default_value_t = 2)]
    wait: u64,

    /// Most pictures to keep from the opening post.
    #[arg(long, default_value_t = 10)]
    max_original: usize,

    /// Most pictures to keep from replies.
    #[arg(long, default_value_t = 20)]
    max_reply: usize,

    /// Attempts per page before giving up.
    #[arg(short, long, default_value_t = 3)]
    retries: u32,

    /// Process at most n topics.
    #[arg(short, long)]
    pub limit: Option<usize>,
}

impl Opt {
    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn pages(&self) -> std::ops::Range<usize> {
        self.start_page..self.start_page.saturating_add(self.pages)
    }

    pub fn wait(&self) -> Duration {
        Duration::from_secs(self.wait)
    }

    pub fn limits(&self) -> Limits {
        Limits {
            max_original: self.max_original,
            max_reply: self.max_reply,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.retries,
            base_delay: self.wait(),
        }
    }
}
