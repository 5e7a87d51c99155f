use std::fmt::{self, Display};

use chrono::{DateTime, Duration, Local};
use fmtsize::{Conventional, FmtSize};

use crate::download::DownloadOutcome;

/// Running totals for one crawl.
#[derive(Clone, Debug)]
pub struct RunReport {
    started: DateTime<Local>,
    pub processed: usize,
    pub failed: usize,
    pub original_images: usize,
    pub reply_images: usize,
    pub bytes_written: u64,
}

/// Images saved for a single topic.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TopicImages {
    pub original: usize,
    pub reply: usize,
    pub bytes_written: u64,
}

impl TopicImages {
    pub fn record_original(&mut self, outcome: DownloadOutcome) {
        if outcome.is_success() {
            self.original += 1;
        }
        self.bytes_written += outcome.bytes_written();
    }

    pub fn record_reply(&mut self, outcome: DownloadOutcome) {
        if outcome.is_success() {
            self.reply += 1;
        }
        self.bytes_written += outcome.bytes_written();
    }
}

impl RunReport {
    pub fn start() -> Self {
        Self {
            started: Local::now(),
            processed: 0,
            failed: 0,
            original_images: 0,
            reply_images: 0,
            bytes_written: 0,
        }
    }

    pub fn topic_saved(&mut self, images: TopicImages) {
        self.processed += 1;
        self.original_images += images.original;
        self.reply_images += images.reply;
        self.bytes_written += images.bytes_written;
    }

    pub fn topic_failed(&mut self) {
        self.failed += 1;
    }

    fn elapsed(&self) -> Duration {
        Local::now().signed_duration_since(self.started)
    }
}

impl Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} topics saved, {} failed or skipped\n{} original / {} reply images ({})\n{} elapsed",
            self.processed,
            self.failed,
            self.original_images,
            self.reply_images,
            self.bytes_written.fmt_size(Conventional),
            Elapsed(self.elapsed()),
        )
    }
}

struct Elapsed(Duration);

impl Display for Elapsed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let elapsed = self.0;
        write!(
            f,
            "{}+{:02}:{:02}",
            elapsed.num_hours(),
            elapsed.num_minutes() % 60,
            elapsed.num_seconds() % 60
        )
    }
}

/// First `n` characters of `text` on one line, with an ellipsis when something was cut.
pub fn preview(text: &str, n: usize) -> String {
    let mut preview: String = text
        .chars()
        .take(n)
        .map(|u| if u == '\n' || u == '\r' { ' ' } else { u })
        .collect();

    if text.chars().nth(n).is_some() {
        preview.push_str("...");
    }
    preview
}
