use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::Path,
};

use tracing::{debug, warn};

use crate::{error::Error, fetch::Transport, storage};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// The target was already on disk; nothing was requested.
    Existing,
    Written(u64),
    Failed,
}

impl DownloadOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, DownloadOutcome::Failed)
    }

    pub fn bytes_written(&self) -> u64 {
        match self {
            DownloadOutcome::Written(bytes) => *bytes,
            _ => 0,
        }
    }
}

/// Saves images to disk, once.
///
/// Files are streamed to `<name>.part` and renamed when complete, so a file with the final name
/// is always a finished download and a rerun can skip it.
pub struct Downloader<'a, T> {
    transport: &'a T,
}

impl<'a, T: Transport> Downloader<'a, T> {
    pub fn new(transport: &'a T) -> Self {
        Self { transport }
    }

    pub fn download(&self, url: &str, dir: &Path, base_name: &str) -> DownloadOutcome {
        match self.try_download(url, dir, base_name) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(url = %abbreviate(url), error = %e, "image not saved");
                DownloadOutcome::Failed
            }
        }
    }

    fn try_download(&self, url: &str, dir: &Path, base_name: &str) -> crate::Result<DownloadOutcome> {
        let name = storage::file_name(url, base_name);
        let path = dir.join(&name);
        if path.exists() {
            debug!(path = %path.display(), "already downloaded");
            return Ok(DownloadOutcome::Existing);
        }

        let partial = dir.join(format!("{}.part", name));
        let written = match self.write_partial(url, &partial) {
            Ok(written) => written,
            Err(e) => {
                let _ = fs::remove_file(&partial);
                return Err(e);
            }
        };

        fs::rename(&partial, &path)?;
        Ok(DownloadOutcome::Written(written))
    }

    fn write_partial(&self, url: &str, partial: &Path) -> crate::Result<u64> {
        let mut writer = BufWriter::new(File::create(partial)?);
        let written = self.transport.copy_to(url, &mut writer).map_err(|e| {
            Error::Other(format!("Unable to download {}", abbreviate(url)), Box::new(e))
        })?;
        writer.flush()?;
        Ok(written)
    }
}

fn abbreviate(url: &str) -> &str {
    match url.char_indices().nth(100) {
        Some((idx, _)) => &url[..idx],
        None => url,
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use reqwest::StatusCode;

    use super::{DownloadOutcome, Downloader};
    use crate::fetch::{testing::ScriptedTransport, TransportError};

    static URL: &str = "https://img1.doubanio.com/view/group_topic/l/public/p1.webp";

    #[test]
    fn second_download_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let transport = ScriptedTransport::new([Ok("image bytes".to_string())]);
        let downloader = Downloader::new(&transport);

        let first = downloader.download(URL, dir.path(), "original_0");
        let second = downloader.download(URL, dir.path(), "original_0");

        assert_eq!(first, DownloadOutcome::Written(11));
        assert_eq!(second, DownloadOutcome::Existing);
        assert!(second.is_success());
        assert_eq!(transport.calls(), 1);
        assert_eq!(
            fs::read_to_string(dir.path().join("original_0.webp")).unwrap(),
            "image bytes"
        );
    }

    #[test]
    fn failure_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let transport =
            ScriptedTransport::new([Err(TransportError::Status(StatusCode::SERVICE_UNAVAILABLE))]);
        let downloader = Downloader::new(&transport);

        let outcome = downloader.download(URL, dir.path(), "original_0");

        assert_eq!(outcome, DownloadOutcome::Failed);
        assert!(!outcome.is_success());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn missing_directory_is_a_failure_not_a_panic() {
        let dir = tempfile::tempdir().unwrap();
        let transport = ScriptedTransport::new([Ok("bytes".to_string())]);
        let downloader = Downloader::new(&transport);

        let outcome = downloader.download(URL, &dir.path().join("nope"), "x");

        assert_eq!(outcome, DownloadOutcome::Failed);
        assert_eq!(transport.calls(), 0);
    }

    #[test]
    fn long_urls_are_abbreviated() {
        let url = "x".repeat(150);
        assert_eq!(super::abbreviate(&url).len(), 100);
        assert_eq!(super::abbreviate("short"), "short");
    }
}
