mod config;
mod download;
mod error;
mod fetch;
mod listing;
mod options;
mod post;
mod report;
mod storage;
mod waiter;

use std::{collections::HashSet, env, fs, io, process};

use clap::Parser;
use tracing::{debug, info, warn};

use config::{Configuration, Key, Session};
use download::{DownloadOutcome, Downloader};
use fetch::{Fetcher, HttpTransport, Transport};
use listing::{ListingReader, TopicLink};
use options::Opt;
use post::PostExtractor;
use report::{RunReport, TopicImages};
use storage::TopicStorage;
use waiter::Waiter;

pub type Result<T, E = error::Error> = std::result::Result<T, E>;

fn main() {
    init_tracing();

    if let Err(e) = run(&Opt::parse()) {
        eprintln!("{}", e);
        process::exit(1);
    }
}

fn init_tracing() {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let use_json = env::var("LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    let result = if use_json {
        registry
            .with(fmt::layer().json().with_writer(io::stderr))
            .try_init()
    } else {
        registry.with(fmt::layer().with_writer(io::stderr)).try_init()
    };

    if let Err(e) = result {
        eprintln!("Unable to initialize logging: {}", e);
    }
}

/// Everything a run needs, built once and shared by reference.
struct Crawl<'a, T> {
    opt: &'a Opt,
    fetcher: Fetcher<'a, T>,
    downloader: Downloader<'a, T>,
    extractor: PostExtractor,
    listing: ListingReader,
    waiter: Waiter,
}

fn run(opt: &Opt) -> crate::Result<()> {
    let config = Configuration::init();
    if config.get_config(Key::Cookie).is_err() {
        warn!("no cookie in ~/.topicgrab.conf; douban may start refusing requests");
    }

    let session = Session::from_config(&config, opt.group());
    let transport = HttpTransport::new(&session)?;
    fs::create_dir_all(opt.directory())?;

    let crawl = Crawl {
        opt,
        fetcher: Fetcher::new(&transport, opt.retry_policy()),
        downloader: Downloader::new(&transport),
        extractor: PostExtractor::new(opt.limits()),
        listing: ListingReader::new(),
        waiter: Waiter::new(opt.wait()),
    };

    info!(
        group = opt.group(),
        dir = %opt.directory().display(),
        wait = ?opt.wait(),
        "starting crawl"
    );

    let report = crawl.run();
    println!("\n{}", report);
    Ok(())
}

impl<T: Transport> Crawl<'_, T> {
    fn run(&self) -> RunReport {
        let mut report = RunReport::start();
        let urls = self.collect_topic_urls();
        let total = self.opt.limit.map_or(urls.len(), |limit| limit.min(urls.len()));
        info!(topics = urls.len(), to_process = total, "topic links collected");

        for (idx, url) in urls.iter().take(total).enumerate() {
            let topic = match self.listing.topic(url) {
                Some(topic) => topic,
                None => {
                    warn!(url = url.as_str(), "no topic id in url; skipping");
                    report.topic_failed();
                    continue;
                }
            };

            info!(topic = %topic.id, "[{}/{}] {}", idx + 1, total, topic.url);
            self.waiter.wait();

            match self.save_topic(&topic) {
                Ok(images) => report.topic_saved(images),
                Err(e) => {
                    warn!(topic = %topic.id, error = %e, "topic not saved");
                    report.topic_failed();
                }
            }
        }

        report
    }

    fn collect_topic_urls(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut urls = Vec::new();

        for page in self.opt.pages() {
            let url = listing::listing_url(self.opt.group(), page);
            info!(page = page + 1, "reading discussion page {}", url);
            self.waiter.wait();

            let links = match self.fetcher.fetch(&url) {
                Ok(html) => self.listing.topic_urls(&html),
                Err(e) => {
                    warn!(page = page + 1, error = %e, "discussion page unavailable");
                    break;
                }
            };

            if links.is_empty() {
                info!(page = page + 1, "no topics on page; stopping");
                break;
            }

            let before = urls.len();
            for link in links {
                if seen.insert(link.clone()) {
                    urls.push(link);
                }
            }
            info!(
                added = urls.len() - before,
                total = urls.len(),
                "discussion page read"
            );
        }

        urls
    }

    fn save_topic(&self, topic: &TopicLink) -> crate::Result<TopicImages> {
        let extraction = self.extractor.fetch(&self.fetcher, &topic.url)?;
        for diagnostic in &extraction.diagnostics {
            warn!(topic = %topic.id, "{}", diagnostic);
        }

        let post = extraction.post;
        let storage = TopicStorage::create(self.opt.directory(), &topic.id)?;
        if let Err(e) = storage.write_prompt(&post) {
            warn!(topic = %topic.id, error = %e, "unable to save prompt.txt");
        }

        let mut images = TopicImages::default();
        for (idx, url) in post.original_images.iter().enumerate() {
            let outcome = self
                .downloader
                .download(url, storage.path(), &storage.original_name(idx));
            announce(&topic.id, url, outcome);
            images.record_original(outcome);
        }

        for (idx, url) in post.reply_images.iter().enumerate() {
            let outcome = self
                .downloader
                .download(url, storage.reply_path(), &storage.reply_name(idx));
            announce(&topic.id, url, outcome);
            images.record_reply(outcome);
        }

        info!(
            topic = %topic.id,
            title = %report::preview(&post.title, 20),
            body = %report::preview(&post.body, 10),
            original = images.original,
            reply = images.reply,
            max_reply = self.opt.limits().max_reply,
            "topic saved"
        );

        Ok(images)
    }
}

fn announce(topic: &str, url: &str, outcome: DownloadOutcome) {
    match outcome {
        DownloadOutcome::Written(_) => println!("{} {}", topic, url),
        DownloadOutcome::Existing => debug!(topic, url, "has already been downloaded"),
        DownloadOutcome::Failed => (),
    }
}
