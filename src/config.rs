use std::{collections::HashMap, fs, time::Duration};

use directories::UserDirs;

use crate::{error::Error, Result};

pub static DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/96.0.4664.110 Safari/537.36";

#[derive(Clone, Debug, Default)]
pub struct Configuration {
    config: HashMap<Key, String>,
}

impl Configuration {
    /// Reads `~/.topicgrab.conf`.
    ///
    /// Should there be no configuration file, a blank configuration is produced. Douban will
    /// still serve most topic pages to anonymous clients, just not for long.
    pub fn init() -> Self {
        let text = UserDirs::new()
            .map(|dirs| dirs.home_dir().join(".topicgrab.conf"))
            .and_then(|conf| fs::read_to_string(conf).ok());

        text.map(|text| Configuration::from_text(&text))
            .unwrap_or_default()
    }

    pub fn from_text(text: &str) -> Self {
        Configuration {
            config: read_config(text),
        }
    }

    pub fn get_config(&self, key: Key) -> Result<&str> {
        self.config
            .get(&key)
            .map(AsRef::as_ref)
            .ok_or(Error::Configuration(key))
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Key {
    Cookie,
    Referer,
    UserAgent,
}

impl Key {
    fn from_identifier(identifier: &str) -> Option<Self> {
        match identifier {
            "cookie" => Some(Key::Cookie),
            "referer" => Some(Key::Referer),
            "user_agent" => Some(Key::UserAgent),
            _ => None,
        }
    }
}

fn read_config(text: &str) -> HashMap<Key, String> {
    text.lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                return None;
            }

            // Cookie strings are full of '=', so only the first one separates key from value.
            let (key, value) = line.split_once('=')?;
            Key::from_identifier(key.trim()).map(|key| (key, value.trim().to_string()))
        })
        .collect()
}

/// Request headers handed to the transport. Opaque to everything else.
#[derive(Clone, Debug)]
pub struct Session {
    pub user_agent: String,
    pub cookie: Option<String>,
    pub referer: Option<String>,
}

impl Session {
    pub fn from_config(config: &Configuration, group: &str) -> Self {
        let referer = config
            .get_config(Key::Referer)
            .map(ToOwned::to_owned)
            .unwrap_or_else(|_| format!("https://www.douban.com/group/{}/discussion", group));

        Session {
            user_agent: config
                .get_config(Key::UserAgent)
                .unwrap_or(DEFAULT_USER_AGENT)
                .to_string(),
            cookie: config
                .get_config(Key::Cookie)
                .ok()
                .filter(|cookie| !cookie.is_empty())
                .map(ToOwned::to_owned),
            referer: Some(referer),
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Session {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            cookie: None,
            referer: None,
        }
    }
}

/// Per-topic image caps.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Limits {
    pub max_original: usize,
    pub max_reply: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_original: 10,
            max_reply: 20,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Delay after the failed attempt numbered `attempt` (zero-based).
    ///
    /// Grows with every attempt: `base * (attempt + 1.5)`.
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay.mul_f64(f64::from(attempt) + 1.5)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            attempts: 3,
            base_delay: Duration::from_secs(2),
        }
    }
}
