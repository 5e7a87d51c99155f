use std::{
    error,
    fmt::{self, Display},
    io,
};

use reqwest::StatusCode;

use crate::config::Key;

#[derive(Debug)]
pub enum Error {
    Configuration(Key),
    Fetch(FetchFailure, String),
    Io(io::Error),
    Json(serde_json::Error),
    Network(reqwest::Error),

    // Things we only ever report: bad header values, failed image transfers.
    Other(String, Box<dyn error::Error + 'static>),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FetchFailure {
    /// The server refused or doesn't know the resource; retrying won't help.
    Terminal(StatusCode),

    /// Every attempt failed with something that looked temporary.
    Exhausted { attempts: u32 },
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Configuration(key) => write!(f, "Configuration not provided: {:?}", key),
            Error::Fetch(kind, url) => match kind {
                FetchFailure::Terminal(status) => {
                    write!(f, "Giving up on {} ({}); check cookie or topic id", url, status)
                }
                FetchFailure::Exhausted { attempts } => {
                    write!(f, "Unable to fetch {} after {} attempts", url, attempts)
                }
            },

            Error::Io(e) => write!(f, "IO error: {}", e),
            Error::Json(e) => write!(f, "Malformed json: {}", e),
            Error::Network(e) => write!(f, "Network error: {}", e),

            Error::Other(message, e) => write!(f, "{}: {}", message, e),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Configuration(_) => None,
            Error::Fetch(..) => None,
            Error::Io(e) => Some(e),
            Error::Json(e) => Some(e),
            Error::Network(e) => Some(e),

            Error::Other(_, e) => Some(e.as_ref()),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Network(e)
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Json(e)
    }
}
