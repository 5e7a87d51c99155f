use std::{
    fmt::{self, Display},
    io::Write,
    thread,
    time::Duration,
};

use reqwest::{
    blocking::{Client, RequestBuilder},
    header::{self, HeaderMap, HeaderValue},
    StatusCode,
};
use tracing::{debug, warn};

use crate::{
    config::{RetryPolicy, Session},
    error::{Error, FetchFailure},
};

const PAGE_TIMEOUT: Duration = Duration::from_secs(30);
const IMAGE_TIMEOUT: Duration = Duration::from_secs(45);

/// The smallest thing we need from HTTP: a page as text, or a body copied into a writer.
pub trait Transport {
    fn get_text(&self, url: &str) -> Result<String, TransportError>;
    fn copy_to(&self, url: &str, writer: &mut dyn Write) -> Result<u64, TransportError>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportError {
    Timeout(String),
    Connection(String),
    Status(StatusCode),
    Body(String),
}

impl TransportError {
    /// 403 and 404 mean a dead cookie or a deleted topic. Nothing else is final.
    pub fn terminal_status(&self) -> Option<StatusCode> {
        match self {
            TransportError::Status(status)
                if *status == StatusCode::FORBIDDEN || *status == StatusCode::NOT_FOUND =>
            {
                Some(*status)
            }
            _ => None,
        }
    }

    fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout(e.to_string())
        } else if e.is_body() || e.is_decode() {
            TransportError::Body(e.to_string())
        } else {
            match e.status() {
                Some(status) => TransportError::Status(status),
                None => TransportError::Connection(e.to_string()),
            }
        }
    }
}

impl Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TransportError::Timeout(message) => write!(f, "timed out: {}", message),
            TransportError::Connection(message) => write!(f, "connection failed: {}", message),
            TransportError::Status(status) => write!(f, "status {}", status),
            TransportError::Body(message) => write!(f, "bad body: {}", message),
        }
    }
}

impl std::error::Error for TransportError {}

pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(session: &Session) -> crate::Result<Self> {
        let client = Client::builder()
            .user_agent(session.user_agent.as_str())
            .default_headers(session_headers(session)?)
            .build()?;
        Ok(Self { client })
    }

    fn page_request(&self, url: &str) -> RequestBuilder {
        self.client
            .get(url)
            .header(header::ACCEPT, HeaderValue::from_static("text/html"))
            .timeout(PAGE_TIMEOUT)
    }
}

/// Headers sent with every request, pages and images alike.
fn session_headers(session: &Session) -> crate::Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    if let Some(cookie) = &session.cookie {
        headers.insert(header::COOKIE, header_value(cookie, "cookie")?);
    }
    if let Some(referer) = &session.referer {
        headers.insert(header::REFERER, header_value(referer, "referer")?);
    }
    Ok(headers)
}

fn header_value(value: &str, name: &str) -> crate::Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| {
        Error::Other(
            format!("Configured {} is not a valid header value", name),
            Box::new(e),
        )
    })
}

impl Transport for HttpTransport {
    fn get_text(&self, url: &str) -> Result<String, TransportError> {
        let response = self
            .page_request(url)
            .send()
            .map_err(TransportError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status));
        }

        response.text().map_err(TransportError::from_reqwest)
    }

    fn copy_to(&self, url: &str, writer: &mut dyn Write) -> Result<u64, TransportError> {
        let mut response = self
            .client
            .get(url)
            .timeout(IMAGE_TIMEOUT)
            .send()
            .map_err(TransportError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status));
        }

        response.copy_to(writer).map_err(TransportError::from_reqwest)
    }
}

/// Page fetcher with bounded retries.
///
/// Timeouts, connection failures and unexpected statuses are retried with a growing delay;
/// 403 and 404 are returned immediately.
pub struct Fetcher<'a, T> {
    transport: &'a T,
    policy: RetryPolicy,
    sleep: Box<dyn Fn(Duration) + 'a>,
}

impl<'a, T: Transport> Fetcher<'a, T> {
    pub fn new(transport: &'a T, policy: RetryPolicy) -> Self {
        Self {
            transport,
            policy,
            sleep: Box::new(thread::sleep),
        }
    }

    #[cfg(test)]
    pub fn with_sleep(mut self, sleep: impl Fn(Duration) + 'a) -> Self {
        self.sleep = Box::new(sleep);
        self
    }

    pub fn fetch(&self, url: &str) -> crate::Result<String> {
        let attempts = self.policy.attempts.max(1);

        for attempt in 0..attempts {
            match self.transport.get_text(url) {
                Ok(text) => {
                    debug!(url, bytes = text.len(), "fetched");
                    return Ok(text);
                }

                Err(e) => {
                    if let Some(status) = e.terminal_status() {
                        warn!(url, %status, "not retrying; cookie may have expired or topic is gone");
                        return Err(Error::Fetch(FetchFailure::Terminal(status), url.into()));
                    }

                    warn!(url, attempt = attempt + 1, attempts, error = %e, "request failed");
                    if attempt + 1 < attempts {
                        (self.sleep)(self.policy.delay(attempt));
                    }
                }
            }
        }

        Err(Error::Fetch(FetchFailure::Exhausted { attempts }, url.into()))
    }
}


#[cfg(test)]
mod tests {
    use std::{cell::RefCell, time::Duration};

    use reqwest::{header, StatusCode};

    use super::{
        session_headers, testing::ScriptedTransport, Fetcher, HttpTransport, TransportError,
    };
    use crate::{
        config::{RetryPolicy, Session},
        error::{Error, FetchFailure},
    };

    fn session() -> Session {
        Session {
            user_agent: "topicgrab-test".into(),
            cookie: Some("bid=abc".into()),
            referer: Some("https://www.douban.com/group/698716/discussion".into()),
        }
    }

    #[test]
    fn accept_html_only_on_page_requests() {
        let headers = session_headers(&session()).unwrap();
        assert_eq!(headers[header::COOKIE], "bid=abc");
        assert_eq!(
            headers[header::REFERER],
            "https://www.douban.com/group/698716/discussion"
        );
        assert!(!headers.contains_key(header::ACCEPT));

        let transport = HttpTransport::new(&session()).unwrap();
        let request = transport
            .page_request("https://www.douban.com/group/topic/1/")
            .build()
            .unwrap();
        assert_eq!(request.headers()[header::ACCEPT], "text/html");
    }

    fn policy() -> RetryPolicy {
        RetryPolicy {
            attempts: 3,
            base_delay: Duration::from_millis(10),
        }
    }

    #[test]
    fn not_found_is_fetched_once() {
        let transport = ScriptedTransport::new([Err(TransportError::Status(StatusCode::NOT_FOUND))]);
        let sleeps = RefCell::new(Vec::new());
        let fetcher = Fetcher::new(&transport, policy()).with_sleep(|d| sleeps.borrow_mut().push(d));

        let result = fetcher.fetch("https://www.douban.com/group/topic/1/");

        assert!(matches!(
            result,
            Err(Error::Fetch(FetchFailure::Terminal(StatusCode::NOT_FOUND), _))
        ));
        assert_eq!(transport.calls(), 1);
        assert!(sleeps.borrow().is_empty());
    }

    #[test]
    fn forbidden_is_terminal() {
        let transport = ScriptedTransport::new([Err(TransportError::Status(StatusCode::FORBIDDEN))]);
        let fetcher = Fetcher::new(&transport, policy()).with_sleep(|_| ());

        let result = fetcher.fetch("https://www.douban.com/group/topic/1/");

        assert!(matches!(
            result,
            Err(Error::Fetch(FetchFailure::Terminal(StatusCode::FORBIDDEN), _))
        ));
        assert_eq!(transport.calls(), 1);
    }

    #[test]
    fn timeouts_retry_with_growing_delay() {
        let transport = ScriptedTransport::new(
            (0..3).map(|_| Err(TransportError::Timeout("slow".into()))),
        );
        let sleeps = RefCell::new(Vec::new());
        let fetcher = Fetcher::new(&transport, policy()).with_sleep(|d| sleeps.borrow_mut().push(d));

        let result = fetcher.fetch("https://www.douban.com/group/topic/1/");

        assert!(matches!(
            result,
            Err(Error::Fetch(FetchFailure::Exhausted { attempts: 3 }, _))
        ));
        assert_eq!(transport.calls(), 3);

        let sleeps = sleeps.borrow().clone();
        assert_eq!(sleeps.len(), 2);
        assert!(sleeps.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn server_errors_are_retried_until_success() {
        let transport = ScriptedTransport::new([
            Err(TransportError::Status(StatusCode::BAD_GATEWAY)),
            Err(TransportError::Connection("reset".into())),
            Ok("<html></html>".to_string()),
        ]);
        let fetcher = Fetcher::new(&transport, policy()).with_sleep(|_| ());

        let text = fetcher.fetch("https://www.douban.com/group/topic/1/").unwrap();

        assert_eq!(text, "<html></html>");
        assert_eq!(transport.calls(), 3);
    }

    #[test]
    fn zero_attempts_still_tries_once() {
        let transport = ScriptedTransport::new([Ok("ok".to_string())]);
        let policy = RetryPolicy {
            attempts: 0,
            ..policy()
        };
        let fetcher = Fetcher::new(&transport, policy).with_sleep(|_| ());

        assert_eq!(fetcher.fetch("https://example.com/").unwrap(), "ok");
        assert_eq!(transport.calls(), 1);
    }
}
