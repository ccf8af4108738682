//! Source opening.
//!
//! A [`Source`] is an HTTP(S) URL, a local file, or stdin. [`Fetcher::open`]
//! turns it into a buffered byte stream without reading the whole document
//! into memory.
//!
//! ## Configuration
//!
//! Read from the environment (and an optional `.env` file):
//!
//! | Variable | Default |
//! |---|---|
//! | `IATI2HXL_CONNECT_TIMEOUT_SECS` | 30 |
//! | `IATI2HXL_MAX_RETRIES` | 3 |
//! | `IATI2HXL_USER_AGENT` | `iati2hxl/<version>` |
//!
//! Only connecting is time-limited; a response body streams for as long as
//! the server keeps sending it.

use reqwest::blocking::{Client, Response};
use reqwest::Url;
use std::env;
use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use crate::error::{FetchError, FetchResult};
use crate::logs::log_warning;

/// Default number of retries
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Delay between retries in milliseconds
const RETRY_DELAY_MS: u64 = 1000;

/// Default time allowed to establish a connection
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Where a document comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Url(Url),
    File(PathBuf),
    Stdin,
}

impl Source {
    /// `-` is stdin, `http://` and `https://` are URLs, anything else a path.
    pub fn parse(reference: &str) -> FetchResult<Self> {
        if reference == "-" {
            return Ok(Source::Stdin);
        }
        if reference.is_empty() {
            return Err(FetchError::InvalidSource {
                source_ref: reference.to_string(),
                message: "empty reference".to_string(),
            });
        }

        let lower = reference.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            let url = Url::parse(reference).map_err(|e| FetchError::InvalidSource {
                source_ref: reference.to_string(),
                message: e.to_string(),
            })?;
            return Ok(Source::Url(url));
        }

        Ok(Source::File(PathBuf::from(reference)))
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Url(url) => write!(f, "{}", url),
            Source::File(path) => write!(f, "{}", path.display()),
            Source::Stdin => f.write_str("<stdin>"),
        }
    }
}

/// HTTP settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchConfig {
    pub connect_timeout: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: Duration::from_millis(RETRY_DELAY_MS),
            user_agent: format!("iati2hxl/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl FetchConfig {
    /// Settings from the process environment, after loading `.env`.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Settings from an arbitrary variable lookup. Unparseable values keep
    /// their default and log a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = lookup("IATI2HXL_CONNECT_TIMEOUT_SECS") {
            match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => config.connect_timeout = Duration::from_secs(secs),
                _ => log_warning(format!(
                    "Ignoring invalid IATI2HXL_CONNECT_TIMEOUT_SECS '{}'",
                    raw
                )),
            }
        }
        if let Some(raw) = lookup("IATI2HXL_MAX_RETRIES") {
            match raw.trim().parse::<u32>() {
                Ok(retries) => config.max_retries = retries,
                Err(_) => log_warning(format!("Ignoring invalid IATI2HXL_MAX_RETRIES '{}'", raw)),
            }
        }
        if let Some(agent) = lookup("IATI2HXL_USER_AGENT") {
            if !agent.trim().is_empty() {
                config.user_agent = agent;
            }
        }

        config
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }
}

/// Opens sources as byte streams.
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
    config: FetchConfig,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> FetchResult<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(None::<Duration>)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self { client, config })
    }

    /// Fetcher configured from the environment.
    pub fn from_env() -> FetchResult<Self> {
        Self::new(FetchConfig::from_env())
    }

    /// Open `source` for streaming.
    pub fn open(&self, source: &Source) -> FetchResult<Box<dyn BufRead>> {
        match source {
            Source::Stdin => Ok(Box::new(io::stdin().lock())),
            Source::File(path) => {
                let file = File::open(path).map_err(|source| FetchError::Io {
                    path: path.display().to_string(),
                    source,
                })?;
                Ok(Box::new(BufReader::new(file)))
            }
            Source::Url(url) => {
                let response = self.get(url)?;
                Ok(Box::new(BufReader::new(response)))
            }
        }
    }

    /// GET with retries on connection failures and 5xx responses.
    fn get(&self, url: &Url) -> FetchResult<Response> {
        let mut attempt = 0;

        loop {
            let retry_reason = match self.client.get(url.clone()).send() {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response)
                    if response.status().is_server_error() && attempt < self.config.max_retries =>
                {
                    format!("HTTP {}", response.status().as_u16())
                }
                Ok(response) => {
                    return Err(FetchError::Status {
                        url: url.to_string(),
                        status: response.status().as_u16(),
                    })
                }
                Err(e)
                    if (e.is_connect() || e.is_timeout()) && attempt < self.config.max_retries =>
                {
                    e.to_string()
                }
                Err(source) => {
                    return Err(FetchError::Request {
                        url: url.to_string(),
                        source,
                    })
                }
            };

            attempt += 1;
            log_warning(format!(
                "{} ({}), retry {}/{}",
                url, retry_reason, attempt, self.config.max_retries
            ));
            thread::sleep(self.config.retry_delay);
        }
    }
}
