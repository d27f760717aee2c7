use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use docbatch_logging::engine_debug;
use futures_util::StreamExt;
use reqwest::header::CONTENT_DISPOSITION;
use reqwest::Url;
use tokio_util::sync::CancellationToken;

use crate::filename::{disposition_filename, fallback_filename};
use crate::persist::{PartialFile, PersistError};
use crate::{DownloadOutcome, DownloadTask, FailureKind, FetchError};

pub const DEFAULT_ENDPOINT: &str =
    "https://assist.positivotecnologia.com.br/bin/at/comprovantes/gerarRatPdf.php";
pub const DEFAULT_WARMUP_URL: &str = "https://assist.positivotecnologia.com.br/";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/100.0.0.0 Safari/537.36";
/// Query parameter carrying the remote id.
pub const ID_QUERY_PARAM: &str = "os_id";

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub endpoint: String,
    /// Page requested once per run to open the session; `None` skips the warm-up request.
    pub warmup_url: Option<String>,
    pub user_agent: String,
    pub connect_timeout: Duration,
    /// Longest wait for any single read; a slow but steady body never hits it.
    pub read_timeout: Duration,
    pub warmup_timeout: Duration,
    pub redirect_limit: usize,
    pub chunk_size: usize,
    /// Leading characters dropped from an id before it is sent.
    pub id_prefix_len: usize,
    /// Ids this long or shorter are sent unchanged.
    pub min_len_for_prefix_strip: usize,
    pub file_extension: String,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            warmup_url: Some(DEFAULT_WARMUP_URL.to_string()),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(30),
            warmup_timeout: Duration::from_secs(15),
            redirect_limit: 5,
            chunk_size: 8192,
            id_prefix_len: 3,
            min_len_for_prefix_strip: 9,
            file_extension: "pdf".to_string(),
        }
    }
}

impl FetchSettings {
    /// Id as sent to the remote endpoint.
    pub fn remote_id<'a>(&self, item_id: &'a str) -> &'a str {
        if item_id.len() > self.min_len_for_prefix_strip {
            item_id.get(self.id_prefix_len..).unwrap_or(item_id)
        } else {
            item_id
        }
    }

    pub fn item_url(&self, item_id: &str) -> Result<Url, FetchError> {
        Url::parse_with_params(&self.endpoint, &[(ID_QUERY_PARAM, self.remote_id(item_id))])
            .map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))
    }
}

#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    /// Open the remote session; failure aborts the whole run.
    async fn warm_up(&self) -> Result<(), FetchError>;

    /// Fetch one item into its target folder, observing `cancel` between chunks.
    async fn download(&self, task: &DownloadTask, cancel: &CancellationToken) -> DownloadOutcome;
}

/// Fetcher over one pooled `reqwest::Client`, shared by every task of a run.
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    settings: FetchSettings,
    client: reqwest::Client,
}

impl ReqwestFetcher {
    pub fn new(settings: FetchSettings) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(settings.user_agent.clone())
            .connect_timeout(settings.connect_timeout)
            .read_timeout(settings.read_timeout)
            .redirect(reqwest::redirect::Policy::limited(settings.redirect_limit))
            .build()
            .map_err(|err| FetchError::new(FailureKind::Network, err.to_string()))?;
        Ok(Self { settings, client })
    }

    pub fn settings(&self) -> &FetchSettings {
        &self.settings
    }

    /// Returns `Ok(None)` when cancelled mid-stream; the partial file is discarded.
    async fn fetch_to_file(
        &self,
        task: &DownloadTask,
        cancel: &CancellationToken,
    ) -> Result<Option<PathBuf>, FetchError> {
        let url = self.settings.item_url(task.item_id.as_str())?;
        engine_debug!("GET {} for item {}", url, task.item_id);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }

        let filename = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .and_then(disposition_filename)
            .unwrap_or_else(|| {
                fallback_filename(task.item_id.as_str(), &self.settings.file_extension)
            });

        let mut partial = PartialFile::create(&task.target_folder).map_err(map_persist_error)?;
        let chunk_size = self.settings.chunk_size.max(1);
        let mut stream = response.bytes_stream();
        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => return Ok(None),
                next = stream.next() => next,
            };
            let Some(chunk) = next else {
                break;
            };
            let chunk = chunk.map_err(map_reqwest_error)?;
            for piece in chunk.chunks(chunk_size) {
                if cancel.is_cancelled() {
                    return Ok(None);
                }
                partial
                    .write_all(piece)
                    .map_err(|err| FetchError::new(FailureKind::Io, err.to_string()))?;
            }
        }

        let path = partial.persist(&filename).map_err(map_persist_error)?;
        if !path.exists() {
            return Err(FetchError::new(
                FailureKind::NotPersisted,
                path.display().to_string(),
            ));
        }
        Ok(Some(path))
    }
}

#[async_trait::async_trait]
impl Fetcher for ReqwestFetcher {
    async fn warm_up(&self) -> Result<(), FetchError> {
        let Some(url) = self.settings.warmup_url.as_deref() else {
            return Ok(());
        };
        let response = self
            .client
            .get(url)
            .timeout(self.settings.warmup_timeout)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }
        Ok(())
    }

    async fn download(&self, task: &DownloadTask, cancel: &CancellationToken) -> DownloadOutcome {
        let item_id = task.item_id.clone();
        if cancel.is_cancelled() {
            return DownloadOutcome::Cancelled { item_id };
        }
        match self.fetch_to_file(task, cancel).await {
            Ok(Some(path)) => DownloadOutcome::Success { item_id, path },
            Ok(None) => DownloadOutcome::Cancelled { item_id },
            Err(error) => DownloadOutcome::Error { item_id, error },
        }
    }
}

fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_redirect() {
        return FetchError::new(FailureKind::RedirectLimitExceeded, err.to_string());
    }
    FetchError::new(FailureKind::Network, err.to_string())
}

fn map_persist_error(err: PersistError) -> FetchError {
    FetchError::new(FailureKind::Io, err.to_string())
}
