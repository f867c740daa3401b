use std::sync::Arc;
use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tracing::{debug, warn};

use crate::domain::{Accession, MoleculeType};
use crate::error::DashError;
use crate::genbank::{GbSeq, parse_gbset};

pub const EUTILS_BASE_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NcbiSettings {
    pub email: Option<String>,
    pub tool: String,
    pub api_key: Option<String>,
    pub batch_size: usize,
    pub timeout: Duration,
    pub max_retries: usize,
}

impl Default for NcbiSettings {
    fn default() -> Self {
        Self {
            email: None,
            tool: "viromedash".to_string(),
            api_key: None,
            batch_size: 200,
            timeout: Duration::from_secs(60),
            max_retries: 3,
        }
    }
}

impl NcbiSettings {
    /// `NCBI_API_KEY` and `NCBI_EMAIL` from `lookup` replace the configured
    /// values; blank variables are ignored.
    pub fn apply_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        if let Some(api_key) = read("NCBI_API_KEY") {
            self.api_key = Some(api_key);
        }
        if let Some(email) = read("NCBI_EMAIL") {
            self.email = Some(email);
        }
        self
    }

    /// Pause between batches: NCBI allows 3 requests/s, 10 with an API key.
    pub fn request_interval(&self) -> Duration {
        if self.api_key.is_some() {
            Duration::from_millis(110)
        } else {
            Duration::from_millis(340)
        }
    }
}

pub trait GenbankClient: Send + Sync {
    fn fetch_records(
        &self,
        molecule: MoleculeType,
        accessions: &[Accession],
    ) -> Result<Vec<GbSeq>, DashError>;
}

impl<T: GenbankClient + ?Sized> GenbankClient for Arc<T> {
    fn fetch_records(
        &self,
        molecule: MoleculeType,
        accessions: &[Accession],
    ) -> Result<Vec<GbSeq>, DashError> {
        (**self).fetch_records(molecule, accessions)
    }
}

impl<T: GenbankClient + ?Sized> GenbankClient for &T {
    fn fetch_records(
        &self,
        molecule: MoleculeType,
        accessions: &[Accession],
    ) -> Result<Vec<GbSeq>, DashError> {
        (**self).fetch_records(molecule, accessions)
    }
}

/// Entrez E-utilities `efetch` client returning GBSeq XML.
#[derive(Clone)]
pub struct EntrezHttpClient {
    client: Client,
    base_url: String,
    settings: NcbiSettings,
}

impl EntrezHttpClient {
    pub fn new(settings: NcbiSettings) -> Result<Self, DashError> {
        let settings = settings.apply_env(|name| std::env::var(name).ok());

        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("viromedash/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| DashError::NcbiHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(settings.timeout)
            .build()
            .map_err(|err| DashError::NcbiHttp(err.to_string()))?;

        Ok(Self {
            client,
            base_url: EUTILS_BASE_URL.to_string(),
            settings,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn settings(&self) -> &NcbiSettings {
        &self.settings
    }

    fn efetch(&self, molecule: MoleculeType, batch: &[Accession]) -> Result<String, DashError> {
        let url = format!("{}/efetch.fcgi", self.base_url);
        let form = efetch_form(molecule, batch, &self.settings);
        let response = self.send_with_retries(|| self.client.post(&url).form(&form))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "NCBI efetch failed".to_string());
            return Err(DashError::NcbiStatus { status, message });
        }
        response
            .text()
            .map_err(|err| DashError::NcbiHttp(err.to_string()))
    }

    fn send_with_retries<F>(
        &self,
        mut make_req: F,
    ) -> Result<reqwest::blocking::Response, DashError>
    where
        F: FnMut() -> reqwest::blocking::RequestBuilder,
    {
        const BASE_DELAY_MS: u64 = 200;
        let max_retries = self.settings.max_retries;
        let mut attempt = 0usize;
        loop {
            let response = make_req().send();
            match response {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < max_retries && is_retryable_status(status) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        warn!(status, attempt, delay_ms = delay, "retrying NCBI request");
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < max_retries && is_retryable_error(&err) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        warn!(error = %err, attempt, delay_ms = delay, "retrying NCBI request");
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Err(DashError::NcbiHttp(err.to_string()));
                }
            }
        }
    }
}

impl GenbankClient for EntrezHttpClient {
    fn fetch_records(
        &self,
        molecule: MoleculeType,
        accessions: &[Accession],
    ) -> Result<Vec<GbSeq>, DashError> {
        let mut records = Vec::new();
        let batch_size = self.settings.batch_size.max(1);
        for (index, batch) in accessions.chunks(batch_size).enumerate() {
            if index > 0 {
                thread::sleep(self.settings.request_interval());
            }
            let start = std::time::Instant::now();
            let xml = self.efetch(molecule, batch)?;
            let parsed = parse_gbset(&xml)?;
            debug!(
                batch = index,
                requested = batch.len(),
                returned = parsed.len(),
                latency_ms = start.elapsed().as_millis() as u64,
                "efetch batch done"
            );
            records.extend(parsed);
        }
        Ok(records)
    }
}

pub fn efetch_form(
    molecule: MoleculeType,
    accessions: &[Accession],
    settings: &NcbiSettings,
) -> Vec<(&'static str, String)> {
    let ids = accessions
        .iter()
        .map(Accession::as_str)
        .collect::<Vec<_>>()
        .join(",");
    let mut form = vec![
        ("db", molecule.entrez_db().to_string()),
        ("id", ids),
        ("rettype", "gb".to_string()),
        ("retmode", "xml".to_string()),
        ("tool", settings.tool.clone()),
    ];
    if let Some(email) = &settings.email {
        form.push(("email", email.clone()));
    }
    if let Some(api_key) = &settings.api_key {
        form.push(("api_key", api_key.clone()));
    }
    form
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}
