use std::time::Duration;

use url::Url;

use super::entities::{BatchGetResponse, ValueRange};
use super::error::{SheetsError, SheetsResult};

const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets/";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Credential handed to the Sheets API as is; obtaining it is left to the
/// deployment.
#[derive(Clone, Debug)]
pub enum SheetsAuth {
    ApiKey(String),
    AccessToken(String),
}

#[derive(Clone)]
pub struct SheetsClient {
    client: reqwest::Client,
    spreadsheet_id: String,
    auth: SheetsAuth,
    api_base: String,
    timeout: Duration,
}

impl SheetsClient {
    pub fn new(client: reqwest::Client, spreadsheet_id: &str, auth: SheetsAuth) -> SheetsResult<SheetsClient> {
        if spreadsheet_id.trim().is_empty() {
            return Err(SheetsError::Init("Spreadsheet id is empty".to_string()));
        }

        Ok(SheetsClient {
            client,
            spreadsheet_id: spreadsheet_id.trim().to_string(),
            auth,
            api_base: SHEETS_API_BASE.to_string(),
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Upper bound for a whole request, connect to last byte
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    fn batch_get_url(&self, ranges: &[String]) -> SheetsResult<Url> {
        let mut url = Url::parse(&self.api_base)?;
        url.path_segments_mut()
            .map_err(|_| SheetsError::Init("Invalid API base".to_string()))?
            .pop_if_empty()
            .push(&self.spreadsheet_id)
            .push("values:batchGet");

        {
            let mut query = url.query_pairs_mut();
            for range in ranges {
                query.append_pair("ranges", range);
            }
            if let SheetsAuth::ApiKey(key) = &self.auth {
                query.append_pair("key", key);
            }
        }

        Ok(url)
    }

    async fn request<T>(&self, url: Url) -> SheetsResult<T>
    where
        T: serde::de::DeserializeOwned,
    {
        log::debug!("Requesting {}", url.path());
        let mut request = self.client.get(url).timeout(self.timeout);
        if let SheetsAuth::AccessToken(token) = &self.auth {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?.error_for_status()?;

        let data_str = response.text().await?;
        log::trace!("Response: {}", data_str);
        let data = serde_json::from_str(&data_str)?;

        Ok(data)
    }

    /// Fetches several ranges in one call; results come back in request order
    pub async fn batch_get(&self, ranges: &[String]) -> SheetsResult<Vec<ValueRange>> {
        let url = self.batch_get_url(ranges)?;
        let BatchGetResponse { value_ranges } = self.request(url).await?;

        if value_ranges.len() != ranges.len() {
            return Err(SheetsError::Init(format!(
                "Asked for {} ranges, got {}",
                ranges.len(),
                value_ranges.len()
            )));
        }

        Ok(value_ranges)
    }
}
