use anyhow::{anyhow, Result};
use reqwest::{
    header::{HeaderMap, HeaderValue, CONTENT_TYPE},
    Client, Method,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error};

use shared_config::AppConfig;

pub struct SupabaseClient {
    client: Client,
    base_url: String,
    service_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.clone(),
            service_key: config.supabase_anon_key.clone(),
        }
    }

    fn headers(&self, extra: Option<(&'static str, String)>) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();

        headers.insert(
            "apikey",
            HeaderValue::from_str(&self.service_key)
                .map_err(|_| anyhow!("invalid api key header value"))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some((name, value)) = extra {
            headers.insert(
                name,
                HeaderValue::from_str(&value)
                    .map_err(|_| anyhow!("invalid header value for {name}"))?,
            );
        }

        Ok(headers)
    }

    pub async fn request<T>(&self, method: Method, path: &str, body: Option<Value>) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making request to {}", url);

        let mut req = self.client.request(method, &url).headers(self.headers(None)?);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            error!("API error ({}): {}", status, error_text);
            return Err(anyhow!("API error ({}): {}", status, error_text));
        }

        let data = response.json::<T>().await?;
        Ok(data)
    }

    /// Write without reading the response body back. PostgREST answers
    /// inserts and updates with an empty body unless representation is
    /// requested, so success here is status-only.
    pub async fn request_no_content(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<()> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making write request to {}", url);

        let mut req = self.client.request(method, &url).headers(self.headers(None)?);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            error!("API error ({}): {}", status, error_text);
            return Err(anyhow!("API error ({}): {}", status, error_text));
        }

        Ok(())
    }

    /// GET with `Prefer: count=exact`; returns the rows plus the total row
    /// count parsed from the `Content-Range` header. Used for pagination
    /// totals so the count always reflects the same filter as the listing.
    pub async fn request_counted<T>(&self, path: &str) -> Result<(T, u64)>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making counted request to {}", url);

        let headers = self.headers(Some(("Prefer", "count=exact".to_string())))?;
        let response = self.client.get(&url).headers(headers).send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            error!("API error ({}): {}", status, error_text);
            return Err(anyhow!("API error ({}): {}", status, error_text));
        }

        // Content-Range looks like "0-9/42"; the part after '/' is the total.
        let total = response
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.rsplit('/').next())
            .and_then(|v| v.parse::<u64>().ok())
            .ok_or_else(|| anyhow!("missing or malformed Content-Range header"))?;

        let data = response.json::<T>().await?;
        Ok((data, total))
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }
}
