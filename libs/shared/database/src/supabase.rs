use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client, Method, StatusCode,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

use shared_config::AppConfig;

#[derive(Error, Debug)]
pub enum SupabaseError {
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid header value: {0}")]
    Header(String),

    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Empty result: {0}")]
    Empty(String),
}

impl SupabaseError {
    fn from_status(status: StatusCode, body: String) -> Self {
        match status.as_u16() {
            401 | 403 => SupabaseError::Auth(body),
            404 => SupabaseError::NotFound(body),
            409 => SupabaseError::Conflict(body),
            code => SupabaseError::Api { status: code, message: body },
        }
    }
}

pub type SupabaseResult<T> = Result<T, SupabaseError>;

/// Thin PostgREST/GoTrue client. User calls forward the caller's token so
/// row-level security applies; `service_*` calls use the service-role key.
#[derive(Clone)]
pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
    service_role_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            anon_key: config.supabase_anon_key.clone(),
            service_role_key: config.supabase_service_role_key.clone(),
        }
    }

    fn get_headers(&self, api_key: &str, auth_token: Option<&str>) -> SupabaseResult<HeaderMap> {
        let mut headers = HeaderMap::new();

        headers.insert(
            "apikey",
            HeaderValue::from_str(api_key).map_err(|e| SupabaseError::Header(e.to_string()))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = auth_token {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", token))
                    .map_err(|e| SupabaseError::Header(e.to_string()))?,
            );
        }

        Ok(headers)
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        headers: HeaderMap,
        body: Option<Value>,
    ) -> SupabaseResult<reqwest::Response> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut req = self.client.request(method, &url).headers(headers);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            error!("API error ({}): {}", status, error_text);
            return Err(SupabaseError::from_status(status, error_text));
        }

        Ok(response)
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> SupabaseResult<T> {
        let bytes = response.bytes().await?;
        // PostgREST answers mutations without `return=representation` with an empty body.
        if bytes.is_empty() {
            return Ok(serde_json::from_value(Value::Null)?);
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub async fn request<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
    ) -> SupabaseResult<T>
    where
        T: DeserializeOwned,
    {
        self.request_with_headers(method, path, auth_token, body, None).await
    }

    pub async fn request_with_headers<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
        extra_headers: Option<HeaderMap>,
    ) -> SupabaseResult<T>
    where
        T: DeserializeOwned,
    {
        let mut headers = self.get_headers(&self.anon_key, auth_token)?;
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let response = self.send(method, path, headers, body).await?;
        Self::decode(response).await
    }

    /// Request authenticated with the service-role key. Only for webhook and
    /// public-booking paths where no end-user token exists.
    pub async fn service_request<T>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> SupabaseResult<T>
    where
        T: DeserializeOwned,
    {
        let mut headers = self.get_headers(&self.service_role_key, Some(&self.service_role_key))?;
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));

        let response = self.send(method, path, headers, body).await?;
        Self::decode(response).await
    }

    pub async fn rpc<T>(
        &self,
        function: &str,
        args: Value,
        auth_token: Option<&str>,
    ) -> SupabaseResult<T>
    where
        T: DeserializeOwned,
    {
        let path = format!("/rest/v1/rpc/{}", function);
        match auth_token {
            Some(token) => self.request(Method::POST, &path, Some(token), Some(args)).await,
            None => self.service_request(Method::POST, &path, Some(args)).await,
        }
    }

    /// Insert a row and return the stored representation.
    pub async fn insert_returning(
        &self,
        table: &str,
        body: Value,
        auth_token: Option<&str>,
    ) -> SupabaseResult<Value> {
        let path = format!("/rest/v1/{}", table);
        self.mutate_returning(Method::POST, &path, body, auth_token).await
    }

    /// Patch rows matching `filter` (a PostgREST query string) and return the first.
    pub async fn patch_returning(
        &self,
        table: &str,
        filter: &str,
        body: Value,
        auth_token: Option<&str>,
    ) -> SupabaseResult<Value> {
        let path = format!("/rest/v1/{}?{}", table, filter);
        self.mutate_returning(Method::PATCH, &path, body, auth_token).await
    }

    async fn mutate_returning(
        &self,
        method: Method,
        path: &str,
        body: Value,
        auth_token: Option<&str>,
    ) -> SupabaseResult<Value> {
        let rows: Vec<Value> = match auth_token {
            Some(token) => {
                let mut headers = HeaderMap::new();
                headers.insert("Prefer", HeaderValue::from_static("return=representation"));
                self.request_with_headers(method, path, Some(token), Some(body), Some(headers))
                    .await?
            }
            None => self.service_request(method, path, Some(body)).await?,
        };

        rows.into_iter()
            .next()
            .ok_or_else(|| SupabaseError::Empty(path.to_string()))
    }

    pub async fn delete(&self, path: &str, auth_token: Option<&str>) -> SupabaseResult<()> {
        let _: Value = match auth_token {
            Some(token) => self.request(Method::DELETE, path, Some(token), None).await?,
            None => self.service_request(Method::DELETE, path, None).await?,
        };
        Ok(())
    }

    /// GET rows; without a user token the service-role key is used.
    pub async fn select(&self, path: &str, auth_token: Option<&str>) -> SupabaseResult<Vec<Value>> {
        match auth_token {
            Some(token) => self.request(Method::GET, path, Some(token), None).await,
            None => self.service_request(Method::GET, path, None).await,
        }
    }

    /// Fetch a single row or `None` when the filter matches nothing.
    pub async fn select_one(
        &self,
        path: &str,
        auth_token: Option<&str>,
    ) -> SupabaseResult<Option<Value>> {
        let rows = self.select(path, auth_token).await?;
        Ok(rows.into_iter().next())
    }

    pub async fn get_user_profile(&self, auth_token: &str) -> SupabaseResult<Value> {
        self.request::<Value>(Method::GET, "/auth/v1/user", Some(auth_token), None)
            .await
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }
}
