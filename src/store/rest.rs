//! Hosted REST backend: `RelationalStore` over a PostgREST-style API
//! (`GET {base}/rest/v1/{table}?{column}=eq.{value}`).

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::error::DatabaseError;
use crate::store::traits::{Filter, RelationalStore, Row, check_identifiers};

/// Connection settings for the hosted store.
#[derive(Debug, Clone)]
pub struct RestConfig {
    pub base_url: String,
    pub api_key: SecretString,
}

impl RestConfig {
    /// Build config from `STUDIO_REST_URL` / `STUDIO_REST_KEY`.
    /// Returns `None` if the URL is not set.
    pub fn from_env() -> Option<Self> {
        let base_url = std::env::var("STUDIO_REST_URL").ok()?;
        let api_key = std::env::var("STUDIO_REST_KEY").unwrap_or_default();
        Some(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: SecretString::from(api_key),
        })
    }
}

/// REST-backed relational store.
pub struct RestStore {
    config: RestConfig,
    client: reqwest::Client,
}

impl RestStore {
    pub fn new(config: RestConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Build the request URL for an equality filter.
    fn table_url(&self, table: &str, filter: &Filter, limit: Option<usize>) -> Result<reqwest::Url, DatabaseError> {
        check_identifiers(table, filter)?;

        let mut url = reqwest::Url::parse(&format!("{}/rest/v1/{table}", self.config.base_url))
            .map_err(|e| DatabaseError::Http(format!("Invalid base URL: {e}")))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("select", "*");
            query.append_pair(&filter.column, &format!("eq.{}", filter.value));
            if let Some(limit) = limit {
                query.append_pair("limit", &limit.to_string());
            }
        }
        Ok(url)
    }

    async fn get_rows(
        &self,
        table: &str,
        filter: &Filter,
        limit: Option<usize>,
    ) -> Result<Vec<Row>, DatabaseError> {
        let url = self.table_url(table, filter, limit)?;
        debug!(url = %url, "REST select");

        let key = self.config.api_key.expose_secret();
        let response = self
            .client
            .get(url)
            .header("apikey", key)
            .bearer_auth(key)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| DatabaseError::Http(format!("select {table}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DatabaseError::Http(format!(
                "select {table}: HTTP {status}: {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        response
            .json::<Vec<Row>>()
            .await
            .map_err(|e| DatabaseError::Serialization(format!("select {table}: {e}")))
    }
}

#[async_trait]
impl RelationalStore for RestStore {
    async fn fetch_one(&self, table: &str, filter: &Filter) -> Result<Row, DatabaseError> {
        self.get_rows(table, filter, Some(1))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| DatabaseError::NotFound {
                entity: table.to_string(),
                id: filter.value.clone(),
            })
    }

    async fn fetch_many(&self, table: &str, filter: &Filter) -> Result<Vec<Row>, DatabaseError> {
        self.get_rows(table, filter, None).await
    }
}
