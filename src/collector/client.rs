//! Management API HTTP client
//!
//! One client per configured broker, with connection pooling, a bounded
//! request timeout and HTTP Basic auth on every request.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::{Client, ClientBuilder};
use serde_json::Value;
use tracing::{debug, error, instrument, warn};
use url::Url;

use super::paths::encode_segment;
use super::StatCategory;
use crate::config::{IgnoreRules, PollConfig};
use crate::error::ClientError;

/// Client for the RabbitMQ management HTTP API
///
/// Every accessor isolates its own failures: transport errors, HTTP error
/// statuses, malformed URLs and non-JSON bodies are logged and surface as
/// empty results, never as errors to the caller. One bad endpoint must not
/// abort the rest of a poll cycle.
#[derive(Debug, Clone)]
pub struct ManagementClient {
    client: Client,
    api_base: String,
    username: String,
    password: String,
    ignore: IgnoreRules,
}

impl ManagementClient {
    /// Create a client for one broker
    ///
    /// # Errors
    /// Returns an error if the underlying HTTP client fails to build
    pub fn new(config: &PollConfig) -> Result<Self, ClientError> {
        let client = ClientBuilder::new()
            .timeout(Duration::from_millis(config.timeout_ms))
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(30))
            .danger_accept_invalid_certs(!config.connection.validate_certs)
            .build()
            .map_err(ClientError::HttpClientInit)?;

        Ok(Self {
            client,
            api_base: format!("{}/api", config.connection.base_url()),
            username: config.credentials.username.clone(),
            password: config.credentials.password.clone(),
            ignore: config.ignore.clone(),
        })
    }

    /// One authenticated GET against the management API
    ///
    /// Path segments must already be encoded (see [`super::paths`]); they are
    /// joined verbatim under `{base}/api/`.
    #[instrument(skip(self))]
    pub async fn fetch(&self, path: &[&str]) -> Option<Value> {
        let raw = format!("{}/{}", self.api_base, path.join("/"));
        let url = match Url::parse(&raw) {
            Ok(url) => url,
            Err(e) => {
                error!(
                    error = %ClientError::InvalidUrl { url: raw.clone(), source: e },
                    "Malformed management API URL"
                );
                return None;
            }
        };

        debug!(url = %url, "Fetching management API resource");

        let response = match self
            .client
            .get(url)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                error!(error = %ClientError::from(e), "Management API request failed");
                return None;
            }
        };

        let status = response.status();
        if !status.is_success() {
            error!(
                error = %ClientError::HttpStatus(status.as_u16()),
                "Management API returned error status"
            );
            return None;
        }

        match response.json::<Value>().await {
            Ok(value) => Some(value),
            Err(e) => {
                error!(error = %ClientError::from(e), "Failed to parse management API response");
                None
            }
        }
    }

    /// Fetch a resource that is expected to be a JSON array
    async fn fetch_list(&self, path: &[&str]) -> Vec<Value> {
        match self.fetch(path).await {
            Some(Value::Array(items)) => items,
            Some(_) => {
                warn!(path = %path.join("/"), "Expected a JSON array, got something else");
                Vec::new()
            }
            None => Vec::new(),
        }
    }

    /// Extract URL-encoded names from a list of raw entity objects
    ///
    /// Entries without a name are skipped; the broker's default exchange
    /// reports an empty name and counts as nameless.
    pub fn names(items: &[Value]) -> Vec<String> {
        items
            .iter()
            .filter_map(|item| item.get("name").and_then(Value::as_str))
            .filter(|name| !name.is_empty())
            .map(encode_segment)
            .collect()
    }

    /// Returns the list of cluster nodes (empty on failure)
    pub async fn nodes(&self) -> Vec<Value> {
        self.fetch_list(&["nodes"]).await
    }

    /// Returns the cluster overview object (`None` on failure)
    pub async fn overview(&self) -> Option<Value> {
        self.fetch(&["overview"]).await
    }

    /// Returns the URL-encoded names of all vhosts
    pub async fn vhost_names(&self) -> Vec<String> {
        Self::names(&self.fetch_list(&["vhosts"]).await)
    }

    /// Returns the URL-encoded names of all queues in a vhost
    pub async fn queue_names(&self, vhost: &str) -> Vec<String> {
        Self::names(&self.fetch_list(&["queues", vhost]).await)
    }

    /// Returns the URL-encoded names of all exchanges in a vhost
    pub async fn exchange_names(&self, vhost: &str) -> Vec<String> {
        Self::names(&self.fetch_list(&["exchanges", vhost]).await)
    }

    /// Detailed stats for entities of `category`, keyed by encoded name
    ///
    /// With `name` set only that entity is fetched; otherwise every name in
    /// the category is enumerated, scoped to `vhost` when given or to all
    /// vhosts otherwise. Ignore rules are applied before the per-item detail
    /// fetch: ignored names cost no requests. Entities whose detail fetch
    /// fails are reported and omitted from the result.
    #[instrument(skip(self))]
    pub async fn stats_for(
        &self,
        category: StatCategory,
        name: Option<&str>,
        vhost: Option<&str>,
    ) -> BTreeMap<String, Value> {
        let vhosts = match vhost {
            Some(vhost) => vec![vhost.to_string()],
            None => self.vhost_names().await,
        };

        let mut stats = BTreeMap::new();
        for vhost in &vhosts {
            let names = match name {
                Some(name) => vec![name.to_string()],
                None => match category {
                    StatCategory::Queue => self.queue_names(vhost).await,
                    StatCategory::Exchange => self.exchange_names(vhost).await,
                },
            };

            for name in names {
                if self.ignore.is_ignored(category.as_str(), &name) {
                    debug!(category = %category, name = %name, "Skipping ignored entity");
                    continue;
                }
                match self.fetch(&[category.plural(), vhost, &name]).await {
                    Some(detail) => {
                        stats.insert(name, detail);
                    }
                    None => {
                        warn!(
                            category = %category,
                            name = %name,
                            vhost = %vhost,
                            "Detail fetch failed, skipping entity"
                        );
                    }
                }
            }
        }

        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BrokerConfig, PollConfig};
    use serde_json::json;

    fn test_config() -> PollConfig {
        PollConfig::from_broker(&BrokerConfig::default()).unwrap()
    }

    #[test]
    fn test_client_new() {
        let client = ManagementClient::new(&test_config());
        assert!(client.is_ok());
        assert_eq!(
            client.unwrap().api_base,
            "http://localhost:15672/api"
        );
    }

    #[test]
    fn test_names_encodes_and_skips_nameless() {
        let items = vec![
            json!({"name": "/"}),
            json!({"name": "orders"}),
            json!({"tracking_id": 7}),
            json!({"name": ""}),
            json!({"name": "logs/audit"}),
        ];
        let names = ManagementClient::names(&items);
        assert_eq!(names, vec!["%2F", "orders", "logs%2Faudit"]);
    }

    #[test]
    fn test_names_empty_input() {
        assert!(ManagementClient::names(&[]).is_empty());
    }
}
