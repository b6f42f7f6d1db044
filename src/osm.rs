use std::future::Future;
use std::time::Duration;

use reqwest::header::ACCEPT;
use tracing::{debug, info, warn};

use crate::error::{NodeLookupError, PosError};

pub const OSM_API_BASE_URL: &str = "https://www.openstreetmap.org/api/0.6";
/// OSM's usage policy asks clients to identify themselves.
pub const USER_AGENT: &str = "CampusCoffee/1.0 (Campus Coffee Management System)";
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct OsmConfig {
    pub base_url: String,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
}

impl Default for OsmConfig {
    fn default() -> Self {
        Self {
            base_url: OSM_API_BASE_URL.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }
}

/// Anything that can hand out the raw XML of an OSM node.
pub trait NodeSource {
    /// One attempt, no retries. Every failure is [`PosError::OsmNodeNotFound`].
    fn fetch_node(&self, node_id: u64) -> impl Future<Output = Result<String, PosError>>;
}

pub struct OsmClient {
    client: reqwest::Client,
    base_url: String,
}

impl OsmClient {
    pub fn new(config: &OsmConfig) -> Result<Self, reqwest::Error> {
        Self::from_builder(reqwest::Client::builder(), config)
    }

    pub fn from_builder(
        builder: reqwest::ClientBuilder,
        config: &OsmConfig,
    ) -> Result<Self, reqwest::Error> {
        let client = builder
            .user_agent(USER_AGENT)
            .connect_timeout(config.connect_timeout)
            .read_timeout(config.read_timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn node_url(&self, node_id: u64) -> String {
        format!("{}/node/{}", self.base_url, node_id)
    }

    async fn get_xml(&self, node_id: u64) -> Result<String, NodeLookupError> {
        let url = self.node_url(node_id);
        info!("Fetching OSM node {} from {}", node_id, url);

        let response = self
            .client
            .get(&url)
            .header(ACCEPT, "application/xml, text/xml")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NodeLookupError::Status(status));
        }

        let body = response.text().await?;
        if body.is_empty() {
            return Err(NodeLookupError::EmptyBody);
        }
        debug!("Received {} bytes for OSM node {}", body.len(), node_id);
        Ok(body)
    }
}

impl NodeSource for OsmClient {
    async fn fetch_node(&self, node_id: u64) -> Result<String, PosError> {
        self.get_xml(node_id).await.map_err(|cause| {
            warn!("Could not fetch OSM node {}: {}", node_id, cause);
            PosError::node_not_found(node_id, cause)
        })
    }
}
