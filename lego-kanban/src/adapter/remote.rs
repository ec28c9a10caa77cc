//! REST persistence adapter
//!
//! Maps store operations onto a collection endpoint:
//!
//! | operation            | request                                   |
//! |----------------------|-------------------------------------------|
//! | `fetch_items`        | `GET {base}`                              |
//! | `update_item_column` | `PATCH {base}/{id}` with `{field: column}` |
//! | `create_item`        | `POST {base}` with the item               |
//! | `update_item`        | `PUT {base}/{id}` with the item           |
//! | `delete_item`        | `DELETE {base}/{id}`                      |
//! | `reorder_items`      | `POST {base}/reorder`                     |

use super::PersistenceAdapter;
use crate::error::{KanbanError, Result};
use crate::types::{BoardItem, ColumnId, ColumnKey};
use async_trait::async_trait;
use lego_common::Pretty;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::marker::PhantomData;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_COLUMN_FIELD: &str = "status";

/// Settings for a [`RemoteAdapter`]
#[derive(Debug, Clone)]
pub struct RemoteAdapterConfig {
    /// Collection URL, e.g. `https://api.example.com/tasks`
    pub base_url: String,
    /// Item field that holds the column id
    pub column_field: String,
    pub timeout: Duration,
    /// Sent with every request
    pub headers: Vec<(String, String)>,
}

impl RemoteAdapterConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            column_field: DEFAULT_COLUMN_FIELD.to_string(),
            timeout: DEFAULT_TIMEOUT,
            headers: Vec::new(),
        }
    }

    pub fn with_column_field(mut self, field: impl Into<String>) -> Self {
        self.column_field = field.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Persists board items through a REST collection
pub struct RemoteAdapter<T, K = ColumnId> {
    client: Client,
    base_url: Url,
    column_field: String,
    _marker: PhantomData<fn() -> (T, K)>,
}

impl<T, K> std::fmt::Debug for RemoteAdapter<T, K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteAdapter")
            .field("base_url", &self.base_url.as_str())
            .field("column_field", &self.column_field)
            .finish()
    }
}

impl<T, K> RemoteAdapter<T, K> {
    pub fn new(config: RemoteAdapterConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| KanbanError::invalid_url(&config.base_url, e.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(KanbanError::invalid_url(
                &config.base_url,
                "URL cannot have path segments",
            ));
        }

        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let invalid = || KanbanError::InvalidHeader { name: name.clone() };
            let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
            let header_value = HeaderValue::from_str(value).map_err(|_| invalid())?;
            headers.insert(header_name, header_value);
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url,
            column_field: config.column_field,
            _marker: PhantomData,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `{base}/{segment}`, with the segment percent-encoded
    fn child_url(&self, segment: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| KanbanError::invalid_url(self.base_url.as_str(), "URL cannot have path segments"))?
            .pop_if_empty()
            .push(segment);
        Ok(url)
    }
}

/// Turn non-2xx responses into typed errors carrying the status
fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(KanbanError::Http {
            status: status.as_u16(),
            url: response.url().to_string(),
        })
    }
}

#[async_trait]
impl<T, K> PersistenceAdapter<T, K> for RemoteAdapter<T, K>
where
    T: BoardItem + Serialize + DeserializeOwned,
    K: ColumnKey + Serialize,
{
    #[instrument(skip(self), fields(url = %self.base_url))]
    async fn fetch_items(&self) -> Result<Vec<T>> {
        let response = self.client.get(self.base_url.clone()).send().await?;
        let items: Vec<T> = check_status(response)?.json().await?;
        debug!(count = items.len(), "fetched items");
        Ok(items)
    }

    #[instrument(skip(self))]
    async fn update_item_column(&self, item_id: &str, column: &K) -> Result<()> {
        let mut body = Map::new();
        body.insert(self.column_field.clone(), serde_json::to_value(column)?);
        let response = self
            .client
            .patch(self.child_url(item_id)?)
            .json(&Value::Object(body))
            .send()
            .await?;
        check_status(response)?;
        Ok(())
    }

    #[instrument(skip(self, item), fields(item_id = item.id()))]
    async fn create_item(&self, item: &T) -> Result<T> {
        let response = self
            .client
            .post(self.base_url.clone())
            .json(item)
            .send()
            .await?;
        Ok(check_status(response)?.json().await?)
    }

    #[instrument(skip(self))]
    async fn delete_item(&self, item_id: &str) -> Result<()> {
        let response = self.client.delete(self.child_url(item_id)?).send().await?;
        check_status(response)?;
        Ok(())
    }

    #[instrument(skip(self, item), fields(item_id = item.id()))]
    async fn update_item(&self, item: &T) -> Result<()> {
        let response = self
            .client
            .put(self.child_url(item.id())?)
            .json(item)
            .send()
            .await?;
        check_status(response)?;
        Ok(())
    }

    #[instrument(skip(self, item_ids), fields(count = item_ids.len()))]
    async fn reorder_items(&self, column: &K, item_ids: &[String]) -> Result<()> {
        let mut body = Map::new();
        body.insert(self.column_field.clone(), serde_json::to_value(column)?);
        body.insert("item_ids".to_string(), json!(item_ids));
        let body = Value::Object(body);
        debug!("reorder request: {}", Pretty(&body));
        let response = self
            .client
            .post(self.child_url("reorder")?)
            .json(&body)
            .send()
            .await?;
        check_status(response)?;
        Ok(())
    }
}
