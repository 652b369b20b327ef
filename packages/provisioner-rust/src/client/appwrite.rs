//! `reqwest` implementation of [`ControlPlane`] against the Appwrite REST API.

use async_trait::async_trait;
use focusflow_core::{AttributeKind, AttributeSpec, CollectionSpec, IndexSpec};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value as Json};
use tracing::debug;

use super::{AttributeStatus, CollectionSummary, ControlPlane, ControlPlaneError, UserSummary};
use crate::config::ClientConfig;

/// Page size for list endpoints.
const PAGE_SIZE: usize = 100;

/// Error body Appwrite returns with every non-2xx response.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default, rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct AttributeBody {
    status: String,
}

#[derive(Debug, Deserialize)]
struct CollectionPage {
    total: usize,
    collections: Vec<CollectionSummary>,
}

#[derive(Debug, Deserialize)]
struct UserPage {
    total: usize,
    users: Vec<UserSummary>,
}

/// Authenticated handle to an Appwrite project's server API.
///
/// Immutable after construction; no per-request timeout is configured, so a
/// hung call blocks its caller.
#[derive(Debug, Clone)]
pub struct AppwriteClient {
    http: Client,
    endpoint: String,
}

impl AppwriteClient {
    /// Builds a client that sends the project id and API key with every request.
    ///
    /// # Errors
    ///
    /// Returns [`ControlPlaneError::Transport`] if the credentials are not
    /// valid header values or the HTTP client cannot be built.
    pub fn connect(config: &ClientConfig) -> Result<Self, ControlPlaneError> {
        let header = |value: &str| {
            HeaderValue::from_str(value).map_err(|e| ControlPlaneError::Transport(e.to_string()))
        };
        let mut headers = HeaderMap::new();
        headers.insert("X-Appwrite-Project", header(&config.project_id)?);
        let mut key = header(config.api_key())?;
        key.set_sensitive(true);
        headers.insert("X-Appwrite-Key", key);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .default_headers(headers)
            .user_agent(concat!("focusflow-admin/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ControlPlaneError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        debug!(%method, path, "control-plane request");
        self.http.request(method, format!("{}{path}", self.endpoint))
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, ControlPlaneError> {
        let response = builder
            .send()
            .await
            .map_err(|e| ControlPlaneError::Transport(e.to_string()))?;
        check(response).await
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
    ) -> Result<T, ControlPlaneError> {
        self.send(builder)
            .await?
            .json::<T>()
            .await
            .map_err(|e| ControlPlaneError::Decode(e.to_string()))
    }

    async fn post(&self, path: &str, body: &Json) -> Result<(), ControlPlaneError> {
        self.send(self.request(Method::POST, path).json(body)).await?;
        Ok(())
    }
}

/// Maps a non-success response into the error taxonomy.
async fn check(response: Response) -> Result<Response, ControlPlaneError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let raw = response.text().await.unwrap_or_default();
    let body = serde_json::from_str::<ErrorBody>(&raw).unwrap_or(ErrorBody {
        message: raw,
        kind: String::new(),
    });
    if status == StatusCode::CONFLICT {
        Err(ControlPlaneError::Conflict {
            message: body.message,
        })
    } else {
        Err(ControlPlaneError::Remote {
            status: status.as_u16(),
            kind: body.kind,
            message: body.message,
        })
    }
}

/// `queries[]` parameters for one page of a list call.
fn page_queries(offset: usize) -> [(&'static str, String); 2] {
    [
        (
            "queries[]",
            json!({ "method": "limit", "values": [PAGE_SIZE] }).to_string(),
        ),
        (
            "queries[]",
            json!({ "method": "offset", "values": [offset] }).to_string(),
        ),
    ]
}

/// Route suffix and JSON body for an attribute creation call.
pub(crate) fn attribute_request(attribute: &AttributeSpec) -> (&'static str, Json) {
    let AttributeSpec {
        key,
        kind,
        required,
        array,
    } = attribute;
    let default = attribute.default_value().unwrap_or(Json::Null);
    let body = match kind {
        AttributeKind::String { size, .. } => json!({
            "key": key, "size": size, "required": required, "default": default, "array": array
        }),
        AttributeKind::Integer { min, max, .. } => json!({
            "key": key, "required": required, "min": min, "max": max,
            "default": default, "array": array
        }),
        AttributeKind::Boolean { .. } | AttributeKind::Datetime { .. } => json!({
            "key": key, "required": required, "default": default, "array": array
        }),
        AttributeKind::Enum { elements, .. } => json!({
            "key": key, "elements": elements, "required": required,
            "default": default, "array": array
        }),
    };
    (kind.type_name(), body)
}

pub(crate) fn collection_request(collection_id: &str, collection: &CollectionSpec) -> Json {
    let permissions: Vec<String> = collection
        .permissions
        .iter()
        .map(ToString::to_string)
        .collect();
    json!({
        "collectionId": collection_id,
        "name": collection.name,
        "permissions": permissions,
        "documentSecurity": collection.document_security,
        "enabled": collection.enabled
    })
}

pub(crate) fn index_request(index: &IndexSpec) -> Json {
    let orders: Vec<&str> = index.orders.iter().map(|o| o.as_str()).collect();
    json!({
        "key": index.key,
        "type": index.kind.as_str(),
        "attributes": index.attributes,
        "orders": orders
    })
}

#[async_trait]
impl ControlPlane for AppwriteClient {
    async fn create_database(&self, database_id: &str, name: &str) -> Result<(), ControlPlaneError> {
        self.post("/databases", &json!({ "databaseId": database_id, "name": name }))
            .await
    }

    async fn create_collection(
        &self,
        database_id: &str,
        collection_id: &str,
        collection: &CollectionSpec,
    ) -> Result<(), ControlPlaneError> {
        self.post(
            &format!("/databases/{database_id}/collections"),
            &collection_request(collection_id, collection),
        )
        .await
    }

    async fn create_attribute(
        &self,
        database_id: &str,
        collection_id: &str,
        attribute: &AttributeSpec,
    ) -> Result<(), ControlPlaneError> {
        let (route, body) = attribute_request(attribute);
        self.post(
            &format!("/databases/{database_id}/collections/{collection_id}/attributes/{route}"),
            &body,
        )
        .await
    }

    async fn attribute_status(
        &self,
        database_id: &str,
        collection_id: &str,
        key: &str,
    ) -> Result<AttributeStatus, ControlPlaneError> {
        let path = format!("/databases/{database_id}/collections/{collection_id}/attributes/{key}");
        let body: AttributeBody = self.send_json(self.request(Method::GET, &path)).await?;
        Ok(AttributeStatus::from(body.status.as_str()))
    }

    async fn create_index(
        &self,
        database_id: &str,
        collection_id: &str,
        index: &IndexSpec,
    ) -> Result<(), ControlPlaneError> {
        self.post(
            &format!("/databases/{database_id}/collections/{collection_id}/indexes"),
            &index_request(index),
        )
        .await
    }

    async fn list_collections(
        &self,
        database_id: &str,
    ) -> Result<Vec<CollectionSummary>, ControlPlaneError> {
        let path = format!("/databases/{database_id}/collections");
        let mut all = Vec::new();
        loop {
            let page: CollectionPage = self
                .send_json(self.request(Method::GET, &path).query(&page_queries(all.len())))
                .await?;
            let fetched = page.collections.len();
            all.extend(page.collections);
            if fetched == 0 || all.len() >= page.total {
                return Ok(all);
            }
        }
    }

    async fn list_users(&self) -> Result<Vec<UserSummary>, ControlPlaneError> {
        let mut all = Vec::new();
        loop {
            let page: UserPage = self
                .send_json(self.request(Method::GET, "/users").query(&page_queries(all.len())))
                .await?;
            let fetched = page.users.len();
            all.extend(page.users);
            if fetched == 0 || all.len() >= page.total {
                return Ok(all);
            }
        }
    }

    async fn delete_user(&self, user_id: &str) -> Result<(), ControlPlaneError> {
        self.send(self.request(Method::DELETE, &format!("/users/{user_id}")))
            .await?;
        Ok(())
    }
}
