use crate::auth::CredentialProvider;
use crate::common::{ClientError, CredentialError, FactoryError};
use crate::config::Configuration;
use crate::execution::ExecutionContext;
use chrono::{DateTime, Utc};
use futures_util::Future;
use reqwest::Url;
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::task::JoinHandle;
use uuid::Uuid;

const COMPUTE_PROVIDER: &str = "Microsoft.Compute";
const REQUEST_ID_HEADER: &str = "x-ms-request-id";
/// Upper bound on pages followed by a single listing.
const MAX_PAGES: usize = 1000;

/// Who is responsible for shutting down a client's execution context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextOwnership {
    /// Created by the factory for this client alone.
    Dedicated,
    /// Supplied by the caller, who keeps ownership.
    Shared,
}

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    value: Vec<T>,
    #[serde(rename = "nextLink")]
    next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: String,
    #[serde(default)]
    message: String,
}

/// Handle to the compute management API.
///
/// Returned by the factory ready for use: it holds its configuration, its
/// execution context and a local HTTP client, and performs no network I/O
/// until a request is issued. Tokens are fetched lazily from the configured
/// credential provider.
#[derive(Debug)]
pub struct ComputeManagementClient {
    id: Uuid,
    config: Arc<Configuration>,
    context: ExecutionContext,
    ownership: ContextOwnership,
    http_client: reqwest::Client,
    created_at: DateTime<Utc>,
}

impl ComputeManagementClient {
    /// Builds the HTTP client for `config` without touching the network.
    pub(crate) fn http_client_for(config: &Configuration) -> Result<reqwest::Client, FactoryError> {
        let mut builder = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .user_agent(config.user_agent());
        if !config.system_proxy() {
            builder = builder.no_proxy();
        }
        builder
            .build()
            .map_err(|e| FactoryError::HttpClient(e.to_string()))
    }

    pub(crate) fn new(
        config: Arc<Configuration>,
        context: ExecutionContext,
        ownership: ContextOwnership,
        http_client: reqwest::Client,
    ) -> Self {
        let id = Uuid::new_v4();
        log::debug!(
            "Created compute management client {id} for {} on {ownership:?} context {}",
            config.endpoint(),
            context.id()
        );
        Self {
            id,
            config,
            context,
            ownership,
            http_client,
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn configuration(&self) -> &Arc<Configuration> {
        &self.config
    }

    pub fn execution_context(&self) -> &ExecutionContext {
        &self.context
    }

    pub fn ownership(&self) -> ContextOwnership {
        self.ownership
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// OAuth scope covering the configured management endpoint.
    pub fn management_scope(&self) -> Result<String, ClientError> {
        Ok(format!("{}/.default", self.endpoint_origin()?))
    }

    fn endpoint_origin(&self) -> Result<String, ClientError> {
        let url = self
            .config
            .endpoint_url()
            .map_err(|e| ClientError::InvalidPath(e.to_string()))?;
        Ok(url.origin().ascii_serialization())
    }

    /// Builds a subscription-scoped URL under the compute resource provider.
    ///
    /// `path` is relative to `providers/Microsoft.Compute`, e.g.
    /// `virtualMachines` or `locations/westeurope/vmSizes`. Segments are
    /// percent-encoded.
    ///
    /// # Errors
    ///
    /// [`ClientError::MissingSubscription`] when the configuration has no
    /// subscription id, [`ClientError::InvalidPath`] for empty paths or
    /// paths with `.`/`..` segments.
    pub fn resource_url(&self, path: &str) -> Result<String, ClientError> {
        let subscription = self
            .config
            .subscription_id()
            .ok_or(ClientError::MissingSubscription)?;

        let trimmed = path.trim().trim_matches('/');
        if trimmed.is_empty() {
            return Err(ClientError::InvalidPath("path is empty".to_string()));
        }

        let mut segments = Vec::new();
        for segment in trimmed.split('/') {
            if segment.is_empty() || segment == "." || segment == ".." {
                return Err(ClientError::InvalidPath(path.to_string()));
            }
            segments.push(urlencoding::encode(segment).into_owned());
        }

        Ok(format!(
            "{}/subscriptions/{}/providers/{}/{}?api-version={}",
            self.config.endpoint().trim().trim_end_matches('/'),
            urlencoding::encode(subscription),
            COMPUTE_PROVIDER,
            segments.join("/"),
            urlencoding::encode(self.config.api_version()),
        ))
    }

    /// Fetches a token and formats it for the `Authorization` header.
    pub async fn authorization_header(&self) -> Result<String, ClientError> {
        let scope = self.management_scope()?;
        let token = self.credential()?.get_token(&scope).await?;
        Ok(token.authorization_header())
    }

    /// Runs `future` on the client's execution context.
    pub fn spawn<F, T>(&self, future: F) -> JoinHandle<Option<T>>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        self.context.spawn(future)
    }

    /// GETs a compute resource and decodes it.
    ///
    /// The request runs on the client's execution context.
    pub async fn get_json<T>(&self, path: &str) -> Result<T, ClientError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let url = self.resource_url(path)?;
        let request = self.request_context()?;
        self.run(async move { request.get(&url).await }).await
    }

    /// GETs a compute resource collection, following `nextLink` pages.
    ///
    /// # Errors
    ///
    /// [`ClientError::Pagination`] when a `nextLink` leaves the configured
    /// endpoint's origin, revisits an earlier page or the listing exceeds
    /// the page limit.
    pub async fn list_json<T>(&self, path: &str) -> Result<Vec<T>, ClientError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let url = self.resource_url(path)?;
        let request = self.request_context()?;
        let origin = self.endpoint_origin()?;
        self.run(async move {
            let mut items = Vec::new();
            let mut visited = HashSet::new();
            let mut next = Some(url);
            while let Some(url) = next.take() {
                if !visited.insert(url.clone()) {
                    return Err(ClientError::Pagination(format!(
                        "nextLink {url} was already visited"
                    )));
                }
                if visited.len() > MAX_PAGES {
                    return Err(ClientError::Pagination(format!(
                        "more than {MAX_PAGES} pages"
                    )));
                }
                let page: ListResponse<T> = request.get(&url).await?;
                items.extend(page.value);
                next = match page.next_link.filter(|link| !link.trim().is_empty()) {
                    Some(link) => Some(same_origin_link(&link, &origin)?),
                    None => None,
                };
            }
            Ok(items)
        })
        .await
    }

    /// Shuts down the execution context when this client owns it.
    ///
    /// Shared contexts are left running for their owner.
    pub fn shutdown(self) {
        match self.ownership {
            ContextOwnership::Dedicated => self.context.shutdown(),
            ContextOwnership::Shared => {
                log::debug!("Client {} leaves shared context running", self.id)
            }
        }
    }

    fn credential(&self) -> Result<Arc<dyn CredentialProvider>, ClientError> {
        self.config.credential().cloned().ok_or_else(|| {
            ClientError::Credential(CredentialError::Unavailable(
                "no credential provider configured".to_string(),
            ))
        })
    }

    fn request_context(&self) -> Result<RequestContext, ClientError> {
        Ok(RequestContext {
            http_client: self.http_client.clone(),
            credential: self.credential()?,
            scope: self.management_scope()?,
        })
    }

    async fn run<F, T>(&self, future: F) -> Result<T, ClientError>
    where
        F: Future<Output = Result<T, ClientError>> + Send + 'static,
        T: Send + 'static,
    {
        match self.context.spawn(future).await {
            Ok(Some(result)) => result,
            Ok(None) => Err(ClientError::Cancelled),
            Err(e) => Err(ClientError::Request(format!("request task failed: {e}"))),
        }
    }
}

struct RequestContext {
    http_client: reqwest::Client,
    credential: Arc<dyn CredentialProvider>,
    scope: String,
}

impl RequestContext {
    async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T, ClientError> {
        let token = self.credential.get_token(&self.scope).await?;

        log::debug!("GET {url}");
        let response = self
            .http_client
            .get(url)
            .header(AUTHORIZATION, token.authorization_header())
            .send()
            .await
            .map_err(|e| ClientError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let request_id = response
                .headers()
                .get(REQUEST_ID_HEADER)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string);
            let body = response.text().await.unwrap_or_default();
            return Err(parse_api_error(status.as_u16(), &body, request_id));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))
    }
}

/// Accepts a `nextLink` only when it points at the configured endpoint, so
/// the bearer token is never sent to another host.
fn same_origin_link(link: &str, origin: &str) -> Result<String, ClientError> {
    let url = Url::parse(link.trim())
        .map_err(|e| ClientError::Pagination(format!("invalid nextLink '{link}': {e}")))?;
    let link_origin = url.origin().ascii_serialization();
    if link_origin != origin {
        log::warn!("Refusing nextLink to {link_origin}; expected {origin}");
        return Err(ClientError::Pagination(format!(
            "nextLink points to {link_origin}, outside {origin}"
        )));
    }
    Ok(url.into())
}

/// Maps a failed response to [`ClientError::Api`], reading the standard
/// `{"error": {"code", "message"}}` envelope when the body carries one.
pub fn parse_api_error(status: u16, body: &str, request_id: Option<String>) -> ClientError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => ClientError::Api {
            status,
            code: envelope.error.code,
            message: envelope.error.message,
            request_id,
        },
        Err(_) => ClientError::Api {
            status,
            code: format!("Http{status}"),
            message: body.trim().to_string(),
            request_id,
        },
    }
}
