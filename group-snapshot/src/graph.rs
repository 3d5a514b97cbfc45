#![doc = "Directory client over the Microsoft Graph REST API, authenticated with client credentials."]
//
//! # GraphClient
//!
//! Implements [`DirectoryClient`] for the Graph `v1.0` endpoints the snapshot needs:
//! `/groups`, `/groups/{id}`, `/groups/{id}/owners`, `/groups/{id}/members/{cast}`,
//! `/groups/{id}/memberOf` and `/users`.
//!
//! - The app-only token is fetched once and cached on the client until shortly before expiry.
//! - Collections are followed through `@odata.nextLink` until exhausted.
//! - A 404, or a first page without `value`, is reported as an absent payload (`Ok(None)`).
//! - [`DirectoryQuery`] projections become `$select`/`$top`, and eventual consistency becomes
//!   the `ConsistencyLevel` header.

use async_trait::async_trait;
use group_snapshot_core::contract::DirectoryClient;
use group_snapshot_core::error::DirectoryError;
use group_snapshot_core::model::{DirectoryUser, Group, GroupMembership, Principal};
use group_snapshot_core::query::DirectoryQuery;
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::load_config::{DirectorySettings, Secret};

pub const GRAPH_DEFAULT_SCOPE: &str = "https://graph.microsoft.com/.default";
const CONSISTENCY_HEADER: &str = "ConsistencyLevel";
/// Tokens this close to expiry are refreshed instead of reused.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);
/// Lifetime assumed when the token endpoint omits `expires_in`.
const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(300);

pub struct GraphClient {
    http: reqwest::Client,
    base_url: Url,
    token_url: String,
    client_id: String,
    client_secret: Secret,
    token: Mutex<Option<AccessToken>>,
}

struct AccessToken {
    value: String,
    expires_at: Instant,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Deserialize)]
struct Page<T> {
    value: Option<Vec<T>>,
    #[serde(rename = "@odata.nextLink", default)]
    next_link: Option<String>,
}

impl GraphClient {
    pub fn new(settings: &DirectorySettings) -> Result<Self, DirectoryError> {
        let base_url = Url::parse(&settings.graph_base_url).map_err(|e| {
            DirectoryError::Transport {
                message: format!("invalid graph base url {}: {e}", settings.graph_base_url),
            }
        })?;
        let token_url = format!(
            "{}/{}/oauth2/v2.0/token",
            settings.authority.trim_end_matches('/'),
            settings.tenant_id
        );
        tracing::info!(
            graph_base_url = %base_url,
            client_id = %settings.client_id,
            client_secret_set = !settings.client_secret.expose().is_empty(),
            "Initialized GraphClient"
        );
        Ok(GraphClient {
            http: reqwest::Client::new(),
            base_url,
            token_url,
            client_id: settings.client_id.clone(),
            client_secret: settings.client_secret.clone(),
            token: Mutex::new(None),
        })
    }

    /// Returns a cached token or exchanges the client credentials for a new one.
    pub async fn access_token(&self) -> Result<String, DirectoryError> {
        let mut guard = self.token.lock().await;
        if let Some(token) = guard.as_ref() {
            if token.expires_at > Instant::now() + TOKEN_REFRESH_MARGIN {
                return Ok(token.value.clone());
            }
        }

        tracing::info!(token_url = %self.token_url, "Requesting app-only access token");
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose()),
            ("scope", GRAPH_DEFAULT_SCOPE),
        ];
        let response = self
            .http
            .post(&self.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| DirectoryError::Authentication {
                message: format!("token request failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, "Token endpoint rejected client credentials");
            return Err(DirectoryError::Authentication {
                message: format!("token endpoint returned {status}: {body}"),
            });
        }
        let token: TokenResponse =
            response
                .json()
                .await
                .map_err(|e| DirectoryError::Authentication {
                    message: format!("malformed token response: {e}"),
                })?;

        let lifetime = token
            .expires_in
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TOKEN_LIFETIME);
        let value = token.access_token;
        *guard = Some(AccessToken {
            value: value.clone(),
            expires_at: Instant::now() + lifetime,
        });
        tracing::info!(expires_in_secs = lifetime.as_secs(), "Acquired access token");
        Ok(value)
    }

    fn resource_url(
        &self,
        segments: &[&str],
        query: &DirectoryQuery,
    ) -> Result<Url, DirectoryError> {
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| DirectoryError::Transport {
                    message: format!("graph base url cannot be a base: {}", self.base_url),
                })?;
            path.pop_if_empty().extend(segments);
            if let Some(object_type) = query.of_type {
                path.push(object_type.cast_segment());
            }
        }
        let pairs = query.query_pairs();
        if !pairs.is_empty() {
            let mut q = url.query_pairs_mut();
            for (key, value) in &pairs {
                q.append_pair(key, value);
            }
        }
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        query: &DirectoryQuery,
    ) -> Result<Option<T>, DirectoryError> {
        let token = self.access_token().await?;
        let mut request = self
            .http
            .get(url.clone())
            .bearer_auth(token)
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(level) = query.consistency.header_value() {
            request = request.header(CONSISTENCY_HEADER, level);
        }

        let response = request.send().await.map_err(|e| DirectoryError::Transport {
            message: format!("GET {url} failed: {e}"),
        })?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            tracing::warn!(url = %url, "Directory resource not found");
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, url = %url, "Directory request failed");
            return Err(DirectoryError::Status {
                status: status.as_u16(),
                url: url.to_string(),
                body,
            });
        }
        let value = response
            .json::<T>()
            .await
            .map_err(|e| DirectoryError::Decode {
                message: format!("{url}: {e}"),
            })?;
        Ok(Some(value))
    }

    /// Reads every page of a collection.
    ///
    /// `None` when any page, first or later, is missing or carries no `value`: a collection is
    /// returned whole or not at all.
    async fn get_collection<T: DeserializeOwned>(
        &self,
        url: Url,
        query: &DirectoryQuery,
    ) -> Result<Option<Vec<T>>, DirectoryError> {
        let mut items: Vec<T> = Vec::new();
        let mut next = Some(url);
        let mut pages = 0usize;

        while let Some(url) = next.take() {
            let page = match self.get_json::<Page<T>>(url.clone(), query).await? {
                Some(page) => page,
                None => {
                    warn_absent_page(&url, pages);
                    return Ok(None);
                }
            };
            let Some(value) = page.value else {
                warn_absent_page(&url, pages);
                return Ok(None);
            };
            pages += 1;
            items.extend(value);
            next = match page.next_link {
                Some(link) => Some(self.next_page_url(&link)?),
                None => None,
            };
        }

        tracing::debug!(pages, items = items.len(), "Collection read complete");
        Ok(Some(items))
    }

    /// Parses an `@odata.nextLink`, refusing links that leave the configured Graph origin so
    /// the bearer token is never sent elsewhere.
    fn next_page_url(&self, link: &str) -> Result<Url, DirectoryError> {
        let url = Url::parse(link).map_err(|e| DirectoryError::Decode {
            message: format!("invalid @odata.nextLink {link}: {e}"),
        })?;
        if url.origin() != self.base_url.origin() {
            tracing::error!(next_link = %link, "Refusing @odata.nextLink outside the Graph origin");
            return Err(DirectoryError::Decode {
                message: format!("@odata.nextLink {link} points outside {}", self.base_url),
            });
        }
        Ok(url)
    }
}

fn warn_absent_page(url: &Url, pages_read: usize) {
    tracing::warn!(url = %url, pages_read, "Collection page carried no payload");
}

#[async_trait]
impl DirectoryClient for GraphClient {
    async fn authenticate(&self) -> Result<(), DirectoryError> {
        self.access_token().await.map(|_| ())
    }

    async fn list_groups(
        &self,
        query: &DirectoryQuery,
    ) -> Result<Option<Vec<Group>>, DirectoryError> {
        tracing::info!("Listing groups");
        let url = self.resource_url(&["groups"], query)?;
        self.get_collection(url, query).await
    }

    async fn get_group(
        &self,
        group_id: &str,
        query: &DirectoryQuery,
    ) -> Result<Option<Group>, DirectoryError> {
        tracing::debug!(group_id, "Fetching group properties");
        let url = self.resource_url(&["groups", group_id], query)?;
        self.get_json(url, query).await
    }

    async fn list_owners(
        &self,
        group_id: &str,
        query: &DirectoryQuery,
    ) -> Result<Option<Vec<Principal>>, DirectoryError> {
        tracing::debug!(group_id, "Listing group owners");
        let url = self.resource_url(&["groups", group_id, "owners"], query)?;
        self.get_collection(url, query).await
    }

    async fn list_members(
        &self,
        group_id: &str,
        query: &DirectoryQuery,
    ) -> Result<Option<Vec<Principal>>, DirectoryError> {
        tracing::debug!(group_id, "Listing group members");
        let url = self.resource_url(&["groups", group_id, "members"], query)?;
        self.get_collection(url, query).await
    }

    async fn list_group_memberships(
        &self,
        group_id: &str,
        query: &DirectoryQuery,
    ) -> Result<Option<Vec<GroupMembership>>, DirectoryError> {
        tracing::debug!(group_id, "Listing group memberships");
        let url = self.resource_url(&["groups", group_id, "memberOf"], query)?;
        self.get_collection(url, query).await
    }

    async fn list_users(
        &self,
        query: &DirectoryQuery,
    ) -> Result<Option<Vec<DirectoryUser>>, DirectoryError> {
        tracing::info!("Listing users");
        let url = self.resource_url(&["users"], query)?;
        self.get_collection(url, query).await
    }
}
