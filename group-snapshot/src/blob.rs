//! Blob publisher over the Azure Blob Storage REST API.
//!
//! [`StorageAccount`] is parsed from a standard storage connection string (including the
//! `UseDevelopmentStorage=true` shorthand). [`BlobStorageClient`] overwrites one block blob per
//! call with a single `Put Blob` request, signed either with a SAS token from the connection
//! string or with a SharedKey signature over the account key.

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use group_snapshot_core::contract::{BlobPublisher, BlobTarget, PublishReceipt};
use group_snapshot_core::error::PublishError;
use hmac::{Hmac, Mac};
use reqwest::header::{CONTENT_TYPE, ETAG, LAST_MODIFIED};
use reqwest::Url;
use sha2::Sha256;
use std::collections::HashMap;

type HmacSha256 = Hmac<Sha256>;

pub const STORAGE_API_VERSION: &str = "2021-08-06";
const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

const DEV_ACCOUNT_NAME: &str = "devstoreaccount1";
const DEV_ACCOUNT_KEY: &str =
    "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";
const DEV_BLOB_ENDPOINT: &str = "http://127.0.0.1:10000/devstoreaccount1";

/// How requests to the account are authorized.
#[derive(Clone)]
pub enum StorageCredential {
    SharedKey(Vec<u8>),
    /// SAS query string, without the leading `?`.
    Sas(String),
}

impl std::fmt::Debug for StorageCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageCredential::SharedKey(_) => f.write_str("SharedKey(..)"),
            StorageCredential::Sas(_) => f.write_str("Sas(..)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StorageAccount {
    pub account_name: String,
    pub blob_endpoint: Url,
    pub credential: StorageCredential,
}

impl StorageAccount {
    pub fn from_connection_string(raw: &str) -> anyhow::Result<Self> {
        let parts: HashMap<String, String> = raw
            .split(';')
            .filter(|p| !p.trim().is_empty())
            .map(|p| {
                p.split_once('=')
                    .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
                    .ok_or_else(|| anyhow!("connection string segment without '=': {p:?}"))
            })
            .collect::<anyhow::Result<_>>()?;

        if parts
            .get("UseDevelopmentStorage")
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
        {
            return Ok(StorageAccount {
                account_name: DEV_ACCOUNT_NAME.to_string(),
                blob_endpoint: Url::parse(DEV_BLOB_ENDPOINT)?,
                credential: StorageCredential::SharedKey(STANDARD.decode(DEV_ACCOUNT_KEY)?),
            });
        }

        let account_name = parts
            .get("AccountName")
            .cloned()
            .ok_or_else(|| anyhow!("connection string is missing AccountName"))?;

        let blob_endpoint = match parts.get("BlobEndpoint") {
            Some(endpoint) => endpoint.clone(),
            None => {
                let protocol = parts
                    .get("DefaultEndpointsProtocol")
                    .map(String::as_str)
                    .unwrap_or("https");
                let suffix = parts
                    .get("EndpointSuffix")
                    .map(String::as_str)
                    .unwrap_or("core.windows.net");
                format!("{protocol}://{account_name}.blob.{suffix}")
            }
        };
        let blob_endpoint = Url::parse(&blob_endpoint)
            .with_context(|| format!("invalid blob endpoint {blob_endpoint}"))?;

        let credential = if let Some(sas) = parts.get("SharedAccessSignature") {
            StorageCredential::Sas(sas.trim_start_matches('?').to_string())
        } else if let Some(key) = parts.get("AccountKey") {
            StorageCredential::SharedKey(
                STANDARD
                    .decode(key)
                    .context("AccountKey is not valid base64")?,
            )
        } else {
            anyhow::bail!("connection string has neither AccountKey nor SharedAccessSignature");
        };

        Ok(StorageAccount {
            account_name,
            blob_endpoint,
            credential,
        })
    }

    pub fn blob_url(&self, target: &BlobTarget) -> Result<Url, PublishError> {
        let mut url = self.blob_endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| PublishError::Signing {
                message: format!("blob endpoint cannot be a base: {}", self.blob_endpoint),
            })?
            .pop_if_empty()
            .push(&target.container)
            .push(&target.blob_name);
        if let StorageCredential::Sas(sas) = &self.credential {
            url.set_query(Some(sas));
        }
        Ok(url)
    }
}

pub struct BlobStorageClient {
    http: reqwest::Client,
    account: StorageAccount,
}

impl BlobStorageClient {
    pub fn new(account: StorageAccount) -> Self {
        tracing::info!(
            account = %account.account_name,
            endpoint = %account.blob_endpoint,
            credential = ?account.credential,
            "Initialized BlobStorageClient"
        );
        BlobStorageClient {
            http: reqwest::Client::new(),
            account,
        }
    }

    pub fn from_connection_string(raw: &str) -> anyhow::Result<Self> {
        Ok(Self::new(StorageAccount::from_connection_string(raw)?))
    }
}

/// Canonical `Put Blob` string-to-sign for SharedKey authorization.
///
/// `ms_headers` must hold every `x-ms-*` header sent with the request.
pub fn put_blob_string_to_sign(
    account_name: &str,
    url: &Url,
    content_length: usize,
    content_type: &str,
    ms_headers: &[(&str, String)],
) -> String {
    let length = if content_length == 0 {
        String::new()
    } else {
        content_length.to_string()
    };
    let mut headers: Vec<(String, &str)> = ms_headers
        .iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), value.trim()))
        .collect();
    headers.sort();
    let canonical_headers: String = headers
        .iter()
        .map(|(name, value)| format!("{name}:{value}\n"))
        .collect();
    let canonical_resource = format!("/{}{}", account_name, url.path());

    // Verb, Content-Encoding, Content-Language, Content-Length, Content-MD5, Content-Type,
    // Date, If-Modified-Since, If-Match, If-None-Match, If-Unmodified-Since, Range.
    format!("PUT\n\n\n{length}\n\n{content_type}\n\n\n\n\n\n\n{canonical_headers}{canonical_resource}")
}

pub fn sign(key: &[u8], string_to_sign: &str) -> Result<String, PublishError> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|e| PublishError::Signing {
        message: format!("failed to initialize hmac: {e}"),
    })?;
    mac.update(string_to_sign.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

#[async_trait]
impl BlobPublisher for BlobStorageClient {
    async fn publish(
        &self,
        target: &BlobTarget,
        content: &str,
    ) -> Result<PublishReceipt, PublishError> {
        let url = self.account.blob_url(target)?;
        let body = content.as_bytes().to_vec();
        let ms_headers = vec![
            ("x-ms-blob-type", "BlockBlob".to_string()),
            (
                "x-ms-client-request-id",
                uuid::Uuid::new_v4().to_string(),
            ),
            (
                "x-ms-date",
                chrono::Utc::now()
                    .format("%a, %d %b %Y %H:%M:%S GMT")
                    .to_string(),
            ),
            ("x-ms-version", STORAGE_API_VERSION.to_string()),
        ];

        let mut request = self
            .http
            .put(url.clone())
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE);
        for (name, value) in &ms_headers {
            request = request.header(*name, value.as_str());
        }
        if let StorageCredential::SharedKey(key) = &self.account.credential {
            let string_to_sign = put_blob_string_to_sign(
                &self.account.account_name,
                &url,
                body.len(),
                JSON_CONTENT_TYPE,
                &ms_headers,
            );
            let signature = sign(key, &string_to_sign)?;
            request = request.header(
                reqwest::header::AUTHORIZATION,
                format!("SharedKey {}:{}", self.account.account_name, signature),
            );
        }

        tracing::info!(
            container = %target.container,
            blob = %target.blob_name,
            bytes = body.len(),
            "Uploading block blob"
        );
        let response = request
            .body(body)
            .send()
            .await
            .map_err(|e| PublishError::Transport {
                message: format!("PUT {} failed: {e}", url.path()),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, blob = %target.blob_name, "Blob upload rejected");
            return Err(PublishError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let header = |name: reqwest::header::HeaderName| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let receipt = PublishReceipt {
            etag: header(ETAG),
            last_modified: header(LAST_MODIFIED),
        };
        tracing::info!(etag = ?receipt.etag, "Blob overwritten");
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_account_key_connection_string() {
        let account = StorageAccount::from_connection_string(
            "DefaultEndpointsProtocol=https;AccountName=acme;AccountKey=a2V5;EndpointSuffix=core.windows.net",
        )
        .unwrap();
        assert_eq!(account.account_name, "acme");
        assert_eq!(account.blob_endpoint.as_str(), "https://acme.blob.core.windows.net/");
        assert!(matches!(account.credential, StorageCredential::SharedKey(ref k) if k == b"key"));
    }

    #[test]
    fn development_storage_uses_emulator_defaults() {
        let account = StorageAccount::from_connection_string("UseDevelopmentStorage=true").unwrap();
        assert_eq!(account.account_name, "devstoreaccount1");
        let url = account.blob_url(&BlobTarget::default()).unwrap();
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:10000/devstoreaccount1/mycontainer/PT1H.json"
        );
    }

    #[test]
    fn sas_connection_string_puts_token_in_query() {
        let err = StorageAccount::from_connection_string(
            "BlobEndpoint=https://acme.blob.core.windows.net/;SharedAccessSignature=?sv=2021-08-06&sig=abc%3D",
        )
        .unwrap_err();
        // AccountName is still required.
        assert!(err.to_string().contains("AccountName"));

        let account = StorageAccount::from_connection_string(
            "AccountName=acme;BlobEndpoint=https://acme.blob.core.windows.net/;SharedAccessSignature=?sv=2021-08-06&sig=abc%3D",
        )
        .unwrap();
        let url = account.blob_url(&BlobTarget::default()).unwrap();
        assert_eq!(
            url.as_str(),
            "https://acme.blob.core.windows.net/mycontainer/PT1H.json?sv=2021-08-06&sig=abc%3D"
        );
    }

    #[test]
    fn rejects_connection_string_without_credentials() {
        let err = StorageAccount::from_connection_string("AccountName=acme").unwrap_err();
        assert!(err.to_string().contains("AccountKey"));
    }

    #[test]
    fn string_to_sign_has_canonical_layout() {
        let url = Url::parse("https://acme.blob.core.windows.net/mycontainer/PT1H.json").unwrap();
        let s = put_blob_string_to_sign(
            "acme",
            &url,
            12,
            "application/json; charset=utf-8",
            &[
                ("x-ms-version", "2021-08-06".to_string()),
                ("x-ms-blob-type", "BlockBlob".to_string()),
                ("x-ms-date", "Mon, 01 Jan 2024 00:00:00 GMT".to_string()),
            ],
        );
        let expected = "PUT\n\n\n12\n\napplication/json; charset=utf-8\n\n\n\n\n\n\n\
x-ms-blob-type:BlockBlob\n\
x-ms-date:Mon, 01 Jan 2024 00:00:00 GMT\n\
x-ms-version:2021-08-06\n\
/acme/mycontainer/PT1H.json";
        assert_eq!(s, expected);
    }

    #[test]
    fn signature_is_base64_hmac() {
        let sig = sign(b"key", "payload").unwrap();
        assert_eq!(STANDARD.decode(&sig).unwrap().len(), 32);
        assert_eq!(sig, sign(b"key", "payload").unwrap());
        assert_ne!(sig, sign(b"other", "payload").unwrap());
    }
}
