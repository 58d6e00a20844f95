//! # Service API clients
//!
//! One submodule per service, plus the shared request plumbing: attach the
//! bearer token, send, turn non-success statuses into [`ApiError`], decode
//! the JSON body.

use anyhow::{Context, Result};
use reqwest::Url;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::auth::get_access_token;
use crate::client::CLIENT;
use crate::error::ApiError;

pub mod compute;
pub mod pubsub;
pub mod storage;

async fn send(req: reqwest::RequestBuilder) -> Result<reqwest::Response> {
    let token = get_access_token()
        .await
        .context("Failed to get access token")?;
    let res = req
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .map_err(ApiError::Transport)?;
    if res.status().is_success() {
        Ok(res)
    } else {
        Err(ApiError::from_response(res).await.into())
    }
}

async fn decode<T: DeserializeOwned>(res: reqwest::Response) -> Result<T> {
    let body = res.bytes().await.map_err(ApiError::Transport)?;
    serde_json::from_slice(&body).map_err(|e| {
        let snippet = String::from_utf8_lossy(&body[..body.len().min(200)]);
        ApiError::Malformed(format!("{e}: {snippet}")).into()
    })
}

pub(crate) async fn get_json<T: DeserializeOwned>(url: Url) -> Result<T> {
    debug!(%url, "GET");
    decode(send(CLIENT.get(url)).await?).await
}

/// GET returning the raw body, for media downloads.
pub(crate) async fn get_bytes(url: Url) -> Result<Vec<u8>> {
    debug!(%url, "GET (media)");
    let res = send(CLIENT.get(url)).await?;
    let bytes = res.bytes().await.map_err(ApiError::Transport)?;
    Ok(bytes.to_vec())
}

pub(crate) async fn post_json<B, T>(url: Url, body: &B) -> Result<T>
where
    B: Serialize + ?Sized,
    T: DeserializeOwned,
{
    debug!(%url, "POST");
    decode(send(CLIENT.post(url).json(body)).await?).await
}

/// POST with no body, for verb-style endpoints like `instances/.../start`.
pub(crate) async fn post_empty<T: DeserializeOwned>(url: Url) -> Result<T> {
    debug!(%url, "POST");
    decode(send(CLIENT.post(url)).await?).await
}

/// POST with a raw body, for media uploads.
pub(crate) async fn post_bytes<T: DeserializeOwned>(
    url: Url,
    data: Vec<u8>,
    content_type: &str,
) -> Result<T> {
    debug!(%url, bytes = data.len(), "POST (media)");
    let req = CLIENT
        .post(url)
        .header("Content-Type", content_type)
        .body(data);
    decode(send(req).await?).await
}

pub(crate) async fn put_json<B, T>(url: Url, body: &B) -> Result<T>
where
    B: Serialize + ?Sized,
    T: DeserializeOwned,
{
    debug!(%url, "PUT");
    decode(send(CLIENT.put(url).json(body)).await?).await
}

/// DELETE where the response body matters (compute answers with an
/// operation).
pub(crate) async fn delete_json<T: DeserializeOwned>(url: Url) -> Result<T> {
    debug!(%url, "DELETE");
    decode(send(CLIENT.delete(url)).await?).await
}

/// DELETE discarding the response body (storage answers 204, Pub/Sub `{}`).
pub(crate) async fn delete_empty(url: Url) -> Result<()> {
    debug!(%url, "DELETE");
    send(CLIENT.delete(url)).await?;
    Ok(())
}

/// Builds a URL with query pairs appended.
pub(crate) fn url_with_query(base: &str, pairs: &[(&str, &str)]) -> Result<Url> {
    let mut url = Url::parse(base)?;
    if !pairs.is_empty() {
        let mut qp = url.query_pairs_mut();
        for (key, value) in pairs {
            qp.append_pair(key, value);
        }
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_urls_with_queries() {
        let url = url_with_query("https://storage.googleapis.com/storage/v1/b/x/o", &[])
            .unwrap();
        assert_eq!(url.as_str(), "https://storage.googleapis.com/storage/v1/b/x/o");

        let url = url_with_query(
            "https://storage.googleapis.com/storage/v1/b/x/o",
            &[("prefix", "logs/2026 08/"), ("delimiter", "/")],
        )
        .unwrap();
        assert_eq!(
            url.as_str(),
            "https://storage.googleapis.com/storage/v1/b/x/o?prefix=logs%2F2026+08%2F&delimiter=%2F"
        );
    }
}
