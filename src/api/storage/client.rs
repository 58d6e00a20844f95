//! # Storage API requests
//!
//! Listing, reading, writing and deleting objects and buckets. Object names
//! may contain any character including `/`, so they are percent-encoded into
//! a single path segment wherever they appear in a URL.

use anyhow::{Context, Result, bail};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use reqwest::Url;
use serde_json::Value;

use crate::api;
use crate::api::storage::types::*;
use crate::resource::{Api, ReleaseTrack};

/// Media uploads go through a dedicated URL space.
const UPLOAD_BASE: &str = "https://storage.googleapis.com/upload/storage/v1";

fn api_base() -> String {
    // The JSON API only publishes v1; release tracks do not change it.
    Api::Storage.base_url(ReleaseTrack::default())
}

/// Parses a storage URL (`gs://bucket/object/path`) into bucket and object
/// path. The path may be empty or a prefix; `gs://bucket` alone is valid.
pub fn parse_gs_url(s: &str) -> Result<(String, String)> {
    let rest = s
        .strip_prefix("gs://")
        .with_context(|| format!("[{s}] is not a storage URL (expected gs://bucket/path)"))?;
    let (bucket, path) = match rest.split_once('/') {
        Some((bucket, path)) => (bucket.to_string(), path.to_string()),
        None => (rest.to_string(), String::new()),
    };
    if bucket.is_empty() {
        bail!("[{s}] has no bucket name");
    }
    Ok((bucket, path))
}

/// Percent-encodes an object name as a single path segment, so `/` inside
/// the name survives the trip.
pub fn percent_encode(name: &str) -> String {
    let mut out = String::with_capacity(name.len() * 3);
    for b in name.as_bytes() {
        let c = *b as char;
        if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~') {
            out.push(c);
        } else {
            out.push('%');
            out.push_str(&format!("{:02X}", b));
        }
    }
    out
}

fn object_url(bucket: &str, object: &str) -> String {
    format!("{}/b/{}/o/{}", api_base(), bucket, percent_encode(object))
}

/// Lists objects under a prefix, following pagination. With a delimiter the
/// response also carries the "directories" directly under the prefix.
pub async fn list_objects(
    bucket: &str,
    prefix: &str,
    delimiter: Option<&str>,
) -> Result<(Vec<String>, Vec<Object>)> {
    let base = format!("{}/b/{}/o", api_base(), bucket);
    let mut prefixes = Vec::new();
    let mut objects = Vec::new();
    let mut page_token: Option<String> = None;
    loop {
        let mut pairs: Vec<(&str, &str)> = Vec::new();
        if !prefix.is_empty() {
            pairs.push(("prefix", prefix));
        }
        if let Some(delimiter) = delimiter {
            pairs.push(("delimiter", delimiter));
        }
        if let Some(token) = &page_token {
            pairs.push(("pageToken", token));
        }
        let page: ObjectListResponse =
            api::get_json(api::url_with_query(&base, &pairs)?).await?;
        prefixes.extend(page.prefixes);
        objects.extend(page.items);
        page_token = page.next_page_token;
        if page_token.is_none() {
            break;
        }
    }
    prefixes.sort();
    objects.sort_by(|a, b| a.name.cmp(&b.name));
    Ok((prefixes, objects))
}

/// Fetches one object's metadata.
pub async fn get_object(bucket: &str, object: &str) -> Result<Object> {
    api::get_json(Url::parse(&object_url(bucket, object))?).await
}

/// Downloads an object's content.
pub async fn download_object(bucket: &str, object: &str) -> Result<Vec<u8>> {
    let url = format!("{}?alt=media", object_url(bucket, object));
    api::get_bytes(Url::parse(&url)?).await
}

/// Checks downloaded bytes against the metadata's MD5, when the server
/// recorded one (composite objects have none).
pub fn verify_md5(data: &[u8], object: &Object) -> Result<()> {
    let Some(expected) = &object.md5_hash else {
        return Ok(());
    };
    let actual = BASE64.encode(md5::compute(data).0);
    if &actual != expected {
        bail!(
            "download of [{}] is corrupt: md5 mismatch (got {actual}, want {expected})",
            object.name
        );
    }
    Ok(())
}

/// Uploads data as a new object in one shot.
pub async fn upload_object(
    bucket: &str,
    name: &str,
    data: Vec<u8>,
    content_type: &str,
) -> Result<Object> {
    let base = format!("{UPLOAD_BASE}/b/{bucket}/o");
    let url = api::url_with_query(&base, &[("uploadType", "media"), ("name", name)])?;
    api::post_bytes(url, data, content_type).await
}

pub async fn delete_object(bucket: &str, object: &str) -> Result<()> {
    api::delete_empty(Url::parse(&object_url(bucket, object))?).await
}

/// Lists the project's buckets, following pagination.
pub async fn list_buckets(project: &str) -> Result<Vec<Bucket>> {
    let base = format!("{}/b", api_base());
    let mut buckets = Vec::new();
    let mut page_token: Option<String> = None;
    loop {
        let mut pairs: Vec<(&str, &str)> = vec![("project", project)];
        if let Some(token) = &page_token {
            pairs.push(("pageToken", token));
        }
        let page: BucketListResponse =
            api::get_json(api::url_with_query(&base, &pairs)?).await?;
        buckets.extend(page.items);
        page_token = page.next_page_token;
        if page_token.is_none() {
            break;
        }
    }
    buckets.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(buckets)
}

/// Fetches one bucket. Raw resource for `describe`.
pub async fn get_bucket(bucket: &str) -> Result<Value> {
    let url = format!("{}/b/{}", api_base(), bucket);
    api::get_json(Url::parse(&url)?).await
}

pub async fn create_bucket(project: &str, request: &BucketRequest) -> Result<Bucket> {
    let base = format!("{}/b", api_base());
    let url = api::url_with_query(&base, &[("project", project)])?;
    api::post_json(url, request).await
}

/// Deletes a bucket; the server refuses unless it is empty.
pub async fn delete_bucket(bucket: &str) -> Result<()> {
    let url = format!("{}/b/{}", api_base(), bucket);
    api::delete_empty(Url::parse(&url)?).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_gs_urls() {
        assert_eq!(
            parse_gs_url("gs://my-bucket/path/to/obj").unwrap(),
            ("my-bucket".to_string(), "path/to/obj".to_string())
        );
        assert_eq!(
            parse_gs_url("gs://my-bucket").unwrap(),
            ("my-bucket".to_string(), String::new())
        );
        assert_eq!(
            parse_gs_url("gs://my-bucket/").unwrap(),
            ("my-bucket".to_string(), String::new())
        );
        assert!(parse_gs_url("s3://bucket/x").is_err());
        assert!(parse_gs_url("gs:///no-bucket").is_err());
    }

    #[test]
    fn encodes_object_names_as_one_segment() {
        assert_eq!(percent_encode("logs/2026/app.log"), "logs%2F2026%2Fapp.log");
        assert_eq!(percent_encode("plain-name_1.txt"), "plain-name_1.txt");
        assert_eq!(percent_encode("a b+c"), "a%20b%2Bc");
        assert_eq!(
            object_url("b1", "x/y"),
            "https://storage.googleapis.com/storage/v1/b/b1/o/x%2Fy"
        );
    }

    #[test]
    fn verifies_md5() {
        let object = Object {
            name: "f.txt".to_string(),
            bucket: None,
            size: Some("11".to_string()),
            updated: None,
            content_type: None,
            storage_class: None,
            // md5 of "hello world"
            md5_hash: Some("XrY7u+Ae7tCTyyK7j1rNww==".to_string()),
            crc32c: None,
            generation: None,
            metageneration: None,
            etag: None,
        };
        assert!(verify_md5(b"hello world", &object).is_ok());
        let err = verify_md5(b"hello w0rld", &object).unwrap_err();
        assert!(err.to_string().contains("md5 mismatch"), "{err}");

        let mut no_hash = object;
        no_hash.md5_hash = None;
        assert!(verify_md5(b"anything", &no_hash).is_ok());
    }

    /// Requires credentials and a reachable bucket.
    #[tokio::test]
    #[ignore]
    async fn lists_a_real_bucket() {
        let (prefixes, objects) = list_objects("gcp-public-data-landsat", "", Some("/"))
            .await
            .unwrap();
        assert!(!prefixes.is_empty() || !objects.is_empty());
    }
}
