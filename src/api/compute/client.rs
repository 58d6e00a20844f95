//! # Compute API requests
//!
//! Thin wrappers over the instances and operations endpoints. Callers hand
//! in resolved [`ResourceRef`]s; URL building stays in one place here.

use anyhow::Result;
use reqwest::Url;
use serde_json::Value;

use crate::api;
use crate::api::compute::types::*;
use crate::operations::{Operation, OperationScope};
use crate::resource::{Api, ReleaseTrack, ResourceRef};

fn api_base(track: ReleaseTrack) -> String {
    Api::Compute.base_url(track)
}

/// Lists instances in one zone, following pagination.
pub async fn list_instances(
    track: ReleaseTrack,
    project: &str,
    zone: &str,
    filter: Option<&str>,
) -> Result<Vec<Instance>> {
    let base = format!("{}/projects/{project}/zones/{zone}/instances", api_base(track));
    let mut items = Vec::new();
    let mut page_token: Option<String> = None;
    loop {
        let mut pairs: Vec<(&str, &str)> = Vec::new();
        if let Some(filter) = filter {
            pairs.push(("filter", filter));
        }
        if let Some(token) = &page_token {
            pairs.push(("pageToken", token));
        }
        let page: InstanceListResponse =
            api::get_json(api::url_with_query(&base, &pairs)?).await?;
        items.extend(page.items);
        page_token = page.next_page_token;
        if page_token.is_none() {
            break;
        }
    }
    Ok(items)
}

/// Lists instances across every zone of the project in one call.
pub async fn aggregated_list_instances(
    track: ReleaseTrack,
    project: &str,
    filter: Option<&str>,
) -> Result<Vec<Instance>> {
    let base = format!("{}/projects/{project}/aggregated/instances", api_base(track));
    let mut items = Vec::new();
    let mut page_token: Option<String> = None;
    loop {
        let mut pairs: Vec<(&str, &str)> = Vec::new();
        if let Some(filter) = filter {
            pairs.push(("filter", filter));
        }
        if let Some(token) = &page_token {
            pairs.push(("pageToken", token));
        }
        let page: InstanceAggregatedListResponse =
            api::get_json(api::url_with_query(&base, &pairs)?).await?;
        for scoped in page.items.into_values() {
            items.extend(scoped.instances);
        }
        page_token = page.next_page_token;
        if page_token.is_none() {
            break;
        }
    }
    Ok(items)
}

/// Fetches one instance. Returns the raw resource so `describe` shows
/// exactly what the server sent.
pub async fn get_instance(track: ReleaseTrack, instance: &ResourceRef) -> Result<Value> {
    api::get_json(Url::parse(&instance.self_link(track))?).await
}

pub async fn insert_instance(
    track: ReleaseTrack,
    project: &str,
    zone: &str,
    request: &InstanceRequest,
) -> Result<Operation> {
    let url = format!("{}/projects/{project}/zones/{zone}/instances", api_base(track));
    api::post_json(Url::parse(&url)?, request).await
}

pub async fn delete_instance(track: ReleaseTrack, instance: &ResourceRef) -> Result<Operation> {
    api::delete_json(Url::parse(&instance.self_link(track))?).await
}

pub async fn start_instance(track: ReleaseTrack, instance: &ResourceRef) -> Result<Operation> {
    let url = format!("{}/start", instance.self_link(track));
    api::post_empty(Url::parse(&url)?).await
}

pub async fn stop_instance(track: ReleaseTrack, instance: &ResourceRef) -> Result<Operation> {
    let url = format!("{}/stop", instance.self_link(track));
    api::post_empty(Url::parse(&url)?).await
}

pub async fn get_operation(track: ReleaseTrack, operation: &ResourceRef) -> Result<Operation> {
    api::get_json(Url::parse(&operation.self_link(track))?).await
}

/// Lists operations in one scope, following pagination.
pub async fn list_operations(
    track: ReleaseTrack,
    project: &str,
    scope: &OperationScope,
) -> Result<Vec<Operation>> {
    let base = match scope {
        OperationScope::Zone(zone) => {
            format!("{}/projects/{project}/zones/{zone}/operations", api_base(track))
        }
        OperationScope::Region(region) => format!(
            "{}/projects/{project}/regions/{region}/operations",
            api_base(track)
        ),
        OperationScope::Global => {
            format!("{}/projects/{project}/global/operations", api_base(track))
        }
    };
    let mut items = Vec::new();
    let mut page_token: Option<String> = None;
    loop {
        let mut pairs: Vec<(&str, &str)> = Vec::new();
        if let Some(token) = &page_token {
            pairs.push(("pageToken", token));
        }
        let page: OperationListResponse =
            api::get_json(api::url_with_query(&base, &pairs)?).await?;
        items.extend(page.items);
        page_token = page.next_page_token;
        if page_token.is_none() {
            break;
        }
    }
    Ok(items)
}
