//! # Pub/Sub API requests
//!
//! Topics and subscriptions are created with a PUT on their own name;
//! verbs like publish, pull and acknowledge are POSTs on `name:verb`.

use anyhow::Result;
use reqwest::Url;
use serde_json::Value;

use crate::api;
use crate::api::pubsub::types::*;
use crate::resource::{Api, ReleaseTrack, ResourceRef};

fn api_base() -> String {
    // Pub/Sub only publishes v1; release tracks do not change it.
    Api::Pubsub.base_url(ReleaseTrack::default())
}

fn resource_url(resource: &ResourceRef) -> Result<Url> {
    Ok(Url::parse(&resource.self_link(ReleaseTrack::default()))?)
}

fn verb_url(resource: &ResourceRef, verb: &str) -> Result<Url> {
    Ok(Url::parse(&format!(
        "{}:{verb}",
        resource.self_link(ReleaseTrack::default())
    ))?)
}

pub async fn create_topic(topic: &ResourceRef, request: &TopicRequest) -> Result<Topic> {
    api::put_json(resource_url(topic)?, request).await
}

/// Fetches one topic. Raw resource for `describe`.
pub async fn get_topic(topic: &ResourceRef) -> Result<Value> {
    api::get_json(resource_url(topic)?).await
}

pub async fn delete_topic(topic: &ResourceRef) -> Result<()> {
    api::delete_empty(resource_url(topic)?).await
}

/// Lists the project's topics, following pagination.
pub async fn list_topics(project: &str) -> Result<Vec<Topic>> {
    let base = format!("{}/projects/{project}/topics", api_base());
    let mut topics = Vec::new();
    let mut page_token: Option<String> = None;
    loop {
        let mut pairs: Vec<(&str, &str)> = Vec::new();
        if let Some(token) = &page_token {
            pairs.push(("pageToken", token));
        }
        let page: TopicListResponse = api::get_json(api::url_with_query(&base, &pairs)?).await?;
        topics.extend(page.topics);
        page_token = page.next_page_token;
        if page_token.is_none() {
            break;
        }
    }
    Ok(topics)
}

pub async fn publish(topic: &ResourceRef, messages: Vec<PubsubMessage>) -> Result<PublishResponse> {
    api::post_json(verb_url(topic, "publish")?, &PublishRequest { messages }).await
}

pub async fn create_subscription(
    subscription: &ResourceRef,
    request: &SubscriptionRequest,
) -> Result<Subscription> {
    api::put_json(resource_url(subscription)?, request).await
}

/// Fetches one subscription. Raw resource for `describe`.
pub async fn get_subscription(subscription: &ResourceRef) -> Result<Value> {
    api::get_json(resource_url(subscription)?).await
}

pub async fn delete_subscription(subscription: &ResourceRef) -> Result<()> {
    api::delete_empty(resource_url(subscription)?).await
}

/// Lists the project's subscriptions, following pagination.
pub async fn list_subscriptions(project: &str) -> Result<Vec<Subscription>> {
    let base = format!("{}/projects/{project}/subscriptions", api_base());
    let mut subscriptions = Vec::new();
    let mut page_token: Option<String> = None;
    loop {
        let mut pairs: Vec<(&str, &str)> = Vec::new();
        if let Some(token) = &page_token {
            pairs.push(("pageToken", token));
        }
        let page: SubscriptionListResponse =
            api::get_json(api::url_with_query(&base, &pairs)?).await?;
        subscriptions.extend(page.subscriptions);
        page_token = page.next_page_token;
        if page_token.is_none() {
            break;
        }
    }
    Ok(subscriptions)
}

/// Pulls up to `max_messages` without waiting for more to arrive.
pub async fn pull(subscription: &ResourceRef, max_messages: u32) -> Result<Vec<ReceivedMessage>> {
    let response: PullResponse = api::post_json(
        verb_url(subscription, "pull")?,
        &PullRequest { max_messages },
    )
    .await?;
    Ok(response.received_messages)
}

pub async fn acknowledge(subscription: &ResourceRef, ack_ids: Vec<String>) -> Result<()> {
    let _: Value = api::post_json(
        verb_url(subscription, "acknowledge")?,
        &AcknowledgeRequest { ack_ids },
    )
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{PUBSUB_TOPICS, RefResolver};

    #[test]
    fn verb_urls_append_to_the_resource_name() {
        let topic = RefResolver::new(&PUBSUB_TOPICS)
            .parse("projects/p/topics/alerts")
            .unwrap();
        assert_eq!(
            verb_url(&topic, "publish").unwrap().as_str(),
            "https://pubsub.googleapis.com/v1/projects/p/topics/alerts:publish"
        );
    }
}
