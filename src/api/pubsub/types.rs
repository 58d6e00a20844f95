//! # Pub/Sub API data types
//!
//! Message payloads are base64 on the wire; [`PubsubMessage::from_text`]
//! and [`PubsubMessage::decoded_data`] do the conversion at the edges so
//! the rest of the code handles clear text.

use std::collections::HashMap;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topic {
    /// Full name, `projects/{p}/topics/{t}`.
    pub name: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub labels: HashMap<String, String>,
}

/// Request body for topic creation (a PUT on the topic name).
#[derive(Debug, Default, Serialize)]
pub struct TopicRequest {
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub labels: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub struct TopicListResponse {
    #[serde(default)]
    pub topics: Vec<Topic>,
    #[serde(rename = "nextPageToken")]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    /// Full name, `projects/{p}/subscriptions/{s}`.
    pub name: String,
    /// Full topic name, or `_deleted-topic_` once the topic is gone.
    pub topic: String,
    #[serde(rename = "ackDeadlineSeconds")]
    pub ack_deadline_seconds: Option<u32>,
    /// Duration string like `604800s`.
    #[serde(rename = "messageRetentionDuration")]
    pub message_retention_duration: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub labels: HashMap<String, String>,
}

/// Request body for subscription creation (a PUT on the subscription name).
#[derive(Debug, Serialize)]
pub struct SubscriptionRequest {
    pub topic: String,
    #[serde(rename = "ackDeadlineSeconds", skip_serializing_if = "Option::is_none")]
    pub ack_deadline_seconds: Option<u32>,
    #[serde(
        rename = "messageRetentionDuration",
        skip_serializing_if = "Option::is_none"
    )]
    pub message_retention_duration: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SubscriptionListResponse {
    #[serde(default)]
    pub subscriptions: Vec<Subscription>,
    #[serde(rename = "nextPageToken")]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PubsubMessage {
    /// Base64-encoded payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub attributes: HashMap<String, String>,
    #[serde(rename = "messageId", skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(rename = "publishTime", skip_serializing_if = "Option::is_none")]
    pub publish_time: Option<String>,
}

impl PubsubMessage {
    /// Builds an outgoing message from clear text.
    pub fn from_text(text: &str, attributes: HashMap<String, String>) -> PubsubMessage {
        PubsubMessage {
            data: Some(BASE64.encode(text.as_bytes())),
            attributes,
            message_id: None,
            publish_time: None,
        }
    }

    /// The decoded payload, when `data` is present and valid base64.
    pub fn decoded_data(&self) -> Option<Vec<u8>> {
        self.data.as_deref().and_then(|d| BASE64.decode(d).ok())
    }
}

#[derive(Debug, Serialize)]
pub struct PublishRequest {
    pub messages: Vec<PubsubMessage>,
}

#[derive(Debug, Deserialize)]
pub struct PublishResponse {
    #[serde(rename = "messageIds", default)]
    pub message_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct PullRequest {
    #[serde(rename = "maxMessages")]
    pub max_messages: u32,
}

#[derive(Debug, Deserialize)]
pub struct PullResponse {
    #[serde(rename = "receivedMessages", default)]
    pub received_messages: Vec<ReceivedMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReceivedMessage {
    #[serde(rename = "ackId")]
    pub ack_id: String,
    pub message: PubsubMessage,
}

#[derive(Debug, Serialize)]
pub struct AcknowledgeRequest {
    #[serde(rename = "ackIds")]
    pub ack_ids: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_text_round_trips_through_base64() {
        let msg = PubsubMessage::from_text("hello", HashMap::new());
        assert_eq!(msg.data.as_deref(), Some("aGVsbG8="));
        assert_eq!(msg.decoded_data().unwrap(), b"hello");

        let wire = serde_json::to_value(&msg).unwrap();
        assert_eq!(wire, serde_json::json!({"data": "aGVsbG8="}));
    }

    #[test]
    fn pull_response_decodes_messages() {
        let res: PullResponse = serde_json::from_value(serde_json::json!({
            "receivedMessages": [{
                "ackId": "ack-1",
                "message": {
                    "data": "aGVsbG8=",
                    "attributes": {"origin": "test"},
                    "messageId": "m1",
                    "publishTime": "2026-08-24T08:00:00Z"
                }
            }]
        }))
        .unwrap();
        let received = &res.received_messages[0];
        assert_eq!(received.ack_id, "ack-1");
        assert_eq!(received.message.decoded_data().unwrap(), b"hello");
        assert_eq!(received.message.attributes["origin"], "test");
    }

    #[test]
    fn list_responses_use_service_field_names() {
        let topics: TopicListResponse = serde_json::from_value(serde_json::json!({
            "topics": [{"name": "projects/p/topics/t"}]
        }))
        .unwrap();
        assert_eq!(topics.topics.len(), 1);

        let subs: SubscriptionListResponse = serde_json::from_value(serde_json::json!({
            "subscriptions": [{
                "name": "projects/p/subscriptions/s",
                "topic": "projects/p/topics/t",
                "ackDeadlineSeconds": 10
            }]
        }))
        .unwrap();
        assert_eq!(subs.subscriptions[0].ack_deadline_seconds, Some(10));
    }
}
