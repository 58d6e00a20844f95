//! # Pub/Sub client
//!
//! Topic and subscription management plus the message verbs: publish, pull,
//! acknowledge.
//!
//! ## Submodules
//! - `client`: request functions for the topics and subscriptions endpoints.
//! - `types`: data structures serialized to and from the API.

pub mod client;
pub mod types;

pub use client::{
    acknowledge, create_subscription, create_topic, delete_subscription, delete_topic,
    get_subscription, get_topic, list_subscriptions, list_topics, publish, pull,
};
pub use types::*;
