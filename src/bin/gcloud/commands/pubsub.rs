//! # `gcloud pubsub`
//!
//! Topic and subscription management plus the message path: publish to a
//! topic, pull from a subscription, acknowledge what was handled.

use std::collections::HashMap;

use anyhow::Result;
use clap::Subcommand;
use serde_json::json;

use gcloud::api::pubsub::{self, PubsubMessage, SubscriptionRequest, TopicRequest};
use gcloud::operations::last_segment;
use gcloud::resource::{PUBSUB_SUBSCRIPTIONS, PUBSUB_TOPICS, RefResolver, ResourceRef};

use crate::common::{Ctx, format_labels, parse_kv, parse_kv_map, print_json, print_table};

#[derive(Subcommand, Debug)]
pub enum PubsubCmd {
    /// Manage topics and publish messages
    #[command(subcommand)]
    Topics(TopicsCmd),
    /// Manage subscriptions and pull messages
    #[command(subcommand)]
    Subscriptions(SubscriptionsCmd),
}

#[derive(Subcommand, Debug)]
pub enum TopicsCmd {
    /// Create a topic
    Create {
        topic: String,
        /// Labels as `k1=v1,k2=v2`
        #[arg(long)]
        labels: Option<String>,
    },
    /// Delete a topic
    Delete { topic: String },
    /// List the project's topics
    List,
    /// Show one topic exactly as the API returns it
    Describe { topic: String },
    /// Publish a message to a topic
    Publish {
        topic: String,
        /// The message body
        #[arg(long)]
        message: String,
        /// An attribute as `KEY=VALUE`; repeatable
        #[arg(long = "attribute")]
        attributes: Vec<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum SubscriptionsCmd {
    /// Create a subscription to a topic
    Create {
        subscription: String,
        /// The topic to subscribe to
        #[arg(long)]
        topic: String,
        /// Ack deadline in seconds
        #[arg(long)]
        ack_deadline: Option<u32>,
        /// Retention as a duration string, e.g. `604800s`
        #[arg(long)]
        message_retention_duration: Option<String>,
    },
    /// Delete a subscription
    Delete { subscription: String },
    /// List the project's subscriptions
    List,
    /// Show one subscription exactly as the API returns it
    Describe { subscription: String },
    /// Pull messages from a subscription
    Pull {
        subscription: String,
        /// Maximum number of messages to pull
        #[arg(long, default_value_t = 1)]
        limit: u32,
        /// Acknowledge the pulled messages immediately
        #[arg(long)]
        auto_ack: bool,
    },
}

pub async fn run(ctx: &Ctx, cmd: PubsubCmd) -> Result<()> {
    match cmd {
        PubsubCmd::Topics(cmd) => topics(ctx, cmd).await,
        PubsubCmd::Subscriptions(cmd) => subscriptions(ctx, cmd).await,
    }
}

async fn topics(ctx: &Ctx, cmd: TopicsCmd) -> Result<()> {
    match cmd {
        TopicsCmd::Create { topic, labels } => {
            let topic = topic_ref(ctx, &topic)?;
            let labels = match &labels {
                Some(spec) => parse_kv_map(spec)?,
                None => HashMap::new(),
            };
            let created = pubsub::create_topic(&topic, &TopicRequest { labels }).await?;
            eprintln!("Created topic [{}].", created.name);
            if ctx.json_output() {
                return print_json(&created);
            }
            Ok(())
        }
        TopicsCmd::Delete { topic } => {
            let topic = topic_ref(ctx, &topic)?;
            ctx.confirm(&format!("Topic [{topic}] will be deleted."))?;
            pubsub::delete_topic(&topic).await?;
            eprintln!("Deleted topic [{topic}].");
            Ok(())
        }
        TopicsCmd::List => {
            let project = ctx.project()?;
            let topics = pubsub::list_topics(&project).await?;
            if ctx.json_output() {
                return print_json(&topics);
            }
            if topics.is_empty() {
                eprintln!("Listed 0 items.");
                return Ok(());
            }
            let rows: Vec<Vec<String>> = topics
                .iter()
                .map(|t| vec![last_segment(&t.name).to_string(), format_labels(&t.labels)])
                .collect();
            print_table(&["NAME", "LABELS"], &rows);
            Ok(())
        }
        TopicsCmd::Describe { topic } => {
            let topic = topic_ref(ctx, &topic)?;
            let raw = pubsub::get_topic(&topic).await?;
            print_json(&raw)
        }
        TopicsCmd::Publish {
            topic,
            message,
            attributes,
        } => {
            let topic = topic_ref(ctx, &topic)?;
            let attributes: HashMap<String, String> = attributes
                .iter()
                .map(|item| parse_kv(item))
                .collect::<Result<_>>()?;
            let outgoing = PubsubMessage::from_text(&message, attributes);
            let response = pubsub::publish(&topic, vec![outgoing]).await?;
            if ctx.json_output() {
                return print_json(&json!({"messageIds": response.message_ids}));
            }
            println!("messageIds:");
            for id in &response.message_ids {
                println!("- '{id}'");
            }
            Ok(())
        }
    }
}

async fn subscriptions(ctx: &Ctx, cmd: SubscriptionsCmd) -> Result<()> {
    match cmd {
        SubscriptionsCmd::Create {
            subscription,
            topic,
            ack_deadline,
            message_retention_duration,
        } => {
            let subscription = subscription_ref(ctx, &subscription)?;
            let topic = topic_ref(ctx, &topic)?;
            let request = SubscriptionRequest {
                topic: topic.relative_name(),
                ack_deadline_seconds: ack_deadline,
                message_retention_duration,
            };
            let created = pubsub::create_subscription(&subscription, &request).await?;
            eprintln!("Created subscription [{}].", created.name);
            if ctx.json_output() {
                return print_json(&created);
            }
            Ok(())
        }
        SubscriptionsCmd::Delete { subscription } => {
            let subscription = subscription_ref(ctx, &subscription)?;
            ctx.confirm(&format!("Subscription [{subscription}] will be deleted."))?;
            pubsub::delete_subscription(&subscription).await?;
            eprintln!("Deleted subscription [{subscription}].");
            Ok(())
        }
        SubscriptionsCmd::List => {
            let project = ctx.project()?;
            let subscriptions = pubsub::list_subscriptions(&project).await?;
            if ctx.json_output() {
                return print_json(&subscriptions);
            }
            if subscriptions.is_empty() {
                eprintln!("Listed 0 items.");
                return Ok(());
            }
            let rows: Vec<Vec<String>> = subscriptions
                .iter()
                .map(|s| {
                    vec![
                        last_segment(&s.name).to_string(),
                        last_segment(&s.topic).to_string(),
                        s.ack_deadline_seconds
                            .map(|d| d.to_string())
                            .unwrap_or_else(|| "-".to_string()),
                    ]
                })
                .collect();
            print_table(&["NAME", "TOPIC", "ACK_DEADLINE"], &rows);
            Ok(())
        }
        SubscriptionsCmd::Describe { subscription } => {
            let subscription = subscription_ref(ctx, &subscription)?;
            let raw = pubsub::get_subscription(&subscription).await?;
            print_json(&raw)
        }
        SubscriptionsCmd::Pull {
            subscription,
            limit,
            auto_ack,
        } => pull(ctx, &subscription, limit, auto_ack).await,
    }
}

async fn pull(ctx: &Ctx, subscription: &str, limit: u32, auto_ack: bool) -> Result<()> {
    let subscription = subscription_ref(ctx, subscription)?;
    let received = pubsub::pull(&subscription, limit).await?;
    if received.is_empty() {
        eprintln!("Listed 0 items.");
        return Ok(());
    }
    if ctx.json_output() {
        let items: Vec<_> = received
            .iter()
            .map(|r| json!({"ackId": r.ack_id, "message": r.message}))
            .collect();
        print_json(&items)?;
    } else {
        let rows: Vec<Vec<String>> = received
            .iter()
            .map(|r| {
                let data = r
                    .message
                    .decoded_data()
                    .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
                    .unwrap_or_else(|| "-".to_string());
                vec![
                    data,
                    r.message.message_id.clone().unwrap_or_else(|| "-".to_string()),
                    format_labels(&r.message.attributes),
                    r.ack_id.clone(),
                ]
            })
            .collect();
        print_table(&["DATA", "MESSAGE_ID", "ATTRIBUTES", "ACK_ID"], &rows);
    }
    if auto_ack {
        let ack_ids: Vec<String> = received.iter().map(|r| r.ack_id.clone()).collect();
        let count = ack_ids.len();
        pubsub::acknowledge(&subscription, ack_ids).await?;
        eprintln!("Acknowledged {count} messages.");
    }
    Ok(())
}

fn topic_ref(ctx: &Ctx, input: &str) -> Result<ResourceRef> {
    Ok(RefResolver::new(&PUBSUB_TOPICS)
        .attribute("project", ctx.project_sources())
        .parse(input)?)
}

fn subscription_ref(ctx: &Ctx, input: &str) -> Result<ResourceRef> {
    Ok(RefResolver::new(&PUBSUB_SUBSCRIPTIONS)
        .attribute("project", ctx.project_sources())
        .parse(input)?)
}
