pub mod auth;
pub mod compute;
pub mod config;
pub mod pubsub;
pub mod storage;
