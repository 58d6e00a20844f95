use std::time::Duration;

use once_cell::sync::Lazy;

/// Shared HTTP client. Holds the connection pool for every API call the
/// process makes, so build it once and reuse it.
pub static CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .user_agent(concat!("gcloud-rs/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(300))
        .connect_timeout(Duration::from_secs(20))
        .build()
        .expect("failed to build reqwest client")
});
