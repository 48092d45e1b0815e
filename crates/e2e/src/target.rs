//! Reachability check for the site under test

use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::{E2eError, E2eResult};

/// How hard to try before declaring the target down
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    pub attempts: usize,
    pub interval: Duration,
    pub request_timeout: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            attempts: 5,
            interval: Duration::from_secs(1),
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// GET the root page until it answers with a success status
pub async fn probe_target(url: &str, config: &ProbeConfig) -> E2eResult<()> {
    let client = reqwest::Client::builder()
        .timeout(config.request_timeout)
        .build()?;

    for attempt in 1..=config.attempts {
        match client.get(url).send().await {
            Ok(resp) if resp.status().is_success() => {
                info!("Target {} is up", url);
                return Ok(());
            }
            Ok(resp) => {
                warn!("Target returned {} (attempt {}/{})", resp.status(), attempt, config.attempts);
            }
            Err(e) => {
                warn!("Target check failed (attempt {}/{}): {}", attempt, config.attempts, e);
            }
        }

        if attempt < config.attempts {
            sleep(config.interval).await;
        }
    }

    Err(E2eError::TargetUnreachable {
        url: url.to_string(),
        attempts: config.attempts,
    })
}
