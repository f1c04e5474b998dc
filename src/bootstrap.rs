//! AWS environment bootstrap: the one shared SDK config (adaptive retry,
//! max 10 attempts, wrapped around every client) and the worker's own
//! account identity, which stamps the reserved default-deny rules.

use anyhow::Context;
use aws_config::retry::RetryConfig;
use aws_config::{BehaviorVersion, Region, SdkConfig};

use crate::config::Config;

pub struct AwsEnv {
    pub sdk_config: SdkConfig,
    /// Account this worker runs in, resolved once via STS.
    pub caller_account: String,
}

pub async fn bootstrap(config: &Config) -> anyhow::Result<AwsEnv> {
    let sdk_config = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(config.app.lambda_region.clone()))
        .retry_config(RetryConfig::adaptive().with_max_attempts(10))
        .load()
        .await;

    let sts = aws_sdk_sts::Client::new(&sdk_config);
    let caller_account = sts
        .get_caller_identity()
        .send()
        .await
        .context("resolving caller identity")?
        .account()
        .unwrap_or_default()
        .to_string();

    tracing::debug!(account = %caller_account, "aws environment ready");
    Ok(AwsEnv {
        sdk_config,
        caller_account,
    })
}
