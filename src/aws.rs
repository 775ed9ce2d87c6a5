use aws_config::{BehaviorVersion, Region, SdkConfig};
use dashmap::DashMap;

/// Per-region AWS client factory.
///
/// Clients are cheap wrappers over a shared connector, so they are built on
/// demand from a cached per-region `SdkConfig` derived from the base config.
pub struct AwsClients {
    base: SdkConfig,
    regional: DashMap<String, SdkConfig>,
}

impl AwsClients {
    /// Resolve credentials and the home region from the environment.
    pub async fn connect(home_region: &str) -> Self {
        let base = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(home_region.to_string()))
            .load()
            .await;
        Self::new(base)
    }

    pub fn new(base: SdkConfig) -> Self {
        Self {
            base,
            regional: DashMap::new(),
        }
    }

    fn config_for(&self, region: &str) -> SdkConfig {
        if let Some(cfg) = self.regional.get(region) {
            return cfg.clone();
        }
        let cfg = self
            .base
            .to_builder()
            .region(Region::new(region.to_string()))
            .build();
        self.regional.insert(region.to_string(), cfg.clone());
        cfg
    }

    // Region-scoped clients.

    pub fn ec2(&self, region: &str) -> aws_sdk_ec2::Client {
        aws_sdk_ec2::Client::new(&self.config_for(region))
    }

    pub fn s3(&self, region: &str) -> aws_sdk_s3::Client {
        aws_sdk_s3::Client::new(&self.config_for(region))
    }

    pub fn cloudwatch(&self, region: &str) -> aws_sdk_cloudwatch::Client {
        aws_sdk_cloudwatch::Client::new(&self.config_for(region))
    }

    pub fn cloudtrail(&self, region: &str) -> aws_sdk_cloudtrail::Client {
        aws_sdk_cloudtrail::Client::new(&self.config_for(region))
    }

    pub fn ecs(&self, region: &str) -> aws_sdk_ecs::Client {
        aws_sdk_ecs::Client::new(&self.config_for(region))
    }

    pub fn cloudformation(&self, region: &str) -> aws_sdk_cloudformation::Client {
        aws_sdk_cloudformation::Client::new(&self.config_for(region))
    }

    // Account-scoped clients, pinned to the home region.

    pub fn iam(&self) -> aws_sdk_iam::Client {
        aws_sdk_iam::Client::new(&self.base)
    }

    pub fn sts(&self) -> aws_sdk_sts::Client {
        aws_sdk_sts::Client::new(&self.base)
    }

    pub fn s3control(&self) -> aws_sdk_s3control::Client {
        aws_sdk_s3control::Client::new(&self.base)
    }

    pub fn dynamodb(&self) -> aws_sdk_dynamodb::Client {
        aws_sdk_dynamodb::Client::new(&self.base)
    }

    pub fn ses(&self) -> aws_sdk_sesv2::Client {
        aws_sdk_sesv2::Client::new(&self.base)
    }

    /// Cost Explorer is served out of us-east-1 regardless of home region.
    pub fn cost_explorer(&self) -> aws_sdk_costexplorer::Client {
        aws_sdk_costexplorer::Client::new(&self.config_for("us-east-1"))
    }
}
