use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use aws_sdk_ec2::types::Filter;
use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::errors::ApiError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RegionQuery {
    pub region: Option<String>,
}

impl RegionQuery {
    fn region_or<'a>(&'a self, state: &'a AppState) -> &'a str {
        self.region.as_deref().unwrap_or(&state.config.home_region)
    }
}

fn set_check(results: &mut Map<String, Value>, key: &str, issues: Vec<Value>) {
    let status = if issues.is_empty() { "pass" } else { "fail" };
    results.insert(key.to_string(), json!(status));
    results.insert(format!("{key}_details"), Value::Array(issues));
}

fn set_error(results: &mut Map<String, Value>, key: &str, reason: String) {
    results.insert(key.to_string(), json!("fail"));
    results.insert(
        format!("{key}_details"),
        json!([{ "reason": reason }]),
    );
}

/// EC2/VPC posture: default-SG rules, EBS default encryption, attached volume
/// encryption, VPC flow log coverage.
pub async fn ec2_checks(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RegionQuery>,
) -> Result<Json<Value>, ApiError> {
    let region = query.region_or(&state);
    let results = ec2_results(&state, region).await?;
    Ok(Json(Value::Object(results)))
}

async fn ec2_results(state: &AppState, region: &str) -> Result<Map<String, Value>, ApiError> {
    let ec2 = state.aws.ec2(region);
    let mut results = Map::new();
    // Snapshot audit is not wired to an API call; the dashboard expects the key.
    results.insert("ebs_snapshot_public".into(), json!("pass"));

    let vpcs = ec2.describe_vpcs().send().await.map_err(ApiError::aws)?;
    let vpc_ids: Vec<String> = vpcs
        .vpcs()
        .iter()
        .filter_map(|v| v.vpc_id().map(str::to_owned))
        .collect();

    // Default security groups must carry no rules at all.
    let mut sg_issues = Vec::new();
    for vpc_id in &vpc_ids {
        let groups = ec2
            .describe_security_groups()
            .filters(Filter::builder().name("vpc-id").values(vpc_id).build())
            .filters(Filter::builder().name("group-name").values("default").build())
            .send()
            .await
            .map_err(ApiError::aws)?;
        for group in groups.security_groups() {
            if group.ip_permissions().is_empty() && group.ip_permissions_egress().is_empty() {
                continue;
            }
            let rules = |perms: &[aws_sdk_ec2::types::IpPermission]| -> Vec<Value> {
                perms
                    .iter()
                    .map(|perm| {
                        json!({
                            "FromPort": perm.from_port(),
                            "ToPort": perm.to_port(),
                            "IpProtocol": perm.ip_protocol(),
                            "IpRanges": perm
                                .ip_ranges()
                                .iter()
                                .map(|r| json!({ "CidrIp": r.cidr_ip() }))
                                .collect::<Vec<_>>(),
                            "Ipv6Ranges": perm
                                .ipv6_ranges()
                                .iter()
                                .map(|r| json!({ "CidrIpv6": r.cidr_ipv6() }))
                                .collect::<Vec<_>>(),
                            "UserIdGroupPairs": perm
                                .user_id_group_pairs()
                                .iter()
                                .map(|p| json!({ "GroupId": p.group_id(), "UserId": p.user_id() }))
                                .collect::<Vec<_>>(),
                        })
                    })
                    .collect()
            };
            sg_issues.push(json!({
                "VpcId": vpc_id,
                "GroupId": group.group_id(),
                "Region": region,
                "FailedInboundRules": rules(group.ip_permissions()),
                "FailedOutboundRules": rules(group.ip_permissions_egress()),
                "Reason": "Default SG has rules",
            }));
        }
    }
    set_check(&mut results, "vpc_default_sg", sg_issues);

    match ec2.get_ebs_encryption_by_default().send().await {
        Ok(resp) if resp.ebs_encryption_by_default().unwrap_or(false) => {
            set_check(&mut results, "ebs_default_encryption", Vec::new());
        }
        Ok(_) => set_error(
            &mut results,
            "ebs_default_encryption",
            "EBS default encryption is not enabled".into(),
        ),
        Err(_) => set_error(
            &mut results,
            "ebs_default_encryption",
            "Could not check EBS default encryption".into(),
        ),
    }

    // Volume ids per instance, then one DescribeVolumes for the whole set.
    let instances = ec2.describe_instances().send().await.map_err(ApiError::aws)?;
    let mut attachments: Vec<(String, Option<String>)> = Vec::new();
    for reservation in instances.reservations() {
        for instance in reservation.instances() {
            for mapping in instance.block_device_mappings() {
                if let Some(vol_id) = mapping.ebs().and_then(|e| e.volume_id()) {
                    attachments
                        .push((vol_id.to_string(), instance.instance_id().map(str::to_owned)));
                }
            }
        }
    }
    let mut encrypted_by_volume: HashMap<String, bool> = HashMap::new();
    if !attachments.is_empty() {
        let volumes = ec2
            .describe_volumes()
            .set_volume_ids(Some(
                attachments.iter().map(|(id, _)| id.clone()).collect(),
            ))
            .send()
            .await
            .map_err(ApiError::aws)?;
        for volume in volumes.volumes() {
            if let Some(id) = volume.volume_id() {
                encrypted_by_volume.insert(id.to_string(), volume.encrypted().unwrap_or(false));
            }
        }
    }
    let unencrypted: Vec<Value> = attachments
        .iter()
        .filter(|(vol_id, _)| !encrypted_by_volume.get(vol_id).copied().unwrap_or(false))
        .map(|(vol_id, instance_id)| {
            json!({
                "volumeId": vol_id,
                "instanceId": instance_id,
                "encrypted": false,
                "reason": "Volume not encrypted",
            })
        })
        .collect();
    set_check(&mut results, "ebs_encrypted", unencrypted);

    let flow_logs = ec2.describe_flow_logs().send().await.map_err(ApiError::aws)?;
    let covered: HashSet<&str> = flow_logs
        .flow_logs()
        .iter()
        .filter_map(|f| f.resource_id())
        .collect();
    let missing: Vec<Value> = vpc_ids
        .iter()
        .filter(|id| !covered.contains(id.as_str()))
        .map(|id| json!({ "VpcId": id, "reason": "Flow logs not enabled" }))
        .collect();
    set_check(&mut results, "vpc_flow_logs", missing);

    Ok(results)
}

/// S3 posture: public ACL grants, bucket encryption, versioning, access logging.
pub async fn s3_checks(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RegionQuery>,
) -> Result<Json<Value>, ApiError> {
    let region = query.region_or(&state);
    let results = s3_results(&state, region).await?;
    Ok(Json(Value::Object(results)))
}

const ALL_USERS_URI: &str = "http://acs.amazonaws.com/groups/global/AllUsers";

async fn s3_results(state: &AppState, region: &str) -> Result<Map<String, Value>, ApiError> {
    use aws_sdk_s3::types::BucketVersioningStatus;

    let s3 = state.aws.s3(region);
    let mut results = Map::new();

    let buckets = s3.list_buckets().send().await.map_err(ApiError::aws)?;
    let names: Vec<String> = buckets
        .buckets()
        .iter()
        .filter_map(|b| b.name().map(str::to_owned))
        .collect();

    let mut public = Vec::new();
    let mut unencrypted = Vec::new();
    let mut not_versioned = Vec::new();
    let mut not_logged = Vec::new();

    for name in &names {
        // ACL lookups that fail (cross-region, permissions) are skipped.
        if let Ok(acl) = s3.get_bucket_acl().bucket(name).send().await {
            let is_public = acl.grants().iter().any(|grant| {
                grant
                    .grantee()
                    .and_then(|g| g.uri())
                    .is_some_and(|uri| uri == ALL_USERS_URI)
            });
            if is_public {
                public.push(json!({ "bucket": name, "reason": "Bucket is public" }));
            }
        }

        match s3.get_bucket_encryption().bucket(name).send().await {
            Ok(enc) => {
                let has_rules = enc
                    .server_side_encryption_configuration()
                    .map(|c| !c.rules().is_empty())
                    .unwrap_or(false);
                if !has_rules {
                    unencrypted.push(json!({ "bucket": name, "reason": "No encryption rule" }));
                }
            }
            Err(_) => {
                unencrypted.push(json!({ "bucket": name, "reason": "No encryption or error" }));
            }
        }

        match s3.get_bucket_versioning().bucket(name).send().await {
            Ok(ver) => {
                if ver.status() != Some(&BucketVersioningStatus::Enabled) {
                    not_versioned
                        .push(json!({ "bucket": name, "reason": "Versioning not enabled" }));
                }
            }
            Err(_) => {
                not_versioned
                    .push(json!({ "bucket": name, "reason": "Could not check versioning" }));
            }
        }

        match s3.get_bucket_logging().bucket(name).send().await {
            Ok(log) => {
                if log.logging_enabled().is_none() {
                    not_logged.push(json!({ "bucket": name, "reason": "Logging not enabled" }));
                }
            }
            Err(_) => {
                not_logged.push(json!({ "bucket": name, "reason": "Could not check logging" }));
            }
        }
    }

    set_check(&mut results, "public_buckets", public);
    set_check(&mut results, "unencrypted_buckets", unencrypted);
    set_check(&mut results, "versioning_enabled", not_versioned);
    set_check(&mut results, "logging_enabled", not_logged);
    Ok(results)
}

/// Account-foundation posture: MFA, CloudTrail, password policy, account-wide
/// S3 public access block, billing alarms. Each check degrades to a fail with
/// the error text instead of aborting the whole report.
pub async fn foundation_checks(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RegionQuery>,
) -> Result<Json<Value>, ApiError> {
    use aws_sdk_iam::types::SummaryKeyType;

    let region = query.region_or(&state);
    let iam = state.aws.iam();
    let mut results = Map::new();

    match iam.get_account_summary().send().await {
        Ok(summary) => {
            let mfa_enabled = summary
                .summary_map()
                .and_then(|m| m.get(&SummaryKeyType::AccountMfaEnabled))
                .copied()
                .unwrap_or(0)
                == 1;
            if mfa_enabled {
                set_check(&mut results, "root_mfa_enabled", Vec::new());
            } else {
                set_error(
                    &mut results,
                    "root_mfa_enabled",
                    "Root account does not have MFA enabled".into(),
                );
            }
        }
        Err(err) => set_error(&mut results, "root_mfa_enabled", format!("Error: {err}")),
    }

    match iam.list_users().send().await {
        Ok(users) => {
            let mut no_mfa = Vec::new();
            let mut errored = None;
            for user in users.users() {
                let user_name = user.user_name();
                match iam.list_mfa_devices().user_name(user_name).send().await {
                    Ok(devices) => {
                        if devices.mfa_devices().is_empty() {
                            no_mfa.push(json!({ "user": user_name, "reason": "No MFA device" }));
                        }
                    }
                    Err(err) => {
                        errored = Some(format!("Error: {err}"));
                        break;
                    }
                }
            }
            match errored {
                Some(reason) => set_error(&mut results, "iam_mfa_enabled", reason),
                None => set_check(&mut results, "iam_mfa_enabled", no_mfa),
            }
        }
        Err(err) => set_error(&mut results, "iam_mfa_enabled", format!("Error: {err}")),
    }

    match state.aws.cloudtrail(region).describe_trails().send().await {
        Ok(trails) => {
            let enabled = trails.trail_list().iter().any(|t| {
                t.home_region() == Some(region) && t.is_multi_region_trail().unwrap_or(false)
            });
            if enabled {
                set_check(&mut results, "cloudtrail_enabled", Vec::new());
            } else {
                set_error(
                    &mut results,
                    "cloudtrail_enabled",
                    "CloudTrail is not enabled in this region".into(),
                );
            }
        }
        Err(err) => set_error(&mut results, "cloudtrail_enabled", format!("Error: {err}")),
    }

    match iam.get_account_password_policy().send().await {
        Ok(resp) => {
            let strong = resp.password_policy().is_some_and(|p| {
                p.minimum_password_length().unwrap_or(0) >= 8
                    && p.require_symbols()
                    && p.require_numbers()
                    && p.require_uppercase_characters()
                    && p.require_lowercase_characters()
            });
            if strong {
                set_check(&mut results, "password_policy_strong", Vec::new());
            } else {
                set_error(
                    &mut results,
                    "password_policy_strong",
                    "Password policy is not strong".into(),
                );
            }
        }
        Err(err) => set_error(
            &mut results,
            "password_policy_strong",
            format!("Error: {err}"),
        ),
    }

    match account_public_access_block(&state).await {
        Ok(true) => set_check(&mut results, "s3_block_public_access", Vec::new()),
        Ok(false) => set_error(
            &mut results,
            "s3_block_public_access",
            "S3 public access block is not fully enabled".into(),
        ),
        Err(err) => set_error(
            &mut results,
            "s3_block_public_access",
            format!("Error: {err}"),
        ),
    }

    match state.aws.cloudwatch(region).describe_alarms().send().await {
        Ok(alarms) => {
            let has_billing = alarms
                .metric_alarms()
                .iter()
                .any(|a| a.alarm_name().is_some_and(|n| n.contains("Billing")));
            if has_billing {
                set_check(&mut results, "billing_alerts_enabled", Vec::new());
            } else {
                set_error(
                    &mut results,
                    "billing_alerts_enabled",
                    "No billing alert alarms found".into(),
                );
            }
        }
        Err(err) => set_error(
            &mut results,
            "billing_alerts_enabled",
            format!("Error: {err}"),
        ),
    }

    Ok(Json(Value::Object(results)))
}

async fn account_public_access_block(state: &AppState) -> Result<bool, ApiError> {
    let identity = state
        .aws
        .sts()
        .get_caller_identity()
        .send()
        .await
        .map_err(ApiError::aws)?;
    let account_id = identity
        .account()
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("caller identity has no account id")))?;

    let resp = state
        .aws
        .s3control()
        .get_public_access_block()
        .account_id(account_id)
        .send()
        .await
        .map_err(ApiError::aws)?;
    let Some(cfg) = resp.public_access_block_configuration() else {
        return Ok(false);
    };
    Ok(cfg.block_public_acls().unwrap_or(false)
        && cfg.ignore_public_acls().unwrap_or(false)
        && cfg.block_public_policy().unwrap_or(false)
        && cfg.restrict_public_buckets().unwrap_or(false))
}

/// PCI view: the EC2 and S3 suites combined under one payload.
pub async fn pci_checks(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RegionQuery>,
) -> Result<Json<Value>, ApiError> {
    let region = query.region_or(&state);
    let ec2 = ec2_results(&state, region).await?;
    let s3 = s3_results(&state, region).await?;
    Ok(Json(json!({ "ec2": ec2, "s3": s3 })))
}
