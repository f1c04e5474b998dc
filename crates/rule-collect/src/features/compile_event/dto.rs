// crates/rule-collect/src/features/compile_event/dto.rs

use std::sync::OnceLock;

use regex::Regex;

use super::error::CompileError;

/// A decoded trigger for the compile stage, demultiplexed from the raw
/// event-bus payload. Only the fields the pipeline needs survive decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectEvent {
    /// A tenant wrote a configuration object.
    ObjectPut {
        account: String,
        bucket: String,
        key: String,
        version: String,
    },
    /// A tenant removed their configuration object.
    ObjectDelete {
        account: String,
        bucket: String,
        key: String,
        version: String,
    },
    /// A tenant VPC was deleted out from under its rules.
    VpcDelete {
        account: String,
        region: String,
        vpc_id: String,
    },
}

impl CollectEvent {
    /// Decodes an EventBridge envelope. Accepted sources are `aws.s3`
    /// (reason `PutObject` / `DeleteObject`) and `aws.ec2` (DeleteVpc via
    /// CloudTrail). Everything else is a wiring error, not tenant input.
    pub fn from_event_bridge(event: &serde_json::Value) -> Result<Self, CompileError> {
        let source = event
            .get("source")
            .and_then(|s| s.as_str())
            .unwrap_or_default();

        match source {
            "aws.ec2" => {
                let detail = &event["detail"];
                let vpc_id = str_field(detail, &["requestParameters", "vpcId"])?;
                let account = str_field(detail, &["recipientAccountId"])?;
                let region = str_field(detail, &["awsRegion"])?;
                Ok(CollectEvent::VpcDelete {
                    account,
                    region,
                    vpc_id,
                })
            }
            "aws.s3" => {
                let account = str_field(event, &["account"])?;
                let detail = &event["detail"];
                let bucket = str_field(detail, &["bucket", "name"])?;
                let key = decode_object_field(&str_field(detail, &["object", "key"])?);
                let version = decode_object_field(&str_field(detail, &["object", "version-id"])?);
                let reason = str_field(detail, &["reason"])?;
                match reason.as_str() {
                    "PutObject" => Ok(CollectEvent::ObjectPut {
                        account,
                        bucket,
                        key,
                        version,
                    }),
                    "DeleteObject" => Ok(CollectEvent::ObjectDelete {
                        account,
                        bucket,
                        key,
                        version,
                    }),
                    other => Err(CompileError::UnrecognizedEvent(format!(
                        "unsupported s3 reason: {other}"
                    ))),
                }
            }
            other => Err(CompileError::UnrecognizedEvent(format!(
                "unsupported event source: {other}"
            ))),
        }
    }

    pub fn account(&self) -> &str {
        match self {
            CollectEvent::ObjectPut { account, .. }
            | CollectEvent::ObjectDelete { account, .. }
            | CollectEvent::VpcDelete { account, .. } => account,
        }
    }

    /// The version identifier attached to every queue message for this
    /// event: the object version for S3 events, the VPC id for DeleteVpc.
    pub fn version(&self) -> &str {
        match self {
            CollectEvent::ObjectPut { version, .. }
            | CollectEvent::ObjectDelete { version, .. } => version,
            CollectEvent::VpcDelete { vpc_id, .. } => vpc_id,
        }
    }

    /// The region whose firewall this event targets: named by the object
    /// key for S3 events, carried on the event for DeleteVpc.
    pub fn target_region(&self) -> Result<String, CompileError> {
        match self {
            CollectEvent::ObjectPut { key, .. } | CollectEvent::ObjectDelete { key, .. } => {
                region_from_object_key(key)
            }
            CollectEvent::VpcDelete { region, .. } => Ok(region.clone()),
        }
    }
}

fn str_field(value: &serde_json::Value, path: &[&str]) -> Result<String, CompileError> {
    let mut cursor = value;
    for segment in path {
        cursor = &cursor[*segment];
    }
    cursor
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| CompileError::UnrecognizedEvent(format!("missing field {}", path.join("."))))
}

/// S3 event payloads URL-encode object keys and version ids the same way
/// the REST API does, with `+` standing in for spaces.
fn decode_object_field(raw: &str) -> String {
    let plus_decoded = raw.replace('+', " ");
    urlencoding::decode(&plus_decoded)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| plus_decoded)
}

fn file_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^((us(-gov)?|ap|ca|cn|eu|sa)-(central|(north|south)?(east|west)?)-\d)-config\.(yaml|yml)$",
        )
        .expect("valid regex")
    })
}

/// Validates the `<region>-config.yaml` object key and returns the region
/// it names.
pub fn region_from_object_key(key: &str) -> Result<String, CompileError> {
    file_name_regex()
        .captures(key)
        .map(|captures| captures[1].to_string())
        .ok_or_else(|| CompileError::InvalidFileName(key.to_string()))
}
