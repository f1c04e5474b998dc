// crates/rule-collect/src/features/compile_event/use_case_test.rs

use std::sync::Arc;

use shared::logging::{LogLevel, MemorySink};
use shared::rule_name::RuleName;
use shared::{Fault, FaultKind, RuleEvent};

use crate::domain::{DocumentSchema, ProtocolTable, RuleSynthesizer};
use crate::features::compile_event::dto::CollectEvent;
use crate::features::compile_event::error::CompileError;
use crate::features::compile_event::mocks::{
    MockMessagePublisher, MockObjectFetcher, MockVpcGateway,
};
use crate::features::compile_event::use_case::CompileEventUseCase;

const DOCUMENT: &str = "Version: \"1.0\"\n\
                        Config:\n\
                        - VPC: vpc-0a1b2c3d\n\
                        \x20 Properties:\n\
                        \x20 - https:\n\
                        \x20   - .amazonaws.com\n\
                        \x20 - http:\n\
                        \x20   - example.org:8080\n\
                        - VPC: vpc-0e5f6a7b\n\
                        \x20 Properties:\n\
                        \x20 - https:\n\
                        \x20   - example.net\n";

struct Fixture {
    use_case: CompileEventUseCase,
    objects: Arc<MockObjectFetcher>,
    vpcs: Arc<MockVpcGateway>,
    publisher: Arc<MockMessagePublisher>,
    sink: Arc<MemorySink>,
}

fn fixture() -> Fixture {
    let objects = Arc::new(MockObjectFetcher::new());
    let vpcs = Arc::new(
        MockVpcGateway::new()
            .with_vpc("vpc-0a1b2c3d", "10.0.0.0/24", true)
            .with_vpc("vpc-0e5f6a7b", "10.0.1.0/24", false),
    );
    let publisher = Arc::new(MockMessagePublisher::new());
    let sink = Arc::new(MemorySink::new());
    let use_case = CompileEventUseCase::new(
        objects.clone(),
        vpcs.clone(),
        publisher.clone(),
        sink.clone(),
        DocumentSchema::bundled().unwrap(),
        RuleSynthesizer::new(ProtocolTable::bundled().unwrap(), false),
    );
    Fixture {
        use_case,
        objects,
        vpcs,
        publisher,
        sink,
    }
}

fn put_event() -> CollectEvent {
    CollectEvent::ObjectPut {
        account: "123456789012".to_string(),
        bucket: "tenant-config".to_string(),
        key: "eu-west-1-config.yaml".to_string(),
        version: "v-42".to_string(),
    }
}

#[tokio::test]
async fn put_object_compiles_one_message_per_attached_vpc() {
    // Arrange
    let f = fixture();
    f.objects.put("tenant-config", "eu-west-1-config.yaml", DOCUMENT);

    // Act
    let messages = f
        .use_case
        .execute(&put_event(), "2024/01/01/00/00/1")
        .await
        .unwrap();

    // Assert: the unattached VPC is skipped, not an error.
    assert_eq!(messages.len(), 1);
    let message = &messages[0];
    assert_eq!(message.vpc, "0a1b2c3d");
    assert_eq!(message.account, "123456789012");
    assert_eq!(message.region, "eu-west-1");
    assert_eq!(message.cidr, "10.0.0.0/24");
    assert_eq!(message.rules.len(), 2);

    for (name, rule) in &message.rules {
        assert_eq!(RuleName::extract(rule).unwrap().as_str(), name);
        assert!(rule.contains("$a1234567890120a1b2c3d"));
        assert!(rule.contains("$EXTERNAL_NET"));
    }

    // The queue saw exactly the compiled messages, with Update attributes.
    assert_eq!(f.publisher.sent_count(), 1);
    let (sent, attributes) = f.publisher.sent.lock().unwrap()[0].clone();
    assert_eq!(&sent, message);
    assert_eq!(attributes.event, RuleEvent::Update);
    assert_eq!(attributes.version, "v-42");
    assert_eq!(attributes.group_id(), "123456789012");

    // The tenant sees the skip as a warning.
    assert!(f.sink.contains(
        LogLevel::Warn,
        "vpc-0e5f6a7b rules skipped as it is not attached to TGW"
    ));
    assert!(f
        .sink
        .contains(LogLevel::Info, "Processing rules for Account 123456789012"));
}

#[tokio::test]
async fn compiling_the_same_document_twice_is_byte_identical() {
    let f = fixture();
    f.objects.put("tenant-config", "eu-west-1-config.yaml", DOCUMENT);

    let first = f
        .use_case
        .execute(&put_event(), "stream-1")
        .await
        .unwrap();
    let second = f
        .use_case
        .execute(&put_event(), "stream-2")
        .await
        .unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn schema_violation_rejects_the_whole_event() {
    let f = fixture();
    f.objects.put(
        "tenant-config",
        "eu-west-1-config.yaml",
        "Version: \"1.0\"\nConfig: not-a-list\n",
    );

    let error = f
        .use_case
        .execute(&put_event(), "stream")
        .await
        .unwrap_err();

    assert!(matches!(error, CompileError::SchemaViolation { .. }));
    assert_eq!(error.kind(), FaultKind::Format);
    assert_eq!(f.publisher.sent_count(), 0);
}

#[tokio::test]
async fn one_bad_rule_suppresses_every_message() {
    let f = fixture();
    // First VPC compiles fine; the second carries a lone-TLD domain.
    let document = DOCUMENT.replace("example.net", ".net");
    f.vpcs
        .attached
        .lock()
        .unwrap()
        .insert("vpc-0e5f6a7b".to_string());
    f.objects
        .put("tenant-config", "eu-west-1-config.yaml", &document);

    let error = f
        .use_case
        .execute(&put_event(), "stream")
        .await
        .unwrap_err();

    assert!(matches!(error, CompileError::InvalidRule { .. }));
    assert_eq!(error.kind(), FaultKind::Format);
    assert_eq!(f.publisher.sent_count(), 0);
}

#[tokio::test]
async fn unknown_vpc_is_a_format_error() {
    let f = fixture();
    let document = DOCUMENT.replace("vpc-0a1b2c3d", "vpc-99999999");
    f.objects
        .put("tenant-config", "eu-west-1-config.yaml", &document);

    let error = f
        .use_case
        .execute(&put_event(), "stream")
        .await
        .unwrap_err();

    assert!(matches!(error, CompileError::InvalidVpc(_)));
    assert_eq!(error.kind(), FaultKind::Format);
}

#[tokio::test]
async fn invalid_file_name_is_rejected_before_any_read() {
    let f = fixture();
    let event = CollectEvent::ObjectPut {
        account: "123456789012".to_string(),
        bucket: "tenant-config".to_string(),
        key: "eu-west-1-rules.yaml".to_string(),
        version: "v-1".to_string(),
    };

    let error = f.use_case.execute(&event, "stream").await.unwrap_err();

    assert!(matches!(error, CompileError::InvalidFileName(_)));
    assert_eq!(f.publisher.sent_count(), 0);
}

#[tokio::test]
async fn object_delete_emits_one_empty_account_scoped_message() {
    let f = fixture();
    let event = CollectEvent::ObjectDelete {
        account: "123456789012".to_string(),
        bucket: "tenant-config".to_string(),
        key: "eu-west-1-config.yml".to_string(),
        version: "v-9".to_string(),
    };

    let messages = f.use_case.execute(&event, "stream").await.unwrap();

    assert_eq!(messages.len(), 1);
    assert!(messages[0].rules.is_empty());
    assert_eq!(messages[0].vpc, "");
    assert_eq!(messages[0].region, "eu-west-1");

    let (_, attributes) = f.publisher.sent.lock().unwrap()[0].clone();
    assert_eq!(attributes.event, RuleEvent::DeleteS3);
    assert_eq!(attributes.version, "delete");
    assert!(f.sink.contains(
        LogLevel::Info,
        "All rules for 123456789012 in eu-west-1 will be deleted"
    ));
}

#[tokio::test]
async fn vpc_delete_emits_one_empty_vpc_scoped_message() {
    let f = fixture();
    let event = CollectEvent::VpcDelete {
        account: "123456789012".to_string(),
        region: "eu-central-1".to_string(),
        vpc_id: "vpc-0a1b2c3d".to_string(),
    };

    let messages = f.use_case.execute(&event, "stream").await.unwrap();

    assert_eq!(messages.len(), 1);
    assert!(messages[0].rules.is_empty());
    assert_eq!(messages[0].vpc, "0a1b2c3d");
    assert_eq!(messages[0].region, "eu-central-1");

    let (_, attributes) = f.publisher.sent.lock().unwrap()[0].clone();
    assert_eq!(attributes.event, RuleEvent::DeleteVpc);
    assert_eq!(attributes.version, "vpc-0a1b2c3d");
}

#[tokio::test]
async fn queue_failure_surfaces_as_internal() {
    let f = fixture();
    f.objects.put("tenant-config", "eu-west-1-config.yaml", DOCUMENT);
    *f.publisher.should_fail.lock().unwrap() = true;

    let error = f
        .use_case
        .execute(&put_event(), "stream")
        .await
        .unwrap_err();

    assert!(matches!(error, CompileError::Queue(_)));
    assert_eq!(error.kind(), FaultKind::Internal);
    assert!(error.customer_message().contains("Please Contact Support"));
}
