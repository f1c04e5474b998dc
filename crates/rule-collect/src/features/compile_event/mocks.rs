// crates/rule-collect/src/features/compile_event/mocks.rs

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;

use shared::models::{CompilationMessage, MessageAttributes};

use super::error::CompileError;
use super::ports::{MessagePublisher, ObjectFetcher, PortResult, VpcGateway};

#[derive(Default)]
pub struct MockObjectFetcher {
    pub objects: Arc<Mutex<BTreeMap<(String, String), Bytes>>>,
    pub should_fail: Arc<Mutex<bool>>,
}

impl MockObjectFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, bucket: &str, key: &str, body: &str) {
        self.objects.lock().unwrap().insert(
            (bucket.to_string(), key.to_string()),
            Bytes::copy_from_slice(body.as_bytes()),
        );
    }
}

#[async_trait]
impl ObjectFetcher for MockObjectFetcher {
    async fn fetch(&self, bucket: &str, key: &str) -> PortResult<Bytes> {
        if *self.should_fail.lock().unwrap() {
            return Err(CompileError::ObjectStore("mock fetch failed".to_string()));
        }
        self.objects
            .lock()
            .unwrap()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| CompileError::ObjectStore(format!("no such object {bucket}/{key}")))
    }
}

#[derive(Default)]
pub struct MockVpcGateway {
    pub cidrs: Arc<Mutex<BTreeMap<String, String>>>,
    pub attached: Arc<Mutex<BTreeSet<String>>>,
    pub should_fail: Arc<Mutex<bool>>,
}

impl MockVpcGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_vpc(self, vpc_id: &str, cidr: &str, attached: bool) -> Self {
        self.cidrs
            .lock()
            .unwrap()
            .insert(vpc_id.to_string(), cidr.to_string());
        if attached {
            self.attached.lock().unwrap().insert(vpc_id.to_string());
        }
        self
    }
}

#[async_trait]
impl VpcGateway for MockVpcGateway {
    async fn primary_cidr(&self, vpc_id: &str) -> PortResult<String> {
        if *self.should_fail.lock().unwrap() {
            return Err(CompileError::Ec2("mock describe failed".to_string()));
        }
        self.cidrs
            .lock()
            .unwrap()
            .get(vpc_id)
            .cloned()
            .ok_or_else(|| CompileError::InvalidVpc(vpc_id.to_string()))
    }

    async fn attached_to_transit_gateway(&self, vpc_id: &str) -> PortResult<bool> {
        if *self.should_fail.lock().unwrap() {
            return Err(CompileError::Ec2("mock describe failed".to_string()));
        }
        Ok(self.attached.lock().unwrap().contains(vpc_id))
    }
}

#[derive(Default)]
pub struct MockMessagePublisher {
    pub sent: Arc<Mutex<Vec<(CompilationMessage, MessageAttributes)>>>,
    pub should_fail: Arc<Mutex<bool>>,
}

impl MockMessagePublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl MessagePublisher for MockMessagePublisher {
    async fn publish(
        &self,
        message: &CompilationMessage,
        attributes: &MessageAttributes,
    ) -> PortResult<()> {
        if *self.should_fail.lock().unwrap() {
            return Err(CompileError::Queue("mock publish failed".to_string()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((message.clone(), attributes.clone()));
        Ok(())
    }
}
