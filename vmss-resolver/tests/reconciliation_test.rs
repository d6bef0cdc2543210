// Resolution pass over many nodes sharing one resolver
mod common;

use common::{nic, resolver_with, vm, RESOURCE_GROUP};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use vmss_common::NodeName;
use vmss_providers::limiter::TokenBucketLimiter;
use vmss_providers::mock::MockProvider;
use vmss_resolver::{resolve_nodes, InstanceAddressResolver, NodeResolution};

fn fleet(size: usize) -> MockProvider {
    let mut provider = MockProvider::new();
    for i in 0..size {
        let node = format!("vm-{}", i);
        let nic_name = format!("nic-{}", i);
        provider = provider
            .with_vm(node.clone(), vm(&node, &[(nic_name.as_str(), false)]))
            .with_interface(nic(
                &nic_name,
                &[("ipconfig1", true, format!("10.0.0.{}", i + 4).as_str())],
            ));
    }
    provider
}

#[tokio::test]
async fn pass_reports_every_outcome_in_input_order() {
    let t = resolver_with(
        fleet(3)
            .with_vm("vm-bad", vm("vm-bad", &[("nic-x", false), ("nic-y", false)]))
            .with_instance_error("vm-err", "status=500 body=InternalError"),
    );
    let nodes: Vec<NodeName> = ["vm-2", "vm-gone", "vm-0", "vm-bad", "vm-err", "vm-1"]
        .into_iter()
        .map(NodeName::from)
        .collect();

    let report = resolve_nodes(&t.resolver, &nodes, 3).await;

    let order: Vec<&str> = report.nodes.iter().map(|r| r.node.as_str()).collect();
    assert_eq!(order, vec!["vm-2", "vm-gone", "vm-0", "vm-bad", "vm-err", "vm-1"]);
    assert_eq!(
        report.nodes[0].resolution,
        NodeResolution::Resolved {
            address: "10.0.0.6".to_string()
        }
    );
    assert_eq!(report.nodes[1].resolution, NodeResolution::NotFound);
    assert!(matches!(
        &report.nodes[3].resolution,
        NodeResolution::Failed { error } if error.contains("vm-bad")
    ));
    assert!(matches!(
        &report.nodes[4].resolution,
        NodeResolution::Failed { error } if error.contains("status=500")
    ));
    assert_eq!((report.resolved, report.not_found, report.failed), (3, 1, 2));
    assert!(report.has_failures());
}

#[tokio::test]
async fn zero_concurrency_still_makes_progress() {
    let t = resolver_with(fleet(2));
    let nodes = vec![NodeName::from("vm-0"), NodeName::from("vm-1")];

    let report = resolve_nodes(&t.resolver, &nodes, 0).await;

    assert_eq!(report.resolved, 2);
    assert_eq!(t.limiter.accepted(), 4);
}

#[tokio::test]
async fn concurrent_callers_share_one_token_bucket() {
    let provider = Arc::new(fleet(16));
    let resolver = Arc::new(InstanceAddressResolver::new(
        provider.clone(),
        provider.clone(),
        Arc::new(TokenBucketLimiter::new(500.0, NonZeroU32::new(8).unwrap())),
        RESOURCE_GROUP,
    ));

    let mut handles = Vec::new();
    for i in 0..16 {
        let resolver = resolver.clone();
        handles.push(tokio::spawn(async move {
            resolver
                .resolve_instance_private_ip(&NodeName::from(format!("vm-{}", i)))
                .await
        }));
    }

    for (i, handle) in handles.into_iter().enumerate() {
        let ip = tokio::time::timeout(Duration::from_secs(10), handle)
            .await
            .expect("resolution should not stall")
            .unwrap()
            .unwrap();
        assert_eq!(ip, format!("10.0.0.{}", i + 4));
    }
    assert_eq!(provider.instance_lookups(), 16);
    assert_eq!(provider.interface_lookups(), 16);
}

#[tokio::test]
async fn empty_pass_is_a_no_op() {
    let t = resolver_with(MockProvider::new());

    let report = resolve_nodes(&t.resolver, &[], 4).await;

    assert!(report.nodes.is_empty());
    assert!(!report.has_failures());
    assert_eq!(t.provider.instance_lookups(), 0);
}
