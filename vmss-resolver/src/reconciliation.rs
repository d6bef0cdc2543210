use crate::resolver::InstanceAddressResolver;
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use vmss_common::{NodeName, ResolveError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum NodeResolution {
    Resolved { address: String },
    /// Instance is gone from the scale set; not an error for the pass.
    NotFound,
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeReport {
    pub node: NodeName,
    #[serde(flatten)]
    pub resolution: NodeResolution,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ResolutionReport {
    pub nodes: Vec<NodeReport>,
    pub resolved: usize,
    pub not_found: usize,
    pub failed: usize,
}

impl ResolutionReport {
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    fn push(&mut self, node: NodeName, result: Result<String, ResolveError>) {
        let resolution = match result {
            Ok(address) => {
                self.resolved += 1;
                NodeResolution::Resolved { address }
            }
            Err(ResolveError::InstanceNotFound) => {
                self.not_found += 1;
                NodeResolution::NotFound
            }
            Err(e) => {
                self.failed += 1;
                NodeResolution::Failed {
                    error: format!("{:#}", e),
                }
            }
        };
        self.nodes.push(NodeReport { node, resolution });
    }
}

/// Resolve every node, at most `concurrency` at a time, all sharing the resolver's
/// rate limiter. Reports come back in input order.
pub async fn resolve_nodes(
    resolver: &InstanceAddressResolver,
    nodes: &[NodeName],
    concurrency: usize,
) -> ResolutionReport {
    tracing::info!(
        "[Resolution] Resolving {} node(s), concurrency={}",
        nodes.len(),
        concurrency.max(1)
    );

    let results: Vec<(NodeName, Result<String, ResolveError>)> = stream::iter(nodes)
        .map(|node| async move {
            let result = resolver.resolve_instance_private_ip(node).await;
            (node.clone(), result)
        })
        .buffered(concurrency.max(1))
        .collect()
        .await;

    let mut report = ResolutionReport::default();
    for (node, result) in results {
        report.push(node, result);
    }

    tracing::info!(
        "[Resolution] Done: resolved={} not_found={} failed={}",
        report.resolved,
        report.not_found,
        report.failed
    );
    report
}
