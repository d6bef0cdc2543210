pub mod provider_manager;
pub mod reconciliation;
pub mod resolver;

pub use reconciliation::{resolve_nodes, NodeReport, NodeResolution, ResolutionReport};
pub use resolver::InstanceAddressResolver;
