use thiserror::Error;

/// Why an instance's private address could not be resolved.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The node no longer exists in the control plane (deleted or evicted).
    #[error("instance not found")]
    InstanceNotFound,

    #[error("failed to find a primary nic for the vm. vmname={vm_name:?}")]
    NoPrimaryInterface { vm_name: String },

    #[error("failed to determine the primary ipconfig. nicname={nic_name:?}")]
    NoPrimaryIpConfiguration { nic_name: String },

    #[error("primary ipconfig has no private address. nicname={nic_name:?} ipconfig={ipconfig_name:?}")]
    NoPrivateIpAddress {
        nic_name: String,
        ipconfig_name: String,
    },

    #[error("resource name was missing from identifier {id:?}")]
    InvalidResourceId { id: String },

    /// Error returned by a lookup collaborator, passed through as-is.
    #[error(transparent)]
    Provider(#[from] anyhow::Error),
}

impl ResolveError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ResolveError::InstanceNotFound)
    }
}

/// The node name does not carry a scale-set instance id suffix.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("not a vmss instance: {node}")]
pub struct NotScaleSetInstance {
    pub node: String,
}
