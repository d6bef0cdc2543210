use crate::error::{NotScaleSetInstance, ResolveError};

/// Length of the base-36 instance id suffix of a scale-set computer name.
const INSTANCE_ID_SUFFIX_LEN: usize = 6;

/// Short resource name of an ARM resource id (its final path segment).
///
/// `/subscriptions/s/resourceGroups/rg/providers/Microsoft.Network/networkInterfaces/nic-1`
/// yields `nic-1`. Ids without any `/` or with an empty final segment are rejected.
pub fn last_segment(id: &str) -> Result<&str, ResolveError> {
    match id.rsplit_once('/') {
        Some((_, name)) if !name.is_empty() => Ok(name),
        _ => Err(ResolveError::InvalidResourceId { id: id.to_string() }),
    }
}

/// Scale-set instance id encoded in a node's computer name.
///
/// Scale-set VMs are named `<prefix><6 base-36 digits>`, e.g. `k8s-agent-vmss00000a`
/// is instance `10`.
pub fn scale_set_instance_id(node: &str) -> Result<String, NotScaleSetInstance> {
    let not_vmss = || NotScaleSetInstance {
        node: node.to_string(),
    };

    let suffix = node
        .len()
        .checked_sub(INSTANCE_ID_SUFFIX_LEN)
        .and_then(|start| node.get(start..))
        .ok_or_else(not_vmss)?;
    if !suffix.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return Err(not_vmss());
    }

    u64::from_str_radix(suffix, 36)
        .map(|id| id.to_string())
        .map_err(|_| not_vmss())
}
