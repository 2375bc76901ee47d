use std::{default::Default, time::Duration};

/// Contains Config properties which will be used by an EntityReplicationManager
#[derive(Clone, Debug)]
pub struct ReplicationConfig {
    /// Maximum number of entities whose creation has been sent to the remote
    /// host but not yet acknowledged. Entities entering the replication
    /// window past this bound wait until a slot frees up.
    pub max_remote_entities_pending_creation: usize,
    /// Wall-clock budget spent activating newly created entities per tick.
    /// Zero means unlimited. At least one entity is always activated per tick.
    pub entity_activation_time_slice: Duration,
    /// How long a removed replicator stays resolvable to absorb late messages
    pub entity_pending_removal: Duration,
    /// How long an unacknowledged entity update waits before its changes are
    /// considered lost and resent
    pub resend_timeout: Duration,
    /// How long RPCs for a not-yet-created entity are buffered
    pub orphaned_rpc_timeout: Duration,
    /// Cadence at which the replication window and entity domain are polled
    pub update_window_interval: Duration,
    /// Cadence at which replicators past their removal grace period are destroyed
    pub clear_removed_replicators_interval: Duration,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            max_remote_entities_pending_creation: usize::MAX,
            entity_activation_time_slice: Duration::ZERO,
            entity_pending_removal: Duration::from_millis(1000),
            resend_timeout: Duration::from_millis(250),
            orphaned_rpc_timeout: Duration::from_millis(1000),
            update_window_interval: Duration::from_millis(100),
            clear_removed_replicators_interval: Duration::from_millis(100),
        }
    }
}
