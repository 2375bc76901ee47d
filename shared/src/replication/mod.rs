pub mod config;
pub mod entity_domain;
pub mod entity_replication_manager;
pub mod entity_replicator;
pub mod error;
pub mod events;
pub mod inbound;
pub mod migration;
pub mod orphaned_rpcs;
pub mod outbound;
pub mod replication_window;
