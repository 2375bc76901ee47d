pub mod entity_migration_message;
pub mod entity_rpc_message;
pub mod entity_update_message;
pub mod replication_packet;
