pub mod entity_world;
pub mod error;
