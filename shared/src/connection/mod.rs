pub mod connection;
pub mod connection_listener;
pub mod error;
pub mod packet_type;
pub mod standard_header;
