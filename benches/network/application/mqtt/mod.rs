pub mod client;
pub mod inbound;
pub mod packet;
