pub mod adapters;
pub mod server;
pub mod traffic;
