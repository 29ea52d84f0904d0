pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod nonce_store;
pub mod request;
pub mod server;
pub mod session;
pub mod signer;
