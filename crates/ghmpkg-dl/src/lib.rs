pub mod error;
pub mod http_client;
pub mod rate;
pub mod retry;
pub mod transport;
