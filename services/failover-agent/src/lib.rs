//! Failover agent library.
//!
//! Wires the failover reconciler to a real provider:
//!
//! - `config`: environment configuration
//! - `provider`: HTTP/JSON `ProviderGateway`
//! - `worker`: periodic reconciliation loop

pub mod config;
pub mod provider;
pub mod worker;

pub use config::Config;
pub use provider::HttpProvider;
pub use worker::FailoverWorker;
