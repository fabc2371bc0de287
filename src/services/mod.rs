// Service exports
pub mod adapters;
pub mod provider;

pub use adapters::{spec_for, ProviderSpec};
pub use provider::{
    build_aggregator, http_client, HttpProviderClient, ProviderClient, ProviderConfig,
    ProviderError,
};
