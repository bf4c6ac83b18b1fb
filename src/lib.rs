pub mod adapters;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod services;

pub use adapters::{MetricSender, NginxApiClient, SenderSummary, StatusSource, ZabbixSender};
pub use config::AppConfig;
pub use domain::{DiscoveryEnvelope, DiscoveryRecord, GroupKind, MetricSet, MetricValue, PeerGroup};
pub use error::{Result, StatusError};
pub use services::{Listing, StatusAdapter, UpdateOutcome, UpdateSettings};
