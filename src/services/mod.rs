pub mod status_adapter;

pub use status_adapter::{Listing, StatusAdapter, UpdateOutcome, UpdateSettings};
