//! Podshare Core - Shared types and traits
//!
//! This crate defines the abstractions shared by the simulation engine and the
//! collaborators around it (series loaders, reporting, the CLI):
//!
//! Key types:
//! - `DemandSeries` trait (what a loader must provide)
//! - `SimulationObserver` trait (injected observability hooks)
//! - Sizing parameters and host capacity
//! - Error types

pub mod types;
pub mod traits;
pub mod error;

pub use types::*;
pub use traits::*;
pub use error::*;
