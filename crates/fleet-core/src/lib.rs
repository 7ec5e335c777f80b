//! In-memory state machines for the fleet control plane.
//!
//! Component boundaries mirror the ownership rules each module documents:
//! the Registry owns agent records, the Distributor owns distribution
//! records, the Reporter owns only a cache of scores it derives from the
//! other two's read APIs.

pub mod audit;
pub mod error;
pub mod models;
pub mod services;

pub use error::{FleetError, FleetResult};
