//! Application Layer - Use cases and port definitions.
//!
//! This layer contains the façade service and the port interfaces that
//! define how the farm model interacts with the broker and the history API.

/// Port interfaces for external systems (broker, history API).
pub mod ports;

/// The wind farm façade service.
pub mod services;
