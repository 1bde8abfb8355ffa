//! Domain Layer - Farm model and state.
//!
//! Pure types and logic with no I/O: the structured farm entities, the
//! reducer that folds decoded events into the farm snapshot, and the shapes
//! returned by historical queries.

/// Turbines, alerts and farm statistics.
pub mod farm;

/// Historical query results.
pub mod history;

/// Farm snapshot and the reducer applied to it.
pub mod state;
