//! Command handler implementations.

pub mod simulated;
pub mod streaming;

pub use simulated::SimulatedPlayer;
pub use streaming::StreamingPlayer;
