//! Event publisher adapters.

mod broadcast;

pub use broadcast::BroadcastEventPublisher;
