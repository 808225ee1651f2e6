//! Seams between the engine and its external collaborators.

pub mod channel;
pub mod provider;
pub mod store;

pub use channel::Channel;
pub use provider::Provider;
pub use store::RowStore;
