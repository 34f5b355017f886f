pub mod chain;
pub mod output;

pub use chain::{ChainStore, EventBatch};
pub use output::OutputStore;
