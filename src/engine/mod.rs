mod reconciler;
mod signals;
mod state;

pub use reconciler::{EngineConfig, Reconciler};
pub use signals::{PageSignal, ReconcilerHandle};
pub use state::{evaluate, FilterState, BLOCK_NOTICE};
