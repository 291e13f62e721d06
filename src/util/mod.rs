mod circular;
mod gate;
pub mod uri;

pub use circular::CircularBuffer;
pub use gate::{GateGuard, ThreadStore};
