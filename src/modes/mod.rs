pub mod interaction;

pub use interaction::{InteractionPhase, InteractionState, PointerEvent, RunId};
