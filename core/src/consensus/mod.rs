pub mod checkpoints;
pub mod constants;
pub mod emission;
pub mod mixins;

pub use checkpoints::Checkpoints;
pub use constants::*;
pub use emission::{base_reward, penalize_reward};
pub use mixins::MixinBounds;
