pub mod rhs;
pub mod traits;

pub use rhs::Rhs;
pub use traits::{Problem, SpaceTransfer, Sweeper};
