pub mod applied;
pub mod audit;
pub mod release;
pub mod run_state;
pub mod tree;

pub use applied::*;
pub use release::*;
pub use run_state::*;
pub use tree::*;
