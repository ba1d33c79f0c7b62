pub mod committee;
pub mod threshold;

pub use committee::{Participants, Role, RESERVED_ACCOUNTS};
pub use threshold::QuorumParams;
