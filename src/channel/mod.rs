//! Watchtower-assisted payment channel: lifecycle state, typed contract
//! requests and the driver that measures each phase.

pub mod driver;
pub mod requests;
pub mod state;

pub use driver::{OpenedChannel, PhaseGas, ProtocolDriver, ScenarioCosts};
pub use requests::ChannelRequest;
pub use state::{ChannelPhase, ChannelSession};
