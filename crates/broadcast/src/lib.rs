pub mod error;
pub mod relay;
pub mod transport;

pub use error::ChannelError;
pub use relay::{ChannelState, EmitOutcome, EventRelay, ZmqBroadcastRelay};
pub use transport::Transport;
