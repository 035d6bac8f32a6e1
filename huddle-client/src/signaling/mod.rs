mod event;
mod signaling_output;
mod ws_channel;

pub use event::{EventTranslator, RoomEvent, SignalIntent};
pub use signaling_output::{RoomEvents, SignalingConnector, SignalingOutput};
pub use ws_channel::{WsConnector, WsSignaling};
