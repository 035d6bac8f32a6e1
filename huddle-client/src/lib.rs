//! Client side of a small peer-to-peer video meeting: local capture, relay
//! signaling and one WebRTC session per remote participant.

pub mod config;
pub mod error;
pub mod media;
pub mod peer;
pub mod room;
pub mod signaling;

pub use config::ClientConfig;
pub use error::{CaptureError, HuddleError, Result};
pub use room::{RoomHandle, RoomSession, RoomSnapshot, SessionDeps};

use std::sync::Arc;

use crate::peer::{TransportConfig, WebRtcTransportFactory};
use crate::signaling::WsConnector;

/// Production boundaries: WebSocket relay and webrtc-rs transports around
/// the given capture device.
pub fn default_deps(
    config: &ClientConfig,
    capture: Arc<dyn media::CaptureDevice>,
) -> SessionDeps {
    SessionDeps {
        capture,
        connector: Arc::new(WsConnector::new(
            config.signaling_url.clone(),
            config.reconnect.clone(),
        )),
        transports: Arc::new(WebRtcTransportFactory::new(TransportConfig::new(
            config.ice_servers.clone(),
        ))),
    }
}
