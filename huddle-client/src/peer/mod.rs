mod connection_wrapper;
mod registry;
mod sdp;
mod session;
mod track_sync;
mod transport;
mod transport_config;
mod view;

pub use connection_wrapper::{ConnectionWrapper, WebRtcTransportFactory};
pub use registry::PeerRegistry;
pub use session::{
    NegotiationState, OfferOutcome, PeerSession, Polarity, TrackSyncOutcome, polarity_for,
};
pub use track_sync::{SyncReport, TrackSynchronizer};
pub use transport::{LinkState, PeerTransport, RemoteMedia, TransportEvent, TransportFactory};
pub use transport_config::TransportConfig;
pub use view::{PeerView, RoomView};
