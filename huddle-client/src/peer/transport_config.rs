use huddle_core::IceServerConfig;
use crate::config::ClientConfig;
use webrtc::ice_transport::ice_server::RTCIceServer;

/// ICE configuration handed to every peer connection.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub ice_servers: Vec<IceServerConfig>,
}

impl TransportConfig {
    pub fn new(ice_servers: Vec<IceServerConfig>) -> Self {
        Self { ice_servers }
    }

    pub(crate) fn rtc_ice_servers(&self) -> Vec<RTCIceServer> {
        self.ice_servers
            .iter()
            .map(|s| RTCIceServer {
                urls: s.urls.clone(),
                username: s.username.clone().unwrap_or_default(),
                credential: s.credential.clone().unwrap_or_default(),
            })
            .collect()
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::new(ClientConfig::default().ice_servers)
    }
}
