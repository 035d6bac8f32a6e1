pub const DEFAULT_STUN_ADDR: &str = "stun:stun.l.google.com:19302";
pub const DEFAULT_STUN_ADDR_2: &str = "stun:stun1.l.google.com:19302";
pub const DEFAULT_STUN_ADDR_3: &str = "stun:stun2.l.google.com:19302";
pub const DEFAULT_STUN_ADDR_4: &str = "stun:stun3.l.google.com:19302";

pub const DEFAULT_STUN_SERVERS: [&str; 4] = [
    DEFAULT_STUN_ADDR,
    DEFAULT_STUN_ADDR_2,
    DEFAULT_STUN_ADDR_3,
    DEFAULT_STUN_ADDR_4,
];

/// Relay-side cap on room occupancy.
pub const MAX_ROOM_USERS: usize = 6;
