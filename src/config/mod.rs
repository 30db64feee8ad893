//! Configuration Module
//!
//! Settings loaded from defaults, optional config files, and environment
//! variables.

mod settings;

pub use settings::{
    DatabaseSettings, GatewaySettings, MembershipSettings, RedisSettings, Settings,
    StorageSettings, TransportSettings, WebSocketSettings,
};
