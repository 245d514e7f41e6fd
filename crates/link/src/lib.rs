/**
 * Broker connection for DSLink clients.
 *  Turns a [`config::LinkConfig`] into an authenticated
 *  stream to a broker: announce the link over HTTP, check
 *  the broker's reply, derive the auth token and open the
 *  websocket.
 */
pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod handshake;
pub mod logging;
pub mod settings;
pub mod transport;

pub use client::{Connection, NegotiationState, Negotiator, Session};
pub use config::{ConfigError, LinkConfig, LinkConfigBuilder};
pub use error::ConnError;
pub use settings::{Settings, SettingsError};

pub mod prelude {
    pub use crate::client::{Connection, NegotiationState, Negotiator};
    pub use crate::codec::{Codec, CodecRegistry, FrameKind, JsonCodec, MsgpackCodec};
    pub use crate::config::LinkConfig;
    pub use crate::error::ConnError;
    pub use common::prelude::*;
}
