//! Meteonet protocol - messages exchanged between stations and brokers
//!
//! Shared by every Meteonet process:
//! - Value objects for readings and the three message kinds
//! - Typed control commands parsed once at the protocol boundary
//! - Wire codec (tagged JSON/XML distribution envelopes, untagged JSON control)
//! - Append-only payload journal

pub mod codec;
pub mod command;
pub mod journal;
pub mod models;

use std::net::Ipv4Addr;

pub use codec::{
    decode_control, decode_distribution, decode_response, encode_control, encode_distribution,
    encode_response, CodecError,
};
pub use command::{Command, CommandError};
pub use journal::PayloadJournal;
pub use models::{
    now_millis, ControlMessage, DistributionMessage, EncodingFormat, MessageType, ResponseMessage,
    ResponseStatus, Variable,
};

/// Port every station broadcasts readings to.
pub const BROADCAST_PORT: u16 = 5000;

/// Default destination of station broadcasts.
pub const BROADCAST_ADDRESS: Ipv4Addr = Ipv4Addr::BROADCAST;

/// Control target matching every station.
pub const TARGET_ALL: &str = "ALL";

/// Placeholder id used when the original message could not be identified.
pub const UNKNOWN_MESSAGE_ID: &str = "N/A";

/// Receive buffer large enough for any distribution datagram.
pub const MAX_DATAGRAM_SIZE: usize = 8192;
