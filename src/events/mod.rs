// Events module - typed decoding of server-pushed payloads
mod action;
mod codec;

pub use action::{BroadcastMessage, ChannelAction, Column, PostgresChange, Record};
pub use codec::{decode, DecodedEvent};
