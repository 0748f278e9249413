//! remote-protocol
//!
//! Wire-level encoding/decoding for the remote control service.
//!
//! The protocol is newline-delimited UTF-8 text. Each line is a verb
//! followed by `|`-separated arguments. There is no escaping, no
//! framing beyond the newline, and no version negotiation.
//!
//! - [`wire`]       : separators, markers and fixed strings
//! - [`line_codec`] : inbound lines → [`Request`], [`Event`] → outbound lines

pub mod wire;
pub mod line_codec;

pub use line_codec::{
    format_bool,
    format_event,
    parse_bool,
    parse_request,
    split_line,
    Command,
    Event,
    Request,
    TrackList,
};
