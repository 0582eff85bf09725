//! The post-decrypt tokenizer and typed dispatcher.
//!
//! A one-byte tag identifies the inner message kind, and an unrecognized
//! tag is rejected rather than silently skipped. Every inner message here
//! additionally carries the channel number it's routed to, immediately
//! after the tag, since all seven kinds route to the channel identified
//! by that field.
//!
//! Wire layout of one inner message:
//!
//! ```text
//! offset 0 : tag             (u8)
//! offset 1 : channel_number  (u32, big-endian)
//! offset 5 : payload         (kind-dependent, possibly empty)
//! ```

use crate::error::{Result, TunnelError};

const TAG_SIZE: usize = 1;
const CHANNEL_NUMBER_SIZE: usize = 4;
const INNER_HEADER_SIZE: usize = TAG_SIZE + CHANNEL_NUMBER_SIZE;

const TAG_KEEPALIVE: u8 = 0x00;
const TAG_CHANNEL_APP_DATA: u8 = 0x01;
const TAG_CHANNEL_APP_DATA_ACK: u8 = 0x02;
const TAG_CHANNEL_OPEN: u8 = 0x03;
const TAG_CHANNEL_OPEN_ACK: u8 = 0x04;
const TAG_CHANNEL_OPEN_NACK: u8 = 0x05;
const TAG_CHANNEL_DESTROY: u8 = 0x06;

/// One decoded post-decrypt inner message, tagged with the channel it's
/// routed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InnerMessage {
    /// Tunnel-level liveness ping; carries no channel-specific payload.
    /// Channel number is conventionally `0`.
    Keepalive,

    /// Application data bound for `channel_number`.
    ChannelAppData { channel_number: u32, payload: Vec<u8> },

    /// Acknowledges application data previously sent on `channel_number`.
    ChannelAppDataAck { channel_number: u32 },

    /// Requests a new channel-slot at `channel_number` (remote-allocated,
    /// see [`crate::channel_table::ChannelTable::record_remote`]).
    ChannelOpen { channel_number: u32 },

    /// Confirms a channel-open request.
    ChannelOpenAck { channel_number: u32 },

    /// Rejects a channel-open request. Retained for interop with peers
    /// that still send it.
    ChannelOpenNack { channel_number: u32 },

    /// Tears down `channel_number`.
    ChannelDestroy { channel_number: u32 },
}

impl InnerMessage {
    /// The channel this message is routed to. `0` for [`Self::Keepalive`],
    /// which is not channel-specific.
    #[must_use]
    pub fn channel_number(&self) -> u32 {
        match *self {
            InnerMessage::Keepalive => 0,
            InnerMessage::ChannelAppData { channel_number, .. }
            | InnerMessage::ChannelAppDataAck { channel_number }
            | InnerMessage::ChannelOpen { channel_number }
            | InnerMessage::ChannelOpenAck { channel_number }
            | InnerMessage::ChannelOpenNack { channel_number }
            | InnerMessage::ChannelDestroy { channel_number } => channel_number,
        }
    }

    /// Encode this message to its wire form.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let (tag, channel_number, payload): (u8, u32, &[u8]) = match self {
            InnerMessage::Keepalive => (TAG_KEEPALIVE, 0, &[]),
            InnerMessage::ChannelAppData { channel_number, payload } => {
                (TAG_CHANNEL_APP_DATA, *channel_number, payload.as_slice())
            }
            InnerMessage::ChannelAppDataAck { channel_number } => (TAG_CHANNEL_APP_DATA_ACK, *channel_number, &[]),
            InnerMessage::ChannelOpen { channel_number } => (TAG_CHANNEL_OPEN, *channel_number, &[]),
            InnerMessage::ChannelOpenAck { channel_number } => (TAG_CHANNEL_OPEN_ACK, *channel_number, &[]),
            InnerMessage::ChannelOpenNack { channel_number } => (TAG_CHANNEL_OPEN_NACK, *channel_number, &[]),
            InnerMessage::ChannelDestroy { channel_number } => (TAG_CHANNEL_DESTROY, *channel_number, &[]),
        };

        let mut out = Vec::with_capacity(INNER_HEADER_SIZE + payload.len());
        out.push(tag);
        out.extend_from_slice(&channel_number.to_be_bytes());
        out.extend_from_slice(payload);
        out
    }
}

/// Tokenize one frame of decrypted plaintext into a single [`InnerMessage`].
///
/// `AxolotlState::decrypt` already yields one plaintext buffer per frame,
/// so tokenizing reduces to decoding exactly one message from it (no
/// multi-message batching within a frame).
///
/// # Errors
///
/// Returns [`TunnelError::UnknownInnerMessageType`] for an unrecognized
/// tag, or [`TunnelError::InnerFrameTooShort`] if `plaintext` is shorter
/// than its kind requires.
pub fn decode(plaintext: &[u8]) -> Result<InnerMessage> {
    if plaintext.len() < INNER_HEADER_SIZE {
        return Err(TunnelError::InnerFrameTooShort {
            expected: INNER_HEADER_SIZE,
            actual: plaintext.len(),
        });
    }

    let tag = plaintext[0];
    let channel_number = u32::from_be_bytes(plaintext[TAG_SIZE..INNER_HEADER_SIZE].try_into().expect("slice is 4 bytes"));
    let payload = &plaintext[INNER_HEADER_SIZE..];

    match tag {
        TAG_KEEPALIVE => Ok(InnerMessage::Keepalive),
        TAG_CHANNEL_APP_DATA => Ok(InnerMessage::ChannelAppData {
            channel_number,
            payload: payload.to_vec(),
        }),
        TAG_CHANNEL_APP_DATA_ACK => Ok(InnerMessage::ChannelAppDataAck { channel_number }),
        TAG_CHANNEL_OPEN => Ok(InnerMessage::ChannelOpen { channel_number }),
        TAG_CHANNEL_OPEN_ACK => Ok(InnerMessage::ChannelOpenAck { channel_number }),
        TAG_CHANNEL_OPEN_NACK => Ok(InnerMessage::ChannelOpenNack { channel_number }),
        TAG_CHANNEL_DESTROY => Ok(InnerMessage::ChannelDestroy { channel_number }),
        other => Err(TunnelError::UnknownInnerMessageType(other)),
    }
}
