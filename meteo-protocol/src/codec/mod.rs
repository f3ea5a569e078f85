//! Wire codec
//!
//! Distribution messages travel inside a tagged envelope, `JSON:{...}` or
//! `XML:<...>`. Control and response messages are always bare JSON.
//! Callers only go through the functions below, so a new format only
//! touches this module.

mod xml;

use crate::models::{ControlMessage, DistributionMessage, EncodingFormat, MessageType, ResponseMessage};

/// Separator between the envelope tag and the payload.
pub const TAG_SEPARATOR: char = ':';

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("encode error: {0}")]
    Encode(String),
}

pub fn encode_distribution(msg: &DistributionMessage) -> Result<String, CodecError> {
    let payload = match msg.encoding_format {
        EncodingFormat::Json => serde_json::to_string(msg).map_err(|e| CodecError::Encode(e.to_string()))?,
        EncodingFormat::Xml => xml::encode(msg)?,
    };
    Ok(format!("{}{}{}", msg.encoding_format.tag(), TAG_SEPARATOR, payload))
}

pub fn decode_distribution(raw: &str) -> Result<DistributionMessage, CodecError> {
    let (tag, payload) = raw
        .split_once(TAG_SEPARATOR)
        .ok_or_else(|| CodecError::MalformedEnvelope("missing format tag separator".into()))?;

    match EncodingFormat::from_tag(tag) {
        Some(EncodingFormat::Json) => {
            let mut msg: DistributionMessage =
                serde_json::from_str(payload).map_err(|e| CodecError::Parse(e.to_string()))?;
            if msg.message_type != MessageType::Distribution {
                return Err(CodecError::Parse(format!(
                    "unexpected message type {}",
                    msg.message_type.as_str()
                )));
            }
            msg.encoding_format = EncodingFormat::Json;
            Ok(msg)
        }
        Some(EncodingFormat::Xml) => xml::decode(payload),
        None => Err(CodecError::MalformedEnvelope(format!("unknown format tag '{}'", truncate(tag, 16)))),
    }
}

pub fn encode_control(msg: &ControlMessage) -> Result<String, CodecError> {
    serde_json::to_string(msg).map_err(|e| CodecError::Encode(e.to_string()))
}

pub fn decode_control(raw: &str) -> Result<ControlMessage, CodecError> {
    let mut msg: ControlMessage = serde_json::from_str(raw).map_err(|e| CodecError::Parse(e.to_string()))?;
    msg.encoding_format = EncodingFormat::Json;
    Ok(msg)
}

pub fn encode_response(msg: &ResponseMessage) -> Result<String, CodecError> {
    serde_json::to_string(msg).map_err(|e| CodecError::Encode(e.to_string()))
}

pub fn decode_response(raw: &str) -> Result<ResponseMessage, CodecError> {
    let mut msg: ResponseMessage = serde_json::from_str(raw).map_err(|e| CodecError::Parse(e.to_string()))?;
    msg.encoding_format = EncodingFormat::Json;
    Ok(msg)
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
