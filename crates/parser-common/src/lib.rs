#![warn(
    clippy::all,
    clippy::todo,
    clippy::empty_enum,
    clippy::mem_forget,
    clippy::unused_self,
    clippy::filter_map_next,
    clippy::needless_continue,
    clippy::needless_borrow,
    clippy::match_wildcard_for_single_variants,
    clippy::if_let_mutex,
    clippy::await_holding_lock,
    clippy::match_on_vec_items,
    clippy::imprecise_flops,
    clippy::suboptimal_flops,
    clippy::lossy_float_literal,
    clippy::rest_pat_in_fully_bound_structs,
    clippy::fn_params_excessive_bools,
    clippy::exit,
    clippy::inefficient_to_string,
    clippy::linkedlist,
    clippy::macro_use_imports,
    clippy::option_option,
    clippy::verbose_file_reads,
    clippy::unnested_or_patterns,
    rust_2018_idioms,
    rust_2024_compatibility,
    future_incompatible,
    nonstandard_style,
    missing_docs
)]

//! The common parser sub-crate for the socketioxide client.
//!
//! This is the default parser implementation.
//!
//! It is used to parse and serialize the common packet format of the socket.io protocol:
//! ```text
//! <packet type>[<# of binary attachments>-][<namespace>,][<acknowledgment id>][JSON-stringified payload without binary]
//! + binary attachments extracted
//! ```
use std::collections::BTreeSet;

use bytes::Bytes;
use socketioxide_core::{
    PayloadValue, Str,
    packet::{Packet, PacketData},
    parser::{EncodedPacket, Parse, ParseError, ParserState, PartialPacket},
};

mod de;
mod ser;

/// Parse and serialize from and into the socket.io common packet format.
/// See details in the [socket.io protocol doc](https://socket.io/fr/docs/v4/socket-io-protocol/#packet-encoding).
#[derive(Debug, Default, Clone, Copy)]
pub struct CommonParser;

impl Parse for CommonParser {
    fn encode(self, packet: Packet) -> EncodedPacket {
        ser::serialize_packet(packet)
    }

    fn decode_str(self, state: &ParserState, value: Str) -> Result<Packet, ParseError> {
        let (mut packet, attachments) = de::deserialize_packet(value)?;
        match attachments {
            Some(0) => {
                resolve_placeholders(&mut packet.inner, &[])?;
                Ok(packet)
            }
            Some(expected) => {
                *state.partial_bin_packet.lock().unwrap() = Some(PartialPacket {
                    packet,
                    expected,
                    attachments: Vec::new(),
                });
                Err(ParseError::NeedsMoreBinaryData)
            }
            None => Ok(packet),
        }
    }

    fn decode_bin(self, state: &ParserState, data: Bytes) -> Result<Packet, ParseError> {
        let mut partial = state.partial_bin_packet.lock().unwrap();
        let Some(bin_packet) = partial.as_mut() else {
            return Err(ParseError::UnexpectedBinaryPacket);
        };
        // We copy the data to avoid holding a ref to the engine.io
        // websocket buffer too long.
        bin_packet.attachments.push(Bytes::copy_from_slice(&data));
        if bin_packet.attachments.len() < bin_packet.expected {
            return Err(ParseError::NeedsMoreBinaryData);
        }
        let PartialPacket {
            mut packet,
            attachments,
            ..
        } = partial.take().ok_or(ParseError::UnexpectedBinaryPacket)?;
        resolve_placeholders(&mut packet.inner, &attachments)?;
        Ok(packet)
    }

    fn finalize(self, state: &ParserState) -> Result<(), ParseError> {
        match state.partial_bin_packet.lock().unwrap().take() {
            Some(partial) => Err(ParseError::AttachmentMismatch {
                expected: partial.expected,
                received: partial.attachments.len(),
            }),
            None => Ok(()),
        }
    }
}

/// Replace every placeholder of the packet with its attachment.
///
/// The placeholders can be anywhere in the payload and in any order, but they must
/// reference exactly the indices `0..attachments.len()`.
fn resolve_placeholders(data: &mut PacketData, attachments: &[Bytes]) -> Result<(), ParseError> {
    let args = match data {
        PacketData::BinaryEvent(_, args, _) | PacketData::BinaryAck(args, _) => args,
        _ => return Ok(()),
    };
    let mut referenced = BTreeSet::new();
    for arg in args {
        arg.visit_mut(&mut |value| {
            if let Some(num) = placeholder_num(value) {
                referenced.insert(num);
                if let Some(data) = attachments.get(num) {
                    *value = PayloadValue::Binary(num, data.clone());
                }
            }
        });
    }
    let exact = referenced.len() == attachments.len()
        && referenced.last().is_none_or(|max| *max < attachments.len());
    if exact {
        Ok(())
    } else {
        Err(ParseError::AttachmentMismatch {
            expected: attachments.len(),
            received: referenced.len(),
        })
    }
}

/// Returns the index of a `{"_placeholder":true,"num":<num>}` object.
fn placeholder_num(value: &PayloadValue) -> Option<usize> {
    let obj = value.as_object()?;
    if obj.len() != 2 || obj.get("_placeholder")?.as_bool() != Some(true) {
        return None;
    }
    match obj.get("num")? {
        PayloadValue::Number(n) => n.as_u64().map(|n| n as usize),
        _ => None,
    }
}
