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

//! Core types of the engine.io protocol shared by the engineioxide crates:
//! * [`Packet`] and [`OpenPacket`] with their string serialization.
//! * The http long-polling [`payload`] encoding for both protocol versions.
//! * The [`Sid`], [`Str`], [`TransportType`] and [`ProtocolVersion`] types.

mod packet;
mod protocol;
mod sid;
mod str;

pub mod payload;

pub use packet::{OpenPacket, Packet, PacketBuf, PacketParseError};
pub use protocol::{
    ProtocolVersion, TransportType, UnknownProtocolVersionError, UnknownTransportError,
};
pub use sid::{Sid, SidDecodeError};
pub use str::Str;
