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

//! Core types shared by the socketioxide client crates:
//! * The socket.io [`Packet`](packet::Packet) model.
//! * The dynamic [`PayloadValue`] carried by events and acknowledgements.
//! * The [`Parse`](parser::Parse) interface implemented by socket.io parsers.

pub mod errors;
pub mod packet;
pub mod parser;
mod value;

pub use engineioxide_core::{Sid, Str};
pub use value::PayloadValue;
