//! Vehicle on-board-diagnostics (OBD) message compiler and decoder.
//!
//! Given a declarative catalog of OBD parameters, this crate builds the
//! request frames to transmit on the vehicle bus and validates, defragments
//! and interprets the response frames into numeric measurements and
//! labelled facts.
//!
//! The flow is: fill a [`ParameterFrame`] with lookup keys, let
//! [`Engine::build`] compile the outbound messages, transmit them through
//! whatever adapter is at hand, store the received raw frames back on the
//! frame, and let [`Engine::parse`] produce [`Data`] records.
//!
//! Transport, file I/O and the catalog file format live outside this crate;
//! see `obdwire-xml` for the XML definitions loader.

// --- Foundation Modules ---
pub mod defs;
pub mod error;
pub mod types;
pub mod util;

// --- Frame Codec ---
pub mod frame;

// --- Decoder Host and Orchestration ---
mod script;

pub mod engine;

// --- Top-level Exports ---
pub use defs::Definitions;
pub use engine::Engine;
pub use error::ObdError;
pub use script::DecoderHandle;
pub use types::{
    Data, LiteralData, MessageData, NumericalData, ParameterFrame, ParseMode, Protocol,
};
pub use util::{byte_of_hex, bytes_to_hex, hex_of_byte};
