// crates/obdwire/src/types.rs

//! Value types shuttled between the caller and the engine.

use serde::{Deserialize, Serialize};

use crate::script::DecoderHandle;

/// Wire protocol family of a built parameter frame.
///
/// The discriminants are the protocol tag values; families below 0xA00
/// share the legacy fixed three-byte header layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Protocol {
    SaeJ1850 = 0x001,
    Iso9141_2 = 0x002,
    Iso14230 = 0xA01,
    /// Extended and mixed addressing are not supported.
    Iso15765 = 0xA02,
}

impl Protocol {
    /// Legacy protocols use the strict OBD-II three-byte header and are
    /// cleaned by the legacy frame cleaner.
    pub fn is_legacy(self) -> bool {
        (self as u16) < 0xA00
    }
}

/// How the decoder script is dispatched over the cleaned responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseMode {
    /// The decoder runs once for every cleaned (header, data) pair.
    #[default]
    Separately,
    /// The decoder runs a single time over all message data; scripts
    /// address individual responses with `REQ(n).DATA(n).BYTE(n)`.
    Combined,
}

/// Per-request message container.
///
/// Carries the request to transmit, the shape any response is expected to
/// have, the raw frames the caller received, and the cleaned result the
/// decoder consumes. A parameter needing several requests owns one of
/// these per request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageData {
    /// Header bytes for the outgoing request.
    pub req_header_bytes: Vec<u8>,
    /// Request data, one entry per transmitted frame.
    pub list_req_data_bytes: Vec<Vec<u8>>,
    /// Delay to wait before sending this request.
    pub req_data_delay_ms: u32,

    /// Header bytes a response frame is expected to carry.
    pub exp_header_bytes: Vec<u8>,
    /// Mask selecting which bits of `exp_header_bytes` are significant.
    /// Always the same length as `exp_header_bytes`.
    pub exp_header_mask: Vec<u8>,
    /// Bytes every response payload must start with; stripped while
    /// cleaning.
    pub exp_data_prefix: Vec<u8>,
    /// Payload length after the prefix, when the catalog declares one.
    pub exp_data_byte_count: Option<usize>,

    /// Received frames, each one header bytes immediately followed by data
    /// bytes. Frames may have originated from different source addresses
    /// and need no particular order.
    pub list_raw_frames: Vec<Vec<u8>>,

    /// Validated response headers; parallel to `list_data`.
    pub list_headers: Vec<Vec<u8>>,
    /// Defragmented, prefix-stripped payloads; parallel to `list_headers`.
    pub list_data: Vec<Vec<u8>>,
}

/// All the state for a single parameter: the lookup keys the caller fills
/// in, the options and messages the engine compiles from the catalog, and
/// the raw response frames the caller collects from the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterFrame {
    /// Specification name, e.g. "SAEJ1979".
    pub spec: String,
    /// Protocol name as written in the catalog, e.g. "ISO 9141-2".
    pub protocol: String,
    /// Logical bus address name, e.g. "Default".
    pub address: String,
    /// Parameter name, e.g. "Engine RPM".
    pub name: String,

    /// Prepend ISO 15765 PCI bytes to the built request data.
    pub iso15765_add_pci_byte: bool,
    /// Split ISO 15765 request data longer than seven bytes into frames.
    pub iso15765_split_req_into_frames: bool,

    /// Set from the parameter's `parse` attribute.
    pub parse_mode: ParseMode,
    /// Protocol family resolved while building; `None` until built.
    pub parse_protocol: Option<Protocol>,
    /// ISO 14230 "Length Byte" option.
    pub iso14230_add_length_byte: bool,
    /// The protocol carries 29-bit identifiers ("Extended Id").
    pub iso15765_extended_id: bool,
    /// ISO 15765 "Extended Address" option. Stored, not acted on.
    pub iso15765_extended_addr: bool,

    /// One entry per request; a parameter without requests keeps a single
    /// entry holding only the expected response header.
    pub list_message_data: Vec<MessageData>,

    /// Decoder resolved from the script registry while building.
    pub decoder: Option<DecoderHandle>,
}

impl ParameterFrame {
    pub fn new(
        spec: impl Into<String>,
        protocol: impl Into<String>,
        address: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        ParameterFrame {
            spec: spec.into(),
            protocol: protocol.into(),
            address: address.into(),
            name: name.into(),
            ..ParameterFrame::default()
        }
    }
}

impl Default for ParameterFrame {
    fn default() -> Self {
        ParameterFrame {
            spec: String::new(),
            protocol: String::new(),
            address: String::new(),
            name: String::new(),
            iso15765_add_pci_byte: true,
            iso15765_split_req_into_frames: true,
            parse_mode: ParseMode::default(),
            parse_protocol: None,
            iso14230_add_length_byte: false,
            iso15765_extended_id: false,
            iso15765_extended_addr: false,
            list_message_data: Vec::new(),
            decoder: None,
        }
    }
}

/// A decoded numeric measurement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NumericalData {
    pub property: String,
    pub value: f64,
    pub min: f64,
    pub max: f64,
    pub units: String,
}

/// A decoded boolean fact with labels for both outcomes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiteralData {
    pub property: String,
    pub value: bool,
    pub value_if_true: String,
    pub value_if_false: String,
}

/// One decoded response: everything a single decoder invocation produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Data {
    /// Parameter name the data belongs to.
    pub param_name: String,
    /// Address name the response came from.
    pub src_name: String,
    pub list_numerical_data: Vec<NumericalData>,
    pub list_literal_data: Vec<LiteralData>,
}
