// crates/obdwire/tests/simulator/mod.rs

//! Fabricates vehicle responses for built parameter frames.
//!
//! Each `sim_response_*` helper appends raw frames to every message of a
//! frame, shaped the way the corresponding protocol puts them on the bus.
//! With `randomize_header` the declared header expectation is replaced by
//! random bytes with a zeroed mask, which exercises the masked matching
//! path.

use obdwire::defs::{
    Address, Definitions, HeaderTemplate, Parameter, ParameterGroup, ProtocolDef, Script, Spec,
};
use obdwire::{ParameterFrame, Protocol};

/// Deterministic xorshift byte source; tests stay reproducible without a
/// rand dependency.
pub struct ByteGen(u32);

impl ByteGen {
    pub fn new(seed: u32) -> Self {
        ByteGen(seed.max(1))
    }

    pub fn next_byte(&mut self) -> u8 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.0 = x;
        (x >> 16) as u8
    }
}

/// Legacy (SAE J1850 / ISO 9141-2): every response is a single frame of
/// [3-byte header] [prefix] [data bytes].
pub fn sim_response_legacy(frame: &mut ParameterFrame, frames: usize, randomize_header: bool, r#gen: &mut ByteGen) {
    assert!(frame.parse_protocol.is_some_and(Protocol::is_legacy));

    for msg in &mut frame.list_message_data {
        let count = msg.exp_data_byte_count.unwrap_or(4);

        let mut header = msg.exp_header_bytes.clone();
        if randomize_header {
            for (slot, byte) in header.iter_mut().enumerate() {
                msg.exp_header_bytes[slot] = 0x00;
                msg.exp_header_mask[slot] = 0x00;
                *byte = r#gen.next_byte();
            }
        }

        for _ in 0..frames {
            let mut raw = header.clone();
            raw.extend_from_slice(&msg.exp_data_prefix);
            raw.extend((0..count).map(|_| r#gen.next_byte()));
            msg.list_raw_frames.push(raw);
        }
    }
}

/// ISO 14230: the response header is built in the requested shape
/// (`header_length` 1 to 4) with the payload length encoded accordingly.
pub fn sim_response_iso14230(
    frame: &mut ParameterFrame,
    frames: usize,
    randomize_header: bool,
    header_length: usize,
    r#gen: &mut ByteGen,
) {
    assert_eq!(frame.parse_protocol, Some(Protocol::Iso14230));

    for msg in &mut frame.list_message_data {
        let count = msg.exp_data_byte_count.unwrap_or(4);
        let data_length = (count + msg.exp_data_prefix.len()) as u8;

        let exp = |slot: usize| msg.exp_header_bytes.get(slot).copied().unwrap_or(0);

        let mut header = Vec::new();
        match header_length {
            1 => {
                // [F], length inline
                header.push(0x3F & data_length);
            }
            2 => {
                // [F] [L]; zero L-bits select the separate length byte
                header.push(0x00);
                header.push(data_length);
            }
            3 => {
                // [F] [T] [S], length inline, addressing bit set
                header.push(0x80 | (0x3F & data_length));
                header.push(exp(1));
                header.push(exp(2));
            }
            4 => {
                // [F] [T] [S] [L]
                let mut format = exp(0) & !0x3F;
                if format & 0xC0 == 0 {
                    format |= 0x80;
                }
                header.push(format);
                header.push(exp(1));
                header.push(exp(2));
                header.push(data_length);
            }
            other => panic!("unsupported ISO 14230 header length {other}"),
        }

        if randomize_header {
            msg.exp_header_bytes[1] = r#gen.next_byte();
            msg.exp_header_mask[1] = 0x00;
            msg.exp_header_bytes[2] = r#gen.next_byte();
            msg.exp_header_mask[2] = 0x00;
        }

        for _ in 0..frames {
            let mut raw = header.clone();
            raw.extend_from_slice(&msg.exp_data_prefix);
            raw.extend((0..count).map(|_| r#gen.next_byte()));
            msg.list_raw_frames.push(raw);
        }
    }
}

/// ISO 15765: a one-frame response is a single frame, more become a first
/// frame plus consecutive frames of seven data bytes each.
pub fn sim_response_iso15765(
    frame: &mut ParameterFrame,
    frames: usize,
    randomize_header: bool,
    r#gen: &mut ByteGen,
) {
    assert_eq!(frame.parse_protocol, Some(Protocol::Iso15765));

    for msg in &mut frame.list_message_data {
        let mut header = msg.exp_header_bytes.clone();
        if randomize_header {
            for (slot, byte) in header.iter_mut().enumerate() {
                *byte = r#gen.next_byte();
                msg.exp_header_mask[slot] = 0x00;
            }
        }

        if frames == 1 {
            // single frame: pci claims seven data bytes
            let mut data = vec![0x07];
            data.extend_from_slice(&msg.exp_data_prefix);
            data.extend((0..7 - msg.exp_data_prefix.len()).map(|_| r#gen.next_byte()));

            let mut raw = header.clone();
            raw.extend_from_slice(&data);
            msg.list_raw_frames.push(raw);
            continue;
        }

        let total = frames * 7 - 1;
        let mut payload: Vec<u8> = msg.exp_data_prefix.clone();
        payload.extend((0..total - msg.exp_data_prefix.len()).map(|_| r#gen.next_byte()));
        let mut remaining = payload.as_slice();

        for index in 0..frames {
            let mut raw = header.clone();
            if index == 0 {
                raw.push(((total >> 8) as u8 & 0x0F) | 0x10);
                raw.push(total as u8);
                raw.extend_from_slice(&remaining[..6]);
                remaining = &remaining[6..];
            } else {
                raw.push(0x20 | (index % 0x10) as u8);
                raw.extend_from_slice(&remaining[..7]);
                remaining = &remaining[7..];
            }
            msg.list_raw_frames.push(raw);
        }
    }
}

const ALL_PROTOCOLS: &str = "ISO 9141-2,ISO 14230,ISO 15765 Standard Id,ISO 15765 Extended Id";

const SEPARATE_DECODER: &str = "\
let d = NumericalData();
d.value = BYTE(0);
d.min = 0.0;
d.max = 255.0;
d.units = \"raw\";
saveNumericalData(d);";

const COMBINED_DECODER: &str = "\
let d = NumericalData();
d.value = REQ(0).DATA(0).BYTE(0);
d.units = \"raw\";
saveNumericalData(d);";

fn parameter(name: &str, parse: Option<&str>, attrs: &[(&str, &str)], decoder: &str) -> Parameter {
    Parameter {
        name: name.into(),
        parse: parse.map(String::from),
        attrs: attrs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        scripts: vec![Script {
            protocols: ALL_PROTOCOLS.into(),
            source: decoder.into(),
        }],
    }
}

/// The TEST catalog: every request/frame/parse-mode combination, shared by
/// all four protocol entries.
pub fn test_definitions() -> Definitions {
    let single_request: &[(&str, &str)] = &[
        ("request", "0x01 0x0C"),
        ("response.prefix", "0x41 0x0C"),
        ("response.bytes", "2"),
    ];
    let single_request_open: &[(&str, &str)] = &[
        ("request", "0x01 0x0C"),
        ("response.prefix", "0x41 0x0C"),
    ];
    let multi_request: &[(&str, &str)] = &[
        ("request0", "0x01 0x0C"),
        ("response0.prefix", "0x41 0x0C"),
        ("request1", "0x01 0x0D"),
        ("response1.prefix", "0x41 0x0D"),
    ];
    // 20 payload bytes 0x00..=0x13, no response prefix
    let long_request_bytes = (0u8..20)
        .map(|byte| format!("{byte:#04X}"))
        .collect::<Vec<_>>()
        .join(" ");
    let long_request: &[(&str, &str)] = &[("request", &long_request_bytes)];

    Definitions {
        specs: vec![Spec {
            name: "TEST".into(),
            protocols: vec![
                ProtocolDef {
                    name: "ISO 9141-2".into(),
                    options: Vec::new(),
                    addresses: vec![Address {
                        name: "Default".into(),
                        request: Some(HeaderTemplate {
                            prio: Some("0x68".into()),
                            target: Some("0x6A".into()),
                            source: Some("0xF1".into()),
                            ..HeaderTemplate::default()
                        }),
                        response: Some(HeaderTemplate {
                            prio: Some("0x48".into()),
                            target: Some("0x6B".into()),
                            source: Some("0x10".into()),
                            ..HeaderTemplate::default()
                        }),
                    }],
                },
                ProtocolDef {
                    name: "ISO 14230".into(),
                    options: Vec::new(),
                    addresses: vec![Address {
                        name: "Default".into(),
                        request: Some(HeaderTemplate {
                            format: Some("0xC0".into()),
                            target: Some("0x33".into()),
                            source: Some("0xF1".into()),
                            ..HeaderTemplate::default()
                        }),
                        response: Some(HeaderTemplate {
                            target: Some("0xF1".into()),
                            source: Some("0x10".into()),
                            ..HeaderTemplate::default()
                        }),
                    }],
                },
                ProtocolDef {
                    name: "ISO 15765 Standard Id".into(),
                    options: Vec::new(),
                    addresses: vec![Address {
                        name: "Default".into(),
                        request: Some(HeaderTemplate {
                            identifier: Some("0x7DF".into()),
                            ..HeaderTemplate::default()
                        }),
                        response: Some(HeaderTemplate {
                            identifier: Some("0x7E8".into()),
                            ..HeaderTemplate::default()
                        }),
                    }],
                },
                ProtocolDef {
                    name: "ISO 15765 Extended Id".into(),
                    options: Vec::new(),
                    addresses: vec![Address {
                        name: "Default".into(),
                        request: Some(HeaderTemplate {
                            prio: Some("0x18".into()),
                            format: Some("0xDB".into()),
                            target: Some("0x33".into()),
                            source: Some("0xF1".into()),
                            ..HeaderTemplate::default()
                        }),
                        response: Some(HeaderTemplate {
                            prio: Some("0x18".into()),
                            format: Some("0xDA".into()),
                            target: Some("0xF1".into()),
                            source: Some("0x10".into()),
                            ..HeaderTemplate::default()
                        }),
                    }],
                },
            ],
            parameter_groups: vec![ParameterGroup {
                address: "Default".into(),
                parameters: vec![
                    parameter("T_REQ_NONE_RESP_SF_PARSE_SEP", None, &[], SEPARATE_DECODER),
                    parameter(
                        "T_REQ_NONE_RESP_MF_PARSE_COMBINED",
                        Some("combined"),
                        &[],
                        COMBINED_DECODER,
                    ),
                    parameter(
                        "T_REQ_SINGLE_RESP_SF_PARSE_SEP",
                        None,
                        single_request,
                        SEPARATE_DECODER,
                    ),
                    parameter(
                        "T_REQ_SINGLE_RESP_MF_PARSE_SEP",
                        None,
                        single_request_open,
                        SEPARATE_DECODER,
                    ),
                    parameter(
                        "T_REQ_MULTI_RESP_SF_PARSE_SEP",
                        None,
                        multi_request,
                        SEPARATE_DECODER,
                    ),
                    parameter(
                        "T_REQ_MULTI_RESP_SF_PARSE_COMBINED",
                        Some("combined"),
                        multi_request,
                        COMBINED_DECODER,
                    ),
                    parameter(
                        "T_REQ_MULTI_RESP_MF_PARSE_COMBINED",
                        Some("combined"),
                        multi_request,
                        COMBINED_DECODER,
                    ),
                    parameter(
                        "T_REQ_LONG_RESP_LOOPBACK",
                        None,
                        long_request,
                        SEPARATE_DECODER,
                    ),
                ],
            }],
        }],
    }
}
