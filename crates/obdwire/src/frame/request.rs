// crates/obdwire/src/frame/request.rs

//! Builds the request data side of a parameter frame from its catalog
//! attributes, then applies the per-protocol wire formatting (ISO 15765
//! segmentation and PCI bytes, ISO 14230 length encoding).

use crate::defs::Parameter;
use crate::error::ObdError;
use crate::types::{MessageData, ParameterFrame, Protocol};
use crate::util;

/// Fills `frame.list_message_data` from the parameter's request/response
/// attributes.
///
/// A parameter declares either a single request (`request=`, with optional
/// `request.delay=` / `response.prefix=` / `response.bytes=`) or an indexed
/// sequence (`request0=`, `response0.prefix=`, ...). Mixing both forms is
/// an error. A parameter with neither is passive: nothing is transmitted
/// and the header-only message left by the header builder is kept for
/// validating monitored frames.
pub(crate) fn build_request_data(
    frame: &mut ParameterFrame,
    parameter: &Parameter,
) -> Result<(), ObdError> {
    let single = parameter.attr("request").is_some();
    let indexed = parameter.attr("request0").is_some();
    match (single, indexed) {
        (false, false) => return Ok(()),
        (true, true) => {
            return Err(ObdError::BuildFailed(
                "mixed single and indexed request forms".into(),
            ));
        }
        _ => {}
    }
    let multiple = indexed;

    let mut n = 0usize;
    loop {
        let (request, delay, prefix, count) = if multiple {
            (
                parameter.attr(&format!("request{n}")),
                parameter.attr(&format!("request{n}.delay")),
                parameter.attr(&format!("response{n}.prefix")),
                parameter.attr(&format!("response{n}.bytes")),
            )
        } else {
            (
                parameter.attr("request"),
                parameter.attr("request.delay"),
                parameter.attr("response.prefix"),
                parameter.attr("response.bytes"),
            )
        };
        let Some(request) = request else { break };

        // request 0 reuses the message the header builder pushed
        if n > 0 {
            frame.list_message_data.push(MessageData::default());
        }
        let Some(msg) = frame.list_message_data.last_mut() else {
            return Err(ObdError::BuildFailed(
                "no message data to attach request data to".into(),
            ));
        };

        let bytes = parse_byte_list(request)?;
        if bytes.is_empty() {
            return Err(ObdError::BuildFailed(format!(
                "invalid request data bytes {request:?}"
            )));
        }
        msg.list_req_data_bytes.push(bytes);

        if let Some(delay) = delay {
            msg.req_data_delay_ms = util::parse_uint_literal(delay)
                .ok_or_else(|| ObdError::BuildFailed(format!("bad request delay {delay:?}")))?;
        }
        if let Some(prefix) = prefix {
            msg.exp_data_prefix = parse_byte_list(prefix)?;
        }
        if let Some(count) = count {
            let count = util::parse_uint_literal(count).ok_or_else(|| {
                ObdError::BuildFailed(format!("bad response byte count {count:?}"))
            })?;
            msg.exp_data_byte_count = Some(count as usize);
        }

        if !multiple {
            break;
        }
        n += 1;
    }

    propagate_first_header(frame);

    match frame.parse_protocol {
        Some(Protocol::Iso15765) => format_iso15765_requests(frame),
        Some(Protocol::Iso14230) => format_iso14230_requests(frame)?,
        _ => {}
    }
    Ok(())
}

/// Later requests reuse the header the builder compiled into the first
/// message.
fn propagate_first_header(frame: &mut ParameterFrame) {
    let Some((first, rest)) = frame.list_message_data.split_first_mut() else {
        return;
    };
    for msg in rest {
        msg.req_header_bytes = first.req_header_bytes.clone();
        msg.exp_header_bytes = first.exp_header_bytes.clone();
        msg.exp_header_mask = first.exp_header_mask.clone();
    }
}

/// ISO 15765 request formatting: split payloads longer than seven bytes
/// into ISO-TP frames (six bytes in the first frame, seven in every
/// consecutive frame) and prepend PCI bytes.
fn format_iso15765_requests(frame: &mut ParameterFrame) {
    let split = frame.iso15765_split_req_into_frames;
    let add_pci = frame.iso15765_add_pci_byte;

    for msg in &mut frame.list_message_data {
        let Some(payload) = msg.list_req_data_bytes.first() else {
            continue;
        };
        let total = payload.len();

        if split && total > 7 {
            let payload = msg.list_req_data_bytes.swap_remove(0);
            let mut frames = Vec::with_capacity(1 + (total - 6).div_ceil(7));
            frames.push(payload[..6].to_vec());
            frames.extend(payload[6..].chunks(7).map(<[u8]>::to_vec));
            msg.list_req_data_bytes = frames;
        }

        if add_pci {
            if msg.list_req_data_bytes.len() == 1 {
                // single frame: high nibble 0, low nibble carries the length
                let pci = msg.list_req_data_bytes[0].len() as u8;
                msg.list_req_data_bytes[0].insert(0, pci);
            } else {
                // first frame: 0x1N NN carries the pre-split total length
                let first = &mut msg.list_req_data_bytes[0];
                first.insert(0, (total & 0xFF) as u8);
                first.insert(0, ((total & 0xF00) >> 8) as u8 | 0x10);

                // consecutive frames cycle 0x20..=0x2F starting at 0x21
                for (j, consecutive) in msg.list_req_data_bytes.iter_mut().enumerate().skip(1) {
                    consecutive.insert(0, 0x20 + (j % 0x10) as u8);
                }
            }
        }
    }
}

/// ISO 14230 request formatting: encode the data length either as a
/// trailing header byte or in the low six bits of the format byte.
fn format_iso14230_requests(frame: &mut ParameterFrame) -> Result<(), ObdError> {
    let add_length_byte = frame.iso14230_add_length_byte;

    for msg in &mut frame.list_message_data {
        let Some(payload) = msg.list_req_data_bytes.first() else {
            continue;
        };
        let total = payload.len();

        if total > 255 {
            return Err(ObdError::BuildFailed(format!(
                "ISO 14230: request data too long ({total} > 255 bytes)"
            )));
        }

        if add_length_byte {
            msg.req_header_bytes.push(total as u8);
        } else {
            if total > 63 {
                return Err(ObdError::BuildFailed(format!(
                    "ISO 14230: request data too long for a format-byte length ({total} > 63 bytes)"
                )));
            }
            let Some(format_byte) = msg.req_header_bytes.first_mut() else {
                return Err(ObdError::BuildFailed(
                    "ISO 14230: no request header to encode the data length into".into(),
                ));
            };
            *format_byte |= total as u8;
        }
    }
    Ok(())
}

fn parse_byte_list(text: &str) -> Result<Vec<u8>, ObdError> {
    text.split_whitespace()
        .map(|token| {
            util::parse_byte_literal(token)
                .ok_or_else(|| ObdError::BuildFailed(format!("bad data byte literal {token:?}")))
        })
        .collect()
}
