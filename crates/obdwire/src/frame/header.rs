// crates/obdwire/src/frame/header.rs

//! Per-family request header builders.
//!
//! Each builder compiles one catalog [`Address`] into a fresh
//! [`MessageData`]: request header bytes on one side, the expected response
//! header and its significance mask on the other. Unspecified response
//! fields keep a zero mask byte so any value is accepted there.

use log::warn;

use crate::defs::Address;
use crate::error::ObdError;
use crate::types::{MessageData, ParameterFrame};
use crate::util;

fn parse_header_byte(value: &str, what: &str, family: &str) -> Result<u8, ObdError> {
    util::parse_byte_literal(value)
        .ok_or_else(|| ObdError::BuildFailed(format!("{family}: bad {what} byte {value:?}")))
}

/// SAE J1850 / ISO 9141-2 / ISO 14230-4: fixed [prio] [target] [source]
/// header on both sides.
pub(crate) fn build_header_legacy(
    frame: &mut ParameterFrame,
    address: &Address,
) -> Result<(), ObdError> {
    const FAMILY: &str = "SAE J1850/ISO 9141-2";
    let mut msg = MessageData::default();

    if let Some(req) = &address.request {
        let (Some(prio), Some(target), Some(source)) = (&req.prio, &req.target, &req.source)
        else {
            return Err(ObdError::BuildFailed(format!(
                "{FAMILY}: incomplete request header"
            )));
        };
        msg.req_header_bytes = vec![
            parse_header_byte(prio, "prio", FAMILY)?,
            parse_header_byte(target, "target", FAMILY)?,
            parse_header_byte(source, "source", FAMILY)?,
        ];
    } else {
        warn!("{FAMILY}: no request header");
    }

    // Response slots default to "accept anything"; declared fields flip
    // their mask byte.
    msg.exp_header_bytes = vec![0; 3];
    msg.exp_header_mask = vec![0; 3];

    if let Some(resp) = &address.response {
        let slots = [
            (0, &resp.prio, "prio"),
            (1, &resp.target, "target"),
            (2, &resp.source, "source"),
        ];
        for (slot, field, what) in slots {
            if let Some(value) = field {
                msg.exp_header_bytes[slot] = parse_header_byte(value, what, FAMILY)?;
                msg.exp_header_mask[slot] = 0xFF;
            }
        }
    }

    frame.list_message_data.push(msg);
    Ok(())
}

/// ISO 14230 variable header:
///
/// ```text
/// [format]
/// [format] [target] [source]
/// [format] [length]
/// [format] [target] [source] [length]
/// ```
///
/// The format byte is `A1 A0 L5 L4 L3 L2 L1 L0`: nonzero A-bits mean the
/// target/source bytes are present, all-zero L-bits mean the data length
/// travels in a separate trailing byte.
pub(crate) fn build_header_iso14230(
    frame: &mut ParameterFrame,
    address: &Address,
) -> Result<(), ObdError> {
    const FAMILY: &str = "ISO 14230";
    let mut msg = MessageData::default();

    if let Some(req) = &address.request {
        let Some(format) = &req.format else {
            return Err(ObdError::BuildFailed(format!(
                "{FAMILY}: request header is missing the format byte"
            )));
        };
        let format_byte = parse_header_byte(format, "format", FAMILY)?;
        msg.req_header_bytes.push(format_byte);

        if format_byte >> 6 != 0 {
            let (Some(target), Some(source)) = (&req.target, &req.source) else {
                return Err(ObdError::BuildFailed(format!(
                    "{FAMILY}: addressed request header is missing target/source"
                )));
            };
            msg.req_header_bytes
                .push(parse_header_byte(target, "target", FAMILY)?);
            msg.req_header_bytes
                .push(parse_header_byte(source, "source", FAMILY)?);
        }
    } else {
        warn!("{FAMILY}: no request header");
    }

    msg.exp_header_bytes = vec![0; 3];
    msg.exp_header_mask = vec![0; 3];

    if let Some(resp) = &address.response {
        if let Some(format) = &resp.format {
            msg.exp_header_bytes[0] = parse_header_byte(format, "format", FAMILY)?;
            // ignore the six length bits of the format byte
            msg.exp_header_mask[0] = 0xC0;
        }
        if let Some(target) = &resp.target {
            msg.exp_header_bytes[1] = parse_header_byte(target, "target", FAMILY)?;
            msg.exp_header_mask[1] = 0xFF;
        }
        if let Some(source) = &resp.source {
            msg.exp_header_bytes[2] = parse_header_byte(source, "source", FAMILY)?;
            msg.exp_header_mask[2] = 0xFF;
        }
    }

    frame.list_message_data.push(msg);
    Ok(())
}

/// ISO 15765. Standard ids pack the 11-bit identifier into two bytes;
/// extended ids use the four-byte [prio] [format] [target] [source] layout.
pub(crate) fn build_header_iso15765(
    frame: &mut ParameterFrame,
    address: &Address,
) -> Result<(), ObdError> {
    let mut msg = MessageData::default();

    if frame.iso15765_extended_id {
        const FAMILY: &str = "ISO 15765 ext";

        if let Some(req) = &address.request {
            let (Some(prio), Some(format), Some(target), Some(source)) =
                (&req.prio, &req.format, &req.target, &req.source)
            else {
                return Err(ObdError::BuildFailed(format!(
                    "{FAMILY}: incomplete request header"
                )));
            };
            msg.req_header_bytes = vec![
                parse_header_byte(prio, "prio", FAMILY)?,
                parse_header_byte(format, "format", FAMILY)?,
                parse_header_byte(target, "target", FAMILY)?,
                parse_header_byte(source, "source", FAMILY)?,
            ];
        } else {
            warn!("{FAMILY}: no request header");
        }

        msg.exp_header_bytes = vec![0; 4];
        msg.exp_header_mask = vec![0; 4];

        if let Some(resp) = &address.response {
            let slots = [
                (0, &resp.prio, "prio"),
                (1, &resp.format, "format"),
                (2, &resp.target, "target"),
                (3, &resp.source, "source"),
            ];
            for (slot, field, what) in slots {
                if let Some(value) = field {
                    msg.exp_header_bytes[slot] = parse_header_byte(value, what, FAMILY)?;
                    msg.exp_header_mask[slot] = 0xFF;
                }
            }
        }
    } else {
        const FAMILY: &str = "ISO 15765 std";

        if let Some(req) = &address.request {
            let Some(identifier) = &req.identifier else {
                return Err(ObdError::BuildFailed(format!(
                    "{FAMILY}: incomplete request header"
                )));
            };
            let value = util::parse_uint_literal(identifier).ok_or_else(|| {
                ObdError::BuildFailed(format!("{FAMILY}: bad identifier {identifier:?}"))
            })?;
            msg.req_header_bytes = vec![((value & 0xF00) >> 8) as u8, (value & 0xFF) as u8];
        } else {
            warn!("{FAMILY}: no request header");
        }

        msg.exp_header_bytes = vec![0; 2];
        msg.exp_header_mask = vec![0; 2];

        if let Some(resp) = &address.response {
            let Some(identifier) = &resp.identifier else {
                return Err(ObdError::BuildFailed(format!(
                    "{FAMILY}: incomplete response header"
                )));
            };
            let value = util::parse_uint_literal(identifier).ok_or_else(|| {
                ObdError::BuildFailed(format!("{FAMILY}: bad identifier {identifier:?}"))
            })?;
            // the mask stays zeroed; any response identifier is accepted
            msg.exp_header_bytes = vec![((value & 0xF00) >> 8) as u8, (value & 0xFF) as u8];
        }
    }

    frame.list_message_data.push(msg);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defs::HeaderTemplate;

    fn template(
        prio: Option<&str>,
        target: Option<&str>,
        source: Option<&str>,
    ) -> HeaderTemplate {
        HeaderTemplate {
            prio: prio.map(String::from),
            target: target.map(String::from),
            source: source.map(String::from),
            identifier: None,
            format: None,
        }
    }

    #[test]
    fn test_legacy_header_build() {
        let address = Address {
            name: "Default".into(),
            request: Some(template(Some("0x68"), Some("0x6A"), Some("0xF1"))),
            response: Some(template(Some("0x48"), None, Some("0x10"))),
        };
        let mut frame = ParameterFrame::default();
        build_header_legacy(&mut frame, &address).unwrap();

        let msg = &frame.list_message_data[0];
        assert_eq!(msg.req_header_bytes, vec![0x68, 0x6A, 0xF1]);
        assert_eq!(msg.exp_header_bytes, vec![0x48, 0x00, 0x10]);
        assert_eq!(msg.exp_header_mask, vec![0xFF, 0x00, 0xFF]);
    }

    #[test]
    fn test_legacy_header_requires_all_three_request_bytes() {
        let address = Address {
            name: "Default".into(),
            request: Some(template(Some("0x68"), None, Some("0xF1"))),
            response: None,
        };
        let mut frame = ParameterFrame::default();
        let err = build_header_legacy(&mut frame, &address).unwrap_err();
        assert!(matches!(err, ObdError::BuildFailed(_)));
    }

    #[test]
    fn test_legacy_header_without_request_is_expectation_only() {
        let address = Address {
            name: "Default".into(),
            request: None,
            response: Some(template(Some("0x48"), Some("0x6B"), Some("0x10"))),
        };
        let mut frame = ParameterFrame::default();
        build_header_legacy(&mut frame, &address).unwrap();

        let msg = &frame.list_message_data[0];
        assert!(msg.req_header_bytes.is_empty());
        assert_eq!(msg.exp_header_bytes, vec![0x48, 0x6B, 0x10]);
        assert_eq!(msg.exp_header_mask, vec![0xFF; 3]);
    }

    #[test]
    fn test_iso14230_addressed_header() {
        let address = Address {
            name: "Default".into(),
            request: Some(HeaderTemplate {
                format: Some("0xC0".into()),
                target: Some("0x33".into()),
                source: Some("0xF1".into()),
                ..HeaderTemplate::default()
            }),
            response: Some(HeaderTemplate {
                format: Some("0x80".into()),
                target: Some("0xF1".into()),
                source: Some("0x10".into()),
                ..HeaderTemplate::default()
            }),
        };
        let mut frame = ParameterFrame::default();
        build_header_iso14230(&mut frame, &address).unwrap();

        let msg = &frame.list_message_data[0];
        assert_eq!(msg.req_header_bytes, vec![0xC0, 0x33, 0xF1]);
        assert_eq!(msg.exp_header_bytes, vec![0x80, 0xF1, 0x10]);
        assert_eq!(msg.exp_header_mask, vec![0xC0, 0xFF, 0xFF]);
    }

    #[test]
    fn test_iso14230_unaddressed_header_is_format_only() {
        let address = Address {
            name: "Default".into(),
            request: Some(HeaderTemplate {
                format: Some("0x00".into()),
                ..HeaderTemplate::default()
            }),
            response: None,
        };
        let mut frame = ParameterFrame::default();
        build_header_iso14230(&mut frame, &address).unwrap();
        assert_eq!(frame.list_message_data[0].req_header_bytes, vec![0x00]);
    }

    #[test]
    fn test_iso14230_header_requires_format() {
        let address = Address {
            name: "Default".into(),
            request: Some(HeaderTemplate::default()),
            response: None,
        };
        let mut frame = ParameterFrame::default();
        assert!(build_header_iso14230(&mut frame, &address).is_err());
    }

    #[test]
    fn test_iso15765_standard_id_packing() {
        let address = Address {
            name: "Default".into(),
            request: Some(HeaderTemplate {
                identifier: Some("0x7DF".into()),
                ..HeaderTemplate::default()
            }),
            response: Some(HeaderTemplate {
                identifier: Some("0x7E8".into()),
                ..HeaderTemplate::default()
            }),
        };
        let mut frame = ParameterFrame::default();
        build_header_iso15765(&mut frame, &address).unwrap();

        let msg = &frame.list_message_data[0];
        assert_eq!(msg.req_header_bytes, vec![0x07, 0xDF]);
        assert_eq!(msg.exp_header_bytes, vec![0x07, 0xE8]);
        // the identifier is informational; the mask accepts any header
        assert_eq!(msg.exp_header_mask, vec![0x00, 0x00]);
    }

    #[test]
    fn test_iso15765_extended_id_uses_response_attributes() {
        let address = Address {
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
                target: None,
                source: Some("0x10".into()),
                ..HeaderTemplate::default()
            }),
        };
        let mut frame = ParameterFrame {
            iso15765_extended_id: true,
            ..ParameterFrame::default()
        };
        build_header_iso15765(&mut frame, &address).unwrap();

        let msg = &frame.list_message_data[0];
        assert_eq!(msg.req_header_bytes, vec![0x18, 0xDB, 0x33, 0xF1]);
        assert_eq!(msg.exp_header_bytes, vec![0x18, 0xDA, 0x00, 0x10]);
        assert_eq!(msg.exp_header_mask, vec![0xFF, 0xFF, 0x00, 0xFF]);
    }

    #[test]
    fn test_iso15765_extended_id_requires_all_request_bytes() {
        let address = Address {
            name: "Default".into(),
            request: Some(HeaderTemplate {
                prio: Some("0x18".into()),
                format: Some("0xDB".into()),
                ..HeaderTemplate::default()
            }),
            response: None,
        };
        let mut frame = ParameterFrame {
            iso15765_extended_id: true,
            ..ParameterFrame::default()
        };
        assert!(build_header_iso15765(&mut frame, &address).is_err());
    }
}
