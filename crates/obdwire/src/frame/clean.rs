// crates/obdwire/src/frame/clean.rs

//! Response frame cleaners.
//!
//! Each cleaner walks `list_raw_frames`, validates headers against the
//! expected header/mask pair, strips the declared data prefix and fills the
//! parallel `list_headers` / `list_data` sequences. Legacy protocols treat
//! any mismatch as fatal; ISO 14230 and ISO 15765 drop the offending frame
//! with a warning and only fail when nothing survives.

use log::warn;

use crate::error::ObdError;
use crate::frame::{matches_masked, strip_expected_prefix};
use crate::types::MessageData;

/// SAE J1850 / ISO 9141-2 / ISO 14230-4: fixed three-byte headers, strict
/// validation.
pub(crate) fn clean_legacy(msg: &mut MessageData) -> Result<(), ObdError> {
    const HEADER_LENGTH: usize = 3;

    for raw in &msg.list_raw_frames {
        if raw.len() < HEADER_LENGTH {
            return Err(ObdError::ParseFailed(format!(
                "SAE J1850/ISO 9141-2: frame of {} bytes is shorter than its header",
                raw.len()
            )));
        }
        let (header, data) = raw.split_at(HEADER_LENGTH);

        if !matches_masked(&msg.exp_header_bytes, &msg.exp_header_mask, header) {
            return Err(ObdError::ParseFailed(
                "SAE J1850/ISO 9141-2: header bytes mismatch".into(),
            ));
        }

        let Some(data) = strip_expected_prefix(&msg.exp_data_prefix, data) else {
            return Err(ObdError::ParseFailed(
                "SAE J1850/ISO 9141-2: data prefix mismatch".into(),
            ));
        };

        msg.list_headers.push(header.to_vec());
        msg.list_data.push(data);
    }

    if msg.list_headers.is_empty() {
        return Err(ObdError::ParseFailed(
            "SAE J1850/ISO 9141-2: empty message data".into(),
        ));
    }
    Ok(())
}

/// ISO 14230: the format byte of each received frame decides the header
/// shape (1 to 4 bytes) and where the payload length lives.
pub(crate) fn clean_iso14230(msg: &mut MessageData) -> Result<(), ObdError> {
    for raw in &msg.list_raw_frames {
        let Some(&format_byte) = raw.first() else {
            warn!("ISO 14230: empty frame");
            continue;
        };

        // A-bits zero: no target/source. L-bits zero: separate length byte.
        let no_addressing = format_byte >> 6 == 0;
        let separate_length = format_byte & 0x3F == 0;

        let mut header_length = 4usize;
        if no_addressing {
            header_length -= 2;
        }
        if !separate_length {
            header_length -= 1;
        }
        if raw.len() < header_length {
            warn!("ISO 14230: frame shorter than its header");
            continue;
        }

        let data_length = if separate_length {
            raw[header_length - 1] as usize
        } else {
            (format_byte & 0x3F) as usize
        };
        if raw.len() < header_length + data_length {
            warn!("ISO 14230: frame shorter than its declared data length");
            continue;
        }

        let header = &raw[..header_length];
        let data = &raw[header_length..header_length + data_length];

        // Reshape the three-slot expectation to this frame's header: the
        // format byte is always checked, target/source only when present,
        // and a length byte slot is never checked.
        let exp_byte = |slot: usize| msg.exp_header_bytes.get(slot).copied().unwrap_or(0);
        let exp_mask = |slot: usize| msg.exp_header_mask.get(slot).copied().unwrap_or(0);

        let mut expected = vec![exp_byte(0)];
        let mut mask = vec![exp_mask(0)];
        match header_length {
            2 => {
                // [format] [length]
                expected.push(0x00);
                mask.push(0x00);
            }
            3 => {
                // [format] [target] [source]
                expected.extend([exp_byte(1), exp_byte(2)]);
                mask.extend([exp_mask(1), exp_mask(2)]);
            }
            4 => {
                // [format] [target] [source] [length]
                expected.extend([exp_byte(1), exp_byte(2), 0x00]);
                mask.extend([exp_mask(1), exp_mask(2), 0x00]);
            }
            _ => {}
        }

        if !matches_masked(&expected, &mask, header) {
            warn!("ISO 14230: header bytes mismatch");
            continue;
        }

        let Some(data) = strip_expected_prefix(&msg.exp_data_prefix, data) else {
            warn!("ISO 14230: data prefix mismatch");
            continue;
        };

        msg.list_headers.push(header.to_vec());
        msg.list_data.push(data);
    }

    if msg.list_headers.is_empty() {
        return Err(ObdError::ParseFailed("ISO 14230: empty message data".into()));
    }
    Ok(())
}

/// ISO 15765: validates headers, reassembles ISO-TP multi-frame messages
/// and strips PCI bytes and the data prefix.
///
/// `header_length` is 2 for standard 11-bit identifiers and 4 for extended
/// 29-bit identifiers.
pub(crate) fn clean_iso15765(msg: &mut MessageData, header_length: usize) -> Result<(), ObdError> {
    let mut headers: Vec<Vec<u8>> = Vec::new();
    let mut datas: Vec<Vec<u8>> = Vec::new();

    for raw in &msg.list_raw_frames {
        if raw.len() < header_length + 1 {
            warn!("ISO 15765: frame too short");
            continue;
        }
        let (header, data) = raw.split_at(header_length);

        if !matches_masked(&msg.exp_header_bytes, &msg.exp_header_mask, header) {
            warn!("ISO 15765: header bytes mismatch");
            continue;
        }

        headers.push(header.to_vec());
        datas.push(data.to_vec());
    }

    // Merge every consecutive frame into its first frame. The expected CF
    // PCI starts at 0x21 and cycles 0x21..=0x2F, 0x20, 0x21, ...
    let mut merged = vec![false; headers.len()];
    for j in 0..headers.len() {
        if merged[j] {
            continue;
        }
        let pci = datas[j][0];
        if pci >> 4 != 0x1 || datas[j].len() < 2 {
            continue;
        }

        let total = (usize::from(pci & 0x0F) << 8) | usize::from(datas[j][1]);
        let mut seen = datas[j].len() - 2;
        let mut next_pci = 0x21u8;

        while seen < total {
            let found = (0..headers.len()).find(|&k| {
                !merged[k] && datas[k][0] == next_pci && headers[k] == headers[j]
            });
            let Some(k) = found else { break };

            let tail = datas[k][1..].to_vec();
            seen += tail.len();
            datas[j].extend_from_slice(&tail);
            merged[k] = true;

            next_pci = if next_pci == 0x2F { 0x20 } else { next_pci + 1 };
        }

        // drop pad bytes past the declared length (PCI pair still in front)
        datas[j].truncate(total + 2);
    }

    msg.list_headers.clear();
    msg.list_data.clear();

    for (j, (header, mut data)) in headers.into_iter().zip(datas).enumerate() {
        if merged[j] {
            continue;
        }

        let pci = data[0];
        match pci >> 4 {
            0x0 => {
                data.remove(0);
            }
            0x1 => {
                data.drain(..2.min(data.len()));
            }
            0x2 => {
                // a consecutive frame whose first frame never showed up
                warn!("ISO 15765: dropping stray consecutive frame");
                continue;
            }
            _ => {}
        }

        let Some(data) = strip_expected_prefix(&msg.exp_data_prefix, &data) else {
            warn!("ISO 15765: data prefix mismatch");
            continue;
        };

        msg.list_headers.push(header);
        msg.list_data.push(data);
    }

    if msg.list_headers.is_empty() {
        return Err(ObdError::ParseFailed("ISO 15765: empty message data".into()));
    }
    Ok(())
}
