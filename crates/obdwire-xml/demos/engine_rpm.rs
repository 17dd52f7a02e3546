// crates/obdwire-xml/demos/engine_rpm.rs

//! Build an "Engine RPM" request, pretend an ELM327-style adapter answered,
//! and decode the response.
//!
//! Run with: `cargo run --example engine_rpm`

use obdwire::{byte_of_hex, hex_of_byte, Engine, ObdError, ParameterFrame};
use obdwire_xml::parse_definitions;

const DEFINITIONS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<spec name="SAEJ1979">
  <protocol name="ISO 9141-2">
    <address name="Default">
      <request prio="0x68" target="0x6A" source="0xF1"/>
      <response prio="0x48" target="0x6B" source="0x10"/>
    </address>
  </protocol>
  <parameters address="Default">
    <parameter name="Engine RPM" request="0x01 0x0C"
               response.prefix="0x41 0x0C" response.bytes="2">
      <script protocols="ISO 9141-2">
        let rpm = NumericalData();
        rpm.value = (256.0 * BYTE(0) + BYTE(1)) / 4.0;
        rpm.min = 0.0;
        rpm.max = 16383.75;
        rpm.units = "rpm";
        saveNumericalData(rpm);
      </script>
    </parameter>
  </parameters>
</spec>"#;

fn elm327_write(_header: &str, _data: &str) {
    // a real adapter would transmit here
}

fn elm327_read() -> &'static str {
    "486B10410C2ABC"
}

fn main() -> Result<(), ObdError> {
    env_logger::init();

    let engine_defs = parse_definitions(DEFINITIONS)?;
    let mut engine = Engine::new(engine_defs)?;

    // Fill in the lookup keys and let the engine compile the request.
    let mut frame = ParameterFrame::new("SAEJ1979", "ISO 9141-2", "Default", "Engine RPM");
    engine.build(&mut frame)?;

    // ELM327 adapters talk ASCII hex, so convert the request before sending.
    // "Engine RPM" needs a single request with a single frame.
    let msg = &frame.list_message_data[0];
    let header: String = msg.req_header_bytes.iter().map(|b| hex_of_byte(*b)).collect();
    let data: String = msg.list_req_data_bytes[0]
        .iter()
        .map(|b| hex_of_byte(*b))
        .collect();
    println!("request: header {header}, data {data}");
    elm327_write(&header, &data);

    // The response comes back the same way: header and data bytes as hex,
    // checksum already removed by the adapter.
    let response = elm327_read();
    let mut raw = Vec::with_capacity(response.len() / 2);
    for index in (0..response.len()).step_by(2) {
        raw.push(byte_of_hex(&response[index..index + 2])?);
    }
    frame.list_message_data[0].list_raw_frames.push(raw);

    // Decode.
    for record in engine.parse(&mut frame)? {
        for numerical in &record.list_numerical_data {
            println!(
                "{}: {} {}",
                record.param_name, numerical.value, numerical.units
            );
        }
        for literal in &record.list_literal_data {
            let label = if literal.value {
                &literal.value_if_true
            } else {
                &literal.value_if_false
            };
            println!("{}: {label}", literal.property);
        }
    }
    Ok(())
}
