//! Loads XML definitions files into the `obdwire` catalog model.
//!
//! The format is a hierarchy of `<spec>`, `<protocol>`, `<address>`,
//! `<parameters>` and `<parameter>` elements; decoder scripts travel inline
//! as `<script>` bodies. Byte-valued attributes accept `0b...` binary,
//! `0x...` hex and decimal literals.
//!
//! ```xml
//! <spec name="SAEJ1979">
//!   <protocol name="ISO 9141-2">
//!     <address name="Default">
//!       <request prio="0x68" target="0x6A" source="0xF1"/>
//!       <response prio="0x48" target="0x6B" source="0x10"/>
//!     </address>
//!   </protocol>
//!   <parameters address="Default">
//!     <parameter name="Engine RPM" request="0x01 0x0C"
//!                response.prefix="0x41 0x0C" response.bytes="2">
//!       <script protocols="ISO 9141-2">
//!         <![CDATA[
//!           let rpm = NumericalData();
//!           rpm.value = (256.0 * BYTE(0) + BYTE(1)) / 4.0;
//!           rpm.units = "rpm";
//!           saveNumericalData(rpm);
//!         ]]>
//!       </script>
//!     </parameter>
//!   </parameters>
//! </spec>
//! ```

mod parser;

pub use parser::parse_definitions;

use std::path::Path;

use obdwire::defs::Definitions;
use obdwire::ObdError;

/// Reads and parses a definitions file from disk.
pub fn load_definitions(path: impl AsRef<Path>) -> Result<Definitions, ObdError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| ObdError::XmlParsing {
        offset: 0,
        description: format!("could not read {}: {e}", path.display()),
    })?;
    parse_definitions(&text)
}
