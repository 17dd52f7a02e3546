// crates/obdwire/src/engine.rs

//! Orchestrates catalog lookups, request building and response decoding.

use log::debug;

use crate::defs::{Definitions, Parameter, Script};
use crate::error::ObdError;
use crate::frame;
use crate::script::{DecoderHandle, ScriptHost};
use crate::types::{Data, LiteralData, ParameterFrame, ParseMode, Protocol};
use crate::util;

/// Compiles parameter requests against a definitions catalog and decodes
/// vehicle responses.
///
/// Owns the catalog and the script host for its lifetime; all decoder
/// scripts are compiled up front in [`Engine::new`]. One decode runs at a
/// time per engine.
#[derive(Debug)]
pub struct Engine {
    defs: Definitions,
    host: ScriptHost,
}

impl Engine {
    pub fn new(defs: Definitions) -> Result<Self, ObdError> {
        let host = ScriptHost::new(&defs)?;
        Ok(Engine { defs, host })
    }

    /// The catalog this engine was built from.
    pub fn definitions(&self) -> &Definitions {
        &self.defs
    }

    /// Names of the parameters declared for the given triple; empty when
    /// the triple does not resolve.
    pub fn parameter_names(&self, spec: &str, protocol: &str, address: &str) -> Vec<String> {
        self.defs.parameter_names(spec, protocol, address)
    }

    /// Compiles the frame's lookup keys into request messages, response
    /// expectations and a decoder handle.
    ///
    /// Rebuilding an already-built frame starts from scratch, so the call
    /// is idempotent.
    pub fn build(&self, frame: &mut ParameterFrame) -> Result<(), ObdError> {
        frame.list_message_data.clear();
        frame.decoder = None;

        // the catalog outlives this call; keys are cloned so the frame can
        // be mutated while catalog references are held
        let address_name = frame.address.clone();
        let parameter_name = frame.name.clone();

        let spec = self.defs.find_spec(&frame.spec).ok_or_else(|| {
            ObdError::BuildFailed(format!("could not find spec {}", frame.spec))
        })?;
        let protocol = spec.find_protocol(&frame.protocol).ok_or_else(|| {
            ObdError::BuildFailed(format!("could not find protocol {}", frame.protocol))
        })?;

        let parse_protocol = protocol_from_name(&protocol.name).ok_or_else(|| {
            ObdError::BuildFailed(format!("unsupported protocol {}", protocol.name))
        })?;
        frame.parse_protocol = Some(parse_protocol);

        match parse_protocol {
            Protocol::Iso14230 => {
                if let Some(value) = protocol.option("Length Byte") {
                    frame.iso14230_add_length_byte = value;
                }
            }
            Protocol::Iso15765 => {
                frame.iso15765_extended_id = protocol.name.contains("Extended Id");
                if let Some(value) = protocol.option("Extended Address") {
                    frame.iso15765_extended_addr = value;
                }
            }
            _ => {}
        }

        let mut address_found = false;
        for address in protocol.addresses_named(&address_name) {
            address_found = true;
            match parse_protocol {
                Protocol::SaeJ1850 | Protocol::Iso9141_2 => {
                    frame::build_header_legacy(frame, address)?;
                }
                Protocol::Iso14230 => frame::build_header_iso14230(frame, address)?,
                Protocol::Iso15765 => frame::build_header_iso15765(frame, address)?,
            }
        }
        if !address_found {
            return Err(ObdError::BuildFailed(format!(
                "could not find address {}",
                frame.address
            )));
        }

        let mut groups = spec.groups_for_address(&address_name).peekable();
        if groups.peek().is_none() {
            return Err(ObdError::BuildFailed("could not find parameter group".into()));
        }
        let parameter = groups
            .flat_map(|group| group.parameters.iter())
            .find(|p| p.name == parameter_name)
            .ok_or_else(|| {
                ObdError::BuildFailed(format!("could not find parameter {parameter_name}"))
            })?;

        frame::build_request_data(frame, parameter)?;

        frame.parse_mode = match parameter.parse.as_deref() {
            Some("combined") => ParseMode::Combined,
            _ => ParseMode::Separately,
        };

        let script = select_script(parameter, &frame.protocol).ok_or_else(|| {
            ObdError::BuildFailed(format!(
                "no decoder script for protocol {} on parameter {}",
                frame.protocol, frame.name
            ))
        })?;
        let key = format!(
            "{}:{}:{}:{}",
            frame.spec, frame.address, frame.name, script.protocols
        );
        let handle = self.host.resolve(&key).ok_or_else(|| {
            ObdError::BuildFailed(format!("no decoder registered for parameter {}", frame.name))
        })?;
        frame.decoder = Some(handle);

        debug!(
            "built {}/{} with {} request message(s)",
            frame.spec,
            frame.name,
            frame.list_message_data.len()
        );
        Ok(())
    }

    /// Cleans the raw frames the caller collected and runs the decoder,
    /// returning one [`Data`] record per decoder invocation.
    pub fn parse(&mut self, frame: &mut ParameterFrame) -> Result<Vec<Data>, ObdError> {
        let Some(decoder) = frame.decoder else {
            return Err(ObdError::ParseFailed(
                "parameter frame has no decoder; build it first".into(),
            ));
        };
        let Some(parse_protocol) = frame.parse_protocol else {
            return Err(ObdError::ParseFailed(
                "parameter frame has no protocol; build it first".into(),
            ));
        };

        // drop anything a previous parse left behind
        for msg in &mut frame.list_message_data {
            msg.list_headers.clear();
            msg.list_data.clear();
        }

        match parse_protocol {
            Protocol::SaeJ1850 | Protocol::Iso9141_2 => {
                for msg in &mut frame.list_message_data {
                    frame::clean_legacy(msg)?;
                }
            }
            Protocol::Iso14230 => {
                for msg in &mut frame.list_message_data {
                    frame::clean_iso14230(msg)?;
                }
            }
            Protocol::Iso15765 => {
                let header_length = if frame.iso15765_extended_id { 4 } else { 2 };
                for msg in &mut frame.list_message_data {
                    frame::clean_iso15765(msg, header_length)?;
                }
            }
        }

        self.decode(frame, decoder)
    }

    fn decode(
        &self,
        frame: &ParameterFrame,
        decoder: DecoderHandle,
    ) -> Result<Vec<Data>, ObdError> {
        let mut results = Vec::new();

        match frame.parse_mode {
            ParseMode::Separately => {
                // one decoder run per cleaned response
                for msg in &frame.list_message_data {
                    for (header, data) in msg.list_headers.iter().zip(&msg.list_data) {
                        self.host.clear_state();
                        self.host.push_data_bytes(vec![data.clone()]);
                        self.host.invoke(decoder)?;
                        let (numerical, mut literal) = self.host.drain_results();

                        literal.push(LiteralData {
                            property: "Source Address".into(),
                            value: true,
                            value_if_true: util::bytes_to_hex(header),
                            value_if_false: String::new(),
                        });

                        results.push(Data {
                            param_name: frame.name.clone(),
                            src_name: frame.address.clone(),
                            list_numerical_data: numerical,
                            list_literal_data: literal,
                        });
                    }
                }
            }
            ParseMode::Combined => {
                // one decoder run over everything
                self.host.clear_state();
                for msg in &frame.list_message_data {
                    self.host
                        .push_msg(msg.list_headers.clone(), msg.list_data.clone());
                }
                self.host.invoke(decoder)?;
                let (numerical, literal) = self.host.drain_results();

                results.push(Data {
                    param_name: frame.name.clone(),
                    src_name: frame.address.clone(),
                    list_numerical_data: numerical,
                    list_literal_data: literal,
                });
            }
        }

        Ok(results)
    }
}

/// Resolves a catalog protocol name to its wire family.
fn protocol_from_name(name: &str) -> Option<Protocol> {
    if name.contains("SAE J1850") {
        Some(Protocol::SaeJ1850)
    } else if name == "ISO 9141-2" {
        Some(Protocol::Iso9141_2)
    } else if name == "ISO 14230" {
        Some(Protocol::Iso14230)
    } else if name.contains("ISO 15765") {
        Some(Protocol::Iso15765)
    } else {
        None
    }
}

/// Picks the parameter script covering the requested protocol. A first
/// script with no `protocols` attribute covers everything.
fn select_script<'a>(parameter: &'a Parameter, protocol: &str) -> Option<&'a Script> {
    let first = parameter.scripts.first()?;
    if first.protocols.is_empty() {
        return Some(first);
    }
    parameter
        .scripts
        .iter()
        .find(|script| script.protocols.contains(protocol))
}
