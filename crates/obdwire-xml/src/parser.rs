// crates/obdwire-xml/src/parser.rs

//! The event-driven reader behind [`parse_definitions`].
//!
//! The `requestN` / `responseN.prefix` attribute family on `<parameter>` is
//! open-ended, so the document is walked with `quick-xml` events and the
//! attributes are kept verbatim; the engine interprets them at build time.

use log::trace;
use obdwire::defs::{
    Address, Definitions, HeaderTemplate, Parameter, ParameterGroup, ProtocolDef, ProtocolOption,
    Script, Spec,
};
use obdwire::ObdError;
use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// Elements of the definitions grammar; anything else is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Element {
    Spec,
    Protocol,
    Option,
    Address,
    Request,
    Response,
    Parameters,
    Parameter,
    Script,
    Other,
}

impl Element {
    fn of(name: &[u8]) -> Element {
        match name {
            b"spec" => Element::Spec,
            b"protocol" => Element::Protocol,
            b"option" => Element::Option,
            b"address" => Element::Address,
            b"request" => Element::Request,
            b"response" => Element::Response,
            b"parameters" => Element::Parameters,
            b"parameter" => Element::Parameter,
            b"script" => Element::Script,
            _ => Element::Other,
        }
    }

    /// The element this one must be nested in.
    fn parent(self) -> Option<Element> {
        match self {
            Element::Spec | Element::Other => None,
            Element::Protocol | Element::Parameters => Some(Element::Spec),
            Element::Option | Element::Address => Some(Element::Protocol),
            Element::Request | Element::Response => Some(Element::Address),
            Element::Parameter => Some(Element::Parameters),
            Element::Script => Some(Element::Parameter),
        }
    }
}

/// Parses a definitions document into the catalog tree.
pub fn parse_definitions(xml: &str) -> Result<Definitions, ObdError> {
    let mut reader = Reader::from_str(xml);
    let mut defs = Definitions::default();
    let mut open: Vec<Element> = Vec::new();
    let mut script_text = String::new();

    loop {
        let position = reader.buffer_position() as u64;
        match reader.read_event() {
            Err(e) => return Err(xml_error(position, e)),
            Ok(Event::Eof) => break,
            Ok(Event::Start(start)) => {
                let element = open_element(&mut defs, &start, &open, position)?;
                if element == Element::Script {
                    script_text.clear();
                }
                open.push(element);
            }
            Ok(Event::Empty(start)) => {
                let element = open_element(&mut defs, &start, &open, position)?;
                if element == Element::Script {
                    finish_script(&mut defs, &mut script_text);
                }
            }
            Ok(Event::End(_)) => {
                if open.pop() == Some(Element::Script) {
                    finish_script(&mut defs, &mut script_text);
                }
            }
            Ok(Event::Text(text)) => {
                if open.last() == Some(&Element::Script) {
                    let decoded = text.decode().map_err(|e| xml_error(position, e))?;
                    let chunk = unescape(&decoded).map_err(|e| xml_error(position, e))?;
                    script_text.push_str(&chunk);
                }
            }
            Ok(Event::CData(data)) => {
                if open.last() == Some(&Element::Script) {
                    script_text.push_str(&String::from_utf8_lossy(&data.into_inner()));
                }
            }
            Ok(_) => {}
        }
    }

    if !open.is_empty() {
        return Err(ObdError::XmlParsing {
            offset: reader.buffer_position() as u64,
            description: "unexpected end of document".into(),
        });
    }

    trace!("parsed {} spec(s)", defs.specs.len());
    Ok(defs)
}

/// Handles one opening tag: validates nesting and grows the tree.
fn open_element(
    defs: &mut Definitions,
    start: &BytesStart,
    open: &[Element],
    position: u64,
) -> Result<Element, ObdError> {
    let element = Element::of(start.local_name().as_ref());

    if let Some(required) = element.parent() {
        if open.last() != Some(&required) {
            return Err(ObdError::XmlParsing {
                offset: position,
                description: format!(
                    "unexpected <{}> element",
                    String::from_utf8_lossy(start.local_name().as_ref())
                ),
            });
        }
    }

    match element {
        Element::Spec => {
            let name = required_attr(start, "name", position)?;
            defs.specs.push(Spec {
                name,
                ..Spec::default()
            });
        }
        Element::Protocol => {
            let name = required_attr(start, "name", position)?;
            let spec = current_spec(defs, position)?;
            spec.protocols.push(ProtocolDef {
                name,
                ..ProtocolDef::default()
            });
        }
        Element::Option => {
            let name = required_attr(start, "name", position)?;
            let value = attr_value(start, "value", position)?.is_some_and(|v| v == "true");
            let protocol = current_protocol(defs, position)?;
            protocol.options.push(ProtocolOption { name, value });
        }
        Element::Address => {
            let name = required_attr(start, "name", position)?;
            let protocol = current_protocol(defs, position)?;
            protocol.addresses.push(Address {
                name,
                ..Address::default()
            });
        }
        Element::Request | Element::Response => {
            let template = HeaderTemplate {
                prio: attr_value(start, "prio", position)?,
                target: attr_value(start, "target", position)?,
                source: attr_value(start, "source", position)?,
                identifier: attr_value(start, "identifier", position)?,
                format: attr_value(start, "format", position)?,
            };
            let address = current_address(defs, position)?;
            if element == Element::Request {
                address.request = Some(template);
            } else {
                address.response = Some(template);
            }
        }
        Element::Parameters => {
            let address = required_attr(start, "address", position)?;
            let spec = current_spec(defs, position)?;
            spec.parameter_groups.push(ParameterGroup {
                address,
                ..ParameterGroup::default()
            });
        }
        Element::Parameter => {
            let mut name = None;
            let mut parse = None;
            let mut attrs = Vec::new();
            for attr in start.attributes() {
                let attr = attr.map_err(|e| xml_error(position, e))?;
                let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
                let value = attr
                    .unescape_value()
                    .map_err(|e| xml_error(position, e))?
                    .into_owned();
                match key.as_str() {
                    "name" => name = Some(value),
                    "parse" => parse = Some(value),
                    _ => attrs.push((key, value)),
                }
            }
            let Some(name) = name else {
                return Err(missing_attr(position, "name"));
            };
            let group = current_group(defs, position)?;
            group.parameters.push(Parameter {
                name,
                parse,
                attrs,
                scripts: Vec::new(),
            });
        }
        Element::Script => {
            let protocols = attr_value(start, "protocols", position)?.unwrap_or_default();
            let parameter = current_parameter(defs, position)?;
            parameter.scripts.push(Script {
                protocols,
                source: String::new(),
            });
        }
        Element::Other => {}
    }

    Ok(element)
}

/// Stores the collected body text on the script opened last.
fn finish_script(defs: &mut Definitions, script_text: &mut String) {
    let script = defs
        .specs
        .last_mut()
        .and_then(|spec| spec.parameter_groups.last_mut())
        .and_then(|group| group.parameters.last_mut())
        .and_then(|parameter| parameter.scripts.last_mut());
    if let Some(script) = script {
        script.source = script_text.trim().to_string();
    }
    script_text.clear();
}

fn current_spec<'a>(defs: &'a mut Definitions, position: u64) -> Result<&'a mut Spec, ObdError> {
    defs.specs.last_mut().ok_or_else(|| ObdError::XmlParsing {
        offset: position,
        description: "element outside <spec>".into(),
    })
}

fn current_protocol<'a>(
    defs: &'a mut Definitions,
    position: u64,
) -> Result<&'a mut ProtocolDef, ObdError> {
    current_spec(defs, position)?
        .protocols
        .last_mut()
        .ok_or_else(|| ObdError::XmlParsing {
            offset: position,
            description: "element outside <protocol>".into(),
        })
}

fn current_address<'a>(
    defs: &'a mut Definitions,
    position: u64,
) -> Result<&'a mut Address, ObdError> {
    current_protocol(defs, position)?
        .addresses
        .last_mut()
        .ok_or_else(|| ObdError::XmlParsing {
            offset: position,
            description: "element outside <address>".into(),
        })
}

fn current_group<'a>(
    defs: &'a mut Definitions,
    position: u64,
) -> Result<&'a mut ParameterGroup, ObdError> {
    current_spec(defs, position)?
        .parameter_groups
        .last_mut()
        .ok_or_else(|| ObdError::XmlParsing {
            offset: position,
            description: "element outside <parameters>".into(),
        })
}

fn current_parameter<'a>(
    defs: &'a mut Definitions,
    position: u64,
) -> Result<&'a mut Parameter, ObdError> {
    current_group(defs, position)?
        .parameters
        .last_mut()
        .ok_or_else(|| ObdError::XmlParsing {
            offset: position,
            description: "element outside <parameter>".into(),
        })
}

fn attr_value(
    start: &BytesStart,
    name: &str,
    position: u64,
) -> Result<Option<String>, ObdError> {
    for attr in start.attributes() {
        let attr = attr.map_err(|e| xml_error(position, e))?;
        if attr.key.local_name().as_ref() == name.as_bytes() {
            let value = attr
                .unescape_value()
                .map_err(|e| xml_error(position, e))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

fn required_attr(start: &BytesStart, name: &str, position: u64) -> Result<String, ObdError> {
    attr_value(start, name, position)?.ok_or_else(|| missing_attr(position, name))
}

fn missing_attr(position: u64, name: &str) -> ObdError {
    ObdError::XmlParsing {
        offset: position,
        description: format!("missing required attribute {name:?}"),
    }
}

fn xml_error(position: u64, error: impl std::fmt::Display) -> ObdError {
    ObdError::XmlParsing {
        offset: position,
        description: error.to_string(),
    }
}
