// crates/obdwire/src/defs.rs

//! In-memory view of a definitions catalog: specifications, protocols,
//! addresses, parameters and their decoder scripts.
//!
//! The tree is built once by a loader (see the `obdwire-xml` crate) and is
//! read-only afterwards; the engine walks it with the direct lookup helpers
//! below instead of re-scanning the document.

/// The whole catalog: one entry per `<spec>` element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Definitions {
    pub specs: Vec<Spec>,
}

/// A named family of OBD parameters (e.g. SAEJ1979) together with the
/// protocols it can be queried over.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Spec {
    pub name: String,
    pub protocols: Vec<ProtocolDef>,
    pub parameter_groups: Vec<ParameterGroup>,
}

/// A protocol entry: its options and the addresses reachable through it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProtocolDef {
    pub name: String,
    pub options: Vec<ProtocolOption>,
    pub addresses: Vec<Address>,
}

/// An `<option name=... value=.../>` flag on a protocol.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProtocolOption {
    pub name: String,
    pub value: bool,
}

/// A logical bus endpoint with its request/response header templates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Address {
    pub name: String,
    pub request: Option<HeaderTemplate>,
    pub response: Option<HeaderTemplate>,
}

/// Raw header attribute text. Which fields apply depends on the protocol
/// family; numeric literals are parsed at build time so a bad value is
/// reported with protocol context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderTemplate {
    pub prio: Option<String>,
    pub target: Option<String>,
    pub source: Option<String>,
    pub identifier: Option<String>,
    pub format: Option<String>,
}

/// A `<parameters address=...>` group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterGroup {
    pub address: String,
    pub parameters: Vec<Parameter>,
}

/// A named parameter: its request/response attributes and decoder scripts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    /// The `parse` attribute ("combined" selects combined dispatch).
    pub parse: Option<String>,
    /// The open-ended request/response attribute family (`request`,
    /// `request0`, `response2.prefix`, ...), kept verbatim for the data
    /// builder.
    pub attrs: Vec<(String, String)>,
    pub scripts: Vec<Script>,
}

/// An inline decoder script, tagged with the protocol names it applies to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Script {
    pub protocols: String,
    pub source: String,
}

impl Definitions {
    pub fn find_spec(&self, name: &str) -> Option<&Spec> {
        self.specs.iter().find(|s| s.name == name)
    }

    /// Names of the parameters declared for the given spec/protocol/address
    /// triple. Empty when the triple does not resolve.
    pub fn parameter_names(&self, spec: &str, protocol: &str, address: &str) -> Vec<String> {
        let Some(spec) = self.find_spec(spec) else {
            return Vec::new();
        };
        let address_known = spec
            .find_protocol(protocol)
            .is_some_and(|p| p.find_address(address).is_some());
        if !address_known {
            return Vec::new();
        }
        spec.groups_for_address(address)
            .flat_map(|group| group.parameters.iter().map(|p| p.name.clone()))
            .collect()
    }
}

impl Spec {
    pub fn find_protocol(&self, name: &str) -> Option<&ProtocolDef> {
        self.protocols.iter().find(|p| p.name == name)
    }

    /// All parameter groups declared for an address. More than one group
    /// may share an address.
    pub fn groups_for_address<'a>(
        &'a self,
        address: &'a str,
    ) -> impl Iterator<Item = &'a ParameterGroup> {
        self.parameter_groups
            .iter()
            .filter(move |group| group.address == address)
    }
}

impl ProtocolDef {
    pub fn find_address(&self, name: &str) -> Option<&Address> {
        self.addresses.iter().find(|a| a.name == name)
    }

    /// All addresses with a matching name, in declaration order.
    pub fn addresses_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Address> {
        self.addresses.iter().filter(move |a| a.name == name)
    }

    /// Value of a protocol option, when declared.
    pub fn option(&self, name: &str) -> Option<bool> {
        self.options
            .iter()
            .find(|option| option.name == name)
            .map(|option| option.value)
    }
}

impl Parameter {
    /// Looks up a raw request/response attribute by name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}
