// crates/obdwire/src/script.rs

//! Decoder script host.
//!
//! Every `<script>` in the catalog is wrapped into a uniquely named nullary
//! function and compiled, together with a small preamble, into one AST at
//! engine construction. The engine pushes cleaned response bytes into a
//! shared state, invokes the decoder for the parameter, and drains the
//! numeric/literal results back out.
//!
//! Decoder scripts see:
//!
//! - `BYTE(n)` / `DATA(n)` — the pushed data bytes (separate dispatch),
//! - `REQ(n)`, `req.DATA(n)`, `data.BYTE(n)` — per-message access
//!   (combined dispatch),
//! - `NumericalData()` / `LiteralData()` — result constructors,
//! - `saveNumericalData(d)` / `saveLiteralData(d)` — result sinks.
//!
//! The evaluator never leaks into the public API; callers only ever hold a
//! [`DecoderHandle`].

use std::cell::RefCell;
use std::rc::Rc;

use rhai::{AST, Array, Dynamic, EvalAltResult, Map, Scope};

use crate::defs::Definitions;
use crate::error::ObdError;
use crate::types::{LiteralData, NumericalData};

/// Opaque handle to a registered decoder function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DecoderHandle(usize);

/// State shared between the engine and the script-visible callables.
#[derive(Default, Debug)]
struct HostState {
    /// Data-byte lists pushed for separate dispatch.
    list_databytes: Vec<Vec<u8>>,
    /// Per-message header lists pushed for combined dispatch.
    msg_headers: Vec<Vec<Vec<u8>>>,
    /// Per-message data lists pushed for combined dispatch.
    msg_datas: Vec<Vec<Vec<u8>>>,
    numerical: Vec<NumericalData>,
    literal: Vec<LiteralData>,
}

impl HostState {
    fn clear(&mut self) {
        self.list_databytes.clear();
        self.msg_headers.clear();
        self.msg_datas.clear();
        self.numerical.clear();
        self.literal.clear();
    }
}

/// Result constructors available to every decoder script.
const PREAMBLE: &str = "\
fn NumericalData() {
    #{ property: \"\", value: 0.0, min: 0.0, max: 0.0, units: \"\" }
}

fn LiteralData() {
    #{ property: \"\", value: false, valueIfTrue: \"\", valueIfFalse: \"\" }
}
";

#[derive(Debug)]
pub(crate) struct ScriptHost {
    engine: rhai::Engine,
    ast: AST,
    /// Registry keys, indexed by decoder handle.
    keys: Vec<String>,
    state: Rc<RefCell<HostState>>,
}

impl ScriptHost {
    /// Compiles every decoder script in the catalog. The registry key for
    /// a script is `"{spec}:{address}:{name}:{protocols}"`.
    pub(crate) fn new(defs: &Definitions) -> Result<Self, ObdError> {
        let state = Rc::new(RefCell::new(HostState::default()));
        let engine = host_engine(&state);

        let mut source = String::from(PREAMBLE);
        let mut keys: Vec<String> = Vec::new();

        for spec in &defs.specs {
            for group in &spec.parameter_groups {
                for parameter in &group.parameters {
                    for script in &parameter.scripts {
                        let key = format!(
                            "{}:{}:{}:{}",
                            spec.name, group.address, parameter.name, script.protocols
                        );
                        let wrapped =
                            format!("fn decoder_{}() {{\n{}\n}}\n", keys.len(), script.source);

                        // compile each script alone first so a syntax error
                        // names the parameter it came from
                        engine.compile(&wrapped).map_err(|e| {
                            ObdError::ScriptContextSetup(format!(
                                "decoder script {key:?} failed to compile: {e}"
                            ))
                        })?;

                        source.push_str(&wrapped);
                        keys.push(key);
                    }
                }
            }
        }

        let ast = engine.compile(&source).map_err(|e| {
            ObdError::ScriptContextSetup(format!("decoder scripts failed to compile: {e}"))
        })?;

        Ok(ScriptHost {
            engine,
            ast,
            keys,
            state,
        })
    }

    /// Looks a registry key up; `None` when no script was registered for it.
    pub(crate) fn resolve(&self, key: &str) -> Option<DecoderHandle> {
        self.keys.iter().position(|k| k == key).map(DecoderHandle)
    }

    /// Drops all pushed bytes and undrained results.
    pub(crate) fn clear_state(&self) {
        self.state.borrow_mut().clear();
    }

    /// Makes data-byte lists visible to `BYTE(n)` / `DATA(n)`.
    pub(crate) fn push_data_bytes(&self, list: Vec<Vec<u8>>) {
        self.state.borrow_mut().list_databytes.extend(list);
    }

    /// Makes one message's cleaned headers and payloads visible to `REQ(n)`.
    pub(crate) fn push_msg(&self, headers: Vec<Vec<u8>>, datas: Vec<Vec<u8>>) {
        let mut state = self.state.borrow_mut();
        state.msg_headers.push(headers);
        state.msg_datas.push(datas);
    }

    /// Runs the decoder behind `handle` over the pushed state.
    pub(crate) fn invoke(&self, handle: DecoderHandle) -> Result<(), ObdError> {
        let Some(key) = self.keys.get(handle.0) else {
            return Err(ObdError::ParseFailed(
                "invalid decoder handle in parameter frame".into(),
            ));
        };
        self.engine
            .call_fn::<Dynamic>(
                &mut Scope::new(),
                &self.ast,
                format!("decoder_{}", handle.0),
                (),
            )
            .map_err(|e| ObdError::ParseFailed(format!("decoder {key:?} failed: {e}")))?;
        Ok(())
    }

    /// Takes everything the decoder saved since the last clear.
    pub(crate) fn drain_results(&self) -> (Vec<NumericalData>, Vec<LiteralData>) {
        let mut state = self.state.borrow_mut();
        (
            std::mem::take(&mut state.numerical),
            std::mem::take(&mut state.literal),
        )
    }
}

/// Builds the evaluator and registers the host callables over the shared
/// state.
fn host_engine(state: &Rc<RefCell<HostState>>) -> rhai::Engine {
    let mut engine = rhai::Engine::new();

    let st = Rc::clone(state);
    engine.register_fn("__private__clear_all_data", move || st.borrow_mut().clear());

    let st = Rc::clone(state);
    engine.register_fn("__private__add_list_databytes", move |list: Array| {
        let mut state = st.borrow_mut();
        for entry in list {
            state.list_databytes.push(dynamic_to_bytes(entry));
        }
    });

    let st = Rc::clone(state);
    engine.register_fn(
        "__private__add_msg_data",
        move |headers: Array, datas: Array| {
            let mut state = st.borrow_mut();
            state
                .msg_headers
                .push(headers.into_iter().map(dynamic_to_bytes).collect());
            state
                .msg_datas
                .push(datas.into_iter().map(dynamic_to_bytes).collect());
        },
    );

    let st = Rc::clone(state);
    engine.register_fn("__private_get_num_data", move || -> Array {
        st.borrow().numerical.iter().map(numerical_to_map).collect()
    });

    let st = Rc::clone(state);
    engine.register_fn("__private_get_lit_data", move || -> Array {
        st.borrow().literal.iter().map(literal_to_map).collect()
    });

    // decoder-facing accessors

    let st = Rc::clone(state);
    engine.register_fn("BYTE", move |n: i64| -> Result<i64, Box<EvalAltResult>> {
        let state = st.borrow();
        state
            .list_databytes
            .first()
            .and_then(|data| data.get(usize::try_from(n).ok()?))
            .map(|byte| i64::from(*byte))
            .ok_or_else(|| format!("BYTE({n}): no data byte at that position").into())
    });

    let st = Rc::clone(state);
    engine.register_fn("DATA", move |n: i64| -> Result<Array, Box<EvalAltResult>> {
        let state = st.borrow();
        usize::try_from(n)
            .ok()
            .and_then(|i| state.list_databytes.get(i))
            .map(|data| bytes_to_array(data))
            .ok_or_else(|| format!("DATA({n}): no data entry at that position").into())
    });

    let st = Rc::clone(state);
    engine.register_fn("REQ", move |n: i64| -> Result<Array, Box<EvalAltResult>> {
        let state = st.borrow();
        usize::try_from(n)
            .ok()
            .and_then(|i| state.msg_datas.get(i))
            .map(|datas| {
                datas
                    .iter()
                    .map(|data| Dynamic::from(bytes_to_array(data)))
                    .collect()
            })
            .ok_or_else(|| format!("REQ({n}): no message data at that position").into())
    });

    // method forms for combined-mode chains: REQ(i).DATA(j).BYTE(k)
    engine.register_fn(
        "DATA",
        |list: &mut Array, n: i64| -> Result<Array, Box<EvalAltResult>> {
            usize::try_from(n)
                .ok()
                .and_then(|i| list.get(i))
                .and_then(|entry| entry.clone().try_cast::<Array>())
                .ok_or_else(|| format!("DATA({n}): no data entry at that position").into())
        },
    );
    engine.register_fn(
        "BYTE",
        |data: &mut Array, n: i64| -> Result<i64, Box<EvalAltResult>> {
            usize::try_from(n)
                .ok()
                .and_then(|i| data.get(i))
                .and_then(|byte| byte.as_int().ok())
                .ok_or_else(|| format!("BYTE({n}): no data byte at that position").into())
        },
    );

    // result sinks

    let st = Rc::clone(state);
    engine.register_fn("saveNumericalData", move |entry: Map| {
        st.borrow_mut().numerical.push(NumericalData {
            property: map_string(&entry, "property"),
            value: map_number(&entry, "value"),
            min: map_number(&entry, "min"),
            max: map_number(&entry, "max"),
            units: map_string(&entry, "units"),
        });
    });

    let st = Rc::clone(state);
    engine.register_fn("saveLiteralData", move |entry: Map| {
        st.borrow_mut().literal.push(LiteralData {
            property: map_string(&entry, "property"),
            value: map_bool(&entry, "value"),
            value_if_true: map_string(&entry, "valueIfTrue"),
            value_if_false: map_string(&entry, "valueIfFalse"),
        });
    });

    engine
}

fn bytes_to_array(bytes: &[u8]) -> Array {
    bytes
        .iter()
        .map(|byte| Dynamic::from(i64::from(*byte)))
        .collect()
}

fn dynamic_to_bytes(value: Dynamic) -> Vec<u8> {
    value
        .try_cast::<Array>()
        .map(|array| {
            array
                .iter()
                .map(|entry| entry.as_int().unwrap_or(0) as u8)
                .collect()
        })
        .unwrap_or_default()
}

fn numerical_to_map(data: &NumericalData) -> Dynamic {
    let mut map = Map::new();
    map.insert("property".into(), data.property.clone().into());
    map.insert("value".into(), data.value.into());
    map.insert("min".into(), data.min.into());
    map.insert("max".into(), data.max.into());
    map.insert("units".into(), data.units.clone().into());
    Dynamic::from(map)
}

fn literal_to_map(data: &LiteralData) -> Dynamic {
    let mut map = Map::new();
    map.insert("property".into(), data.property.clone().into());
    map.insert("value".into(), data.value.into());
    map.insert("valueIfTrue".into(), data.value_if_true.clone().into());
    map.insert("valueIfFalse".into(), data.value_if_false.clone().into());
    Dynamic::from(map)
}

fn map_string(map: &Map, key: &str) -> String {
    map.get(key)
        .cloned()
        .and_then(|value| value.into_string().ok())
        .unwrap_or_default()
}

fn map_number(map: &Map, key: &str) -> f64 {
    let Some(value) = map.get(key) else {
        return 0.0;
    };
    if let Ok(float) = value.as_float() {
        float
    } else if let Ok(int) = value.as_int() {
        int as f64
    } else {
        0.0
    }
}

fn map_bool(map: &Map, key: &str) -> bool {
    map.get(key)
        .and_then(|value| value.as_bool().ok())
        .unwrap_or(false)
}
