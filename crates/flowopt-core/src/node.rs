//! Node values of the dataflow graph.
//!
//! A [`Node`] is either atomic (a primitive operation) or compound (its
//! behavior is given by the nested children recorded in the graph's
//! hierarchy). Ports are ordered name-to-type maps; the optional
//! `argumentOrdering` setting fixes the positional order when ports must be
//! matched by index. Attributes the engine does not interpret are carried
//! verbatim in `extra` so that a loaded graph serializes back unchanged.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::port::PortDirection;

/// Node settings. Only the argument ordering is interpreted.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub argument_ordering: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

impl Settings {
    pub fn is_empty(&self) -> bool {
        self.argument_ordering.is_none() && self.extra.is_empty()
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// A node of the dataflow graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Unique label within a graph. Assigned by the graph; the serialized
    /// form keeps it outside the node value.
    #[serde(skip)]
    pub label: String,
    /// Operation kind, e.g. `math/add`.
    #[serde(rename = "id")]
    pub kind: String,
    #[serde(default)]
    pub atomic: bool,
    #[serde(default)]
    pub input_ports: IndexMap<String, String>,
    #[serde(default)]
    pub output_ports: IndexMap<String, String>,
    /// Set on recursive definitions and on the recursive call sites inside them.
    #[serde(default, skip_serializing_if = "is_false")]
    pub recursive: bool,
    /// Set on the compound node that defines a recursive function.
    #[serde(default, skip_serializing_if = "is_false")]
    pub recursive_root: bool,
    /// Literal payload (`value` for constants, `partial` for partial
    /// application, `branches` for `tailrec`).
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub params: IndexMap<String, Value>,
    #[serde(default, skip_serializing_if = "Settings::is_empty")]
    pub settings: Settings,
    /// Observable effect of the program; roots of dead-code analysis.
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_sink: bool,
    #[serde(default, rename = "sideeffects", skip_serializing_if = "is_false")]
    pub side_effects: bool,
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

impl Node {
    /// Creates an atomic node of the given kind without ports.
    pub fn atomic(kind: impl Into<String>) -> Self {
        Node::new(kind, true)
    }

    /// Creates a compound node of the given kind without ports.
    pub fn compound(kind: impl Into<String>) -> Self {
        Node::new(kind, false)
    }

    fn new(kind: impl Into<String>, atomic: bool) -> Self {
        let kind = kind.into();
        let label = kind.rsplit('/').next().unwrap_or_default().to_string();
        Node {
            label,
            kind,
            atomic,
            input_ports: IndexMap::new(),
            output_ports: IndexMap::new(),
            recursive: false,
            recursive_root: false,
            params: IndexMap::new(),
            settings: Settings::default(),
            is_sink: false,
            side_effects: false,
            extra: IndexMap::new(),
        }
    }

    /// Sets the preferred label. The graph may suffix it to keep labels unique.
    pub fn labeled(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_input(mut self, name: impl Into<String>, ty: impl Into<String>) -> Self {
        self.input_ports.insert(name.into(), ty.into());
        self
    }

    pub fn with_output(mut self, name: impl Into<String>, ty: impl Into<String>) -> Self {
        self.output_ports.insert(name.into(), ty.into());
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn with_argument_ordering<I, S>(mut self, ordering: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.settings.argument_ordering = Some(ordering.into_iter().map(Into::into).collect());
        self
    }

    pub fn sink(mut self) -> Self {
        self.is_sink = true;
        self
    }

    /// Marks the node as the root of a recursive definition.
    pub fn recursive_root(mut self) -> Self {
        self.recursive = true;
        self.recursive_root = true;
        self
    }

    /// Marks the node as a recursive call site.
    pub fn recursive_call(mut self) -> Self {
        self.recursive = true;
        self
    }

    /// Input port names, in argument order when one is declared.
    pub fn input_port_names(&self) -> Vec<String> {
        ordered_names(&self.input_ports, self.settings.argument_ordering.as_deref())
    }

    /// Output port names, in argument order when one is declared.
    pub fn output_port_names(&self) -> Vec<String> {
        ordered_names(&self.output_ports, self.settings.argument_ordering.as_deref())
    }

    pub fn has_port(&self, name: &str) -> bool {
        self.input_ports.contains_key(name) || self.output_ports.contains_key(name)
    }

    pub fn port_direction(&self, name: &str) -> Option<PortDirection> {
        if self.input_ports.contains_key(name) {
            Some(PortDirection::Input)
        } else if self.output_ports.contains_key(name) {
            Some(PortDirection::Output)
        } else {
            None
        }
    }

    pub fn port_type(&self, name: &str) -> Option<&str> {
        self.input_ports
            .get(name)
            .or_else(|| self.output_ports.get(name))
            .map(String::as_str)
    }

    /// The literal produced by a constant node.
    pub fn value(&self) -> Option<&Value> {
        self.params.get("value")
    }
}

/// Orders port names by `ordering`, keeping ports the ordering does not
/// mention after the ordered ones in declaration order.
fn ordered_names(ports: &IndexMap<String, String>, ordering: Option<&[String]>) -> Vec<String> {
    match ordering {
        Some(ordering) => {
            let mut names: Vec<String> = ordering
                .iter()
                .filter(|p| ports.contains_key(p.as_str()))
                .cloned()
                .collect();
            names.extend(
                ports
                    .keys()
                    .filter(|p| !ordering.contains(p))
                    .cloned(),
            );
            names
        }
        None => ports.keys().cloned().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn less() -> Node {
        Node::atomic("math/less")
            .with_input("than", "number")
            .with_input("isLess", "number")
            .with_output("value", "bool")
            .with_argument_ordering(["isLess", "than", "value"])
    }

    #[test]
    fn argument_ordering_overrides_declaration_order() {
        assert_eq!(less().input_port_names(), vec!["isLess", "than"]);
        assert_eq!(less().output_port_names(), vec!["value"]);
    }

    #[test]
    fn unordered_ports_follow_declaration_order() {
        let node = Node::atomic("math/add")
            .with_input("s1", "number")
            .with_input("s2", "number")
            .with_output("sum", "number");
        assert_eq!(node.input_port_names(), vec!["s1", "s2"]);
    }

    #[test]
    fn ports_missing_from_ordering_are_appended() {
        let node = less().with_input("extra", "number");
        assert_eq!(node.input_port_names(), vec!["isLess", "than", "extra"]);
    }

    #[test]
    fn port_direction_and_type() {
        let node = less();
        assert_eq!(node.port_direction("than"), Some(PortDirection::Input));
        assert_eq!(node.port_direction("value"), Some(PortDirection::Output));
        assert_eq!(node.port_direction("nope"), None);
        assert_eq!(node.port_type("value"), Some("bool"));
    }

    #[test]
    fn default_label_is_last_kind_segment() {
        assert_eq!(Node::atomic("math/const").label, "const");
        assert_eq!(Node::compound("fac").label, "fac");
    }

    #[test]
    fn deserializes_buggy_node_and_keeps_unknown_attributes() {
        let value = json!({
            "id": "math/const",
            "version": "0.2.0",
            "atomic": true,
            "inputPorts": {},
            "outputPorts": { "output": "number" },
            "params": { "value": 2 },
            "settings": { "argumentOrdering": ["output"] }
        });
        let node: Node = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(node.kind, "math/const");
        assert!(node.atomic);
        assert_eq!(node.value(), Some(&json!(2)));
        assert_eq!(node.extra.get("version"), Some(&json!("0.2.0")));
        assert_eq!(serde_json::to_value(&node).unwrap(), value);
    }

    #[test]
    fn recursive_flags_serialize_in_camel_case() {
        let node = Node::compound("fac").recursive_root();
        let value = serde_json::to_value(&node).unwrap();
        assert_eq!(value["recursive"], json!(true));
        assert_eq!(value["recursiveRoot"], json!(true));
    }
}
