//! Parameter specs: values in rule data and caller arguments that may
//! ask the container to build something.
//!
//! In serialised rule data a spec is plain JSON, with three marker tags:
//!
//! ```text
//! {"instance": "NullLogger"}                      construct a type
//! {"instance": "Factory", "params": ["x"]}        ... with arguments
//! {"instance": ["Factory", "make"], "params": []} call a method on a built receiver
//! {"fixed": "Logger"}                             use verbatim
//! {"general": {"a": 1}}                           use verbatim
//! ```
//!
//! Anything else is a plain value; arrays and objects are expanded
//! element-wise.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::Deserialize;

use crate::error::BoxError;
use crate::key::TypeName;
use crate::value::{Instance, Value};

const INSTANCE_TAG: &str = "instance";
const FIXED_TAG: &str = "fixed";
const GENERAL_TAG: &str = "general";
const PARAMS_KEY: &str = "params";

/// A factory closure used in place of a type name.
pub type Factory = Arc<dyn Fn(Vec<Value>) -> std::result::Result<Value, BoxError> + Send + Sync>;

/// A value that may need expanding before use.
#[derive(Clone, Deserialize)]
#[serde(try_from = "serde_json::Value")]
pub enum ParamSpec {
    /// Construct something.
    Instance(ConstructSpec),
    /// Use this value verbatim, never expanding it.
    Literal(Value),
    /// A plain value. Strings may name a type where the context allows it.
    Value(Value),
    /// A list whose elements are expanded one by one.
    List(Vec<ParamSpec>),
    /// A map whose values are expanded one by one.
    Map(BTreeMap<String, ParamSpec>),
}

/// What an [`ParamSpec::Instance`] marker builds.
#[derive(Clone)]
pub enum InstanceTarget {
    /// Create this type through the container.
    Type(TypeName),
    /// Expand `receiver` (strings name types), then call `method` on it.
    Method {
        receiver: Box<ParamSpec>,
        method: String,
    },
    /// Call this closure.
    Factory(Factory),
}

/// The payload of an `instance` marker.
#[derive(Clone)]
pub struct ConstructSpec {
    pub target: InstanceTarget,
    pub params: Vec<ParamSpec>,
}

impl ParamSpec {
    /// `{"instance": type_name}`
    pub fn instance(type_name: impl Into<TypeName>) -> Self {
        ParamSpec::Instance(ConstructSpec {
            target: InstanceTarget::Type(type_name.into()),
            params: Vec::new(),
        })
    }

    /// `{"instance": type_name, "params": params}`
    pub fn instance_with(type_name: impl Into<TypeName>, params: Vec<ParamSpec>) -> Self {
        ParamSpec::Instance(ConstructSpec {
            target: InstanceTarget::Type(type_name.into()),
            params,
        })
    }

    /// `{"instance": [receiver, method], "params": params}`
    pub fn call(receiver: impl Into<ParamSpec>, method: impl Into<String>, params: Vec<ParamSpec>) -> Self {
        ParamSpec::Instance(ConstructSpec {
            target: InstanceTarget::Method {
                receiver: Box::new(receiver.into()),
                method: method.into(),
            },
            params,
        })
    }

    /// An `instance` marker backed by a closure.
    pub fn factory(
        factory: impl Fn(Vec<Value>) -> std::result::Result<Value, BoxError> + Send + Sync + 'static,
        params: Vec<ParamSpec>,
    ) -> Self {
        ParamSpec::Instance(ConstructSpec {
            target: InstanceTarget::Factory(Arc::new(factory)),
            params,
        })
    }

    /// `{"fixed": value}`
    pub fn literal(value: impl Into<Value>) -> Self {
        ParamSpec::Literal(value.into())
    }

    /// Every construct target name inside this spec, for rule validation.
    pub(crate) fn visit_targets<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            ParamSpec::Instance(spec) => {
                match &spec.target {
                    InstanceTarget::Type(name) => out.push(name.as_str()),
                    InstanceTarget::Method { receiver, method } => {
                        receiver.visit_targets(out);
                        out.push(method);
                    }
                    InstanceTarget::Factory(_) => {}
                }
                for param in &spec.params {
                    param.visit_targets(out);
                }
            }
            ParamSpec::List(items) => items.iter().for_each(|item| item.visit_targets(out)),
            ParamSpec::Map(map) => map.values().for_each(|item| item.visit_targets(out)),
            ParamSpec::Literal(_) | ParamSpec::Value(_) => {}
        }
    }
}

macro_rules! plain_spec_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for ParamSpec {
                fn from(value: $ty) -> Self {
                    ParamSpec::Value(Value::from(value))
                }
            }
        )*
    };
}

plain_spec_from!(bool, i32, i64, f64, &str, String, Instance);

impl From<Value> for ParamSpec {
    fn from(value: Value) -> Self {
        ParamSpec::Value(value)
    }
}

impl TryFrom<serde_json::Value> for ParamSpec {
    type Error = String;

    fn try_from(json: serde_json::Value) -> std::result::Result<Self, Self::Error> {
        match json {
            serde_json::Value::Array(items) => items
                .into_iter()
                .map(ParamSpec::try_from)
                .collect::<std::result::Result<Vec<_>, _>>()
                .map(ParamSpec::List),
            serde_json::Value::Object(map) => {
                let tags: Vec<&str> = [INSTANCE_TAG, FIXED_TAG, GENERAL_TAG]
                    .into_iter()
                    .filter(|tag| map.contains_key(*tag))
                    .collect();

                match tags.as_slice() {
                    [] => map
                        .into_iter()
                        .map(|(key, value)| ParamSpec::try_from(value).map(|spec| (key, spec)))
                        .collect::<std::result::Result<BTreeMap<_, _>, _>>()
                        .map(ParamSpec::Map),
                    [INSTANCE_TAG] => construct_from_json(map).map(ParamSpec::Instance),
                    [tag] => {
                        if map.len() != 1 {
                            return Err(format!("`{tag}` marker must not carry other keys"));
                        }
                        let value = map.into_iter().next().map(|(_, v)| v).unwrap_or_default();
                        Ok(ParamSpec::Literal(Value::from(value)))
                    }
                    many => Err(format!(
                        "marker carries more than one tag: {}",
                        many.join(", ")
                    )),
                }
            }
            scalar => Ok(ParamSpec::Value(Value::from(scalar))),
        }
    }
}

fn construct_from_json(
    mut map: serde_json::Map<String, serde_json::Value>,
) -> std::result::Result<ConstructSpec, String> {
    if let Some(extra) = map.keys().find(|k| *k != INSTANCE_TAG && *k != PARAMS_KEY) {
        return Err(format!("unexpected key `{extra}` in instance marker"));
    }

    let params = match map.remove(PARAMS_KEY) {
        None | Some(serde_json::Value::Null) => Vec::new(),
        Some(serde_json::Value::Array(items)) => items
            .into_iter()
            .map(ParamSpec::try_from)
            .collect::<std::result::Result<Vec<_>, _>>()?,
        Some(single) => vec![ParamSpec::try_from(single)?],
    };

    let target = match map.remove(INSTANCE_TAG) {
        Some(serde_json::Value::String(name)) => InstanceTarget::Type(TypeName::new(name)),
        Some(serde_json::Value::Array(pair)) if pair.len() == 2 => {
            let mut pair = pair.into_iter();
            let receiver = pair.next().unwrap_or_default();
            match pair.next() {
                Some(serde_json::Value::String(method)) => InstanceTarget::Method {
                    receiver: Box::new(ParamSpec::try_from(receiver)?),
                    method,
                },
                _ => return Err("instance method pair needs a method name".to_string()),
            }
        }
        _ => return Err("`instance` must be a type name or a [receiver, method] pair".to_string()),
    };

    Ok(ConstructSpec { target, params })
}

impl fmt::Debug for ParamSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamSpec::Instance(spec) => f
                .debug_struct("Instance")
                .field("target", &spec.target)
                .field("params", &spec.params)
                .finish(),
            ParamSpec::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            ParamSpec::Value(value) => write!(f, "{value:?}"),
            ParamSpec::List(items) => f.debug_list().entries(items).finish(),
            ParamSpec::Map(map) => f.debug_map().entries(map).finish(),
        }
    }
}

impl fmt::Debug for InstanceTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstanceTarget::Type(name) => write!(f, "{name}"),
            InstanceTarget::Method { receiver, method } => write!(f, "[{receiver:?}, {method}]"),
            InstanceTarget::Factory(_) => f.write_str("<factory>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(json: serde_json::Value) -> std::result::Result<ParamSpec, String> {
        ParamSpec::try_from(json)
    }

    #[test]
    fn instance_marker() {
        let spec = parse(json!({"instance": "\\NullLogger", "params": ["a"]})).unwrap();
        match spec {
            ParamSpec::Instance(ConstructSpec {
                target: InstanceTarget::Type(name),
                params,
            }) => {
                assert_eq!(name.as_str(), "NullLogger");
                assert_eq!(params.len(), 1);
            }
            other => panic!("Expected Instance, got: {other:?}"),
        }
    }

    #[test]
    fn method_pair_marker() {
        let spec = parse(json!({"instance": ["ConnectionFactory", "open"]})).unwrap();
        assert!(matches!(
            spec,
            ParamSpec::Instance(ConstructSpec { target: InstanceTarget::Method { ref method, .. }, .. })
                if method == "open"
        ));
    }

    #[test]
    fn fixed_and_general_are_literal() {
        assert!(matches!(parse(json!({"fixed": "Logger"})).unwrap(), ParamSpec::Literal(Value::Str(_))));
        assert!(matches!(parse(json!({"general": [1, 2]})).unwrap(), ParamSpec::Literal(Value::List(_))));
    }

    #[test]
    fn nested_markers_inside_plain_containers() {
        let spec = parse(json!([{"db": {"instance": "Pdo"}}, 3])).unwrap();
        let ParamSpec::List(items) = spec else {
            panic!("expected list");
        };
        let ParamSpec::Map(map) = &items[0] else {
            panic!("expected map");
        };
        assert!(matches!(map["db"], ParamSpec::Instance(_)));
        assert!(matches!(items[1], ParamSpec::Value(Value::Int(3))));
    }

    #[test]
    fn rejects_multiple_tags() {
        let err = parse(json!({"instance": "A", "fixed": 1})).unwrap_err();
        assert!(err.contains("more than one tag"));
    }

    #[test]
    fn rejects_extra_keys() {
        assert!(parse(json!({"fixed": 1, "other": 2})).is_err());
        assert!(parse(json!({"instance": "A", "other": 2})).is_err());
        assert!(parse(json!({"instance": 5})).is_err());
    }

    #[test]
    fn deserializes_via_serde() {
        let spec: ParamSpec = serde_json::from_value(json!({"instance": "Logger"})).unwrap();
        let mut targets = Vec::new();
        spec.visit_targets(&mut targets);
        assert_eq!(targets, vec!["Logger"]);
    }
}
