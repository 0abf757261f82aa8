//! Rules: per-type configuration controlling how a type is constructed.
//!
//! Rules are plain data and deserialise from JSON-shaped input:
//!
//! ```json
//! {
//!   "instanceOf": "App\\RedisCache",
//!   "shared": true,
//!   "substitutions": {"Logger": {"instance": "NullLogger"}},
//!   "shareInstances": ["Connection"],
//!   "call": [["setup", [], null]],
//!   "parameters": ["redis://localhost"]
//! }
//! ```
//!
//! Callbacks on `call` entries and factory markers are Rust closures and
//! can only be attached through the builder methods.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::Deserialize;

use crate::error::{Result, TarkibError};
use crate::key::TypeName;
use crate::param::ParamSpec;
use crate::value::Value;

/// Receives the return value of a post-construction call.
pub type Callback = Arc<dyn Fn(&Value) + Send + Sync>;

/// One post-construction method call.
#[derive(Clone, Deserialize)]
#[serde(try_from = "serde_json::Value")]
pub struct CallSpec {
    pub method: String,
    pub args: Vec<ParamSpec>,
    pub callback: Option<Callback>,
}

impl CallSpec {
    pub fn new(method: impl Into<String>, args: Vec<ParamSpec>) -> Self {
        Self {
            method: method.into(),
            args,
            callback: None,
        }
    }

    pub fn with_callback(mut self, callback: impl Fn(&Value) + Send + Sync + 'static) -> Self {
        self.callback = Some(Arc::new(callback));
        self
    }
}

impl TryFrom<serde_json::Value> for CallSpec {
    type Error = String;

    fn try_from(json: serde_json::Value) -> std::result::Result<Self, Self::Error> {
        let serde_json::Value::Array(entry) = json else {
            return Err("call entry must be [method, args?, callback?]".to_string());
        };
        if entry.is_empty() || entry.len() > 3 {
            return Err("call entry must be [method, args?, callback?]".to_string());
        }

        let mut entry = entry.into_iter();
        let method = match entry.next() {
            Some(serde_json::Value::String(method)) => method,
            _ => return Err("call entry must start with a method name".to_string()),
        };

        let args = match entry.next() {
            None | Some(serde_json::Value::Null) => Vec::new(),
            Some(serde_json::Value::Array(items)) => items
                .into_iter()
                .map(ParamSpec::try_from)
                .collect::<std::result::Result<Vec<_>, _>>()?,
            Some(_) => return Err(format!("arguments for {method}() must be a list")),
        };

        match entry.next() {
            None | Some(serde_json::Value::Null) => {}
            Some(_) => return Err("callbacks cannot be expressed in rule data".to_string()),
        }

        Ok(CallSpec::new(method, args))
    }
}

impl fmt::Debug for CallSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallSpec")
            .field("method", &self.method)
            .field("args", &self.args)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

/// Configuration for one type name.
///
/// Scalar fields are `Option`s so that a merge can tell "not set" from
/// "set to the default".
#[derive(Clone, Default, Debug, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct Rule {
    /// Construct this type instead of the rule's own type.
    pub instance_of: Option<TypeName>,
    /// Whether the rule applies to subtypes. Unset means `true`.
    pub inherit: Option<bool>,
    /// Cache the first instance for the container's lifetime.
    pub shared: Option<bool>,
    /// Per-parameter-type overrides.
    pub substitutions: HashMap<TypeName, ParamSpec>,
    /// Types built first and added to the share pool.
    pub share_instances: Vec<TypeName>,
    /// Methods called after construction, in order.
    pub call: Vec<CallSpec>,
    /// Extra values appended to the argument pool.
    pub parameters: Vec<ParamSpec>,
}

impl Rule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn instance_of(mut self, type_name: impl Into<TypeName>) -> Self {
        self.instance_of = Some(type_name.into());
        self
    }

    pub fn inherit(mut self, inherit: bool) -> Self {
        self.inherit = Some(inherit);
        self
    }

    pub fn shared(mut self, shared: bool) -> Self {
        self.shared = Some(shared);
        self
    }

    pub fn substitute(mut self, type_name: impl Into<TypeName>, with: impl Into<ParamSpec>) -> Self {
        self.substitutions.insert(type_name.into(), with.into());
        self
    }

    pub fn share_instance(mut self, type_name: impl Into<TypeName>) -> Self {
        self.share_instances.push(type_name.into());
        self
    }

    pub fn call(mut self, method: impl Into<String>, args: Vec<ParamSpec>) -> Self {
        self.call.push(CallSpec::new(method, args));
        self
    }

    pub fn call_spec(mut self, call: CallSpec) -> Self {
        self.call.push(call);
        self
    }

    pub fn parameter(mut self, value: impl Into<ParamSpec>) -> Self {
        self.parameters.push(value.into());
        self
    }

    #[inline]
    pub fn is_shared(&self) -> bool {
        self.shared == Some(true)
    }

    /// `inherit` unless explicitly `false`.
    #[inline]
    pub fn inherits(&self) -> bool {
        self.inherit != Some(false)
    }

    pub fn substitution_for(&self, type_name: &TypeName) -> Option<&ParamSpec> {
        self.substitutions.get(type_name.canonical())
    }

    /// Returns `true` if no field is set.
    pub fn is_empty(&self) -> bool {
        self.instance_of.is_none()
            && self.inherit.is_none()
            && self.shared.is_none()
            && self.substitutions.is_empty()
            && self.share_instances.is_empty()
            && self.call.is_empty()
            && self.parameters.is_empty()
    }

    /// Merges `newer` on top of `self`.
    ///
    /// - `instanceOf`, `inherit`, `shared`: overwritten when set in `newer`
    /// - `substitutions`: merged by type name, `newer` wins
    /// - `shareInstances`: union, keeping first-seen order
    /// - `call`, `parameters`: concatenated
    pub fn merge(mut self, newer: Rule) -> Rule {
        if newer.instance_of.is_some() {
            self.instance_of = newer.instance_of;
        }
        if newer.inherit.is_some() {
            self.inherit = newer.inherit;
        }
        if newer.shared.is_some() {
            self.shared = newer.shared;
        }
        self.substitutions.extend(newer.substitutions);
        for type_name in newer.share_instances {
            if !self.share_instances.contains(&type_name) {
                self.share_instances.push(type_name);
            }
        }
        self.call.extend(newer.call);
        self.parameters.extend(newer.parameters);
        self
    }

    /// Decodes one rule from JSON rule data, reporting malformed input
    /// as `InvalidRule` for `name`.
    pub fn from_json(name: &str, json: serde_json::Value) -> Result<Rule> {
        let rule: Rule = serde_json::from_value(json).map_err(|err| TarkibError::invalid_rule(name, err.to_string()))?;
        rule.validate(name)?;
        Ok(rule)
    }

    /// Structural checks performed by `add_rule`.
    ///
    /// Whether the named types exist is only checked at `create` time.
    pub fn validate(&self, name: &str) -> Result<()> {
        if TypeName::new(name).is_blank() {
            return Err(TarkibError::invalid_rule(name, "rule name is empty"));
        }
        if self.instance_of.as_ref().is_some_and(TypeName::is_blank) {
            return Err(TarkibError::invalid_rule(name, "`instanceOf` is empty"));
        }
        if self.instance_of.as_ref().is_some_and(TypeName::is_wildcard) {
            return Err(TarkibError::invalid_rule(name, "`instanceOf` cannot be the wildcard"));
        }
        if self.substitutions.keys().any(TypeName::is_blank) {
            return Err(TarkibError::invalid_rule(name, "substitution key is empty"));
        }
        if self.share_instances.iter().any(TypeName::is_blank) {
            return Err(TarkibError::invalid_rule(name, "`shareInstances` entry is empty"));
        }
        if self.call.iter().any(|call| call.method.trim().is_empty()) {
            return Err(TarkibError::invalid_rule(name, "`call` entry has no method name"));
        }

        let mut targets = Vec::new();
        let specs = self
            .substitutions
            .values()
            .chain(&self.parameters)
            .chain(self.call.iter().flat_map(|call| &call.args));
        for spec in specs {
            spec.visit_targets(&mut targets);
        }
        if targets.iter().any(|target| TypeName::new(target).is_blank()) {
            return Err(TarkibError::invalid_rule(name, "`instance` marker has an empty target"));
        }

        Ok(())
    }
}
