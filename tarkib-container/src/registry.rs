//! Rule registry: stores, merges and resolves rules per type name.
//!
//! Rules are keyed by canonical type name and remembered in registration
//! order. Lookup falls back from the exact name to the first inheritable
//! supertype rule, then to the wildcard (`*`) rule.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use tracing::{debug, trace};

use crate::descriptor::TypeTable;
use crate::key::{TypeName, canonicalize};
use crate::rule::Rule;

static EMPTY_RULE: Lazy<Arc<Rule>> = Lazy::new(|| Arc::new(Rule::default()));

const WILDCARD: &str = "*";

/// Stores every registered rule.
#[derive(Debug, Default)]
pub(crate) struct RuleRegistry {
    rules: HashMap<String, Arc<Rule>>,
    order: Vec<TypeName>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges `rule` into the registry under `name`.
    ///
    /// When `rule.instance_of` is set and the rule inherits, the rule that
    /// currently applies to the aliased type is merged underneath it, unless
    /// `name` is already aliased to that type. The result is then merged over
    /// whatever currently applies to `name`, so earlier registrations are
    /// never lost.
    pub fn add(&mut self, name: &str, rule: Rule, types: &TypeTable) {
        let key = TypeName::new(name);

        let existing = self.get(name, types);

        // A rule already aliased to the same target carries its entries.
        let rule = match &rule.instance_of {
            Some(target) if rule.inherits() && existing.instance_of.as_ref() != Some(target) => {
                trace!(name = %key, instance_of = %target, "Inheriting rule of aliased type");
                self.get(target.as_str(), types).as_ref().clone().merge(rule)
            }
            _ => rule,
        };

        let merged = existing.as_ref().clone().merge(rule);

        if !self.rules.contains_key(key.canonical()) {
            self.order.push(key.clone());
        }
        debug!(
            name = %key,
            shared = merged.is_shared(),
            instance_of = ?merged.instance_of.as_ref().map(TypeName::as_str),
            "Registered rule"
        );
        self.rules.insert(key.canonical().to_string(), Arc::new(merged));
    }

    /// Returns the rule that applies to `name`.
    ///
    /// 1. The rule registered for exactly `name`.
    /// 2. The first rule, in registration order, whose key is a strict
    ///    supertype of `name`, skipping aliases (`instanceOf` rules), the
    ///    wildcard and rules with `inherit: false`. This is first match,
    ///    not most specific match.
    /// 3. The wildcard rule, if any.
    /// 4. The empty rule.
    pub fn get(&self, name: &str, types: &TypeTable) -> Arc<Rule> {
        let canonical = canonicalize(name);
        if let Some(rule) = self.rules.get(&canonical) {
            return rule.clone();
        }

        for key in &self.order {
            let Some(rule) = self.rules.get(key.canonical()) else {
                continue;
            };
            if rule.instance_of.is_none()
                && !key.is_wildcard()
                && types.is_subclass_of(name, key.as_str())
                && rule.inherits()
            {
                trace!(name, inherited_from = %key, "Using supertype rule");
                return rule.clone();
            }
        }

        match self.rules.get(WILDCARD) {
            Some(rule) => rule.clone(),
            None => EMPTY_RULE.clone(),
        }
    }

    /// Returns `true` if a rule is registered for exactly `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.rules.contains_key(&canonicalize(name))
    }

    /// Returns the number of registered rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::TypeDescriptor;

    fn types() -> TypeTable {
        let mut types = TypeTable::new();
        types.insert(TypeDescriptor::abstract_class("Base"));
        types.insert(TypeDescriptor::class("Child").extends("Base"));
        types.insert(TypeDescriptor::class("GrandChild").extends("Child"));
        types.insert(TypeDescriptor::interface("Marker"));
        types.insert(TypeDescriptor::class("Both").extends("Base").implements("Marker"));
        types
    }

    #[test]
    fn exact_lookup_is_case_insensitive() {
        let types = types();
        let mut reg = RuleRegistry::new();
        reg.add("\\Child", Rule::new().shared(true), &types);
        assert!(reg.get("child", &types).is_shared());
        assert!(reg.contains("CHILD"));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn supertype_rule_applies_to_subclasses() {
        let types = types();
        let mut reg = RuleRegistry::new();
        reg.add("Base", Rule::new().shared(true), &types);
        assert!(reg.get("Child", &types).is_shared());
        assert!(reg.get("GrandChild", &types).is_shared());
    }

    #[test]
    fn non_inheriting_rule_stays_put() {
        let types = types();
        let mut reg = RuleRegistry::new();
        reg.add("Base", Rule::new().shared(true).inherit(false), &types);
        assert!(!reg.get("Child", &types).is_shared());
    }

    #[test]
    fn alias_rules_are_not_inherited() {
        let types = types();
        let mut reg = RuleRegistry::new();
        reg.add("Base", Rule::new().instance_of("Child"), &types);
        assert!(reg.get("GrandChild", &types).is_empty());
    }

    #[test]
    fn first_registered_supertype_wins() {
        let types = types();
        let mut reg = RuleRegistry::new();
        reg.add("Marker", Rule::new().parameter("marker"), &types);
        reg.add("Base", Rule::new().parameter("base"), &types);
        let rule = reg.get("Both", &types);
        assert_eq!(rule.parameters.len(), 1);
        assert!(matches!(&rule.parameters[0], crate::param::ParamSpec::Value(v) if v.as_str() == Some("marker")));
    }

    #[test]
    fn wildcard_then_empty() {
        let types = types();
        let mut reg = RuleRegistry::new();
        assert!(reg.get("Child", &types).is_empty());
        reg.add("*", Rule::new().shared(true), &types);
        assert!(reg.get("Child", &types).is_shared());
        assert!(reg.get("Unrelated", &types).is_shared());
    }

    #[test]
    fn re_registration_merges() {
        let types = types();
        let mut reg = RuleRegistry::new();
        reg.add("Child", Rule::new().shared(true).share_instance("A"), &types);
        reg.add("Child", Rule::new().share_instance("B"), &types);
        let rule = reg.get("Child", &types);
        assert!(rule.is_shared());
        assert_eq!(rule.share_instances.len(), 2);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn instance_of_inherits_target_rule() {
        let types = types();
        let mut reg = RuleRegistry::new();
        reg.add("Child", Rule::new().shared(true).parameter(1), &types);
        reg.add("Named", Rule::new().instance_of("Child"), &types);
        let rule = reg.get("Named", &types);
        assert!(rule.is_shared());
        assert_eq!(rule.instance_of, Some(TypeName::new("Child")));

        reg.add("Plain", Rule::new().instance_of("Child").inherit(false), &types);
        assert!(!reg.get("Plain", &types).is_shared());
    }
}
