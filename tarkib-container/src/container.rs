//! # The Container: heart of Tarkib
//!
//! Produces fully constructed objects from a type name, resolving
//! constructor and post-construction arguments from rules, caller
//! arguments and shared instances.
//!
//! # Architecture
//! ```text
//! add_rule ──> RuleRegistry
//!                   │ get_rule
//!                   ▼
//! create ──> recipe cache ──(miss)──> recipe::build ──> ArgumentPlan
//!   │                                      │
//!   └── shared-instance cache <── shared ──┘
//! ```
//!
//! # Examples
//! ```rust
//! use tarkib_container::prelude::*;
//!
//! let container = Container::builder()
//!     .register_type(TypeDescriptor::class("Logger"))
//!     .register_type(
//!         TypeDescriptor::class("UserService").constructor(
//!             Method::new(|this, args| {
//!                 this.set("logger", args.into_iter().next().unwrap_or_default());
//!                 Ok(Value::Null)
//!             })
//!             .param(Param::class("logger", "Logger")),
//!         ),
//!     )
//!     .rule("Logger", Rule::new().shared(true))
//!     .build()
//!     .expect("Failed to build container");
//!
//! let service = container.create("UserService").expect("Failed to create");
//! let logger = container.create("Logger").expect("Failed to create");
//! assert!(service.get_object("logger").unwrap().ptr_eq(&logger));
//! ```
//!
//! # Threading
//! The container is `Send + Sync`, but one construction path is tracked per
//! container: concurrent `create` calls from several threads are not
//! supported without external locking.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::{RwLock, RwLockReadGuard};
use tracing::{debug, info, instrument, trace, warn};

use crate::descriptor::{TypeDescriptor, TypeRegistration, TypeTable};
use crate::error::{Result, TarkibError};
use crate::graph::ConstructionPath;
use crate::key::{TypeName, canonicalize};
use crate::param::ParamSpec;
use crate::provider::{Provider, ProviderRegistry};
use crate::recipe::{self, Recipe};
use crate::registry::RuleRegistry;
use crate::rule::Rule;
use crate::settings::ContainerSettings;
use crate::value::{Instance, Value};

// ============================================================
// ContainerBuilder
// ============================================================

/// Builds a [`Container`] with its types, rules and settings.
///
/// # Examples
/// ```rust,ignore
/// let container = Container::builder()
///     .with_registered_types()
///     .register_type(TypeDescriptor::class("Config"))
///     .rule("Config", Rule::new().shared(true))
///     .build()?;
/// ```
#[derive(Default)]
pub struct ContainerBuilder {
    types: TypeTable,
    rules: Vec<(String, Rule)>,
    settings: ContainerSettings,
}

impl ContainerBuilder {
    fn new() -> Self {
        Self::default()
    }

    /// Adds every descriptor submitted with `inventory::submit!`.
    pub fn with_registered_types(mut self) -> Self {
        for registration in inventory::iter::<TypeRegistration>() {
            self.types.insert((registration.0)());
        }
        self
    }

    /// Adds one type descriptor.
    pub fn register_type(mut self, descriptor: TypeDescriptor) -> Self {
        self.types.insert(descriptor);
        self
    }

    /// Queues a rule. Rules are added in call order by [`build`](Self::build).
    pub fn rule(mut self, name: impl Into<String>, rule: Rule) -> Self {
        self.rules.push((name.into(), rule));
        self
    }

    pub fn settings(mut self, settings: ContainerSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Add a [`Provider`] module.
    pub fn add_provider(mut self, provider: &dyn Provider) -> Self {
        debug!(provider = provider.name(), "Adding provider");
        provider.register(&mut self);
        self
    }

    /// Build the container, validating and merging the queued rules.
    ///
    /// # Errors
    /// [`TarkibError::InvalidRule`] for the first malformed rule.
    #[instrument(skip(self), name = "container_build")]
    pub fn build(self) -> Result<Container> {
        info!(
            types = self.types.len(),
            rules = self.rules.len(),
            "Building container"
        );

        let container = Container::with_parts(self.types, self.settings);
        container.add_rules(self.rules)?;

        info!("Container built successfully ✓");
        Ok(container)
    }
}

impl ProviderRegistry for ContainerBuilder {
    fn register_type(&mut self, descriptor: TypeDescriptor) {
        self.types.insert(descriptor);
    }

    fn register_rule(&mut self, name: &str, rule: Rule) {
        self.rules.push((name.to_string(), rule));
    }
}

// ═══════════════════════════════════════════
// Container
// ═══════════════════════════════════════════

/// Rule-driven dependency injection container.
///
/// Rules must be registered before the first `create` of any type they
/// affect: recipes capture the rule in force when they are compiled and
/// are never invalidated.
pub struct Container {
    types: RwLock<TypeTable>,
    rules: RwLock<RuleRegistry>,
    recipes: DashMap<String, Recipe>,
    instances: DashMap<String, Instance>,
    path: ConstructionPath,
    settings: ContainerSettings,
}

impl Container {
    /// An empty container with default settings.
    pub fn new() -> Self {
        Self::with_parts(TypeTable::new(), ContainerSettings::default())
    }

    /// Create a new builder.
    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::new()
    }

    fn with_parts(types: TypeTable, settings: ContainerSettings) -> Self {
        Self {
            types: RwLock::new(types),
            rules: RwLock::new(RuleRegistry::new()),
            recipes: DashMap::new(),
            instances: DashMap::new(),
            path: ConstructionPath::new(),
            settings,
        }
    }

    /// Adds or replaces a type descriptor.
    ///
    /// Recipes already compiled for the type keep the old descriptor.
    pub fn register_type(&self, descriptor: TypeDescriptor) {
        self.types.write().insert(descriptor);
    }

    /// Merges `rule` into the rules for `name`.
    ///
    /// # Errors
    /// [`TarkibError::InvalidRule`] if the rule is structurally malformed.
    /// Whether the types it names exist is checked at `create` time.
    pub fn add_rule(&self, name: &str, rule: Rule) -> Result<()> {
        rule.validate(name)?;

        if self.recipes.contains_key(&canonicalize(name)) {
            warn!(name, "Rule added after its recipe was compiled; the cached recipe is kept");
        }

        let types = self.types.read();
        self.rules.write().add(name, rule, &types);
        Ok(())
    }

    /// Adds rules in iteration order.
    pub fn add_rules<I, N>(&self, rules: I) -> Result<()>
    where
        I: IntoIterator<Item = (N, Rule)>,
        N: AsRef<str>,
    {
        for (name, rule) in rules {
            self.add_rule(name.as_ref(), rule)?;
        }
        Ok(())
    }

    /// Adds rules from a JSON object mapping type names to rule data, in
    /// document order.
    ///
    /// # Errors
    /// [`TarkibError::InvalidRule`] if the data is not an object or a rule
    /// fails to decode. Rules before the failing one stay registered.
    pub fn add_json_rules(&self, json: serde_json::Value) -> Result<()> {
        let serde_json::Value::Object(rules) = json else {
            return Err(TarkibError::invalid_rule(
                "<rules>",
                format!("expected an object of type name → rule, found {json}"),
            ));
        };

        for (name, data) in rules {
            let rule = Rule::from_json(&name, data)?;
            self.add_rule(&name, rule)?;
        }
        Ok(())
    }

    /// Returns the rule that applies to `name` (the empty rule if none).
    pub fn get_rule(&self, name: &str) -> Arc<Rule> {
        let types = self.types.read();
        self.rules.read().get(name, &types)
    }

    /// Returns `true` if a rule is registered for exactly `name`.
    pub fn has_rule(&self, name: &str) -> bool {
        self.rules.read().contains(name)
    }

    /// Creates `name` with no extra arguments.
    pub fn create(&self, name: &str) -> Result<Instance> {
        self.create_with(name, Vec::new(), Vec::new())
    }

    /// Creates `name`, matching `args` to constructor parameters first and
    /// offering `share` to every nested construction.
    ///
    /// A shared instance already built for `name` is returned as is,
    /// ignoring `args` and `share`.
    ///
    /// # Errors
    /// - [`UnconstructableType`](crate::error::TarkibError::UnconstructableType): `name` is an interface or abstract type with no concrete mapping
    /// - [`UnknownType`](crate::error::TarkibError::UnknownType): no descriptor for the target
    /// - [`CyclicDependency`](crate::error::TarkibError::CyclicDependency): non-shared types form a cycle
    #[instrument(level = "debug", skip(self, args, share), fields(args = args.len(), share = share.len()))]
    pub fn create_with(&self, name: &str, args: Vec<ParamSpec>, share: Vec<Value>) -> Result<Instance> {
        let key = TypeName::new(name);

        if let Some(instance) = self.shared_instance(key.canonical()) {
            trace!(name = %key, "Returning shared instance");
            return Ok(instance);
        }

        let _guard = self.path.enter(&key, self.settings.max_depth)?;
        let recipe = self.recipe_for(&key)?;
        recipe(self, args, share)
    }

    /// Returns `true` if a shared instance exists for `name`.
    pub fn has_shared(&self, name: &str) -> bool {
        self.instances.contains_key(&canonicalize(name))
    }

    pub fn settings(&self) -> &ContainerSettings {
        &self.settings
    }

    pub(crate) fn types(&self) -> RwLockReadGuard<'_, TypeTable> {
        self.types.read()
    }

    pub(crate) fn store_shared(&self, key: &str, instance: Instance) {
        debug!(name = key, instance = ?instance, "Registered shared instance");
        self.instances.insert(key.to_string(), instance);
    }

    fn shared_instance(&self, key: &str) -> Option<Instance> {
        self.instances.get(key).map(|entry| entry.value().clone())
    }

    fn recipe_for(&self, key: &TypeName) -> Result<Recipe> {
        if let Some(recipe) = self.recipes.get(key.canonical()) {
            trace!(name = %key, "Recipe cache hit");
            return Ok(recipe.value().clone());
        }

        let rule = self.get_rule(key.as_str());
        let recipe = recipe::build(self, key, &rule)?;
        self.recipes.insert(key.canonical().to_string(), recipe.clone());
        Ok(recipe)
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("types", &self.types.read().len())
            .field("rules", &self.rules.read().len())
            .field("recipes", &self.recipes.len())
            .field("shared", &self.instances.len())
            .field("depth", &self.path.depth())
            .finish()
    }
}

// ═══════════════════════════════════════════
// Prelude
// ═══════════════════════════════════════════

pub mod prelude {
    pub use super::{Container, ContainerBuilder};
    pub use crate::descriptor::{Method, Param, ParamType, ScalarType, TypeDescriptor, TypeKind, TypeRegistration};
    pub use crate::error::{BoxError, Result, TarkibError};
    pub use crate::key::TypeName;
    pub use crate::param::ParamSpec;
    pub use crate::provider::{Provider, ProviderRegistry};
    pub use crate::rule::{CallSpec, Rule};
    pub use crate::settings::ContainerSettings;
    pub use crate::value::{Instance, Value};
}

// ═══════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{Method, Param};

    fn keep_first(field: &'static str) -> Method {
        Method::new(move |this, args| {
            this.set(field, args.into_iter().next().unwrap_or_default());
            Ok(Value::Null)
        })
    }

    fn container() -> Container {
        Container::builder()
            .register_type(TypeDescriptor::class("Logger"))
            .register_type(
                TypeDescriptor::class("Mailer")
                    .constructor(keep_first("logger").param(Param::class("logger", "Logger"))),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn create_without_rules() {
        let c = container();
        let mailer = c.create("Mailer").unwrap();
        assert_eq!(mailer.class().as_str(), "Mailer");
        assert_eq!(mailer.get_object("logger").unwrap().class().as_str(), "Logger");
    }

    #[test]
    fn non_shared_creates_new_each_time() {
        let c = container();
        let a = c.create("Logger").unwrap();
        let b = c.create("Logger").unwrap();
        assert!(!a.ptr_eq(&b));
        assert!(!c.has_shared("Logger"));
    }

    #[test]
    fn shared_lookup_ignores_case_and_prefix() {
        let c = container();
        c.add_rule("Logger", Rule::new().shared(true)).unwrap();
        let a = c.create("\\Logger").unwrap();
        let b = c.create("logger").unwrap();
        assert!(a.ptr_eq(&b));
        assert!(c.has_shared("LOGGER"));
    }

    #[test]
    fn unknown_type_reports_suggestions() {
        let c = container();
        match c.create("Loger") {
            Err(TarkibError::UnknownType(err)) => assert!(err.suggestions.contains(&"Logger".to_string())),
            other => panic!("Expected UnknownType, got: {:?}", other.err()),
        }
    }

    #[test]
    fn invalid_rule_rejected_at_build() {
        let result = Container::builder().rule("Logger", Rule::new().instance_of("")).build();
        assert!(matches!(result, Err(TarkibError::InvalidRule { .. })));
    }

    #[test]
    fn get_rule_defaults_to_empty() {
        let c = container();
        assert!(c.get_rule("Mailer").is_empty());
        assert!(!c.has_rule("Mailer"));

        c.add_rule("\\Mailer", Rule::new().shared(true)).unwrap();
        assert!(c.has_rule("mailer"));
    }

    #[test]
    fn json_rules_in_document_order() {
        let c = container();
        c.add_json_rules(serde_json::json!({
            "Logger": {"shared": true},
            "Mailer": {"substitutions": {"Logger": {"instance": "Logger"}}}
        }))
        .unwrap();
        assert!(c.get_rule("Logger").is_shared());
        assert_eq!(c.get_rule("Mailer").substitutions.len(), 1);

        assert!(matches!(
            c.add_json_rules(serde_json::json!(["Logger"])),
            Err(TarkibError::InvalidRule { .. })
        ));
    }

    #[test]
    fn runtime_type_registration() {
        let c = Container::new();
        assert!(c.create("Clock").is_err());
        c.register_type(TypeDescriptor::class("Clock"));
        assert!(c.create("Clock").is_ok());
    }

    #[test]
    fn debug_display() {
        let c = container();
        c.create("Mailer").unwrap();
        let debug = format!("{c:?}");
        assert!(debug.contains("Container"));
        assert!(debug.contains("types: 2"));
    }
}
