//! Recipes: compiled, cached construction plans.
//!
//! A recipe is built once per requested type name from the rule that
//! applies to it and the target's descriptor. It layers, outermost first:
//!
//! ```text
//! call ∘ shareInstances ∘ shared ∘ base
//! ```
//!
//! Every layer keeps the `(args, share) → instance` shape.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::container::Container;
use crate::descriptor::{Method, TypeDescriptor};
use crate::error::{Result, TarkibError};
use crate::key::TypeName;
use crate::param::ParamSpec;
use crate::resolver::{ArgumentPlan, expand_all};
use crate::rule::{CallSpec, Rule};
use crate::value::{Instance, Value};

/// A compiled construction plan: `(container, args, share) → instance`.
pub(crate) type Recipe = Arc<dyn Fn(&Container, Vec<ParamSpec>, Vec<Value>) -> Result<Instance> + Send + Sync>;

/// A constructor together with its compiled argument plan.
#[derive(Clone)]
struct Constructor {
    method: Method,
    plan: Arc<ArgumentPlan>,
}

/// One `call` entry with its method and plan resolved up front.
struct CallStep {
    call: CallSpec,
    method: Method,
    plan: Arc<ArgumentPlan>,
}

/// Builds the recipe for `name` under `rule`.
///
/// Fails when the target type (or a called method) is unknown.
pub(crate) fn build(container: &Container, name: &TypeName, rule: &Rule) -> Result<Recipe> {
    let class_name = rule.instance_of.clone().unwrap_or_else(|| name.clone());
    let descriptor = container.types().require(class_name.as_str())?;

    let constructor = descriptor.get_constructor().map(|method| Constructor {
        method: method.clone(),
        plan: ArgumentPlan::compile(format!("{}::__construct", descriptor.name()), method.params(), rule),
    });

    debug!(
        name = %name,
        class = %descriptor.name(),
        shared = rule.is_shared(),
        share_instances = rule.share_instances.len(),
        calls = rule.call.len(),
        "Compiling recipe"
    );

    let mut recipe = base(descriptor.clone(), constructor.clone());

    if rule.is_shared() {
        recipe = shared(recipe, descriptor.clone(), constructor, name.canonical().to_string());
    }

    if !rule.share_instances.is_empty() {
        recipe = share_instances(recipe, rule.share_instances.clone());
    }

    if !rule.call.is_empty() {
        recipe = calls(recipe, &descriptor, rule)?;
    }

    Ok(recipe)
}

/// Runs `constructor` (if any) against an already-allocated `instance`.
fn initialize(
    container: &Container,
    descriptor: &TypeDescriptor,
    constructor: Option<&Constructor>,
    instance: &Instance,
    args: Vec<ParamSpec>,
    share: &[Value],
) -> Result<()> {
    let Some(constructor) = constructor else {
        return Ok(());
    };

    let values = constructor.plan.resolve(container, args, share)?;
    constructor
        .method
        .invoke(instance, values)
        .map_err(|err| TarkibError::invocation(format!("{}::__construct", descriptor.name()), err))?;
    Ok(())
}

fn base(descriptor: Arc<TypeDescriptor>, constructor: Option<Constructor>) -> Recipe {
    if !descriptor.kind().is_instantiable() {
        let name = descriptor.name().clone();
        let kind = descriptor.kind();
        return Arc::new(move |_: &Container, _: Vec<ParamSpec>, _: Vec<Value>| -> Result<Instance> {
            Err(TarkibError::UnconstructableType {
                name: name.clone(),
                kind,
            })
        });
    }

    Arc::new(move |container: &Container, args: Vec<ParamSpec>, share: Vec<Value>| {
        let instance = Instance::allocate(descriptor.name().clone());
        initialize(container, &descriptor, constructor.as_ref(), &instance, args, &share)?;
        Ok(instance)
    })
}

/// Registers the instance before its constructor runs, so a cycle through
/// this type finds it in the cache instead of recursing.
///
/// A constructor failure leaves the allocated instance registered.
fn shared(inner: Recipe, descriptor: Arc<TypeDescriptor>, constructor: Option<Constructor>, key: String) -> Recipe {
    Arc::new(move |container: &Container, args: Vec<ParamSpec>, share: Vec<Value>| {
        if descriptor.is_internal() || !descriptor.kind().is_instantiable() {
            let instance = inner(container, args, share)?;
            container.store_shared(&key, instance.clone());
            return Ok(instance);
        }

        let instance = Instance::allocate(descriptor.name().clone());
        container.store_shared(&key, instance.clone());
        initialize(container, &descriptor, constructor.as_ref(), &instance, args, &share)?;
        Ok(instance)
    })
}

/// Builds each listed type first and appends it to the share pool.
fn share_instances(inner: Recipe, names: Vec<TypeName>) -> Recipe {
    Arc::new(move |container: &Container, args: Vec<ParamSpec>, mut share: Vec<Value>| {
        for name in &names {
            let instance = container.create_with(name.as_str(), Vec::new(), share.clone())?;
            trace!(shared = %name, "Added to share pool");
            share.push(Value::Object(instance));
        }
        inner(container, args, share)
    })
}

/// Calls the rule's methods on the built object, in order.
fn calls(inner: Recipe, descriptor: &TypeDescriptor, rule: &Rule) -> Result<Recipe> {
    let call_rule = Rule {
        share_instances: rule.share_instances.clone(),
        ..Rule::default()
    };

    let steps = rule
        .call
        .iter()
        .map(|call| -> Result<CallStep> {
            let method = descriptor
                .get_method(&call.method)
                .cloned()
                .ok_or_else(|| TarkibError::UnknownMethod {
                    type_name: descriptor.name().clone(),
                    method: call.method.clone(),
                })?;
            let plan = ArgumentPlan::compile(
                format!("{}::{}", descriptor.name(), call.method),
                method.params(),
                &call_rule,
            );
            Ok(CallStep {
                call: call.clone(),
                method,
                plan,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Arc::new(move |container: &Container, args: Vec<ParamSpec>, share: Vec<Value>| {
        let object = inner(container, args, share.clone())?;

        for step in &steps {
            let args = expand_all(container, &step.call.args, &[])?
                .into_iter()
                .map(ParamSpec::Value)
                .collect();
            let values = step.plan.resolve(container, args, &share)?;
            let returned = step.method.invoke(&object, values).map_err(|err| {
                TarkibError::invocation(format!("{}::{}", object.class(), step.call.method), err)
            })?;
            trace!(method = %step.call.method, "Called post-construction method");

            if let Some(callback) = &step.call.callback {
                callback(&returned);
            }
        }

        Ok(object)
    }))
}
