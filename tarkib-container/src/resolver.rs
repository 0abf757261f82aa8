//! Argument resolution: turning a declared parameter list plus whatever
//! the caller, the rule and the share pool supply into an ordered argument
//! list.
//!
//! An [`ArgumentPlan`] is compiled once per constructor or method and
//! reused on every call. Resolution walks the declared parameters in
//! order:
//!
//! 1. Object-typed: take the first pooled object of a matching type
//!    (or `null` if the parameter is nullable). Otherwise build one, via
//!    the rule's substitution for that type if present. If the type cannot
//!    be built (interface, abstract), the argument is left out entirely
//!    unless strict mode is on.
//! 2. Variadic: take everything left in the pool.
//! 3. Otherwise take the next pooled value if its kind fits the declared
//!    scalar type, else the declared default, else `null`.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{trace, warn};

use crate::container::Container;
use crate::descriptor::{Param, ParamType, ScalarType};
use crate::error::{Result, TarkibError};
use crate::param::{ConstructSpec, InstanceTarget, ParamSpec};
use crate::rule::Rule;
use crate::value::Value;

/// A compiled argument plan for one constructor or method.
pub(crate) struct ArgumentPlan {
    owner: String,
    params: Vec<(Param, Option<ParamSpec>)>,
    parameters: Vec<ParamSpec>,
}

impl ArgumentPlan {
    /// Caches each parameter alongside the rule's substitution for its type.
    pub fn compile(owner: impl Into<String>, params: &[Param], rule: &Rule) -> Arc<Self> {
        let params = params
            .iter()
            .map(|param| {
                let substitution = param
                    .class_type()
                    .and_then(|class| rule.substitution_for(class))
                    .cloned();
                (param.clone(), substitution)
            })
            .collect();

        Arc::new(Self {
            owner: owner.into(),
            params,
            parameters: rule.parameters.clone(),
        })
    }

    /// Produces the argument list for one invocation.
    ///
    /// Rule parameters and the share pool are appended after the caller's
    /// arguments, so caller arguments are matched first.
    pub fn resolve(&self, container: &Container, mut args: Vec<ParamSpec>, share: &[Value]) -> Result<Vec<Value>> {
        if !share.is_empty() || !self.parameters.is_empty() {
            let expanded = expand_all(container, &self.parameters, share)?;
            args.extend(expanded.into_iter().map(ParamSpec::Value));
            args.extend(share.iter().cloned().map(ParamSpec::Value));
        }

        let mut resolved = Vec::with_capacity(self.params.len());

        for (param, substitution) in &self.params {
            if let Some(class) = param.class_type() {
                let position = {
                    let types = container.types();
                    args.iter().position(|arg| match arg {
                        ParamSpec::Value(Value::Null) => param.nullable,
                        ParamSpec::Value(value) => types.value_is_instance_of(value, class.as_str()),
                        _ => false,
                    })
                };

                if let Some(position) = position {
                    trace!(owner = %self.owner, param = %param.name, "Matched pooled argument");
                    if let ParamSpec::Value(value) = args.remove(position) {
                        resolved.push(value);
                    }
                    continue;
                }

                let built = match substitution {
                    Some(spec) => expand(container, spec, share, true),
                    None => container.create_with(class.as_str(), Vec::new(), share.to_vec()).map(Value::Object),
                };

                match built {
                    Ok(value) => resolved.push(value),
                    Err(err) if err.is_unconstructable() => {
                        if container.settings().strict_arguments {
                            return Err(TarkibError::ArgumentResolution {
                                owner: self.owner.clone(),
                                param: param.name.clone(),
                                source: Box::new(err),
                            });
                        }
                        warn!(
                            owner = %self.owner,
                            param = %param.name,
                            error = %err,
                            "Skipping typed parameter that cannot be built"
                        );
                    }
                    Err(err) => return Err(err),
                }
            } else if param.variadic {
                for arg in args.drain(..) {
                    resolved.push(expand(container, &arg, &[], false)?);
                }
                break;
            } else if args.first().is_some_and(|first| fits(&param.ty, first)) {
                let arg = args.remove(0);
                resolved.push(expand(container, &arg, &[], false)?);
            } else {
                resolved.push(param.default.clone().unwrap_or_default());
            }
        }

        Ok(resolved)
    }
}

/// Whether the next pooled argument may fill an untyped or scalar parameter.
fn fits(ty: &ParamType, arg: &ParamSpec) -> bool {
    let scalar = match ty {
        ParamType::Untyped => return true,
        ParamType::Scalar(scalar) => scalar,
        ParamType::Class(_) => return false,
    };

    match arg {
        ParamSpec::Value(value) | ParamSpec::Literal(value) => scalar.accepts(value),
        ParamSpec::List(_) => matches!(scalar, ScalarType::List | ScalarType::Mixed),
        ParamSpec::Map(_) => matches!(scalar, ScalarType::Map | ScalarType::Mixed),
        ParamSpec::Instance(_) => matches!(scalar, ScalarType::Mixed),
    }
}

/// Expands every spec in `specs`.
pub(crate) fn expand_all(container: &Container, specs: &[ParamSpec], share: &[Value]) -> Result<Vec<Value>> {
    specs
        .iter()
        .map(|spec| expand(container, spec, share, false))
        .collect()
}

/// Resolves a spec into a value.
///
/// - `instance` markers build their target; `create` receives the expanded
///   `params` followed by `share` as its arguments
/// - literals come back verbatim
/// - lists and maps expand element-wise
/// - a plain string names a type when `allow_type_name` is set
pub(crate) fn expand(container: &Container, spec: &ParamSpec, share: &[Value], allow_type_name: bool) -> Result<Value> {
    match spec {
        ParamSpec::Instance(construct) => expand_instance(container, construct, share),
        ParamSpec::Literal(value) => Ok(value.clone()),
        ParamSpec::List(items) => items
            .iter()
            .map(|item| expand(container, item, share, false))
            .collect::<Result<Vec<_>>>()
            .map(Value::List),
        ParamSpec::Map(map) => map
            .iter()
            .map(|(key, item)| expand(container, item, share, false).map(|value| (key.clone(), value)))
            .collect::<Result<BTreeMap<_, _>>>()
            .map(Value::Map),
        ParamSpec::Value(Value::Str(type_name)) if allow_type_name => {
            container.create(type_name).map(Value::Object)
        }
        ParamSpec::Value(value) => Ok(value.clone()),
    }
}

fn expand_instance(container: &Container, construct: &ConstructSpec, share: &[Value]) -> Result<Value> {
    let params = expand_all(container, &construct.params, &[])?;

    match &construct.target {
        InstanceTarget::Type(type_name) => {
            let args = params
                .into_iter()
                .chain(share.iter().cloned())
                .map(ParamSpec::Value)
                .collect();
            container.create_with(type_name.as_str(), args, Vec::new()).map(Value::Object)
        }
        InstanceTarget::Factory(factory) => {
            factory(params).map_err(|err| TarkibError::invocation("instance factory", err))
        }
        InstanceTarget::Method { receiver, method } => {
            let receiver = expand(container, receiver, share, true)?;
            let Value::Object(object) = receiver else {
                return Err(TarkibError::NotAnObject {
                    method: method.clone(),
                    found: receiver.kind(),
                });
            };

            let descriptor = container.types().require(object.class().as_str())?;
            let callable = descriptor
                .get_method(method)
                .ok_or_else(|| TarkibError::UnknownMethod {
                    type_name: object.class().clone(),
                    method: method.clone(),
                })?;

            callable
                .invoke(&object, params)
                .map_err(|err| TarkibError::invocation(format!("{}::{method}", object.class()), err))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{Method, TypeDescriptor};

    fn container() -> Container {
        Container::builder()
            .register_type(TypeDescriptor::interface("Logger"))
            .register_type(TypeDescriptor::class("FileLogger").implements("Logger"))
            .register_type(TypeDescriptor::class("NullLogger").implements("Logger"))
            .build()
            .unwrap()
    }

    #[test]
    fn caller_objects_match_by_type() {
        let c = container();
        let logger = c.create("NullLogger").unwrap();
        let plan = ArgumentPlan::compile(
            "Svc::__construct",
            &[Param::string("name"), Param::class("logger", "Logger")],
            &Rule::new(),
        );

        let args = plan
            .resolve(&c, vec![ParamSpec::from("svc"), ParamSpec::from(logger.clone())], &[])
            .unwrap();

        assert_eq!(args, vec![Value::from("svc"), Value::Object(logger)]);
    }

    #[test]
    fn object_in_front_blocks_scalar_param() {
        let c = container();
        let logger = c.create("NullLogger").unwrap();
        let plan = ArgumentPlan::compile(
            "Svc::__construct",
            &[Param::string("name"), Param::class("logger", "Logger")],
            &Rule::new(),
        );

        // The object sits first in the pool and is not a string, so `name`
        // falls back to null; the object still fills `logger`.
        let args = plan.resolve(&c, vec![ParamSpec::from(logger.clone())], &[]).unwrap();
        assert_eq!(args, vec![Value::Null, Value::Object(logger)]);
    }

    #[test]
    fn nullable_param_takes_pooled_null() {
        let c = container();
        let plan = ArgumentPlan::compile("X", &[Param::class("logger", "Logger").nullable()], &Rule::new());
        let args = plan.resolve(&c, vec![ParamSpec::Value(Value::Null)], &[]).unwrap();
        assert_eq!(args, vec![Value::Null]);
    }

    #[test]
    fn unresolvable_typed_param_is_skipped() {
        let c = container();
        let plan = ArgumentPlan::compile(
            "X",
            &[Param::class("logger", "Logger"), Param::int("size")],
            &Rule::new(),
        );
        let args = plan.resolve(&c, vec![ParamSpec::from(5)], &[]).unwrap();
        assert_eq!(args, vec![Value::Int(5)]);
    }

    #[test]
    fn substitution_builds_replacement() {
        let c = container();
        let rule = Rule::new().substitute("Logger", "FileLogger");
        let plan = ArgumentPlan::compile("X", &[Param::class("logger", "Logger")], &rule);
        let args = plan.resolve(&c, vec![], &[]).unwrap();
        let logger = args[0].as_object().unwrap();
        assert_eq!(logger.class().as_str(), "FileLogger");
    }

    #[test]
    fn scalar_mismatch_falls_back_to_default() {
        let c = container();
        let plan = ArgumentPlan::compile(
            "X",
            &[Param::int("port").default_value(80), Param::untyped("host")],
            &Rule::new(),
        );
        let args = plan.resolve(&c, vec![ParamSpec::from("localhost")], &[]).unwrap();
        assert_eq!(args, vec![Value::Int(80), Value::from("localhost")]);
    }

    #[test]
    fn missing_untyped_without_default_is_null() {
        let c = container();
        let plan = ArgumentPlan::compile("X", &[Param::untyped("a")], &Rule::new());
        assert_eq!(plan.resolve(&c, vec![], &[]).unwrap(), vec![Value::Null]);
    }

    #[test]
    fn variadic_takes_remaining_in_order() {
        let c = container();
        let plan = ArgumentPlan::compile("X", &[Param::untyped("first"), Param::variadic("rest")], &Rule::new());
        let args = plan
            .resolve(&c, vec![ParamSpec::from(1), ParamSpec::from("two"), ParamSpec::from(3.0)], &[])
            .unwrap();
        assert_eq!(args, vec![Value::Int(1), Value::from("two"), Value::Float(3.0)]);
    }

    #[test]
    fn rule_parameters_follow_caller_args() {
        let c = container();
        let rule = Rule::new().parameter("from-rule");
        let plan = ArgumentPlan::compile("X", &[Param::untyped("a"), Param::untyped("b")], &rule);
        let args = plan.resolve(&c, vec![ParamSpec::from("from-caller")], &[]).unwrap();
        assert_eq!(args, vec![Value::from("from-caller"), Value::from("from-rule")]);
    }

    #[test]
    fn share_pool_satisfies_typed_params() {
        let c = container();
        let shared = c.create("FileLogger").unwrap();
        let plan = ArgumentPlan::compile("X", &[Param::class("logger", "Logger")], &Rule::new());
        let args = plan.resolve(&c, vec![], &[Value::Object(shared.clone())]).unwrap();
        assert!(args[0].as_object().unwrap().ptr_eq(&shared));
    }

    #[test]
    fn expand_literal_is_verbatim() {
        let c = container();
        let value = expand(&c, &ParamSpec::literal("NullLogger"), &[], true).unwrap();
        assert_eq!(value, Value::from("NullLogger"));
    }

    #[test]
    fn expand_string_as_type_name() {
        let c = container();
        let value = expand(&c, &ParamSpec::from("NullLogger"), &[], true).unwrap();
        assert_eq!(value.as_object().unwrap().class().as_str(), "NullLogger");

        let plain = expand(&c, &ParamSpec::from("NullLogger"), &[], false).unwrap();
        assert_eq!(plain, Value::from("NullLogger"));
    }

    #[test]
    fn expand_factory_receives_expanded_params() {
        let c = container();
        let spec = ParamSpec::factory(
            |params| Ok(Value::Int(params.len() as i64)),
            vec![ParamSpec::from(1), ParamSpec::List(vec![ParamSpec::instance("NullLogger")])],
        );
        assert_eq!(expand(&c, &spec, &[], false).unwrap(), Value::Int(2));
    }

    #[test]
    fn expand_method_pair_on_non_object_fails() {
        let c = container();
        let spec = ParamSpec::call(ParamSpec::literal(5), "open", vec![]);
        assert!(matches!(
            expand(&c, &spec, &[], false),
            Err(TarkibError::NotAnObject { found: "int", .. })
        ));
    }

    #[test]
    fn expand_method_pair_calls_method() {
        let c = Container::builder()
            .register_type(
                TypeDescriptor::class("ConnectionFactory").method(
                    "open",
                    Method::new(|_, args| Ok(Value::from(format!("conn:{}", args.len())))),
                ),
            )
            .build()
            .unwrap();

        let spec = ParamSpec::call("ConnectionFactory", "open", vec![ParamSpec::from("dsn")]);
        assert_eq!(expand(&c, &spec, &[], false).unwrap(), Value::from("conn:1"));

        let missing = ParamSpec::call("ConnectionFactory", "close", vec![]);
        assert!(matches!(
            expand(&c, &missing, &[], false),
            Err(TarkibError::UnknownMethod { .. })
        ));
    }
}
