#![allow(dead_code)]

use tarkib_container::prelude::*;

/// A constructor that stores each argument in the field named after its
/// parameter.
pub fn ctor(params: Vec<Param>) -> Method {
    let names: Vec<String> = params.iter().map(|param| param.name.clone()).collect();
    let method = Method::new(move |this, args| {
        for (name, value) in names.iter().zip(args) {
            this.set(name.clone(), value);
        }
        Ok(Value::Null)
    });
    params.into_iter().fold(method, Method::param)
}

/// `class name { __construct(Type $field, ...) }`
pub fn class_with(name: &str, deps: &[(&str, &str)]) -> TypeDescriptor {
    let params = deps
        .iter()
        .map(|(field, type_name)| Param::class(*field, *type_name))
        .collect();
    TypeDescriptor::class(name).constructor(ctor(params))
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("tarkib_container=trace")
        .with_test_writer()
        .try_init();
}
