//! Basic example of the Tarkib DI container.
//!
//! Run with `TARKIB_LOG=tarkib_container=debug cargo run --example basic`.

use tarkib::prelude::*;

// === Describe your types ===

fn console_logger() -> TypeDescriptor {
    TypeDescriptor::class("ConsoleLogger").implements("Logger")
}

fn database() -> TypeDescriptor {
    TypeDescriptor::class("Database").constructor(
        Method::new(|this, args| {
            let mut args = args.into_iter();
            this.set("url", args.next().unwrap_or_default());
            this.set("logger", args.next().unwrap_or_default());
            Ok(Value::Null)
        })
        .param(Param::string("url"))
        .param(Param::class("logger", "Logger")),
    )
}

fn user_service() -> TypeDescriptor {
    TypeDescriptor::class("UserService")
        .constructor(
            Method::new(|this, args| {
                let mut args = args.into_iter();
                this.set("db", args.next().unwrap_or_default());
                this.set("logger", args.next().unwrap_or_default());
                Ok(Value::Null)
            })
            .param(Param::class("db", "Database"))
            .param(Param::class("logger", "Logger")),
        )
        .method(
            "warmUp",
            Method::new(|this, _| {
                this.set("warm", true);
                Ok(Value::from("cache warmed"))
            }),
        )
}

fn main() -> Result<()> {
    // Initialize tracing (logging)
    tarkib::logging::init_tracing("tarkib_container=info").ok();

    let container = Container::builder()
        .register_type(TypeDescriptor::interface("Logger"))
        .register_type(console_logger())
        .register_type(database())
        .register_type(user_service())
        // Logger: one ConsoleLogger for everybody
        .rule("Logger", Rule::new().instance_of("ConsoleLogger").shared(true))
        // Database: singleton with its connection string
        .rule(
            "Database",
            Rule::new().shared(true).parameter("postgres://localhost/myapp"),
        )
        // UserService: warm up after construction
        .rule(
            "UserService",
            Rule::new().call_spec(
                CallSpec::new("warmUp", vec![]).with_callback(|result| println!("warmUp returned {result:?}")),
            ),
        )
        .build()?;

    let service = container.create("UserService")?;
    let db = container.create("Database")?;

    println!("service:  {service:?}");
    println!("db url:   {:?}", db.get("url"));
    println!("same db:  {}", service.get_object("db").is_some_and(|d| d.ptr_eq(&db)));
    println!("warm:     {:?}", service.get("warm"));

    let logger = container.create("Logger")?;
    println!(
        "same logger: {}",
        service.get_object("logger").is_some_and(|l| l.ptr_eq(&logger))
    );

    println!("{container:?}");
    Ok(())
}
