use std::env;
use tracing::Level;
use tracing_subscriber::{
    filter::Targets,
    fmt,
    layer::{Layered, SubscriberExt},
    util::SubscriberInitExt,
    Registry,
};

fn create_registry() -> Layered<Targets, Registry> {
    let level = if cfg!(debug_assertions) {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let default_filter = Targets::new()
        .with_target("i2c_responder", level)
        .with_target("i2c_responder_core", level);
    let filter = match env::var("RUST_LOG") {
        Ok(filter) => filter.parse::<Targets>().unwrap_or(default_filter),
        Err(_) => default_filter,
    };

    tracing_subscriber::registry().with(filter)
}

/// Initialize logging to stderr, keeping stdout free for transaction output.
pub fn init() {
    let registry = create_registry().with(
        fmt::layer()
            .compact()
            .with_line_number(true)
            .with_writer(std::io::stderr),
    );

    if let Err(err) = registry.try_init() {
        eprintln!("setting tracing default failed: {err:?}");
    }
}
