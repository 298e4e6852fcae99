use std::str::FromStr;

use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::Layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const DEFAULT_DIRECTIVE: &str = "haven=INFO";

/// Installs the global subscriber. A bare level such as `debug` applies to this crate only,
/// anything else is read as a full filter. Later calls are no-ops.
pub fn setup_tracing(filter: Option<String>) {
    let filter = EnvFilter::builder().parse_lossy(directives(filter));

    tracing_subscriber::registry()
        .with(Layer::default())
        .with(filter)
        .try_init()
        .ok();
}

fn directives(filter: Option<String>) -> String {
    match filter {
        Some(filter) => match Level::from_str(&filter) {
            Ok(level) => format!("haven={level}"),
            Err(_) => filter,
        },
        None => DEFAULT_DIRECTIVE.to_string(),
    }
}
