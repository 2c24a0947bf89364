use tracing::{Event, Level, Subscriber};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{layer::Context, EnvFilter, Layer, Registry};

const QUIET_TARGETS: [&str; 4] = ["hyper", "reqwest", "h2", "tower"];

#[derive(Default)]
struct MessageVisitor(String);

impl tracing::field::Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.0.push_str(&format!("{:?}", value));
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.0.push_str(value);
        }
    }
}

struct CustomLayer;

fn is_quiet(target: &str) -> bool {
    QUIET_TARGETS.iter().any(|quiet| target.starts_with(quiet))
}

fn format_line(timestamp: &str, level: &Level, target: &str, message: &str) -> String {
    match *level {
        Level::ERROR => format!("[{}] ❌ Error: {} - {}", timestamp, target, message),
        Level::WARN => format!("[{}] ⚠️ Warning: {} - {}", timestamp, target, message),
        Level::INFO => format!("[{}] ℹ️ {} - {}", timestamp, target, message),
        _ => format!("[{}] 🔄 {} - {}", timestamp, target, message),
    }
}

impl<S: Subscriber> Layer<S> for CustomLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if is_quiet(metadata.target()) {
            return;
        }

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        if visitor.0.is_empty() {
            return;
        }

        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f").to_string();
        println!("{}", format_line(&timestamp, metadata.level(), metadata.target(), &visitor.0));
    }
}

fn default_directives(show_debug_log: bool) -> &'static str {
    if show_debug_log {
        "warn,backend=debug,shared=debug"
    } else {
        "warn,backend=info,shared=info"
    }
}

/// Installs the global subscriber. `log` records from the shared crate are
/// bridged in as well. Calling this twice is harmless.
pub fn setup(show_debug_log: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(show_debug_log)));

    let subscriber = Registry::default().with(env_filter).with(CustomLayer);

    if subscriber.try_init().is_err() {
        tracing::debug!("Logging was already initialised");
    }
}
