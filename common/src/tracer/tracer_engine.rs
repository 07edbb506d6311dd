use tracing::{debug, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, EnvFilter, Layer};

pub struct TracerOptions {
    pub default_level: LevelFilter,
}

impl TracerOptions {
    pub fn new(default_level: LevelFilter) -> Self {
        Self { default_level }
    }
}

/// This object initialises the stdout tracer, given a TracerOptions struct.
/// Events are filtered by `RUST_LOG` if it is set, otherwise by the default
/// level in TracerOptions.
pub struct TracerEngine {
    service_name: String,
}

impl TracerEngine {
    /// Initialises the stdout tracer for the binary
    /// #Arguments
    /// * `options` - The caller-specified instance of TracerOptions.
    /// * `service_name` - The name of the binary, attached to the first log line.
    /// #Returns
    /// An instance of TracerEngine
    pub fn new(options: TracerOptions, service_name: &str) -> Self {
        let stdout_tracer = tracing_subscriber::fmt::layer().with_writer(std::io::stdout);

        let log_filter = EnvFilter::builder()
            .with_default_directive(options.default_level.into())
            .from_env_lossy();

        let subscriber =
            tracing_subscriber::Registry::default().with(stdout_tracer.with_filter(log_filter));

        // A second initialisation (e.g. from a test harness) keeps the first subscriber.
        if tracing::subscriber::set_global_default(subscriber).is_ok() {
            debug!("Tracer initialised for {service_name}");
        }

        Self {
            service_name: service_name.to_owned(),
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }
}
