mod tracer_engine;

pub use tracer_engine::{TracerEngine, TracerOptions};

/// Should be called once at the start of each binary.
/// The argument is the `LevelFilter` used when `RUST_LOG` is not set.
#[macro_export]
macro_rules! init_tracer {
    ($level:expr) => {{
        $crate::tracer::TracerEngine::new(
            $crate::tracer::TracerOptions::new($level),
            env!("CARGO_BIN_NAME"),
        )
    }};
}
