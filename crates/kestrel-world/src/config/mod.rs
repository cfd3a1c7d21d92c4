pub mod dialog_config;
pub mod kestrel_config;
pub mod logging_config;
pub mod paths;
pub mod scheduler_config;

pub use dialog_config::DialogConfig;
pub use kestrel_config::{ConfigLoadError, KestrelConfig};
pub use logging_config::LoggingConfig;
pub use paths::ProjectPaths;
pub use scheduler_config::SchedulerConfig;
