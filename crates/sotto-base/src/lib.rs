pub mod logging;

pub use logging::{init_file_logger, init_stdout_logger, init_stdout_logger_at, FileLogger, StdoutLogger};

// Re-export log so downstream crates can use sotto_base::log::*
pub use log;
