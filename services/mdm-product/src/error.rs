//! 启动错误

use config::ConfigError;
use errors::AppError;
use telemetry::TelemetryError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Telemetry(#[from] TelemetryError),

    #[error(transparent)]
    App(#[from] AppError),
}
