use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Output formats understood by the server's telemetry subscriber.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// One JSON object per event, fields flattened.
    #[default]
    Json,
    /// Single-line human-readable records.
    Compact,
}

/// Error returned when `--log-format` or `ICE_LOG_FORMAT` is not recognised.
pub type LogFormatParseError = strum::ParseError;
