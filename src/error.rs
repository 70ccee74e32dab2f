use crate::config::ConfigError;
use crate::port::PortError;
use thiserror::Error;

/// Errors surfaced by the `serial-link` binary.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Port(#[from] PortError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Serial device {0} could not be opened")]
    OpenFailed(String),

    #[error("Runtime error: {0}")]
    Runtime(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;

/// Parse a hex payload such as `01ff`, `01 ff` or `0x01,0xff`.
pub fn parse_hex(input: &str) -> AppResult<Vec<u8>> {
    let digits: String = input
        .split(|c: char| c.is_whitespace() || c == ',' || c == ':')
        .map(|tok| tok.trim_start_matches("0x").trim_start_matches("0X"))
        .collect();

    if digits.is_empty() {
        return Err(AppError::InvalidPayload("empty payload".into()));
    }
    if !digits.is_ascii() || digits.len() % 2 != 0 {
        return Err(AppError::InvalidPayload(format!(
            "expected an even number of hex digits in '{input}'"
        )));
    }

    (0..digits.len())
        .step_by(2)
        .map(|i| {
            let pair = &digits[i..i + 2];
            u8::from_str_radix(pair, 16)
                .map_err(|_| AppError::InvalidPayload(format!("bad hex byte '{pair}'")))
        })
        .collect()
}

/// Render bytes as space-separated hex.
pub fn to_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}
