//! Parameter counts inferred from model identifiers.
//!
//! Identifiers follow the `<family>:<size>` tag convention, e.g.
//! `qwen2.5:0.5b` (0.5 billion) or `mixtral:8x7b` (a mixture of experts,
//! 8 × 7 = 56 billion). Counts are returned in billions.

use thiserror::Error;

/// Errors from parsing a model identifier's size tag
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParamsError {
    #[error("Model identifier has no size tag (expected <family>:<size>): {0}")]
    MissingSize(String),

    #[error("Invalid parameter size '{size}' in model identifier {model}")]
    InvalidNumber { model: String, size: String },
}

/// Parse the parameter count, in billions, from a model identifier.
///
/// A trailing `b` marks billions and a trailing `m` marks millions. An
/// `AxB` size is the product of both factors.
///
/// # Errors
///
/// Returns [`ParamsError::MissingSize`] when there is no `:<size>` suffix and
/// [`ParamsError::InvalidNumber`] when a factor is not a finite number.
pub fn parse_params(model: &str) -> Result<f64, ParamsError> {
    let size = model
        .split_once(':')
        .map(|(_, size)| size.trim())
        .filter(|size| !size.is_empty())
        .ok_or_else(|| ParamsError::MissingSize(model.to_string()))?;

    let invalid = || ParamsError::InvalidNumber {
        model: model.to_string(),
        size: size.to_string(),
    };

    let (digits, scale) = if let Some(rest) = size.strip_suffix(['b', 'B']) {
        (rest, 1.0)
    } else if let Some(rest) = size.strip_suffix(['m', 'M']) {
        (rest, 0.001)
    } else {
        (size, 1.0)
    };

    let factor = |s: &str| {
        s.trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(invalid)
    };

    let count = match digits.split_once(['x', 'X']) {
        Some((a, b)) => factor(a)? * factor(b)?,
        None => factor(digits)?,
    };

    Ok(count * scale)
}
