//! Marshaling error taxonomy.

use thiserror::Error;

/// Type-directed value the offending data belonged to, carried along with a
/// [`MarshalError`] for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Offender {
    /// A signed integer value, widened to `i128` so every supported width fits.
    Signed(i128),
    /// An unsigned integer value, widened to `u128` so every supported width fits.
    Unsigned(u128),
    /// A floating point value.
    Float(f64),
    /// A raw 32-bit code point.
    CodePoint(u32),
}

/// Marshaling error variants.
///
/// All errors are raised eagerly at the boundary where they occur (lift,
/// lower, load or store) and are never retried or silently masked; host and
/// service wrappers propagate them verbatim to their callers.
#[derive(Debug, Error)]
pub enum MarshalError {
    /// A native value was outside the wire range for its declared type.
    #[error("value {value:?} is out of range for type `{kind}`")]
    ValidationError {
        /// The type the value failed to encode as.
        kind: &'static str,
        /// The offending value.
        value: Offender,
    },

    /// The flat stream, out-pointer or parameter count didn't match the
    /// descriptor's declared shape.
    #[error("ABI violation: {0}")]
    ABIViolation(String),

    /// `latin1+utf-16` strings are reserved and not implemented.
    #[error("unsupported string encoding: {0}")]
    UnsupportedEncoding(&'static str),

    /// The `keep_option` policy and the value actually produced/consumed
    /// disagreed (tagged supplied when unpacked expected, or vice versa).
    #[error("option representation mismatch: {0}")]
    OptionRepresentationMismatch(String),

    /// An integer exceeded native representation during an internal
    /// conversion (e.g. a `u64`/`s64` value that doesn't fit where a smaller
    /// width was required).
    #[error("integer overflow converting {value} for `{context}`")]
    BigIntOverflow {
        /// What the conversion was for.
        context: &'static str,
        /// The value that didn't fit.
        value: i128,
    },
}

impl MarshalError {
    /// Build a [`MarshalError::ValidationError`] for an unsigned value.
    pub fn invalid_unsigned(kind: &'static str, value: u128) -> Self {
        Self::ValidationError {
            kind,
            value: Offender::Unsigned(value),
        }
    }

    /// Build a [`MarshalError::ValidationError`] for a signed value.
    pub fn invalid_signed(kind: &'static str, value: i128) -> Self {
        Self::ValidationError {
            kind,
            value: Offender::Signed(value),
        }
    }

    /// Build a [`MarshalError::ValidationError`] for a float value.
    pub fn invalid_float(kind: &'static str, value: f64) -> Self {
        Self::ValidationError {
            kind,
            value: Offender::Float(value),
        }
    }

    /// Build a [`MarshalError::ValidationError`] for a code point.
    pub fn invalid_char(value: u32) -> Self {
        Self::ValidationError {
            kind: "char",
            value: Offender::CodePoint(value),
        }
    }

    /// Build an [`MarshalError::ABIViolation`] with a formatted message.
    pub fn abi_violation(msg: impl Into<String>) -> Self {
        Self::ABIViolation(msg.into())
    }
}

/// Convenience alias for results produced by this crate.
pub type Result<T> = std::result::Result<T, MarshalError>;
