//! Canonical ABI options threaded through every load/store/lift/lower call.

use crate::error::MarshalError;

/// The string codec in effect for `wstring` operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, strum::Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StringEncoding {
    /// UTF-8: `code_units` is a byte length.
    #[default]
    Utf8,
    /// UTF-16: `code_units` is a 16-bit-unit length, little-endian.
    Utf16,
    /// Reserved; any operation under this encoding fails with
    /// [`MarshalError::UnsupportedEncoding`].
    Latin1Utf16,
}

impl StringEncoding {
    /// Byte alignment a string's body is allocated at under this encoding,
    /// independent of the descriptor's own (pointer+length) alignment.
    pub const fn body_alignment(self) -> u32 {
        match self {
            Self::Utf8 => 1,
            Self::Utf16 | Self::Latin1Utf16 => 2,
        }
    }
}

/// Context value carried through every descriptor operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CanonicalOptions {
    /// The active string codec.
    pub encoding: StringEncoding,
    /// When true, `option<T>` surfaces as a tagged discriminated value; when
    /// false, it collapses to `T | null`.
    pub keep_option: bool,
}

impl Default for CanonicalOptions {
    fn default() -> Self {
        Self {
            encoding: StringEncoding::Utf8,
            keep_option: false,
        }
    }
}

impl CanonicalOptions {
    /// Build options with the given string encoding and `keep_option=false`.
    pub fn with_encoding(encoding: StringEncoding) -> Self {
        Self {
            encoding,
            ..Default::default()
        }
    }

    /// Fail eagerly if the encoding in effect is the reserved one.
    pub(crate) fn require_implemented_encoding(&self) -> Result<(), MarshalError> {
        if self.encoding == StringEncoding::Latin1Utf16 {
            return Err(MarshalError::UnsupportedEncoding("latin1+utf-16"));
        }
        Ok(())
    }
}
