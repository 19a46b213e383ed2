//! Buffer size functions.
//!
//! The scheduler never looks inside a size function: it is handed a
//! [`LogicalBuffer`] and trusted to return the same byte count every time.

use crate::points_to::LogicalBuffer;

/// Failure reported by a caller-supplied size function.
#[derive(Debug, thiserror::Error)]
#[error("cannot size buffer {buffer}: {reason}")]
pub struct SizeError {
    pub buffer: String,
    pub reason: String,
}

impl SizeError {
    pub fn new(buffer: &LogicalBuffer, reason: impl Into<String>) -> Self {
        Self {
            buffer: buffer.to_string(),
            reason: reason.into(),
        }
    }
}

/// Maps a logical buffer to its footprint in bytes.
///
/// Implemented for every `Fn(&LogicalBuffer) -> Result<u64, SizeError>`.
pub trait SizeFunction {
    fn size_of(&self, buffer: &LogicalBuffer) -> Result<u64, SizeError>;
}

impl<F> SizeFunction for F
where
    F: Fn(&LogicalBuffer) -> Result<u64, SizeError>,
{
    fn size_of(&self, buffer: &LogicalBuffer) -> Result<u64, SizeError> {
        self(buffer)
    }
}

/// The shape-based size function: arrays by element count, tuples by their
/// pointer table of `pointer_size` bytes per element.
pub fn shape_size(pointer_size: u64) -> impl SizeFunction + Copy {
    move |buffer: &LogicalBuffer| -> Result<u64, SizeError> {
        Ok(buffer.shape().byte_size(pointer_size))
    }
}
