//! Codestream library implementations.
//!
//! Each one is only available with the respective Cargo feature.
//! Other libraries can be plugged in by implementing
//! [`Codestream`](crate::Codestream).

#[cfg(any(feature = "openjp2", feature = "openjpeg-sys"))]
pub mod jpeg2k;
