//! Post-process prebuilt Python wheels: append a date stamp to the version,
//! optionally insert a torch/numpy build tag, and keep the archive's
//! `.dist-info` metadata consistent with the new file name.
//!
//! - [`naming`] composes the new file name.
//! - [`probe`] looks up torch/numpy versions, best effort.
//! - [`rewrite`] rewrites the archive contents.
//! - [`walker`] drives all of the above over one directory.
pub mod cli;
pub mod error;
pub mod naming;
pub mod probe;
pub mod rewrite;
#[cfg(test)]
mod test_support;
pub mod walker;

pub use error::WheelError;
