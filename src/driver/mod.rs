//! Drivers: where the session's application bytes come from and go to.
//!
//! - [`MemoryDriver`]: plain in-process buffers
//! - [`ConsoleDriver`]: stdin/stdout via a tokio reader task (requires the
//!   `console` feature)
//!
//! Anything else implements [`crate::core::Driver`] directly.

mod memory;

#[cfg(feature = "console")]
#[cfg_attr(docsrs, doc(cfg(feature = "console")))]
mod console;

pub use memory::MemoryDriver;

#[cfg(feature = "console")]
pub use console::ConsoleDriver;
