#[cfg(feature = "ml")]
pub mod frame;
pub mod panel;

#[cfg(feature = "ml")]
pub use frame::*;
pub use panel::*;
