//! Solar power forecasting service.
//!
//! Weather forecasts and sun times go in, an hourly PV output forecast
//! comes out. The library holds the whole pipeline; the binary only wires
//! configuration, logging and the HTTP server around it.
//!
//! The tabular and model layers sit behind the default `ml` feature.

#[cfg(feature = "ml")]
pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod forecast;
#[cfg(feature = "ml")]
pub mod ml;
#[cfg(feature = "ml")]
pub mod pipeline;
#[cfg(feature = "ml")]
pub mod preprocessing;
#[cfg(feature = "ml")]
pub mod service;
pub mod telemetry;

pub use error::{PipelineError, PipelineResult};
