//! Star detection and inter-frame tracking: the first pipeline stage.
//!
//! [`template::detect_template`] runs once, on frame 0, and assigns every
//! star its identity for the run. [`tracker::track`] re-measures that same
//! list of stars against every later frame, preserving list length and id.

pub mod components;
pub mod config;
pub mod fit;
pub mod template;
pub mod tracker;

pub use config::DetectionConfig;
pub use template::detect_template;
pub use tracker::track;
