//! Utility Module
//!
//! - [`FpsCounter`]: Frame rate measurement for the `fps` effect uniform

pub mod fps_counter;

pub use fps_counter::FpsCounter;
