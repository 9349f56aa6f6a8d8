//! Effect System Settings
//!
//! ```rust,ignore
//! use myth_effects::{EffectSettings, EffectSystem};
//!
//! let settings = EffectSettings {
//!     trace_commands: true,
//!     ..Default::default()
//! };
//! let effects = EffectSystem::with_settings(settings);
//! ```

/// Runtime configuration for [`EffectSystem`](crate::effects::EffectSystem).
#[derive(Debug, Clone, PartialEq)]
pub struct EffectSettings {
    /// Wrap each effect pass in a device debug group.
    pub debug_markers: bool,
    /// Log every executed command at trace level.
    pub trace_commands: bool,
    /// Color used for pending clears of freshly allocated buffers.
    pub clear_color: [f32; 4],
}

impl Default for EffectSettings {
    fn default() -> Self {
        Self {
            debug_markers: true,
            trace_commands: true,
            clear_color: [0.0, 0.0, 0.0, 0.0],
        }
    }
}
