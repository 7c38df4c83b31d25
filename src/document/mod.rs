//! What a layer stack needs from its owning slice document.
//!
//! Rather than a back-reference into a mutable document, layers receive an
//! explicit [`SliceContext`]: the immutable [`PrintSettings`] they fall back
//! to, and the [`DocumentHooks`] they notify when derived data goes stale.

pub mod hooks;
pub mod modifier;
pub mod settings;

pub use hooks::{DocumentHooks, NoHooks, StaleFlags};
pub use modifier::{FallbackRule, LayerParameter, PrintParameterModifier};
pub use settings::{ParameterSet, PrintSettings, round_height, round_parameter, round_to};

use std::fmt;
use std::sync::Arc;

/// Defaults plus invalidation hooks, passed into every operation that needs them.
#[derive(Clone)]
pub struct SliceContext {
    settings: PrintSettings,
    hooks: Arc<dyn DocumentHooks>,
}

impl SliceContext {
    pub fn new(settings: PrintSettings) -> Self {
        Self {
            settings,
            hooks: Arc::new(NoHooks),
        }
    }

    /// Replaces the hooks that receive staleness notifications.
    pub fn with_hooks(mut self, hooks: Arc<dyn DocumentHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    #[inline]
    pub fn settings(&self) -> &PrintSettings {
        &self.settings
    }

    #[inline]
    pub fn settings_mut(&mut self) -> &mut PrintSettings {
        &mut self.settings
    }

    #[inline]
    pub fn hooks(&self) -> &dyn DocumentHooks {
        self.hooks.as_ref()
    }

    /// A per-layer parameter was written.
    #[inline]
    pub fn parameters_changed(&self) {
        self.hooks.print_time_stale();
    }

    /// Layer count or content changed.
    pub fn structure_changed(&self) {
        self.hooks.print_time_stale();
        self.hooks.material_volume_stale();
        self.hooks.gcode_stale();
    }
}

impl Default for SliceContext {
    fn default() -> Self {
        Self::new(PrintSettings::default())
    }
}

impl fmt::Debug for SliceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SliceContext")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
