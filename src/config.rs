//! Engine options

/// Indentation used when new elements are appended to the external tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndentStyle {
    /// Number of spaces per indentation level (or tab width if using tabs)
    pub tab_size: usize,
    /// Use spaces for indentation (false = use tabs)
    pub insert_spaces: bool,
}

impl Default for IndentStyle {
    fn default() -> Self {
        Self {
            tab_size: 2,
            insert_spaces: true,
        }
    }
}

impl IndentStyle {
    /// Generate indentation string for the given level
    pub fn indent(&self, level: usize) -> String {
        if self.insert_spaces {
            " ".repeat(self.tab_size * level)
        } else {
            "\t".repeat(level)
        }
    }
}

/// Tuning knobs for load, the global passes and reconciliation
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Upper bound on global normalize passes before giving up
    pub max_normalize_passes: usize,
    /// Upper bound on global resolve passes
    pub max_resolve_passes: usize,
    /// Also keep a forward (item → target) edge index
    pub track_forward_dependencies: bool,
    /// Run the integrity checker after every reconciliation
    pub verify_integrity_after_reconcile: bool,
    /// Reload an artifact when an external transaction on it is rolled back
    pub reload_on_aborted_transaction: bool,
    /// Change groups kept in the engine history; the oldest are dropped
    pub max_history: usize,
    /// Formatting for elements the engine appends
    pub indent: IndentStyle,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            max_normalize_passes: 16,
            max_resolve_passes: 16,
            track_forward_dependencies: false,
            verify_integrity_after_reconcile: cfg!(debug_assertions),
            reload_on_aborted_transaction: true,
            max_history: 100,
            indent: IndentStyle::default(),
        }
    }
}
