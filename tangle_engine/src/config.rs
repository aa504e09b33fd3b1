//! Tracker configuration.
//!
//! Fixed settings are chosen at construction; mutable flags may be toggled
//! by the front end between cells.

/// Configuration for a [`crate::DependencyTracker`].
///
/// # Example
///
/// ```ignore
/// use tangle_engine::TrackerConfig;
///
/// // ground-truth refresher computation for differential testing
/// let config = TrackerConfig {
///     naive_refresher_computation: true,
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Compute refresher cells by literally prepending each earlier
    /// candidate and re-resolving, instead of from kill sets.
    ///
    /// Quadratic in the batch size; kept as a ground-truth fallback.
    ///
    /// Default: false
    pub naive_refresher_computation: bool,

    /// Track dependencies at statement boundaries. Disabling turns the
    /// tracker into a pure observer (useful for measuring overhead).
    ///
    /// Default: true
    pub track_dependencies: bool,

    /// Consider cells positioned before the active cell when linking, not
    /// only cells after it. When set, batch order indexes are ignored.
    ///
    /// Default: true
    pub backwards_staleness: bool,

    /// Cap on per-refusal warning lines; the remainder is summarized.
    ///
    /// Default: 10
    pub max_refusal_warnings: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        TrackerConfig {
            naive_refresher_computation: false,
            track_dependencies: true,
            backwards_staleness: true,
            max_refusal_warnings: 10,
        }
    }
}

/// Flags the front end may toggle between cells.
#[derive(Debug, Clone)]
pub struct MutableFlags {
    /// Produce batch freshness reports. When off,
    /// `check_and_link_cells` returns an empty report without resolving
    /// anything.
    pub highlights_enabled: bool,
}

impl Default for MutableFlags {
    fn default() -> Self {
        MutableFlags {
            highlights_enabled: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TrackerConfig::default();
        assert!(!config.naive_refresher_computation);
        assert!(config.track_dependencies);
        assert_eq!(config.max_refusal_warnings, 10);
        assert!(MutableFlags::default().highlights_enabled);
    }
}
