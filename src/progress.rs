//! Progress reporting for exports.
//!
//! An export runs a fixed sequence of [`Stage`]s and reports each one as it
//! starts, so a caller can drive a progress bar or a log line.
//!
//! # Example
//!
//! ```
//! use std::sync::{Arc, Mutex};
//! use badge_mesh::progress::{Progress, Stage};
//!
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let sink = Arc::clone(&seen);
//! let progress = Progress::new(move |current, total, message| {
//!     sink.lock().unwrap().push(format!("[{}/{}] {}", current + 1, total, message));
//! });
//!
//! progress.stage(Stage::Contours);
//! assert_eq!(seen.lock().unwrap()[0], "[2/7] Building contours");
//! ```

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Checking the design and configuration.
    Validate,
    /// Silhouette and hole rings.
    Contours,
    /// Front and back face fill.
    Retopology,
    /// Texture rasterization.
    Texture,
    /// Adaptive subdivision.
    Subdivision,
    /// Vertex color baking.
    Colors,
    /// OBJ, MTL and PNG encoding.
    Serialize,
}

impl Stage {
    /// All stages in order.
    pub const ALL: [Stage; 7] = [
        Stage::Validate,
        Stage::Contours,
        Stage::Retopology,
        Stage::Texture,
        Stage::Subdivision,
        Stage::Colors,
        Stage::Serialize,
    ];

    /// 0-based position in [`Stage::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }

    /// Human-readable description.
    pub fn label(self) -> &'static str {
        match self {
            Stage::Validate => "Validating design",
            Stage::Contours => "Building contours",
            Stage::Retopology => "Filling faces",
            Stage::Texture => "Rasterizing texture",
            Stage::Subdivision => "Subdividing",
            Stage::Colors => "Baking vertex colors",
            Stage::Serialize => "Writing OBJ",
        }
    }
}

/// A progress callback that receives updates during an export.
///
/// The callback receives:
/// - `current`: Current step (0-based)
/// - `total`: Total number of steps
/// - `message`: Description of the current operation
pub struct Progress {
    callback: Box<dyn Fn(usize, usize, &str) + Send + Sync>,
}

impl Progress {
    /// Create a new progress reporter with the given callback.
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(usize, usize, &str) + Send + Sync + 'static,
    {
        Self {
            callback: Box::new(callback),
        }
    }

    /// Report progress.
    #[inline]
    pub fn report(&self, current: usize, total: usize, message: &str) {
        (self.callback)(current, total, message);
    }

    /// Report that `stage` is starting.
    #[inline]
    pub fn stage(&self, stage: Stage) {
        self.report(stage.index(), Stage::ALL.len(), stage.label());
    }

    /// Create a no-op progress reporter that discards all updates.
    pub fn none() -> Self {
        Self::new(|_, _, _| {})
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::none()
    }
}

impl std::fmt::Debug for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Progress").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_stage_order() {
        for (i, stage) in Stage::ALL.iter().enumerate() {
            assert_eq!(stage.index(), i);
        }
    }

    #[test]
    fn test_report_reaches_callback() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let progress = Progress::new(move |current, total, _| {
            assert!(current < total);
            counter.fetch_add(1, Ordering::SeqCst);
        });

        for stage in Stage::ALL {
            progress.stage(stage);
        }
        assert_eq!(calls.load(Ordering::SeqCst), Stage::ALL.len());
    }

    #[test]
    fn test_none_is_silent() {
        let progress = Progress::default();
        progress.report(0, 1, "nothing");
        assert_eq!(format!("{progress:?}"), "Progress { .. }");
    }
}
