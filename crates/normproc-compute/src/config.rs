//! Pipeline configuration.
//!
//! ```
//! use normproc_compute::PipelineConfig;
//!
//! let config = PipelineConfig::default().max_blur_radius(16).verbose(true);
//! assert_eq!(config.max_blur_radius, 16);
//! ```

use normproc_core::WORKGROUP_EDGE;

/// Default cap on the Gaussian kernel radius.
pub const DEFAULT_MAX_BLUR_RADIUS: u32 = 32;
/// Largest accepted blur radius.
pub const MAX_BLUR_RADIUS_LIMIT: u32 = 256;
/// Largest accepted workgroup edge (16x16 = 256 invocations).
pub const MAX_WORKGROUP_SIZE: u32 = 16;

/// Environment variable overriding [`PipelineConfig::max_blur_radius`].
pub const ENV_MAX_BLUR_RADIUS: &str = "NORMPROC_MAX_BLUR_RADIUS";

/// Tunables of a [`NormalPipeline`](crate::NormalPipeline).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Upper bound for `ceil(3 * smoothness)`.
    pub max_blur_radius: u32,
    /// Workgroup edge for GPU dispatches.
    pub workgroup_size: u32,
    /// Log every stage dispatch at debug level.
    pub verbose: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_blur_radius: DEFAULT_MAX_BLUR_RADIUS,
            workgroup_size: WORKGROUP_EDGE,
            verbose: false,
        }
    }
}

impl PipelineConfig {
    /// Defaults with environment overrides applied.
    ///
    /// Unparsable values are ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(radius) = std::env::var(ENV_MAX_BLUR_RADIUS)
            .ok()
            .and_then(|v| v.trim().parse::<u32>().ok())
        {
            config = config.max_blur_radius(radius);
        }
        config
    }

    /// Set the blur radius cap (clamped to `0..=256`).
    pub fn max_blur_radius(mut self, radius: u32) -> Self {
        self.max_blur_radius = radius.min(MAX_BLUR_RADIUS_LIMIT);
        self
    }

    /// Set the GPU workgroup edge (clamped to `1..=16`).
    pub fn workgroup_size(mut self, size: u32) -> Self {
        self.workgroup_size = size.clamp(1, MAX_WORKGROUP_SIZE);
        self
    }

    /// Enable verbose stage logging.
    pub fn verbose(mut self, enabled: bool) -> Self {
        self.verbose = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let c = PipelineConfig::default();
        assert_eq!(c.max_blur_radius, 32);
        assert_eq!(c.workgroup_size, 8);
        assert!(!c.verbose);
    }

    #[test]
    fn test_clamping() {
        let c = PipelineConfig::default().max_blur_radius(10_000).workgroup_size(0);
        assert_eq!(c.max_blur_radius, MAX_BLUR_RADIUS_LIMIT);
        assert_eq!(c.workgroup_size, 1);
    }
}
