use crate::foundation::error::{FramixError, FramixResult};

/// Rounding rule applied to the fractional draw origin of a rendered surface.
///
/// The fractional remainder is folded into the render transform either way;
/// this only controls which integer device pixel the origin snaps to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OriginRounding {
    /// Snap to the nearest integer pixel.
    #[default]
    Nearest,
    /// Snap toward negative infinity.
    Floor,
}

impl OriginRounding {
    pub(crate) fn apply(self, v: f64) -> f64 {
        match self {
            Self::Nearest => v.round(),
            Self::Floor => v.floor(),
        }
    }
}

/// Engine-wide configuration injected at construction time.
///
/// There is deliberately no global/singleton state: the cache budget lives in
/// the [`CacheManager`](crate::CacheManager) built from this value, and render
/// policy constants travel with the tasks that use them.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Process-wide cache memory budget in bytes.
    pub cache_budget_bytes: usize,
    /// CPU worker thread count (`None` lets the pool decide).
    pub workers: Option<usize>,
    /// Opacity below which a render skips rasterization and publishes an
    /// empty result.
    pub opacity_skip_threshold: f64,
    /// Draw-origin rounding rule.
    pub origin_rounding: OriginRounding,
    /// Fixed engine audio sample rate in Hz.
    pub sample_rate: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_budget_bytes: 256 * 1024 * 1024,
            workers: None,
            opacity_skip_threshold: 0.001,
            origin_rounding: OriginRounding::Nearest,
            sample_rate: 44_100,
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from a JSON document.
    pub fn from_json_str(json: &str) -> FramixResult<Self> {
        let cfg: Self = serde_json::from_str(json)
            .map_err(|e| FramixError::serde(format!("invalid engine config: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Fail fast on configuration values no subsystem could honor.
    pub fn validate(&self) -> FramixResult<()> {
        if self.sample_rate == 0 {
            return Err(FramixError::validation("sample_rate must be > 0"));
        }
        if let Some(n) = self.workers
            && n == 0
        {
            return Err(FramixError::validation("workers must be >= 1 when set"));
        }
        if !self.opacity_skip_threshold.is_finite() || self.opacity_skip_threshold < 0.0 {
            return Err(FramixError::validation(
                "opacity_skip_threshold must be finite and >= 0",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../tests/unit/config.rs"]
mod tests;
