use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::animate::{AnimationConfig, Timing};
use crate::click::DOUBLE_CLICK_MS;
use crate::error::ConfigError;
use crate::treemap::LayoutOptions;
use crate::zoom::DEFAULT_SHOW_TO_DEPTH;

/// Named animation setups selectable from a config file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnimationPreset {
    None,
    /// Tween every animatable key with default timing.
    Default,
    #[default]
    Opacity,
}

impl AnimationPreset {
    pub fn config(self) -> AnimationConfig {
        match self {
            AnimationPreset::None => AnimationConfig::Disabled,
            AnimationPreset::Default => AnimationConfig::DefaultForAll(Timing::default()),
            AnimationPreset::Opacity => AnimationConfig::opacity_fade(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreemapConfig {
    pub layout: LayoutOptions,
    pub show_to_depth: u32,
    pub double_click_ms: u64,
    pub animation: AnimationPreset,
}

impl Default for TreemapConfig {
    fn default() -> Self {
        Self {
            layout: LayoutOptions::default(),
            show_to_depth: DEFAULT_SHOW_TO_DEPTH,
            double_click_ms: DOUBLE_CLICK_MS,
            animation: AnimationPreset::default(),
        }
    }
}

impl TreemapConfig {
    pub fn from_json(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::treemap::TilingStrategy;

    #[test]
    fn empty_object_is_default() {
        assert_eq!(TreemapConfig::from_json("{}").unwrap(), TreemapConfig::default());
    }

    #[test]
    fn partial_layout_keeps_other_defaults() {
        let cfg = TreemapConfig::from_json(
            r#"{"layout": {"padding": 2, "tile": "slice_dice"}, "animation": "none"}"#,
        )
        .unwrap();
        assert_eq!(cfg.layout.padding, 2.0);
        assert_eq!(cfg.layout.tile, TilingStrategy::SliceDice);
        assert!(cfg.layout.round);
        assert_eq!(cfg.show_to_depth, 1);
        assert!(!cfg.animation.config().is_enabled());
    }

    #[test]
    fn bad_json_is_a_parse_error() {
        assert!(matches!(
            TreemapConfig::from_json("{\"show_to_depth\": -1}"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = TreemapConfig::from_path(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
