//! Viewer settings that feel global to the user: they are stored per document
//! but a newly opened document inherits them from the one it replaces.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViewMode {
    #[default]
    Single,
    Continuous,
    TwoPage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FitMode {
    #[default]
    Custom,
    FitWidth,
    FitPage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Theme {
    #[default]
    Light,
    Dark,
    Sepia,
    Auto,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WatermarkSettings {
    pub text: String,
    pub color: String,
    pub opacity: f32,
    pub size: u32,
    pub gap_x: u32,
    pub gap_y: u32,
    pub rotation: i32,
}

impl Default for WatermarkSettings {
    fn default() -> Self {
        Self {
            text: String::new(),
            color: "#000000".to_string(),
            opacity: 0.1,
            size: 48,
            gap_x: 200,
            gap_y: 200,
            rotation: -45,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScrollSettings {
    pub sensitivity: f32,
    pub threshold: u32,
    pub debounce_ms: u32,
    pub smoothing: bool,
    pub invert_wheel: bool,
}

impl Default for ScrollSettings {
    fn default() -> Self {
        Self {
            sensitivity: 1.0,
            threshold: 50,
            debounce_ms: 150,
            smoothing: true,
            invert_wheel: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ViewerPreferences {
    pub view_mode: ViewMode,
    pub fit_mode: FitMode,
    pub dark_mode: bool,
    pub theme: Theme,
    pub show_thumbnails: bool,
    pub show_outline: bool,
    pub show_annotations: bool,
    pub annotation_color: String,
    pub stroke_width: f32,
    pub watermark: WatermarkSettings,
    pub scroll: ScrollSettings,
    pub zoom_step: f32,
    pub sidebar_width: u32,
}

impl Default for ViewerPreferences {
    fn default() -> Self {
        Self {
            view_mode: ViewMode::default(),
            fit_mode: FitMode::default(),
            dark_mode: false,
            theme: Theme::default(),
            show_thumbnails: false,
            show_outline: false,
            show_annotations: true,
            annotation_color: "#FFFF00".to_string(),
            stroke_width: 2.0,
            watermark: WatermarkSettings::default(),
            scroll: ScrollSettings::default(),
            zoom_step: 0.1,
            sidebar_width: 280,
        }
    }
}

impl ViewerPreferences {
    pub const MIN_SIDEBAR_WIDTH: u32 = 180;
    pub const MAX_SIDEBAR_WIDTH: u32 = 600;

    pub fn set_sidebar_width(&mut self, width: u32) {
        self.sidebar_width = width.clamp(Self::MIN_SIDEBAR_WIDTH, Self::MAX_SIDEBAR_WIDTH);
    }

    pub fn set_stroke_width(&mut self, width: f32) {
        if width.is_finite() && width > 0.0 {
            self.stroke_width = width;
        }
    }

    pub fn set_watermark_opacity(&mut self, opacity: f32) {
        if opacity.is_finite() {
            self.watermark.opacity = opacity.clamp(0.0, 1.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let prefs: ViewerPreferences =
            serde_json::from_str(r#"{"darkMode":true,"scroll":{"invertWheel":true}}"#).unwrap();
        assert!(prefs.dark_mode);
        assert!(prefs.scroll.invert_wheel);
        assert_eq!(prefs.scroll.debounce_ms, 150);
        assert_eq!(prefs.annotation_color, "#FFFF00");
    }

    #[test]
    fn setters_clamp_values() {
        let mut prefs = ViewerPreferences::default();
        prefs.set_sidebar_width(10);
        assert_eq!(prefs.sidebar_width, ViewerPreferences::MIN_SIDEBAR_WIDTH);
        prefs.set_stroke_width(-1.0);
        assert_eq!(prefs.stroke_width, 2.0);
        prefs.set_watermark_opacity(3.0);
        assert_eq!(prefs.watermark.opacity, 1.0);
    }
}
