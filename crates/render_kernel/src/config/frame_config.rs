//! Structured startup configuration (spec §6)

use serde::{Deserialize, Serialize};

use super::Config;

/// Window presentation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowSettings {
    /// Requested surface width in pixels.
    pub width: u32,
    /// Requested surface height in pixels.
    pub height: u32,
    /// Window title, forwarded to whichever windowing layer the host embeds.
    pub title: String,
    /// Start in exclusive fullscreen.
    pub fullscreen: bool,
    /// Request a present mode that synchronizes to vblank.
    pub vsync: bool,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            title: String::from("render_kernel"),
            fullscreen: false,
            vsync: true,
        }
    }
}

/// Renderer-level toggles that affect how the frame kernel is built up.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererSettings {
    /// Build the ray-tracing acceleration-structure pipeline (spec §4.6/§4.7).
    pub enable_ray_tracing: bool,
    /// Number of frames the swapchain pipelines concurrently.
    pub max_frames_in_flight: u32,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            enable_ray_tracing: false,
            max_frames_in_flight: 3,
        }
    }
}

/// Top-level startup configuration for the frame kernel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    /// Window/presentation settings.
    pub window: WindowSettings,
    /// Renderer settings.
    pub renderer: RendererSettings,
    /// Enable the Vulkan validation layers and debug messenger.
    pub enable_validation: bool,
    /// Enable per-phase timing collection on the frame loop (spec §4.4).
    pub enable_performance_monitoring: bool,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            window: WindowSettings::default(),
            renderer: RendererSettings::default(),
            enable_validation: cfg!(debug_assertions),
            enable_performance_monitoring: false,
        }
    }
}

impl Config for FrameConfig {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_values() {
        let config = FrameConfig::default();
        assert_eq!(config.renderer.max_frames_in_flight, 3);
        assert!(!config.renderer.enable_ray_tracing);
        assert!(config.window.vsync);
    }

    #[test]
    fn toml_round_trip_preserves_values() {
        let mut config = FrameConfig::default();
        config.window.width = 1920;
        config.window.height = 1080;
        config.renderer.enable_ray_tracing = true;

        let serialized = toml::to_string_pretty(&config).expect("serialize");
        let restored: FrameConfig = toml::from_str(&serialized).expect("deserialize");

        assert_eq!(restored.window.width, 1920);
        assert_eq!(restored.window.height, 1080);
        assert!(restored.renderer.enable_ray_tracing);
    }
}
