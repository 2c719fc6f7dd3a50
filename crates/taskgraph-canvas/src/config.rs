//! Canvas settings
//!
//! Loaded from `config/canvas_settings.yaml` via [`global_config()`]. Every
//! component takes its own section by value, so tests build components from
//! `Default` without touching the global.

use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Embedded copy of the shipped settings file
const EMBEDDED_SETTINGS: &str = include_str!("../config/canvas_settings.yaml");

/// Global settings instance (lazy-loaded)
static SETTINGS: OnceLock<CanvasSettings> = OnceLock::new();

/// Get the global canvas settings (loads on first access)
pub fn global_config() -> &'static CanvasSettings {
    SETTINGS.get_or_init(|| {
        CanvasSettings::load_from_config_dir().unwrap_or_else(|e| {
            tracing::warn!("Failed to load canvas settings: {}, using embedded", e);
            CanvasSettings::embedded()
        })
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewportSettings {
    pub min_scale: f32,
    pub max_scale: f32,
    pub zoom_step: f32,
}

impl Default for ViewportSettings {
    fn default() -> Self {
        Self {
            min_scale: 0.5,
            max_scale: 2.0,
            zoom_step: 1.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionSettings {
    pub port_radius: f32,
    pub snap_radius: f32,
}

impl Default for InteractionSettings {
    fn default() -> Self {
        Self {
            port_radius: 8.0,
            snap_radius: 80.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometrySettings {
    pub agent_size: [f32; 2],
    pub task_size: [f32; 2],
    pub combiner_size: [f32; 2],
    pub combiner_port_spacing: f32,
}

impl Default for GeometrySettings {
    fn default() -> Self {
        Self {
            agent_size: [160.0, 80.0],
            task_size: [200.0, 110.0],
            combiner_size: [150.0, 90.0],
            combiner_port_spacing: 22.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutSettings {
    pub start_y: f32,
    pub level_spacing: f32,
    pub node_spacing: f32,
    pub fallback_origin: [f32; 2],
    pub fallback_columns: usize,
    pub fallback_cell: [f32; 2],
}

impl Default for LayoutSettings {
    fn default() -> Self {
        Self {
            start_y: 100.0,
            level_spacing: 160.0,
            node_spacing: 240.0,
            fallback_origin: [80.0, 80.0],
            fallback_columns: 4,
            fallback_cell: [240.0, 150.0],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconcilerSettings {
    pub execution_log_cap: usize,
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        Self {
            execution_log_cap: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamSettings {
    pub reconnect_delay_ms: u64,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            reconnect_delay_ms: 5000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimationSettings {
    pub pulse_speed: f32,
    pub particle_life: f32,
    pub burst_size: usize,
}

impl Default for AnimationSettings {
    fn default() -> Self {
        Self {
            pulse_speed: 3.0,
            particle_life: 0.8,
            burst_size: 12,
        }
    }
}

/// Root settings structure
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CanvasSettings {
    #[serde(default)]
    pub viewport: ViewportSettings,
    #[serde(default)]
    pub interaction: InteractionSettings,
    #[serde(default)]
    pub geometry: GeometrySettings,
    #[serde(default)]
    pub layout: LayoutSettings,
    #[serde(default)]
    pub reconciler: ReconcilerSettings,
    #[serde(default)]
    pub stream: StreamSettings,
    #[serde(default)]
    pub animation: AnimationSettings,
}

impl CanvasSettings {
    /// Parse settings from YAML text
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    /// Settings shipped with the crate
    pub fn embedded() -> Self {
        Self::from_yaml(EMBEDDED_SETTINGS).unwrap_or_else(|e| {
            tracing::warn!("Embedded canvas settings are invalid: {}, using defaults", e);
            Self::default()
        })
    }

    /// Load from `$TASKGRAPH_CONFIG_DIR/canvas_settings.yaml` (default `config`)
    fn load_from_config_dir() -> Result<Self, String> {
        let config_dir =
            std::env::var("TASKGRAPH_CONFIG_DIR").unwrap_or_else(|_| "config".to_string());
        let path = format!("{}/canvas_settings.yaml", config_dir);

        let content = std::fs::read_to_string(&path)
            .map_err(|e| format!("failed to read {}: {}", path, e))?;
        let settings =
            Self::from_yaml(&content).map_err(|e| format!("failed to parse {}: {}", path, e))?;

        tracing::info!(path = %path, "Loaded canvas settings");
        Ok(settings)
    }
}
