//! Config module - lenient panel field parsing and file-backed startup values

use serde::Deserialize;
use std::time::Duration;

use crate::control::PidGains;
use crate::expr::DEFAULT_SETPOINT;

// ============================================================================
// FIELD DEFAULTS
// ============================================================================

pub const DEFAULT_UPDATES_PER_SECOND: f64 = 3.14;
pub const DEFAULT_TICKS_PER_UNIT: f64 = 10.0;
pub const DEFAULT_WIDTH_UNITS: f64 = 50.0;
pub const DEFAULT_HEIGHT_UNITS: f64 = 1.0;

// ============================================================================
// LENIENT FIELD PARSING - Bad input becomes a named default, never an error
// ============================================================================

/// Parse a panel field, substituting `or_else` on parse failure or NaN.
/// Zero is a legal value (gains).
pub fn parse_field(text: &str, or_else: f64) -> f64 {
    match text.trim().parse::<f64>() {
        Ok(v) if !v.is_nan() => v,
        _ => or_else,
    }
}

/// Parse a zero-guarded panel field: parse failure, NaN, or exactly zero
/// yields `or_else` (rates and graph extents must not be zero).
pub fn parse_field_nonzero(text: &str, or_else: f64) -> f64 {
    match text.trim().parse::<f64>() {
        Ok(v) if !v.is_nan() && v != 0.0 => v,
        _ => or_else,
    }
}

// ============================================================================
// EFFECTIVE TIMING - Derived from the panel once per control cycle
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectiveTiming {
    pub updates_per_second: f64,
    pub ticks_per_unit: f64,
    pub ticks_per_second: f64,
    pub units_per_tick: f64,
}

impl EffectiveTiming {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64((1.0 / self.ticks_per_second).abs())
    }
}

// ============================================================================
// GRAPH WINDOW - Visible extent of the scope in abstract units
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GraphWindow {
    pub width_units: f64,
    pub height_units: f64,
}

// ============================================================================
// CONTROL PANEL - Raw user text, parsed leniently on every read
// ============================================================================

/// The UI surface: every numeric field holds exactly what the user typed.
/// Values are derived on demand; a half-edited field never breaks a tick.
#[derive(Debug, Clone)]
pub struct ControlPanel {
    pub updates_per_second: String,
    pub ticks_per_unit: String,
    pub width_units: String,
    pub height_units: String,
    pub proportional: String,
    pub integral: String,
    pub derivative: String,
    pub canvas_width: String,
    pub setpoint_source: String,
}

impl Default for ControlPanel {
    fn default() -> Self {
        Self {
            updates_per_second: DEFAULT_UPDATES_PER_SECOND.to_string(),
            ticks_per_unit: DEFAULT_TICKS_PER_UNIT.to_string(),
            width_units: DEFAULT_WIDTH_UNITS.to_string(),
            height_units: DEFAULT_HEIGHT_UNITS.to_string(),
            proportional: "0".to_string(),
            integral: "0".to_string(),
            derivative: "0".to_string(),
            canvas_width: String::new(),
            setpoint_source: DEFAULT_SETPOINT.to_string(),
        }
    }
}

impl ControlPanel {
    pub fn from_runtime(cfg: &RuntimeConfig) -> Self {
        Self {
            updates_per_second: cfg.updates_per_second.to_string(),
            ticks_per_unit: cfg.ticks_per_unit.to_string(),
            width_units: cfg.width_units.to_string(),
            height_units: cfg.height_units.to_string(),
            proportional: cfg.proportional.to_string(),
            integral: cfg.integral.to_string(),
            derivative: cfg.derivative.to_string(),
            canvas_width: cfg.canvas_width.to_string(),
            setpoint_source: cfg.setpoint.clone(),
        }
    }

    pub fn effective_timing(&self) -> EffectiveTiming {
        let ups = parse_field_nonzero(&self.updates_per_second, DEFAULT_UPDATES_PER_SECOND);
        let tpu = parse_field_nonzero(&self.ticks_per_unit, DEFAULT_TICKS_PER_UNIT);
        let tps = ups * tpu;
        EffectiveTiming {
            updates_per_second: ups,
            ticks_per_unit: tpu,
            ticks_per_second: tps,
            units_per_tick: ups / tps,
        }
    }

    pub fn gains(&self) -> PidGains {
        PidGains {
            kp: parse_field(&self.proportional, 0.0),
            ki: parse_field(&self.integral, 0.0),
            kd: parse_field(&self.derivative, 0.0),
        }
    }

    pub fn graph_window(&self) -> GraphWindow {
        GraphWindow {
            width_units: parse_field_nonzero(&self.width_units, DEFAULT_WIDTH_UNITS),
            height_units: parse_field_nonzero(&self.height_units, DEFAULT_HEIGHT_UNITS),
        }
    }

    /// History capacity covering the visible window: ceil(tpu * width).
    pub fn history_target(&self) -> usize {
        let tpu = parse_field_nonzero(&self.ticks_per_unit, DEFAULT_TICKS_PER_UNIT);
        let width = parse_field_nonzero(&self.width_units, DEFAULT_WIDTH_UNITS);
        ((tpu * width).abs().ceil() as usize).max(1)
    }

    pub fn canvas_width(&self, or_else: u32) -> u32 {
        let w = parse_field_nonzero(&self.canvas_width, or_else as f64);
        if w < 1.0 {
            or_else
        } else {
            w as u32
        }
    }
}

// ============================================================================
// RUNTIME CONFIG - Startup values loaded from TOML
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeConfig {
    pub updates_per_second: f64,
    pub ticks_per_unit: f64,
    pub width_units: f64,
    pub height_units: f64,
    pub proportional: f64,
    pub integral: f64,
    pub derivative: f64,
    pub setpoint: String,
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub run_seconds: u64,
    pub frames_per_second: u32,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            updates_per_second: DEFAULT_UPDATES_PER_SECOND,
            ticks_per_unit: DEFAULT_TICKS_PER_UNIT,
            width_units: DEFAULT_WIDTH_UNITS,
            height_units: DEFAULT_HEIGHT_UNITS,
            proportional: 0.0,
            integral: 0.0,
            derivative: 0.0,
            setpoint: DEFAULT_SETPOINT.to_string(),
            canvas_width: 800,
            canvas_height: 400,
            run_seconds: 10,
            frames_per_second: 30,
        }
    }
}

pub fn load_config(path: &str) -> RuntimeConfig {
    match std::fs::read_to_string(path) {
        Ok(s) => toml::from_str::<RuntimeConfig>(&s).unwrap_or_default(),
        Err(_) => RuntimeConfig::default(),
    }
}
