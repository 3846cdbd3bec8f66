//! Render module - device-coordinate projection and frame output
//!
//! Rendering reads the session and never mutates control state. Each frame
//! maps every retained sample into device coordinates through the linear
//! transform anchored at the trace's most recent time coordinate, then
//! draws both traces as connected polylines.

use plotters::prelude::*;

use crate::config::GraphWindow;
use crate::control::SimSession;
use crate::history::{HistoryBuffer, Sample};

// ============================================================================
// VIEWPORT - Device surface size in pixels
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
        }
    }
}

// ============================================================================
// PROJECTION - Graph units to device pixels
// ============================================================================

/// Map a sample to device coordinates. The visible window ends at
/// `rightmost` (the trace's newest time) and spans `window.width_units`
/// backwards; value 0 lands on the vertical center, +height_units at the
/// top edge.
pub fn project(
    sample: Sample,
    rightmost: f64,
    window: &GraphWindow,
    viewport: &Viewport,
) -> (i32, i32) {
    let w = window.width_units;
    let h = window.height_units;
    let x = (viewport.width as f64 * (sample.x - (rightmost - w)) / w).floor();
    let y = (viewport.height as f64 / 2.0 * (-sample.y / h + 1.0)).floor();
    (x as i32, y as i32)
}

/// Project a whole trace oldest to newest. Empty trace, empty polyline.
pub fn polyline(
    buffer: &HistoryBuffer,
    window: &GraphWindow,
    viewport: &Viewport,
) -> Vec<(i32, i32)> {
    let rightmost = match buffer.last() {
        Some(sample) => sample.x,
        None => return Vec::new(),
    };
    buffer
        .iter()
        .map(|sample| project(sample, rightmost, window, viewport))
        .collect()
}

// ============================================================================
// FRAME WRITER - Both traces onto a bitmap
// ============================================================================

/// Draw the current state of both traces: setpoint in black, process
/// variable in red.
pub fn render_frame(
    session: &SimSession,
    window: &GraphWindow,
    viewport: &Viewport,
    path: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let root =
        BitMapBackend::new(path, (viewport.width, viewport.height)).into_drawing_area();
    root.fill(&WHITE)?;

    let setpoint_line = polyline(session.setpoint_history(), window, viewport);
    if setpoint_line.len() > 1 {
        root.draw(&PathElement::new(setpoint_line, &BLACK))?;
    }

    let process_line = polyline(session.process_history(), window, viewport);
    if process_line.len() > 1 {
        root.draw(&PathElement::new(process_line, &RED))?;
    }

    root.present()?;
    Ok(())
}
