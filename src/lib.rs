pub mod config;
pub mod control;
pub mod expr;
pub mod history;
pub mod ipc;
pub mod metrics;
pub mod render;
pub mod runtime;
pub mod timing;

pub use config::{
    load_config, parse_field, parse_field_nonzero, ControlPanel, EffectiveTiming, GraphWindow,
    RuntimeConfig,
};
pub use control::{ControlState, PidGains, SimSession};
pub use expr::{ExprError, SetpointFn, DEFAULT_SETPOINT};
pub use history::{HistoryBuffer, HistoryError, Sample};
pub use ipc::{
    shared_panel, shared_session, CommandChannel, EventLog, PanelCommand, SharedPanel,
    SharedSession,
};
pub use metrics::{ScopeMetrics, ScopeReport};
pub use render::{polyline, project, render_frame, Viewport};
pub use runtime::{spawn_control_thread, ControlStats};
pub use timing::{FixedTimestep, MAX_TICKS_PER_WAKE};
