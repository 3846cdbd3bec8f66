//! Integration tests for the PID scope

use pid_scope::{
    parse_field, parse_field_nonzero, ControlPanel, FixedTimestep, GraphWindow, HistoryBuffer,
    HistoryError, PidGains, Sample, SetpointFn, SimSession, Viewport, MAX_TICKS_PER_WAKE,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::{Duration, Instant};

// ============================================================================
// HISTORY BUFFER TESTS
// ============================================================================

#[test]
fn test_history_keeps_push_order_below_capacity() {
    let mut buf = HistoryBuffer::new(8);
    for i in 0..5 {
        buf.push(Sample::new(i as f64, 10.0 * i as f64));
    }

    assert_eq!(buf.len(), 5, "Count should equal number of pushes");
    for i in 0..5 {
        let sample = buf.at(i).expect("In-range access should succeed");
        assert_eq!(sample.x, i as f64, "at(i) should be the i-th push");
        assert_eq!(sample.y, 10.0 * i as f64);
    }
}

#[test]
fn test_history_evicts_oldest_when_full() {
    let mut buf = HistoryBuffer::new(4);
    // capacity + 3 pushes: the first 3 samples fall off
    for i in 0..7 {
        buf.push(Sample::new(i as f64, 0.0));
    }

    assert_eq!(buf.len(), 4, "Count should stay at capacity");
    assert_eq!(
        buf.at(0).unwrap().x,
        3.0,
        "at(0) after capacity+k pushes should be the k-th push"
    );
    assert_eq!(buf.at(3).unwrap().x, 6.0, "Newest sample should survive");
}

#[test]
fn test_history_last_tracks_newest_across_wraparound() {
    let mut buf = HistoryBuffer::new(3);
    assert!(buf.last().is_none(), "Empty buffer has no last sample");

    for i in 0..10 {
        buf.push(Sample::new(i as f64, -(i as f64)));
        let last = buf.last().expect("Non-empty buffer has a last sample");
        assert_eq!(last.x, i as f64, "last() should be the most recent push");
    }
}

#[test]
fn test_history_out_of_range_is_loud() {
    let mut buf = HistoryBuffer::new(4);
    buf.push(Sample::new(0.0, 0.0));
    buf.push(Sample::new(1.0, 0.0));

    let err = buf.at(2).expect_err("Access past count should fail");
    assert_eq!(err, HistoryError::OutOfRange { index: 2, count: 2 });
    assert!(
        err.to_string().contains("expected [0, 2)"),
        "Error message should carry the valid range"
    );
}

#[test]
fn test_history_grow_preserves_samples() {
    let mut buf = HistoryBuffer::new(3);
    for i in 0..5 {
        buf.push(Sample::new(i as f64, 0.0));
    }

    buf.resize(6);
    assert_eq!(buf.len(), 3, "Growing keeps the retained count");
    assert_eq!(buf.capacity(), 6);
    for (logical, expected) in [(0usize, 2.0), (1, 3.0), (2, 4.0)] {
        assert_eq!(buf.at(logical).unwrap().x, expected, "Order preserved");
    }

    // The rotation offset was compacted away; further pushes extend the tail
    buf.push(Sample::new(5.0, 0.0));
    assert_eq!(buf.len(), 4);
    assert_eq!(buf.last().unwrap().x, 5.0);
}

#[test]
fn test_history_shrink_keeps_most_recent() {
    let mut buf = HistoryBuffer::new(6);
    for i in 0..6 {
        buf.push(Sample::new(i as f64, 0.0));
    }

    buf.resize(2);
    assert_eq!(buf.len(), 2, "Shrinking clamps count to the new capacity");
    assert_eq!(buf.at(0).unwrap().x, 4.0, "Only the most recent survive");
    assert_eq!(buf.at(1).unwrap().x, 5.0);
    assert!(buf.at(2).is_err());
}

#[test]
fn test_history_matches_shadow_model() {
    let mut rng = StdRng::seed_from_u64(42);
    let mut buf = HistoryBuffer::new(7);
    let mut shadow: Vec<Sample> = Vec::new();

    for step in 0..200 {
        let sample = Sample::new(step as f64, rng.gen_range(-1.0..1.0));
        buf.push(sample);
        shadow.push(sample);
        if shadow.len() > 7 {
            shadow.remove(0);
        }

        assert_eq!(buf.len(), shadow.len());
        assert_eq!(buf.last(), shadow.last().copied());
        for (i, expected) in shadow.iter().enumerate() {
            assert_eq!(buf.at(i).unwrap(), *expected, "Mismatch at step {}", step);
        }
    }
}

// ============================================================================
// CONTROL LOOP TESTS
// ============================================================================

fn panel_with(setpoint_tpu: f64) -> ControlPanel {
    let mut panel = ControlPanel::default();
    panel.ticks_per_unit = setpoint_tpu.to_string();
    panel
}

#[test]
fn test_zero_setpoint_equilibrium_holds() {
    let panel = ControlPanel::default();
    let timing = panel.effective_timing();
    let gains = PidGains::new(1.0, 0.0, 0.0);
    let mut session = SimSession::new(64, SetpointFn::compile("0").unwrap());

    for _ in 0..100 {
        session.tick(&timing, &gains);
        let state = session.state();
        assert_eq!(state.process_variable, 0.0, "Equilibrium should hold");
        assert_eq!(state.velocity, 0.0, "Zero error never accelerates");
    }
}

#[test]
fn test_proportional_law_converges_on_first_order_plant() {
    // e_{n+1} = (1 - kp) * e_n for a plant that applies the output directly,
    // so any 0 < kp < 2 shrinks the error magnitude monotonically.
    for kp in [0.2, 0.5, 1.0, 1.5, 1.9] {
        let gains = PidGains::new(kp, 0.0, 0.0);
        let setpoint = 2.5;
        let mut value: f64 = 0.0;
        let mut prev_error = (setpoint - value).abs();

        for _ in 0..60 {
            let error = setpoint - value;
            value += gains.output(error, 0.0, 0.0);
            let magnitude = (setpoint - value).abs();
            assert!(
                magnitude <= prev_error + 1e-12,
                "kp={} should not grow the error",
                kp
            );
            prev_error = magnitude;
        }
        assert!(prev_error < 0.05, "kp={} should approach the setpoint", kp);
    }
}

#[test]
fn test_tick_records_both_traces_and_advances_time() {
    let panel = panel_with(10.0);
    let timing = panel.effective_timing();
    let gains = PidGains::default();
    let mut session = SimSession::new(32, SetpointFn::compile("1").unwrap());

    session.tick(&timing, &gains);
    // seed sample plus one recorded sample per trace
    assert_eq!(session.setpoint_history().len(), 2);
    assert_eq!(session.process_history().len(), 2);
    assert_eq!(session.setpoint_history().last().unwrap().x, 0.0);
    assert_eq!(session.setpoint_history().last().unwrap().y, 1.0);

    session.tick(&timing, &gains);
    let dt = session.setpoint_history().last().unwrap().x;
    assert!((dt - 0.1).abs() < 1e-12, "Second tick records at t=1/tpu");
}

#[test]
fn test_integral_term_accumulates_error() {
    let panel = panel_with(10.0);
    let timing = panel.effective_timing();
    let gains = PidGains::new(0.0, 0.1, 0.0);
    let mut session = SimSession::new(32, SetpointFn::compile("1").unwrap());

    session.tick(&timing, &gains);
    let s1 = session.state();
    assert!((s1.cumulative_error - 1.0).abs() < 1e-12);
    assert!((s1.velocity - 0.1).abs() < 1e-12);

    session.tick(&timing, &gains);
    let s2 = session.state();
    // pv moved by 0.1, so the second error is 0.9
    assert!((s2.cumulative_error - 1.9).abs() < 1e-12);
    assert!((s2.velocity - 0.29).abs() < 1e-12);
}

#[test]
fn test_derivative_term_divides_by_units_per_tick() {
    let panel = panel_with(4.0); // units_per_tick = 0.25
    let timing = panel.effective_timing();
    let gains = PidGains::new(0.0, 0.0, 0.5);
    let mut session = SimSession::new(32, SetpointFn::compile("1").unwrap());

    session.tick(&timing, &gains);
    let s1 = session.state();
    // first error steps 0 -> 1: kd * (1 - 0) / 0.25 = 2
    assert!((s1.velocity - 2.0).abs() < 1e-12);

    session.tick(&timing, &gains);
    let s2 = session.state();
    // pv jumped to 2, error -1: kd * (-1 - 1) / 0.25 = -4
    assert!((s2.velocity - (-2.0)).abs() < 1e-12);
}

#[test]
fn test_damped_session_settles_near_constant_setpoint() {
    let panel = panel_with(10.0);
    let timing = panel.effective_timing();
    let gains = PidGains::new(0.05, 0.0, 0.05);
    let mut session = SimSession::new(1024, SetpointFn::compile("1").unwrap());

    for _ in 0..2000 {
        session.tick(&timing, &gains);
        assert!(
            session.state().process_variable.abs() < 10.0,
            "Damped loop must stay bounded"
        );
    }
    assert!(
        (session.state().process_variable - 1.0).abs() < 0.1,
        "Damped loop should settle near the setpoint, got {}",
        session.state().process_variable
    );
}

#[test]
fn test_reset_zeroes_state_and_reseeds_traces() {
    let panel = ControlPanel::default();
    let timing = panel.effective_timing();
    let gains = PidGains::new(0.3, 0.1, 0.0);
    let mut session = SimSession::new(16, SetpointFn::default());

    for _ in 0..40 {
        session.tick(&timing, &gains);
    }
    assert!(session.state().time > 0.0);

    session.reset(25);
    let state = session.state();
    assert_eq!(state.time, 0.0);
    assert_eq!(state.process_variable, 0.0);
    assert_eq!(state.velocity, 0.0);
    assert_eq!(state.cumulative_error, 0.0);
    assert_eq!(state.last_error, 0.0);

    for history in [session.setpoint_history(), session.process_history()] {
        assert_eq!(history.capacity(), 25, "Reset recreates at the new capacity");
        assert_eq!(history.len(), 1, "Reset seeds one sample");
        assert_eq!(history.at(0).unwrap(), Sample::new(0.0, 0.0));
    }
}

#[test]
fn test_fit_history_never_truncates_a_full_trace() {
    let panel = ControlPanel::default();
    let timing = panel.effective_timing();
    let gains = PidGains::default();
    let mut session = SimSession::new(4, SetpointFn::default());

    for _ in 0..10 {
        session.tick(&timing, &gains);
    }
    let before = session.setpoint_history().last().unwrap();

    session.fit_history(2); // target below the retained count: untouched
    assert_eq!(session.setpoint_history().capacity(), 4);
    assert_eq!(session.setpoint_history().len(), 4);

    session.fit_history(12);
    assert_eq!(session.setpoint_history().capacity(), 12);
    assert_eq!(session.process_history().capacity(), 12);
    assert_eq!(
        session.setpoint_history().last().unwrap(),
        before,
        "Resizing preserves the newest sample"
    );
}

// ============================================================================
// EXPRESSION TESTS
// ============================================================================

#[test]
fn test_expr_precedence_and_grouping() {
    let f = SetpointFn::compile("1 + 2 * 3").unwrap();
    assert_eq!(f.eval(0.0), 7.0, "Multiplication binds tighter than addition");

    let f = SetpointFn::compile("(1 + 2) * 3").unwrap();
    assert_eq!(f.eval(0.0), 9.0);

    let f = SetpointFn::compile("2 ^ 3 ^ 2").unwrap();
    assert_eq!(f.eval(0.0), 512.0, "Power is right-associative");

    let f = SetpointFn::compile("-x ^ 2").unwrap();
    assert_eq!(f.eval(3.0), 9.0, "Unary minus applies to the power operand");

    let f = SetpointFn::compile("10 - 4 - 3").unwrap();
    assert_eq!(f.eval(0.0), 3.0, "Subtraction is left-associative");
}

#[test]
fn test_expr_variable_constants_and_functions() {
    let f = SetpointFn::compile("x").unwrap();
    assert_eq!(f.eval(4.25), 4.25);

    let f = SetpointFn::compile("sin(pi / 2)").unwrap();
    assert!((f.eval(0.0) - 1.0).abs() < 1e-12);

    let f = SetpointFn::compile("cos(tau)").unwrap();
    assert!((f.eval(0.0) - 1.0).abs() < 1e-12);

    let f = SetpointFn::compile("ln(e)").unwrap();
    assert!((f.eval(0.0) - 1.0).abs() < 1e-12);

    let f = SetpointFn::compile("sqrt(abs(x))").unwrap();
    assert_eq!(f.eval(-9.0), 3.0);

    let f = SetpointFn::compile("sin(x/2) + 0.4*sin(2*x)").unwrap();
    let x: f64 = 1.3;
    let expected = (x / 2.0).sin() + 0.4 * (2.0 * x).sin();
    assert!((f.eval(x) - expected).abs() < 1e-12);
}

#[test]
fn test_expr_rejects_malformed_source() {
    assert!(SetpointFn::compile("").is_err(), "Empty source");
    assert!(SetpointFn::compile("   ").is_err(), "Blank source");
    assert!(SetpointFn::compile("sin(x").is_err(), "Unclosed call");
    assert!(SetpointFn::compile("(x + 1").is_err(), "Unclosed paren");
    assert!(SetpointFn::compile("x y").is_err(), "Trailing input");
    assert!(SetpointFn::compile("1 +").is_err(), "Dangling operator");
    assert!(SetpointFn::compile("frob(x)").is_err(), "Unknown function");
    assert!(SetpointFn::compile("y + 1").is_err(), "Unknown identifier");
    assert!(SetpointFn::compile("1..5").is_err(), "Malformed number");
    assert!(SetpointFn::compile("x $ 2").is_err(), "Unknown character");
}

#[test]
fn test_expr_error_messages_name_the_problem() {
    let err = SetpointFn::compile("frob(x)").unwrap_err();
    assert!(err.to_string().contains("frob"), "Message should name the identifier");

    let err = SetpointFn::compile("x # 1").unwrap_err();
    assert!(err.to_string().contains('#'), "Message should show the character");
}

#[test]
fn test_expr_keeps_source_text() {
    let f = SetpointFn::compile(" x + 1 ").unwrap();
    assert_eq!(f.source(), " x + 1 ", "Source text kept verbatim");
}

// ============================================================================
// CONFIG TESTS
// ============================================================================

#[test]
fn test_zero_guarded_fields_fall_back() {
    assert_eq!(parse_field_nonzero("", 3.14), 3.14, "Empty input");
    assert_eq!(parse_field_nonzero("abc", 3.14), 3.14, "Garbage input");
    assert_eq!(parse_field_nonzero("0", 3.14), 3.14, "Zero is guarded");
    assert_eq!(parse_field_nonzero("0.0", 3.14), 3.14);
    assert_eq!(parse_field_nonzero("NaN", 3.14), 3.14, "NaN is rejected");
    assert_eq!(parse_field_nonzero("2.5", 3.14), 2.5, "Valid input passes");
    assert_eq!(parse_field_nonzero(" 2.5 ", 3.14), 2.5, "Whitespace trimmed");
}

#[test]
fn test_gain_fields_default_to_neutral() {
    assert_eq!(parse_field("", 0.0), 0.0);
    assert_eq!(parse_field("abc", 0.0), 0.0);
    assert_eq!(parse_field("NaN", 0.0), 0.0);
    assert_eq!(parse_field("0", 0.0), 0.0, "Zero is a legal gain");
    assert_eq!(parse_field("-1.5", 0.0), -1.5);
}

#[test]
fn test_panel_derives_documented_defaults() {
    let mut panel = ControlPanel::default();
    panel.updates_per_second = "nonsense".to_string();
    panel.ticks_per_unit = "0".to_string();
    panel.width_units = String::new();
    panel.height_units = "oops".to_string();
    panel.proportional = "what".to_string();

    let timing = panel.effective_timing();
    assert_eq!(timing.updates_per_second, 3.14);
    assert_eq!(timing.ticks_per_unit, 10.0);
    assert!((timing.ticks_per_second - 31.4).abs() < 1e-12);
    assert!((timing.units_per_tick - 0.1).abs() < 1e-12);

    let window = panel.graph_window();
    assert_eq!(window.width_units, 50.0);
    assert_eq!(window.height_units, 1.0);

    assert_eq!(panel.gains().kp, 0.0, "Unparsable gain is neutral");
    assert_eq!(panel.history_target(), 500, "ceil(10 * 50)");
}

#[test]
fn test_history_target_rounds_up() {
    let mut panel = ControlPanel::default();
    panel.ticks_per_unit = "3.3".to_string();
    panel.width_units = "10".to_string();
    assert_eq!(panel.history_target(), 33);

    panel.ticks_per_unit = "3.31".to_string();
    assert_eq!(panel.history_target(), 34, "Fractional target rounds up");
}

#[test]
fn test_runtime_config_file_fallbacks() {
    let missing = pid_scope::load_config("/definitely/not/here.toml");
    assert_eq!(missing.updates_per_second, 3.14);
    assert_eq!(missing.setpoint, "sin(x)");

    let dir = std::env::temp_dir();
    let bad_path = dir.join("pid_scope_bad_config.toml");
    std::fs::write(&bad_path, "updates_per_second = \"not a number\"").unwrap();
    let bad = pid_scope::load_config(bad_path.to_str().unwrap());
    assert_eq!(bad.ticks_per_unit, 10.0, "Malformed file falls back whole");

    let good_path = dir.join("pid_scope_good_config.toml");
    std::fs::write(
        &good_path,
        r#"
updates_per_second = 2.0
ticks_per_unit = 5.0
width_units = 20.0
height_units = 2.0
proportional = 0.5
integral = 0.0
derivative = 0.1
setpoint = "cos(x)"
canvas_width = 640
canvas_height = 320
run_seconds = 3
frames_per_second = 15
"#,
    )
    .unwrap();
    let good = pid_scope::load_config(good_path.to_str().unwrap());
    assert_eq!(good.updates_per_second, 2.0);
    assert_eq!(good.setpoint, "cos(x)");
    assert_eq!(good.canvas_width, 640);

    let panel = ControlPanel::from_runtime(&good);
    assert_eq!(panel.history_target(), 100, "ceil(5 * 20)");
    assert_eq!(panel.gains().kp, 0.5);
}

// ============================================================================
// TIMING TESTS
// ============================================================================

#[test]
fn test_fixed_timestep_batches_overdue_ticks() {
    let start = Instant::now();
    let period = Duration::from_millis(10);
    let mut pacer = FixedTimestep::new(start);

    assert_eq!(pacer.due_ticks(start, period), 0, "Nothing due at start");
    assert_eq!(
        pacer.due_ticks(start + Duration::from_millis(35), period),
        3,
        "Three full periods elapsed"
    );
    // 5ms remainder carried: another 5ms completes the fourth period
    assert_eq!(
        pacer.due_ticks(start + Duration::from_millis(40), period),
        1
    );
    assert_eq!(
        pacer.due_ticks(start + Duration::from_millis(40), period),
        0,
        "No time passed, nothing due"
    );
}

#[test]
fn test_fixed_timestep_carries_remainder_into_sleep_hint() {
    let start = Instant::now();
    let period = Duration::from_millis(10);
    let mut pacer = FixedTimestep::new(start);

    pacer.due_ticks(start + Duration::from_millis(27), period);
    assert_eq!(
        pacer.time_to_next(period),
        Duration::from_millis(3),
        "7ms carried, 3ms to the next tick"
    );
}

#[test]
fn test_fixed_timestep_caps_catch_up_after_stall() {
    let start = Instant::now();
    let period = Duration::from_millis(10);
    let mut pacer = FixedTimestep::new(start);

    let due = pacer.due_ticks(start + Duration::from_secs(30), period);
    assert_eq!(due, MAX_TICKS_PER_WAKE, "Stalled backlog is capped");
    assert_eq!(
        pacer.time_to_next(period),
        period,
        "Backlog beyond the cap is dropped, not carried"
    );
}

// ============================================================================
// RENDER TESTS
// ============================================================================

#[test]
fn test_projection_fixed_points() {
    let window = GraphWindow {
        width_units: 50.0,
        height_units: 1.0,
    };
    let viewport = Viewport::new(100, 100);
    let rightmost = 50.0;

    assert_eq!(
        pid_scope::project(Sample::new(50.0, 0.0), rightmost, &window, &viewport),
        (100, 50),
        "Newest sample lands on the right edge, zero on the centerline"
    );
    assert_eq!(
        pid_scope::project(Sample::new(0.0, 1.0), rightmost, &window, &viewport),
        (0, 0),
        "Window-old sample at +height lands on the top-left corner"
    );
    assert_eq!(
        pid_scope::project(Sample::new(25.0, -1.0), rightmost, &window, &viewport),
        (50, 100),
        "-height lands on the bottom edge"
    );
}

#[test]
fn test_polyline_runs_oldest_to_newest() {
    let window = GraphWindow {
        width_units: 10.0,
        height_units: 1.0,
    };
    let viewport = Viewport::new(100, 100);

    let mut buf = HistoryBuffer::new(4);
    assert!(
        pid_scope::polyline(&buf, &window, &viewport).is_empty(),
        "Empty trace renders nothing"
    );

    for i in 0..6 {
        buf.push(Sample::new(i as f64, 0.0));
    }
    let line = pid_scope::polyline(&buf, &window, &viewport);
    assert_eq!(line.len(), buf.len(), "One vertex per retained sample");
    for pair in line.windows(2) {
        assert!(pair[0].0 < pair[1].0, "X must increase oldest to newest");
    }
    assert_eq!(line.last().unwrap().0, 100, "Newest vertex on the right edge");
}
