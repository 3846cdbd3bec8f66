use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use pid_scope::{
    load_config, render_frame, shared_panel, shared_session, spawn_control_thread,
    CommandChannel, ControlPanel, EventLog, PanelCommand, ScopeMetrics, SetpointFn, SimSession,
    Viewport, DEFAULT_SETPOINT,
};

// Scripted panel interactions so a plain `cargo run` exercises the whole
// surface: gain edits, setpoint swap (good and bad), window growth, canvas
// resize, and a reset.
struct DemoScript {
    tuned_gains: bool,
    swapped_setpoint: bool,
    sent_bad_setpoint: bool,
    widened_window: bool,
    resized_canvas: bool,
    sent_reset: bool,
}

impl DemoScript {
    fn new() -> Self {
        Self {
            tuned_gains: false,
            swapped_setpoint: false,
            sent_bad_setpoint: false,
            widened_window: false,
            resized_canvas: false,
            sent_reset: false,
        }
    }

    fn step(
        &mut self,
        at: Duration,
        panel: &pid_scope::SharedPanel,
        commands: &CommandChannel,
        viewport: &mut Viewport,
    ) {
        let secs = at.as_secs_f64();

        if !self.tuned_gains && secs >= 1.0 {
            self.tuned_gains = true;
            let mut p = panel.lock();
            p.proportional = "0.02".to_string();
            p.derivative = "0.1".to_string();
            println!("[{:7.3}s] PANEL: gains set to kP=0.02 kD=0.1", secs);
        }
        if !self.swapped_setpoint && secs >= 3.0 {
            self.swapped_setpoint = true;
            let source = "sin(x/2) + 0.4*sin(2*x)".to_string();
            println!("[{:7.3}s] PANEL: applying setpoint '{}'", secs, source);
            let _ = commands.tx.send(PanelCommand::ApplySetpoint(source));
        }
        if !self.sent_bad_setpoint && secs >= 4.5 {
            self.sent_bad_setpoint = true;
            println!("[{:7.3}s] PANEL: applying setpoint 'sin(x' (malformed)", secs);
            let _ = commands
                .tx
                .send(PanelCommand::ApplySetpoint("sin(x".to_string()));
        }
        if !self.widened_window && secs >= 6.0 {
            self.widened_window = true;
            panel.lock().width_units = "80".to_string();
            println!("[{:7.3}s] PANEL: graph width set to 80 units", secs);
        }
        if !self.resized_canvas && secs >= 7.0 {
            self.resized_canvas = true;
            let mut p = panel.lock();
            p.canvas_width = "1000".to_string();
            let width = p.canvas_width(viewport.width);
            drop(p);
            *viewport = Viewport::new(width, viewport.height);
            println!("[{:7.3}s] PANEL: canvas width applied ({}px)", secs, width);
        }
        if !self.sent_reset && secs >= 8.0 {
            self.sent_reset = true;
            println!("[{:7.3}s] PANEL: reset pressed", secs);
            let _ = commands.tx.send(PanelCommand::Reset);
        }
    }
}

fn main() {
    println!("===========================================");
    println!("Starting PID Scope");
    println!("===========================================\n");

    let cfg = load_config("config/scope.toml");

    let setpoint = match SetpointFn::compile(&cfg.setpoint) {
        Ok(func) => func,
        Err(err) => {
            println!(
                "[PANEL] configured setpoint rejected ({}); falling back to '{}'",
                err, DEFAULT_SETPOINT
            );
            SetpointFn::default()
        }
    };
    println!("[PANEL] setpoint: {}", setpoint.source());

    let panel = shared_panel(ControlPanel::from_runtime(&cfg));
    let capacity = panel.lock().history_target();
    let session = shared_session(SimSession::new(capacity, setpoint));
    let commands = CommandChannel::new(16);
    let log = EventLog::new(64);
    let metrics = ScopeMetrics::new();
    let mut viewport = Viewport::new(cfg.canvas_width, cfg.canvas_height);

    let (handle, stats) = spawn_control_thread(
        session.clone(),
        panel.clone(),
        commands.clone(),
        log.clone(),
        metrics.clone(),
    );

    std::fs::create_dir_all("frames").ok();

    println!(
        "System running for {} seconds at {} fps, history capacity {}...\n",
        cfg.run_seconds, cfg.frames_per_second, capacity
    );

    let run_start = Instant::now();
    let run_duration = Duration::from_secs(cfg.run_seconds);
    let frame_interval = Duration::from_secs_f64(1.0 / cfg.frames_per_second.max(1) as f64);
    let mut script = DemoScript::new();
    let mut printed_events = 0usize;
    let mut frame_counter = 0u64;

    while run_start.elapsed() < run_duration {
        let frame_start = Instant::now();

        script.step(run_start.elapsed(), &panel, &commands, &mut viewport);

        let window = panel.lock().graph_window();
        {
            let locked = session.lock();
            if let Err(err) = render_frame(&locked, &window, &viewport, "frames/scope.png") {
                log.write(format!("frame skipped: {err}"));
            }
        }
        metrics.record_frame(frame_start.elapsed());
        frame_counter += 1;

        let entries = log.read_all();
        for entry in entries.iter().skip(printed_events) {
            println!(
                "[{:7.3}s] EVENT: {}",
                run_start.elapsed().as_secs_f64(),
                entry
            );
        }
        printed_events = entries.len();

        if frame_counter % 60 == 0 {
            let state = session.lock().state();
            println!(
                "[{:7.3}s] SCOPE: t={:.2} pv={:+.3} err={:+.3}",
                run_start.elapsed().as_secs_f64(),
                state.time,
                state.process_variable,
                state.last_error
            );
        }

        let elapsed = frame_start.elapsed();
        if elapsed < frame_interval {
            std::thread::sleep(frame_interval - elapsed);
        }
    }

    println!("\n===========================================");
    println!("Run completed - initiating shutdown");
    stats.shutdown.store(true, Ordering::Relaxed);
    let _ = handle.join();

    let state = session.lock().state();
    let report = metrics.report();

    println!("===========================================");
    println!("FINAL SCOPE RESULTS");
    println!("===========================================");
    println!("Ticks: {} ({} batches, largest batch {})",
        stats.ticks.load(Ordering::Relaxed),
        stats.batches.load(Ordering::Relaxed),
        stats.largest_batch.load(Ordering::Relaxed));
    println!("Frames: {}", report.frames);
    println!("Resets: {}", stats.resets.load(Ordering::Relaxed));
    println!("Rejected setpoints: {}", report.compile_failures);
    println!("Final state: t={:.2} pv={:+.4} vel={:+.4}",
        state.time, state.process_variable, state.velocity);
    println!("===========================================\n");

    println!("=== Performance Metrics ===");
    println!("Tick P50: {:?}, P99: {:?}", report.tick_p50, report.tick_p99);
    println!("Frame P50: {:?}, P99: {:?}", report.frame_p50, report.frame_p99);
}
