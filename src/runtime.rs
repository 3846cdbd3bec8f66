//! Runtime module - the control thread and its run statistics

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::expr::SetpointFn;
use crate::ipc::{CommandChannel, EventLog, PanelCommand, SharedPanel, SharedSession};
use crate::metrics::ScopeMetrics;
use crate::timing::FixedTimestep;

// Upper bound on one sleep so shutdown is observed promptly even at very
// low tick rates.
const SHUTDOWN_POLL: Duration = Duration::from_millis(50);

// ============================================================================
// CONTROL STATS
// ============================================================================

pub struct ControlStats {
    pub ticks: AtomicU64,
    pub batches: AtomicU64,
    pub largest_batch: AtomicU64,
    pub resets: AtomicU64,
    pub shutdown: AtomicBool,
}

impl ControlStats {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            ticks: AtomicU64::new(0),
            batches: AtomicU64::new(0),
            largest_batch: AtomicU64::new(0),
            resets: AtomicU64::new(0),
            shutdown: AtomicBool::new(false),
        })
    }
}

// ============================================================================
// CONTROL THREAD - Fixed-timestep simulation stepping
// ============================================================================

/// Spawn the control loop. Each wake drains panel commands, re-reads the
/// effective timing, runs every tick that became due, and sleeps until the
/// next one. Gains are re-read from the panel for every tick, so edits take
/// effect mid-batch.
pub fn spawn_control_thread(
    session: SharedSession,
    panel: SharedPanel,
    commands: CommandChannel,
    log: EventLog,
    metrics: ScopeMetrics,
) -> (thread::JoinHandle<()>, Arc<ControlStats>) {
    let stats = ControlStats::new();
    let stats_clone = stats.clone();

    let handle = thread::spawn(move || {
        let mut pacer = FixedTimestep::new(Instant::now());

        loop {
            if stats_clone.shutdown.load(Ordering::Relaxed) {
                break;
            }

            // Button presses are handled before stepping. Reset swaps the
            // buffers and zeroes the scalars under the session lock, so a
            // concurrent frame sees either the old run or the fresh one.
            while let Ok(command) = commands.rx.try_recv() {
                match command {
                    PanelCommand::Reset => {
                        let target = panel.lock().history_target();
                        session.lock().reset(target);
                        stats_clone.resets.fetch_add(1, Ordering::Relaxed);
                        log.write("simulation reset".to_string());
                    }
                    PanelCommand::ApplySetpoint(source) => {
                        match SetpointFn::compile(&source) {
                            Ok(func) => {
                                session.lock().install_setpoint(func);
                                panel.lock().setpoint_source = source;
                            }
                            Err(err) => {
                                metrics.record_compile_failure();
                                log.write(format!("setpoint rejected: {err}"));
                            }
                        }
                    }
                }
            }

            let timing = panel.lock().effective_timing();
            let period = timing.tick_interval();

            // Widening the visible window resizes the history in place.
            let target = panel.lock().history_target();
            session.lock().fit_history(target);

            let due = pacer.due_ticks(Instant::now(), period);
            if due > 0 {
                stats_clone.batches.fetch_add(1, Ordering::Relaxed);
                stats_clone
                    .largest_batch
                    .fetch_max(due as u64, Ordering::Relaxed);
                for _ in 0..due {
                    let gains = panel.lock().gains();
                    let tick_start = Instant::now();
                    session.lock().tick(&timing, &gains);
                    metrics.record_tick(tick_start.elapsed());
                    stats_clone.ticks.fetch_add(1, Ordering::Relaxed);
                }
            }

            thread::sleep(pacer.time_to_next(period).min(SHUTDOWN_POLL));
        }
    });

    (handle, stats)
}
