//! Tick orchestration: reader/handler/observer registries, the per-tick
//! protocol, run modes, and human-readable explanation of a selection.

use crate::scorer::{evaluate_constraints, select_best_action, ConstraintStatus, SelectionResult};
use crate::state::StateManager;
use novair_core::{EngineConfig, NovairResult, Severity, TickMode};
use novair_dsl::System;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// `Fn() -> f64`: a pure observation of one declared state.
pub type StateReader = dyn Fn() -> f64 + Send + 'static;
/// `Fn(&HashMap<String, i64>)`: the side-effecting half of an action.
pub type ActionHandler = dyn Fn(&HashMap<String, i64>) + Send + 'static;
/// `Fn(&TickResult)`: a synchronous post-tick observer.
pub type TickObserver = dyn Fn(&TickResult) + Send + 'static;

const TICK_LOG_CAP: usize = 1000;
const TICK_LOG_COMPACT_TO: usize = 500;
const STOP_GRACE: Duration = Duration::from_secs(1);

/// Everything recorded about one completed tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickResult {
    pub tick_id: u64,
    pub timestamp_ms: u64,
    pub constraint_statuses: Vec<ConstraintStatus>,
    pub violations: Vec<String>,
    pub candidate_count: usize,
    pub selected_action: Option<String>,
    pub selected_parameters: Option<HashMap<String, i64>>,
    pub executed: bool,
    pub duration_ms: u64,
}

struct EngineState {
    state_manager: StateManager,
    readers: HashMap<String, Box<StateReader>>,
    handlers: HashMap<String, Box<ActionHandler>>,
    observers: Vec<Box<TickObserver>>,
    tick_log: VecDeque<TickResult>,
    tick_counter: u64,
    has_sampled: bool,
}

/// Orchestrates the tick-driven decision loop over a parsed [`System`].
pub struct Engine {
    system: Arc<System>,
    config: EngineConfig,
    interval_ms: u64,
    action_threshold: f64,
    mode: TickMode,
    state: Mutex<EngineState>,
    stop_flag: Arc<AtomicBool>,
    worker: Mutex<Option<std::thread::JoinHandle<()>>>,
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

impl Engine {
    /// Builds an engine from a parsed system and configuration. A `tick`
    /// block declared in the system overrides `interval_ms`,
    /// `action_threshold`, and the continuous/reactive mode from `config`.
    pub fn new(system: System, config: EngineConfig) -> NovairResult<Arc<Self>> {
        config.validate()?;

        let (interval_ms, action_threshold, mode) = match &system.tick {
            Some(tick) => (tick.interval_ms, tick.action_threshold, tick.mode),
            None => (
                config.tick_interval_ms,
                config.action_threshold,
                if config.continuous_mode {
                    TickMode::Continuous
                } else {
                    TickMode::Reactive
                },
            ),
        };

        Ok(Arc::new(Self {
            system: Arc::new(system),
            config,
            interval_ms,
            action_threshold,
            mode,
            state: Mutex::new(EngineState {
                state_manager: StateManager::new(),
                readers: HashMap::new(),
                handlers: HashMap::new(),
                observers: Vec::new(),
                tick_log: VecDeque::new(),
                tick_counter: 0,
                has_sampled: false,
            }),
            stop_flag: Arc::new(AtomicBool::new(false)),
            worker: Mutex::new(None),
        }))
    }

    pub fn system(&self) -> &System {
        &self.system
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Registers a reader for `name`. A name matching no declared state is
    /// accepted and stored but never invoked.
    pub fn register_state_reader(&self, name: impl Into<String>, reader: impl Fn() -> f64 + Send + 'static) {
        self.state
            .lock()
            .unwrap()
            .readers
            .insert(name.into(), Box::new(reader));
    }

    /// Registers a handler for `name`. A name matching no declared action is
    /// accepted and stored but never invoked.
    pub fn register_action_handler(
        &self,
        name: impl Into<String>,
        handler: impl Fn(&HashMap<String, i64>) + Send + 'static,
    ) {
        self.state
            .lock()
            .unwrap()
            .handlers
            .insert(name.into(), Box::new(handler));
    }

    /// Registers a synchronous observer invoked, in registration order,
    /// after every completed tick.
    pub fn on_tick(&self, observer: impl Fn(&TickResult) + Send + 'static) {
        self.state.lock().unwrap().observers.push(Box::new(observer));
    }

    pub fn last_tick(&self) -> Option<TickResult> {
        self.state.lock().unwrap().tick_log.back().cloned()
    }

    pub fn tick_history(&self) -> Vec<TickResult> {
        self.state.lock().unwrap().tick_log.iter().cloned().collect()
    }

    pub fn tick_count(&self) -> u64 {
        self.state.lock().unwrap().tick_counter
    }

    /// Executes exactly one tick: read, snapshot, evaluate, enumerate &
    /// score, select, execute, record & notify. Returns `None` without
    /// doing any of that work when in [`TickMode::Reactive`] and no
    /// registered reader's value changed since the previous tick.
    pub fn tick(&self) -> Option<TickResult> {
        let start = Instant::now();
        let mut guard = self.state.lock().unwrap();

        let mut changed = false;
        for declared in &self.system.states {
            let outcome = guard
                .readers
                .get(&declared.name)
                .map(|reader| catch_unwind(AssertUnwindSafe(|| reader())));
            match outcome {
                Some(Ok(value)) => {
                    if guard.state_manager.get_opt(&declared.name) != Some(value) {
                        changed = true;
                    }
                    guard.state_manager.update(&declared.name, value);
                }
                Some(Err(payload)) => {
                    tracing::warn!(
                        state = %declared.name,
                        error = %panic_message(&*payload),
                        "state reader failed"
                    );
                }
                None => {}
            }
        }

        if self.mode == TickMode::Reactive && guard.has_sampled && !changed {
            return None;
        }
        guard.has_sampled = true;

        let timestamp_ms = now_ms();
        guard.state_manager.snapshot(timestamp_ms);

        let current = guard.state_manager.current().clone();
        let statuses = evaluate_constraints(&self.system.constraints, &current);
        let selection = select_best_action(&self.system, &statuses, &current, self.action_threshold);

        let mut executed = false;
        if let Some(sc) = &selection.selected {
            if !self.config.dry_run {
                let outcome = guard
                    .handlers
                    .get(&sc.candidate.action)
                    .map(|handler| {
                        catch_unwind(AssertUnwindSafe(|| handler(&sc.candidate.parameters)))
                    });
                match outcome {
                    Some(Ok(())) => executed = true,
                    Some(Err(payload)) => {
                        tracing::warn!(
                            action = %sc.candidate.action,
                            error = %panic_message(&*payload),
                            "action handler failed"
                        );
                    }
                    None => {}
                }
            }
        }

        guard.tick_counter += 1;
        let result = TickResult {
            tick_id: guard.tick_counter,
            timestamp_ms,
            violations: statuses
                .iter()
                .filter(|s| s.violated)
                .map(|s| s.name.clone())
                .collect(),
            candidate_count: selection.candidates.len(),
            selected_action: selection.selected.as_ref().map(|sc| sc.candidate.action.clone()),
            selected_parameters: selection.selected.as_ref().map(|sc| sc.candidate.parameters.clone()),
            constraint_statuses: statuses,
            executed,
            duration_ms: start.elapsed().as_millis() as u64,
        };

        tracing::debug!(
            tick_id = result.tick_id,
            violations = result.violations.len(),
            selected_action = result.selected_action.as_deref().unwrap_or("none"),
            duration_ms = result.duration_ms,
            "tick completed"
        );

        guard.tick_log.push_back(result.clone());
        if guard.tick_log.len() > TICK_LOG_CAP {
            let excess = guard.tick_log.len() - TICK_LOG_COMPACT_TO;
            for _ in 0..excess {
                guard.tick_log.pop_front();
            }
        }

        for observer in guard.observers.iter() {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| observer(&result))) {
                tracing::warn!(error = %panic_message(&*payload), "tick observer failed");
            }
        }

        Some(result)
    }

    /// Ticks repeatedly, sleeping `interval_ms` between ticks, until
    /// `duration` elapses or [`Engine::stop`] is called.
    pub fn run(self: &Arc<Self>, duration: Duration) {
        self.stop_flag.store(false, Ordering::SeqCst);
        let deadline = Instant::now() + duration;
        while Instant::now() < deadline && !self.stop_flag.load(Ordering::SeqCst) {
            self.tick();
            std::thread::sleep(self.interval());
        }
    }

    /// Starts the driven loop on a dedicated worker thread.
    pub fn start(self: &Arc<Self>) {
        self.stop_flag.store(false, Ordering::SeqCst);
        let engine = Arc::clone(self);
        let handle = std::thread::spawn(move || {
            tracing::info!(interval_ms = engine.interval_ms, mode = %engine.mode, "engine background worker started");
            while !engine.stop_flag.load(Ordering::SeqCst) {
                engine.tick();
                std::thread::sleep(engine.interval());
            }
            tracing::info!("engine background worker stopped");
        });
        *self.worker.lock().unwrap() = Some(handle);
    }

    /// Signals the worker to stop and joins it within a one-second grace
    /// period. The current tick, if any, is allowed to complete.
    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::SeqCst);
        let handle = match self.worker.lock().unwrap().take() {
            Some(h) => h,
            None => return,
        };

        let (tx, rx) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            let _ = handle.join();
            let _ = tx.send(());
        });
        match rx.recv_timeout(STOP_GRACE) {
            Ok(()) => {}
            Err(_) => {
                tracing::warn!("engine background worker did not join within the grace period");
            }
        }
    }

    /// Renders a human-readable breakdown of `selection`'s outcome.
    pub fn explain(&self, statuses: &[ConstraintStatus], selection: &SelectionResult) -> String {
        explain(statuses, selection, self.action_threshold)
    }
}

/// Renders a human-readable breakdown of a selection result. When no
/// candidate was selected, `statuses` (the same slice passed to
/// [`select_best_action`]) is used to distinguish an unresolved critical
/// violation from a best candidate that simply fell below threshold.
pub fn explain(statuses: &[ConstraintStatus], selection: &SelectionResult, action_threshold: f64) -> String {
    if let Some(sc) = &selection.selected {
        return format!(
            "selected '{}' with parameters {:?}: score {:.3} (c_res={:.3}, objective={:.3}, penalty={:.3}); predicted effects {:?}",
            sc.candidate.action,
            sc.candidate.parameters,
            sc.breakdown.score,
            sc.breakdown.c_res,
            sc.breakdown.objective,
            sc.breakdown.penalty,
            sc.effects
        );
    }

    let critical_violations: Vec<&str> = statuses
        .iter()
        .filter(|s| s.violated && matches!(s.severity, Severity::Critical))
        .map(|s| s.name.as_str())
        .collect();
    let any_positive = selection.candidates.iter().any(|c| c.breakdown.c_res > 0.0);

    if !critical_violations.is_empty() && !any_positive {
        return format!(
            "no declared action materially resolves the critical violation(s): {}",
            critical_violations.join(", ")
        );
    }

    let mut best: Option<&crate::scorer::ScoredCandidate> = None;
    for c in &selection.candidates {
        match best {
            None => best = Some(c),
            Some(b) if c.breakdown.score > b.breakdown.score => best = Some(c),
            _ => {}
        }
    }

    match best {
        Some(best) => format!(
            "best candidate '{}' scored {:.3}, which does not exceed the action_threshold of {:.3}",
            best.candidate.action, best.breakdown.score, action_threshold
        ),
        None => "no actions are declared".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use novair_dsl::parse;
    use std::sync::atomic::AtomicI64;

    const THERMOSTAT: &str = r#"
system Thermostat
    state:
        temperature <- sensors.cpu.temp
        fan_speed <- actuators.fan.speed
        target <- config.target_temp

    constraints:
        max_temp: temperature <= 85 @critical
        min_temp: temperature >= 30 @warning

    objectives:
        comfort: temperature -> target(65) @priority(8)
        silence: fan_speed -> min @priority(4)

    actions:
        increase_fan:
            parameters: [amount: 0..100]
            effects:
                temperature: -5 to -15
                fan_speed: 10 to 40
            cost: medium

        noop:
            cost: low

    tick:
        interval: 10ms
        action_threshold: 0.3
        mode: continuous
"#;

    #[test]
    fn tick_reads_state_selects_and_executes_handler() {
        let system = parse(THERMOSTAT).unwrap();
        let engine = Engine::new(system, EngineConfig::default()).unwrap();

        engine.register_state_reader("temperature", || 90.0);
        engine.register_state_reader("fan_speed", || 30.0);
        engine.register_state_reader("target", || 65.0);

        let invoked = Arc::new(AtomicI64::new(-1));
        let invoked_clone = Arc::clone(&invoked);
        engine.register_action_handler("increase_fan", move |params| {
            invoked_clone.store(params["amount"], Ordering::SeqCst);
        });

        let result = engine.tick().expect("continuous tick always produces a result");
        assert_eq!(result.selected_action.as_deref(), Some("increase_fan"));
        assert!(result.executed);
        assert_eq!(invoked.load(Ordering::SeqCst), 100);
    }

    #[test]
    fn dry_run_selects_without_invoking_handler() {
        let system = parse(THERMOSTAT).unwrap();
        let config = EngineConfig {
            dry_run: true,
            ..EngineConfig::default()
        };
        let engine = Engine::new(system, config).unwrap();
        engine.register_state_reader("temperature", || 90.0);
        engine.register_state_reader("fan_speed", || 30.0);
        engine.register_state_reader("target", || 65.0);

        let invoked = Arc::new(AtomicI64::new(0));
        let invoked_clone = Arc::clone(&invoked);
        engine.register_action_handler("increase_fan", move |_| {
            invoked_clone.fetch_add(1, Ordering::SeqCst);
        });

        let result = engine.tick().unwrap();
        assert_eq!(result.selected_action.as_deref(), Some("increase_fan"));
        assert!(!result.executed);
        assert_eq!(invoked.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unregistered_reader_retains_prior_value() {
        let system = parse(THERMOSTAT).unwrap();
        let engine = Engine::new(system, EngineConfig::default()).unwrap();
        engine.register_state_reader("temperature", || 65.0);
        engine.register_state_reader("fan_speed", || 30.0);
        engine.register_state_reader("target", || 65.0);

        let first = engine.tick().unwrap();
        assert!(first.selected_action.is_none());
        let second = engine.tick().unwrap();
        assert_eq!(second.selected_action, first.selected_action);
    }

    #[test]
    fn reader_panic_is_caught_and_logged() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let system = parse(THERMOSTAT).unwrap();
        let engine = Engine::new(system, EngineConfig::default()).unwrap();
        engine.register_state_reader("temperature", || panic!("sensor offline"));
        engine.register_state_reader("fan_speed", || 30.0);
        engine.register_state_reader("target", || 65.0);

        let result = engine.tick();
        assert!(result.is_some(), "a failing reader must not abort the tick");
    }

    #[test]
    fn history_is_capped_and_compacted() {
        let system = parse(THERMOSTAT).unwrap();
        let engine = Engine::new(system, EngineConfig::default()).unwrap();
        engine.register_state_reader("temperature", || 65.0);
        engine.register_state_reader("fan_speed", || 30.0);
        engine.register_state_reader("target", || 65.0);

        for _ in 0..1005 {
            engine.tick();
        }
        assert!(engine.tick_history().len() <= TICK_LOG_CAP);
    }

    #[test]
    fn observer_is_notified_after_each_tick() {
        let system = parse(THERMOSTAT).unwrap();
        let engine = Engine::new(system, EngineConfig::default()).unwrap();
        engine.register_state_reader("temperature", || 65.0);
        engine.register_state_reader("fan_speed", || 30.0);
        engine.register_state_reader("target", || 65.0);

        let seen = Arc::new(AtomicI64::new(0));
        let seen_clone = Arc::clone(&seen);
        engine.on_tick(move |_| {
            seen_clone.fetch_add(1, Ordering::SeqCst);
        });

        engine.tick();
        engine.tick();
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn reactive_mode_skips_unchanged_ticks() {
        let src = THERMOSTAT.replace("mode: continuous", "mode: reactive");
        let system = parse(&src).unwrap();
        let engine = Engine::new(system, EngineConfig::default()).unwrap();
        engine.register_state_reader("temperature", || 65.0);
        engine.register_state_reader("fan_speed", || 30.0);
        engine.register_state_reader("target", || 65.0);

        let first = engine.tick();
        assert!(first.is_some(), "first sample always ticks");
        let second = engine.tick();
        assert!(second.is_none(), "unchanged state must skip the tick");
    }

    #[test]
    fn background_worker_starts_and_stops_within_grace_period() {
        let system = parse(THERMOSTAT).unwrap();
        let engine = Engine::new(system, EngineConfig::default()).unwrap();
        engine.register_state_reader("temperature", || 65.0);
        engine.register_state_reader("fan_speed", || 30.0);
        engine.register_state_reader("target", || 65.0);

        engine.start();
        std::thread::sleep(Duration::from_millis(50));
        engine.stop();
        assert!(engine.tick_count() >= 1);
    }
}
