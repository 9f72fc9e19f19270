//! End-to-end simulator
//!
//! Builds a seeded population of simulated components, resolves them at
//! random ticks, lets a scripted operator answer whatever is displayed,
//! and checks the run against the observer's guarantees.

use super::{
    kinds, sim_bank, BlankAdapter, FaultyAdapter, PanickingAdapter, ScriptedOperator, SimComponent, SimHandle,
    SimHost, WiresAdapter,
};
use crate::component::Component;
use crate::config::ObserverConfig;
use crate::error::ConfigError;
use crate::journal::RunEvent;
use crate::monitor::{AdapterRegistry, MonitorOutcome};
use crate::runtime::{Observer, RunSummary};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Simulator configuration
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Random seed for reproducibility
    pub seed: u64,
    /// Healthy wire components
    pub components: usize,
    /// Components whose adapter abandons
    pub faulty: usize,
    /// Components whose adapter panics
    pub volatile: usize,
    /// Components with nothing to ask
    pub blank: usize,
    /// Latest tick at which a component resolves
    pub max_resolve_tick: u64,
    /// Probability the operator answers correctly
    pub accuracy: f64,
    pub answer_delay: Duration,
    pub observer: ObserverConfig,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            components: 9,
            faulty: 1,
            volatile: 0,
            blank: 0,
            max_resolve_tick: 30,
            accuracy: 0.75,
            answer_delay: Duration::from_millis(40),
            observer: ObserverConfig::new()
                .with_tick_interval(Duration::from_millis(20))
                .with_blinks(6, Duration::from_millis(30)),
        }
    }
}

/// A broken guarantee found after the run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub check: &'static str,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulatorReport {
    pub seed: u64,
    pub summary: RunSummary,
    pub penalties_applied: u64,
    pub finished_declarations: u64,
    pub violations: Vec<Violation>,
}

impl SimulatorReport {
    /// Check if the run upheld every guarantee
    #[must_use]
    pub fn passed(&self) -> bool {
        self.summary.is_solved() && self.violations.is_empty()
    }

    pub fn generate_text(&self) -> String {
        let s = &self.summary;
        let mut report = String::new();

        report.push_str("=== Quizwatch Simulator Report ===\n\n");
        report.push_str(&format!("Seed: {}\n", self.seed));
        report.push_str(&format!("Run: {}\n", s.run_id));
        report.push_str(&format!("Outcome: {:?}\n", s.outcome));
        report.push_str(&format!("Ticks: {}\n", s.ticks));
        report.push_str(&format!("In scope: {} ({} resolved)\n", s.total_in_scope, s.resolved));
        report.push_str(&format!("Batches pooled: {}\n", s.batches_pooled));
        report.push_str(&format!("Items served: {}\n", s.items_served));
        report.push_str(&format!("Correct: {}\n", s.correct));
        report.push_str(&format!("Penalties: {}\n", self.penalties_applied));

        report.push_str("\n=== Monitors ===\n");
        for m in &s.monitors {
            report.push_str(&format!("{}: {:?}\n", m.component, m.outcome));
        }

        if !self.violations.is_empty() {
            report.push_str("\n=== Violations ===\n");
            for (i, v) in self.violations.iter().enumerate() {
                report.push_str(&format!("{}. {}: {}\n", i + 1, v.check, v.detail));
            }
        }

        report.push_str(&format!(
            "\n=== Result: {} ===\n",
            if self.passed() { "PASS" } else { "FAIL" }
        ));
        report
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Run one simulated session to completion
pub async fn run_simulator(config: SimulatorConfig) -> Result<SimulatorReport, ConfigError> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let host = Arc::new(SimHost::default());
    let operator = Arc::new(ScriptedOperator::new(
        config.accuracy,
        config.answer_delay,
        config.seed ^ 0x5eed,
    ));
    let registry = AdapterRegistry::new()
        .with(Arc::new(WiresAdapter))
        .with(Arc::new(FaultyAdapter))
        .with(Arc::new(PanickingAdapter))
        .with(Arc::new(BlankAdapter));

    let observer = Observer::new(
        config.observer.clone().with_seed(config.seed),
        sim_bank(),
        registry,
        host.clone(),
        operator.clone(),
    )?;
    operator.attach(observer.choice_handle());
    let session = observer.session().clone();

    let population = [
        (kinds::WIRES, config.components),
        (kinds::FAULTY, config.faulty),
        (kinds::VOLATILE, config.volatile),
        (kinds::BLANK, config.blank),
    ];
    let mut sims = Vec::new();
    for (kind, count) in population {
        for _ in 0..count {
            let resolve_at = rng.gen_range(1..=config.max_resolve_tick.max(1));
            sims.push(SimComponent::generate(session.allocate_id(), kind, resolve_at, &mut rng));
        }
    }
    let components: Vec<Arc<dyn Component>> = sims
        .iter()
        .map(|sim| Arc::new(SimHandle(Arc::clone(sim))) as Arc<dyn Component>)
        .collect();

    let tick = config.observer.tick_interval();
    let resolver = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(tick);
        let last = sims.iter().map(|s| s.resolve_at()).max().unwrap_or(0);
        for now in 0..=last {
            ticker.tick().await;
            for sim in sims.iter().filter(|s| s.resolve_at() == now) {
                sim.resolve();
            }
        }
    });

    let summary = observer.run(components).await;
    resolver.abort();

    let violations = check_run(&config, &summary, &session.journal().events());
    Ok(SimulatorReport {
        seed: config.seed,
        summary,
        penalties_applied: host.penalties(),
        finished_declarations: host.finished_count(),
        violations,
    })
}

fn check_run(config: &SimulatorConfig, summary: &RunSummary, events: &[RunEvent]) -> Vec<Violation> {
    let mut violations = Vec::new();
    let mut fail = |check: &'static str, detail: String| violations.push(Violation { check, detail });

    for m in &summary.monitors {
        let expected = match m.component.kind.as_str() {
            kinds::WIRES => m.outcome.is_submitted(),
            kinds::FAULTY => matches!(m.outcome, MonitorOutcome::Abandoned { .. }),
            kinds::VOLATILE => matches!(m.outcome, MonitorOutcome::Failed { .. }),
            kinds::BLANK => m.outcome == MonitorOutcome::IntentionallyEmpty,
            _ => true,
        };
        if !expected {
            fail("isolation", format!("{} ended as {:?}", m.component, m.outcome));
        }
    }
    let submitted = summary.monitors.iter().filter(|m| m.outcome.is_submitted()).count();
    if summary.is_solved() && submitted != config.components {
        fail(
            "isolation",
            format!("{submitted} of {} healthy monitors submitted", config.components),
        );
    }

    if summary.is_solved() && summary.items_served != summary.batches_pooled as u64 {
        fail(
            "service",
            format!(
                "{} batches pooled but {} items served",
                summary.batches_pooled, summary.items_served
            ),
        );
    }

    let mut served = std::collections::HashSet::new();
    let mut displaying = false;
    for event in events {
        match event {
            RunEvent::ItemServed { component, .. } => {
                if displaying {
                    fail("single active item", format!("{component} served while another item was displayed"));
                }
                if !served.insert(component.clone()) {
                    fail("no duplicate service", format!("{component} served twice"));
                }
                displaying = true;
            }
            RunEvent::Answered { .. } => displaying = false,
            _ => {}
        }
    }

    let solved = events.iter().filter(|e| matches!(e, RunEvent::Solved)).count();
    if summary.is_solved() && solved != 1 {
        fail("termination", format!("solved recorded {solved} times"));
    }
    if summary.is_solved() && summary.penalties != summary.items_served - summary.correct {
        fail(
            "penalties",
            format!(
                "{} penalties for {} wrong answers",
                summary.penalties,
                summary.items_served - summary.correct
            ),
        );
    }

    violations
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn default_simulation_passes() {
        let report = run_simulator(SimulatorConfig::default()).await.unwrap();
        assert!(report.passed(), "{}", report.generate_text());
        assert_eq!(report.summary.items_served, 9);
        assert_eq!(report.finished_declarations, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn json_report_round_trips_through_serde_json() {
        let config = SimulatorConfig {
            components: 3,
            faulty: 0,
            ..Default::default()
        };
        let report = run_simulator(config).await.unwrap();
        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["summary"]["outcome"], "solved");
        assert_eq!(json["seed"], 42);
    }

    #[tokio::test]
    async fn invalid_observer_config_is_rejected() {
        let config = SimulatorConfig {
            observer: ObserverConfig::new().with_fairness_floor(0),
            ..Default::default()
        };
        assert!(run_simulator(config).await.is_err());
    }
}
