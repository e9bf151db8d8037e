//! population-load simulator
//!
//! Models how pipeline infrastructure copes as the served population grows.
//! `SimulationState::step` advances one simulated second; the server drives
//! it from a 1s ticker while the simulation is running.

use rand::Rng;
use serde::Serialize;
use std::collections::VecDeque;

use crate::domain::HealthStatus;

pub const MIN_POPULATION: f64 = 1.0;
pub const MAX_POPULATION: f64 = 20.0;
pub const DEFAULT_POPULATION: f64 = 5.0;
/// points kept per chart
pub const HISTORY_LEN: usize = 20;
/// population above which the system is considered unstable, billions
pub const STABILITY_THRESHOLD: f64 = 15.0;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SimulationError {
    #[error("population {0}B is outside 1B..=20B")]
    PopulationOutOfRange(f64),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub name: String,
    pub value: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ResourceAllocation {
    pub label: &'static str,
    pub value: f64,
    pub unit: &'static str,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct InfrastructureUsage {
    pub label: &'static str,
    pub current: f64,
    pub max: f64,
    pub unit: &'static str,
    pub percentage: f64,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationState {
    running: bool,
    population: f64,
    elapsed_secs: u64,
    system_load: f64,
    resource_consumption: VecDeque<SeriesPoint>,
    performance: VecDeque<SeriesPoint>,
}

/// everything the simulation view renders
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationSnapshot {
    pub running: bool,
    pub population: f64,
    pub elapsed_secs: u64,
    pub system_load: f64,
    pub load_status: HealthStatus,
    pub load_message: &'static str,
    pub resource_consumption: Vec<SeriesPoint>,
    pub performance: Vec<SeriesPoint>,
    pub resources: Vec<ResourceAllocation>,
    pub infrastructure: Vec<InfrastructureUsage>,
    pub depletion_risk_percent: f64,
    pub scaling_capacity: HealthStatus,
    pub beyond_stability_threshold: bool,
}

fn push_bounded(series: &mut VecDeque<SeriesPoint>, point: SeriesPoint) {
    if series.len() >= HISTORY_LEN {
        series.pop_front();
    }
    series.push_back(point);
}

impl SimulationState {
    pub fn new() -> Self {
        Self {
            running: false,
            population: DEFAULT_POPULATION,
            elapsed_secs: 0,
            system_load: 0.0,
            resource_consumption: VecDeque::with_capacity(HISTORY_LEN),
            performance: VecDeque::with_capacity(HISTORY_LEN),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn population(&self) -> f64 {
        self.population
    }

    pub fn elapsed_secs(&self) -> u64 {
        self.elapsed_secs
    }

    pub fn system_load(&self) -> f64 {
        self.system_load
    }

    /// flip running/paused, returns the new running flag
    pub fn toggle(&mut self) -> bool {
        self.running = !self.running;
        self.running
    }

    /// stop and clear everything except the chosen population
    pub fn reset(&mut self) {
        self.running = false;
        self.elapsed_secs = 0;
        self.system_load = 0.0;
        self.resource_consumption.clear();
        self.performance.clear();
    }

    pub fn set_population(&mut self, billions: f64) -> Result<(), SimulationError> {
        if !(MIN_POPULATION..=MAX_POPULATION).contains(&billions) {
            return Err(SimulationError::PopulationOutOfRange(billions));
        }
        self.population = billions;
        Ok(())
    }

    /// advance one simulated second
    pub fn step<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let t = self.elapsed_secs;
        let label = format!("{}s", t);

        let variance = (t as f64 / 10.0).sin() * 3.0;
        self.system_load = (self.population * 5.0 + variance).clamp(0.0, 100.0);

        let consumption = self.population * 10.0 + rng.gen_range(-2.5..2.5);
        push_bounded(&mut self.resource_consumption, SeriesPoint { name: label.clone(), value: consumption });

        let efficiency =
            (95.0 - (self.population / 20.0) * 10.0 + rng.gen_range(-1.0..1.0)).max(70.0);
        push_bounded(&mut self.performance, SeriesPoint { name: label, value: efficiency });

        self.elapsed_secs = t + 1;
    }

    pub fn load_status(&self) -> (HealthStatus, &'static str) {
        if self.system_load < 50.0 {
            (HealthStatus::Normal, "System load normal")
        } else if self.system_load < 80.0 {
            (HealthStatus::Warning, "System load elevated")
        } else {
            (HealthStatus::Critical, "System load critical")
        }
    }

    pub fn scaling_capacity(&self) -> HealthStatus {
        if self.population > 18.0 {
            HealthStatus::Critical
        } else if self.population > 12.0 {
            HealthStatus::Warning
        } else {
            HealthStatus::Normal
        }
    }

    pub fn resources(&self) -> Vec<ResourceAllocation> {
        let p = self.population;
        vec![
            ResourceAllocation { label: "Petroleum", value: (p * 5.0).round(), unit: "M barrels/day" },
            ResourceAllocation { label: "Infrastructure", value: (p * 3.0).round(), unit: "K nodes" },
            ResourceAllocation { label: "Processing", value: (p * 7.0).round(), unit: "PFlops" },
            ResourceAllocation { label: "Storage", value: (p * 10.0).round(), unit: "PB" },
        ]
    }

    pub fn infrastructure(&self) -> Vec<InfrastructureUsage> {
        let p = self.population;
        [
            ("Server Clusters", p * 1500.0, 40000.0, ""),
            ("Distribution Nodes", p * 800.0, 20000.0, ""),
            ("Network Bandwidth", p * 25.0, 600.0, "Tbps"),
            ("Storage Capacity", p * 50.0, 1200.0, "PB"),
        ]
        .into_iter()
        .map(|(label, current, max, unit)| {
            let current = current.round();
            InfrastructureUsage { label, current, max, unit, percentage: current / max * 100.0 }
        })
        .collect()
    }

    pub fn snapshot(&self) -> SimulationSnapshot {
        let (load_status, load_message) = self.load_status();
        SimulationSnapshot {
            running: self.running,
            population: self.population,
            elapsed_secs: self.elapsed_secs,
            system_load: self.system_load,
            load_status,
            load_message,
            resource_consumption: self.resource_consumption.iter().cloned().collect(),
            performance: self.performance.iter().cloned().collect(),
            resources: self.resources(),
            infrastructure: self.infrastructure(),
            depletion_risk_percent: (self.population / MAX_POPULATION * 100.0).round(),
            scaling_capacity: self.scaling_capacity(),
            beyond_stability_threshold: self.population > STABILITY_THRESHOLD,
        }
    }
}

impl Default for SimulationState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_initial_state() {
        let sim = SimulationState::new();
        assert!(!sim.is_running());
        assert_eq!(sim.population(), DEFAULT_POPULATION);
        assert_eq!(sim.load_status().0, HealthStatus::Normal);
        assert!(sim.snapshot().resource_consumption.is_empty());
    }

    #[test]
    fn test_step_load_and_history_bounds() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut sim = SimulationState::new();
        sim.set_population(20.0).unwrap();
        for _ in 0..45 {
            sim.step(&mut rng);
            assert!((0.0..=100.0).contains(&sim.system_load()));
        }
        let snap = sim.snapshot();
        assert_eq!(snap.elapsed_secs, 45);
        assert_eq!(snap.resource_consumption.len(), HISTORY_LEN);
        assert_eq!(snap.performance.len(), HISTORY_LEN);
        assert_eq!(snap.resource_consumption.first().map(|p| p.name.as_str()), Some("25s"));
        assert_eq!(snap.resource_consumption.last().map(|p| p.name.as_str()), Some("44s"));
        assert_eq!(snap.load_status, HealthStatus::Critical);
        assert!(snap.performance.iter().all(|p| p.value >= 70.0));
    }

    #[test]
    fn test_first_step_values() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut sim = SimulationState::new();
        sim.step(&mut rng);
        // sin(0) == 0, so the first load is exactly population * 5
        assert_eq!(sim.system_load(), 25.0);
        let snap = sim.snapshot();
        let consumption = snap.resource_consumption[0].value;
        assert!((47.5..52.5).contains(&consumption));
    }

    #[test]
    fn test_population_bounds_and_derived_values() {
        let mut sim = SimulationState::new();
        assert!(sim.set_population(0.5).is_err());
        assert!(sim.set_population(20.5).is_err());
        assert_eq!(sim.population(), DEFAULT_POPULATION);

        sim.set_population(13.0).unwrap();
        assert_eq!(sim.scaling_capacity(), HealthStatus::Warning);
        sim.set_population(18.5).unwrap();
        assert_eq!(sim.scaling_capacity(), HealthStatus::Critical);
        assert!(sim.snapshot().beyond_stability_threshold);

        sim.set_population(10.0).unwrap();
        let infra = sim.infrastructure();
        assert_eq!(infra[0].current, 15000.0);
        assert_eq!(infra[0].percentage, 37.5);
        assert_eq!(sim.resources()[0].value, 50.0);
        assert_eq!(sim.snapshot().depletion_risk_percent, 50.0);
    }

    #[test]
    fn test_toggle_and_reset() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut sim = SimulationState::new();
        assert!(sim.toggle());
        sim.step(&mut rng);
        sim.step(&mut rng);
        sim.reset();
        assert!(!sim.is_running());
        assert_eq!(sim.elapsed_secs(), 0);
        assert_eq!(sim.system_load(), 0.0);
        assert!(sim.snapshot().performance.is_empty());
        assert!(sim.toggle());
    }
}
