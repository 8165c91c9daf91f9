//! Observer adapters for planning runs
//!
//! Observers allow composable progress reporting during planning without
//! coupling the search code to a particular output.

use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::{
    Result,
    ports::{PlanningObserver, TreeStats},
};

/// Observer that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl PlanningObserver for NoopObserver {}

/// Forwards planning events to the `log` facade.
#[derive(Debug, Clone, Default)]
pub struct LogObserver {
    planner: String,
}

impl LogObserver {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PlanningObserver for LogObserver {
    fn on_planning_start(&mut self, planner: &str, budget: usize) -> Result<()> {
        self.planner = planner.to_string();
        info!("{planner}: planning started (budget {budget})");
        Ok(())
    }

    fn on_reachability(&mut self, states_discovered: usize) -> Result<()> {
        info!("{}: {states_discovered} reachable states", self.planner);
        Ok(())
    }

    fn on_sweep(&mut self, iteration: usize, delta: f64) -> Result<()> {
        debug!("{}: sweep {iteration}, delta {delta:.6}", self.planner);
        Ok(())
    }

    fn on_rollout(&mut self, rollout: usize, stats: &TreeStats) -> Result<()> {
        debug!(
            "{}: rollout {rollout}, {} nodes, {} unique states",
            self.planner, stats.tree_size, stats.unique_states
        );
        Ok(())
    }

    fn on_goal_found(&mut self, rollout: usize) -> Result<()> {
        info!("{}: goal found on rollout {rollout}", self.planner);
        Ok(())
    }

    fn on_value_estimates(&mut self, estimates: usize) -> Result<()> {
        info!("{}: {estimates} value estimates", self.planner);
        Ok(())
    }

    fn on_planning_end(&mut self) -> Result<()> {
        info!("{}: planning finished", self.planner);
        Ok(())
    }
}

/// Progress bar observer - shows sweep or rollout progress
pub struct ProgressObserver {
    progress_bar: Option<ProgressBar>,
    planner: String,
}

impl ProgressObserver {
    /// Create a new progress observer
    pub fn new() -> Self {
        Self {
            progress_bar: None,
            planner: String::new(),
        }
    }

    fn advance_to(&self, position: usize, message: String) {
        if let Some(pb) = &self.progress_bar {
            pb.set_position(position as u64);
            pb.set_message(message);
        }
    }
}

impl Default for ProgressObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl PlanningObserver for ProgressObserver {
    fn on_planning_start(&mut self, planner: &str, budget: usize) -> Result<()> {
        let pb = ProgressBar::new(budget as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {prefix} {bar:40.cyan/blue} {pos}/{len} ({msg})")
                .map_err(|e| crate::Error::ProgressBarTemplate {
                    message: e.to_string(),
                })?
                .progress_chars("=>-"),
        );
        pb.set_prefix(planner.to_string());
        self.planner = planner.to_string();
        self.progress_bar = Some(pb);
        Ok(())
    }

    fn on_sweep(&mut self, iteration: usize, delta: f64) -> Result<()> {
        self.advance_to(iteration, format!("delta {delta:.3e}"));
        Ok(())
    }

    fn on_rollout(&mut self, rollout: usize, stats: &TreeStats) -> Result<()> {
        self.advance_to(rollout, format!("{} nodes", stats.tree_size));
        Ok(())
    }

    fn on_planning_end(&mut self) -> Result<()> {
        if let Some(pb) = self.progress_bar.take() {
            pb.finish_with_message(format!("{} done", self.planner));
        }
        Ok(())
    }
}

/// Metrics observer - counts planning events
#[derive(Debug, Clone, Default)]
pub struct MetricsObserver {
    planning_calls: usize,
    sweeps: usize,
    rollouts: usize,
    goals_found: usize,
    states_discovered: usize,
    value_estimates: usize,
    last_delta: Option<f64>,
    last_tree: TreeStats,
}

impl MetricsObserver {
    /// Create a new metrics observer
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sweeps(&self) -> usize {
        self.sweeps
    }

    pub fn rollouts(&self) -> usize {
        self.rollouts
    }

    pub fn last_delta(&self) -> Option<f64> {
        self.last_delta
    }

    /// Get metrics summary
    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            planning_calls: self.planning_calls,
            sweeps: self.sweeps,
            rollouts: self.rollouts,
            goals_found: self.goals_found,
            states_discovered: self.states_discovered,
            value_estimates: self.value_estimates,
            last_delta: self.last_delta,
            tree_size: self.last_tree.tree_size,
            unique_states: self.last_tree.unique_states,
        }
    }
}

/// Summary of planning metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub planning_calls: usize,
    pub sweeps: usize,
    pub rollouts: usize,
    pub goals_found: usize,
    pub states_discovered: usize,
    pub value_estimates: usize,
    pub last_delta: Option<f64>,
    pub tree_size: usize,
    pub unique_states: usize,
}

impl PlanningObserver for MetricsObserver {
    fn on_planning_start(&mut self, _planner: &str, _budget: usize) -> Result<()> {
        self.planning_calls += 1;
        Ok(())
    }

    fn on_reachability(&mut self, states_discovered: usize) -> Result<()> {
        self.states_discovered = states_discovered;
        Ok(())
    }

    fn on_sweep(&mut self, _iteration: usize, delta: f64) -> Result<()> {
        self.sweeps += 1;
        self.last_delta = Some(delta);
        Ok(())
    }

    fn on_rollout(&mut self, _rollout: usize, stats: &TreeStats) -> Result<()> {
        self.rollouts += 1;
        self.last_tree = *stats;
        Ok(())
    }

    fn on_goal_found(&mut self, _rollout: usize) -> Result<()> {
        self.goals_found += 1;
        Ok(())
    }

    fn on_value_estimates(&mut self, estimates: usize) -> Result<()> {
        self.value_estimates = estimates;
        Ok(())
    }
}
