//! Observer port - abstraction for planning progress and debug events
//!
//! Planners report what they are doing through this port without coupling
//! the search to a particular logger, progress bar or metrics sink. Every
//! planner defaults to [`crate::observers::NoopObserver`].

use std::sync::{Arc, Mutex, PoisonError};

use crate::Result;

/// Snapshot of a UCT search tree after a rollout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TreeStats {
    /// Distinct hashed states seen anywhere in the tree
    pub unique_states: usize,
    /// State nodes in the tree
    pub tree_size: usize,
    /// States passed through by all rollouts so far, counting the terminal or
    /// horizon state each rollout stops at
    pub total_visits: usize,
}

/// Observer trait for monitoring planning
///
/// # Event Sequence
///
/// 1. `on_planning_start(planner, budget)` - once per planning call
/// 2. Planner-specific events:
///    - dynamic programming: `on_reachability`, then `on_sweep` per pass
///    - UCT: `on_rollout` per rollout, `on_goal_found` if the goal test fires
///    - Sparse Sampling: `on_value_estimates` once the tree is evaluated
/// 3. `on_planning_end()` - once per planning call
///
/// # Examples
///
/// ```
/// use mdp_planning::ports::PlanningObserver;
///
/// struct SweepCounter {
///     sweeps: usize,
/// }
///
/// impl PlanningObserver for SweepCounter {
///     fn on_sweep(&mut self, _iteration: usize, _delta: f64) -> mdp_planning::Result<()> {
///         self.sweeps += 1;
///         Ok(())
///     }
/// }
/// ```
pub trait PlanningObserver: Send {
    /// Called when a planning call starts.
    ///
    /// `budget` is the iteration cap, rollout count or tree height,
    /// depending on the planner.
    fn on_planning_start(&mut self, _planner: &str, _budget: usize) -> Result<()> {
        Ok(())
    }

    /// Called after a reachability pass with the total number of discovered states.
    fn on_reachability(&mut self, _states_discovered: usize) -> Result<()> {
        Ok(())
    }

    /// Called after each full sweep with the largest value change in that sweep.
    fn on_sweep(&mut self, _iteration: usize, _delta: f64) -> Result<()> {
        Ok(())
    }

    /// Called after each UCT rollout (1-based).
    fn on_rollout(&mut self, _rollout: usize, _stats: &TreeStats) -> Result<()> {
        Ok(())
    }

    /// Called when the goal condition stopped a UCT search early.
    fn on_goal_found(&mut self, _rollout: usize) -> Result<()> {
        Ok(())
    }

    /// Called with the running number of Sparse Sampling value estimates.
    fn on_value_estimates(&mut self, _estimates: usize) -> Result<()> {
        Ok(())
    }

    /// Called when a planning call completes.
    fn on_planning_end(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Shared observers stay inspectable after being handed to a planner.
impl<O: PlanningObserver + ?Sized> PlanningObserver for Arc<Mutex<O>> {
    fn on_planning_start(&mut self, planner: &str, budget: usize) -> Result<()> {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .on_planning_start(planner, budget)
    }

    fn on_reachability(&mut self, states_discovered: usize) -> Result<()> {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .on_reachability(states_discovered)
    }

    fn on_sweep(&mut self, iteration: usize, delta: f64) -> Result<()> {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .on_sweep(iteration, delta)
    }

    fn on_rollout(&mut self, rollout: usize, stats: &TreeStats) -> Result<()> {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .on_rollout(rollout, stats)
    }

    fn on_goal_found(&mut self, rollout: usize) -> Result<()> {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .on_goal_found(rollout)
    }

    fn on_value_estimates(&mut self, estimates: usize) -> Result<()> {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .on_value_estimates(estimates)
    }

    fn on_planning_end(&mut self) -> Result<()> {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .on_planning_end()
    }
}
