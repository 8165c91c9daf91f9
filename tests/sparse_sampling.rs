use std::sync::{Arc, Mutex};

use mdp_planning::{
    GreedyQPolicy, Policy, QProvider, SimpleHashingFactory, SparseSampling, SparseSamplingConfig,
    ValueIteration, ValueIterationConfig, observers::MetricsObserver,
};

mod common;

use common::{Bandit, Chain, Lever, Step, approx_eq_tol};

fn exact(chain: Chain, height: usize) -> SparseSampling<Chain, SimpleHashingFactory> {
    let config = SparseSamplingConfig::exact(0.9, height);
    SparseSampling::new(chain, SimpleHashingFactory, config).unwrap()
}

#[test]
fn exact_mode_reproduces_the_optimal_chain_values() {
    let chain = Chain::new(2);
    let mut ss = exact(chain, 3);
    for state in 0..=2 {
        let value = ss.value(&state).unwrap();
        assert!(
            approx_eq_tol(value, chain.optimal_value(state, 0.9), 1e-9),
            "state {state}: {value}"
        );
    }
}

#[test]
fn exact_mode_agrees_with_value_iteration() {
    let chain = Chain::new(4);
    let config = ValueIterationConfig::new(0.9, 1e-12, 1_000);
    let mut vi = ValueIteration::new(chain, SimpleHashingFactory, config).unwrap();
    vi.plan_from(&0).unwrap();
    let mut ss = exact(chain, 6);
    let ss_qs = ss.q_values(&0).unwrap();
    let vi_qs = vi.q_values(&0).unwrap();
    for (a, b) in ss_qs.iter().zip(&vi_qs) {
        assert_eq!(a.action, b.action);
        assert!(approx_eq_tol(a.q, b.q, 1e-9));
    }
}

#[test]
fn terminal_states_ignore_the_leaf_heuristic() {
    let mut ss = exact(Chain::new(2), 0).with_leaf_value(|_: &u32| 100.0);
    assert_eq!(ss.value(&2).unwrap(), 0.0);
    assert_eq!(ss.value(&0).unwrap(), 100.0);
}

#[test]
fn sampled_mode_estimates_bandit_payouts() {
    let config = SparseSamplingConfig::new(0.9, 1, 3_000).with_seed(8);
    let mut ss = SparseSampling::new(Bandit::new(0.8, 0.2), SimpleHashingFactory, config).unwrap();
    assert!(approx_eq_tol(ss.q_value(&0, &Lever::Good).unwrap(), 0.8, 0.05));
    assert!(approx_eq_tol(ss.q_value(&0, &Lever::Bad).unwrap(), 0.2, 0.05));

    let mut greedy = GreedyQPolicy::new(&mut ss).with_seed(1);
    assert_eq!(greedy.action(&0).unwrap(), Lever::Good);
}

#[test]
fn reset_is_idempotent() {
    let config = SparseSamplingConfig::new(0.9, 2, 4).with_seed(99);
    let build = || {
        SparseSampling::new(Bandit::new(0.6, 0.5), SimpleHashingFactory, config.clone()).unwrap()
    };

    let mut planner = build();
    let first = planner.q_values(&0).unwrap();
    planner.reset();
    let after_reset = planner.q_values(&0).unwrap();
    let fresh = build().q_values(&0).unwrap();
    assert_eq!(first, after_reset);
    assert_eq!(after_reset, fresh);
}

#[test]
fn remembered_roots_are_not_replanned() {
    let metrics = Arc::new(Mutex::new(MetricsObserver::new()));
    let mut ss = exact(Chain::new(3), 4).with_observer(Arc::clone(&metrics));
    ss.q_values(&0).unwrap();
    ss.q_values(&0).unwrap();
    ss.q_value(&0, &Step::Forward).unwrap();
    let summary = metrics.lock().unwrap().summary();
    assert_eq!(summary.planning_calls, 1);
    assert_eq!(summary.value_estimates, ss.value_estimates());
}

#[test]
fn epsilon_optimal_settings_replace_height_and_samples() {
    let mut ss = exact(Chain::new(2), 1);
    let hc = ss.set_h_and_c_by_error(1.0, 0.5, 2).unwrap();
    assert_eq!(ss.height(), hc.height);
    assert_eq!(ss.samples(), hc.samples.max(1));
    assert!(hc.height > 1);
}
