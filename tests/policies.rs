use mdp_planning::{
    EpsilonGreedy, Error, GreedyQPolicy, Policy, PolicyEvaluation, PolicyIteration,
    PolicyIterationConfig, RandomPolicy, SimpleHashingFactory, ValueIteration, ValueIterationConfig,
    policy::action_prob_in,
};

mod common;

use common::{Bandit, Chain, Lever, Step, approx_eq_tol};

fn solved_chain() -> ValueIteration<Chain, SimpleHashingFactory> {
    let config = ValueIterationConfig::new(0.9, 1e-12, 500);
    let mut vi = ValueIteration::new(Chain::new(4), SimpleHashingFactory, config).unwrap();
    vi.plan_from(&0).unwrap();
    vi
}

#[test]
fn greedy_policy_walks_down_the_chain() {
    let mut greedy = GreedyQPolicy::new(solved_chain()).with_seed(5);
    for state in 0..4 {
        assert_eq!(greedy.action(&state).unwrap(), Step::Forward);
        let dist = greedy.policy_distribution(&state).unwrap();
        assert_eq!(action_prob_in(&dist, &Step::Forward), 1.0);
        assert_eq!(action_prob_in(&dist, &Step::Stay), 0.0);
    }
    assert!(!greedy.is_defined_for(&4));
    assert!(matches!(greedy.action(&4), Err(Error::PolicyUndefined { .. })));
}

#[test]
fn epsilon_greedy_mixes_in_uniform_exploration() {
    let mut policy = EpsilonGreedy::new(solved_chain(), 0.2).unwrap().with_seed(17);
    let dist = policy.policy_distribution(&0).unwrap();
    assert!(approx_eq_tol(action_prob_in(&dist, &Step::Forward), 0.9, 1e-12));
    assert!(approx_eq_tol(action_prob_in(&dist, &Step::Stay), 0.1, 1e-12));

    let draws = 4_000;
    let forward = (0..draws)
        .filter(|_| policy.action(&0).unwrap() == Step::Forward)
        .count();
    assert!(approx_eq_tol(forward as f64 / draws as f64, 0.9, 0.03));
}

#[test]
fn epsilon_outside_the_unit_interval_is_rejected() {
    assert!(matches!(
        EpsilonGreedy::new(solved_chain(), 1.5),
        Err(Error::InvalidConfiguration { .. })
    ));
}

#[test]
fn random_policy_is_evaluated_exactly() {
    let bandit = Bandit::new(0.7, 0.3);
    let mut evaluation = PolicyEvaluation::new(
        bandit,
        SimpleHashingFactory,
        PolicyIterationConfig::new(0.9, 1e-10, 100, 10),
    )
    .unwrap();
    let mut random = RandomPolicy::new(bandit).with_seed(2);
    evaluation.evaluate_policy_from(&mut random, &0).unwrap();
    assert!(approx_eq_tol(evaluation.value(&0), 0.5, 1e-12));
    assert_eq!(evaluation.value(&1), 0.0);

    let dist = random.policy_distribution(&0).unwrap();
    assert_eq!(action_prob_in(&dist, &Lever::Good), 0.5);
    assert!(!random.is_defined_for(&1));
}

#[test]
fn policy_iteration_acts_with_its_computed_policy() {
    let mut pi = PolicyIteration::new(
        Bandit::new(0.2, 0.6),
        SimpleHashingFactory,
        PolicyIterationConfig::new(0.9, 1e-10, 100, 10),
    )
    .unwrap();
    pi.plan_from(&0).unwrap();
    assert_eq!(pi.action(&0).unwrap(), Lever::Bad);
    assert!(approx_eq_tol(pi.value(&0), 0.6, 1e-9));
    assert!(matches!(pi.action(&1), Err(Error::PolicyUndefined { .. })));
}
