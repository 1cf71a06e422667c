//! End-to-end runs of the certify / project / fall back pipeline

use partopt_core::execution::run_certification;
use partopt_core::{
    Connectivity, EnergyError, EnergyModel, FallbackKind, GraphStrategy, GridGraph, NodeState,
    Orchestrator, Outcome, PottsEdge, SolverConfig,
};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn run(model: &EnergyModel, config: SolverConfig) -> Outcome {
    Orchestrator::new(config).unwrap().run(model).unwrap()
}

fn three_by_one() -> EnergyModel {
    EnergyModel::from_rows(
        &[vec![0.0, 5.0], vec![2.0, 2.0], vec![5.0, 0.0]],
        vec![PottsEdge::new(0, 1, 1.0), PottsEdge::new(1, 2, 1.0)],
    )
    .unwrap()
}

/// Noisy two-region strip on a small 8-connected grid
fn noisy_grid() -> EnergyModel {
    let grid = GridGraph::new(5, 4, Connectivity::Eight).unwrap();
    let intensities = [
        10.0, 20.0, 200.0, 240.0, 250.0, //
        15.0, 120.0, 130.0, 230.0, 245.0, //
        5.0, 25.0, 90.0, 160.0, 235.0, //
        0.0, 30.0, 210.0, 220.0, 255.0,
    ];
    let means = [0.0, 127.5, 255.0];
    let rows: Vec<Vec<f64>> = intensities
        .iter()
        .map(|&i: &f64| means.iter().map(|&m: &f64| (i - m).abs()).collect())
        .collect();
    EnergyModel::from_rows(&rows, grid.edges_with(|_, _| 20.0)).unwrap()
}

#[test]
fn three_by_one_leaves_middle_node_open() {
    init_logger();
    for strategy in [GraphStrategy::PerLabel, GraphStrategy::Shared] {
        let outcome = run(&three_by_one(), SolverConfig::default().with_strategy(strategy));

        assert_eq!(outcome.labeling.state(0), NodeState::Certified(0));
        assert_eq!(outcome.labeling.state(1), NodeState::Unassigned);
        assert_eq!(outcome.labeling.state(2), NodeState::Certified(1));
        assert_eq!(outcome.residual_nodes, 1);
        assert_eq!(outcome.residual_edges, 0);
        assert_eq!(
            outcome.complete(),
            Err(EnergyError::IncompleteLabeling { unresolved: 1 })
        );
    }
}

#[test]
fn disconnected_nodes_certify_to_argmin() {
    init_logger();
    let model = EnergyModel::from_rows(
        &[
            vec![3.0, 1.0, 2.0],
            vec![0.0, 4.0, 4.0],
            vec![2.0, 2.0, 1.5],
            vec![9.0, 0.5, 7.0],
        ],
        vec![],
    )
    .unwrap();
    let config = SolverConfig::default().with_fallback(FallbackKind::AlphaExpansion);
    let outcome = run(&model, config);

    assert!(outcome.fallback.is_none());
    assert_eq!(outcome.residual_nodes, 0);
    for (node, label) in model.argmin_labels().into_iter().enumerate() {
        assert_eq!(outcome.labeling.state(node), NodeState::Certified(label));
    }
    assert_eq!(outcome.energy, Some(1.0 + 0.0 + 1.5 + 0.5));
}

#[test]
fn fallback_completes_without_overwriting_certified_nodes() {
    init_logger();
    let model = noisy_grid();
    let partial = run(&model, SolverConfig::default());

    for fallback in [FallbackKind::AlphaExpansion, FallbackKind::TrwBp] {
        let outcome = run(&model, SolverConfig::default().with_fallback(fallback));
        let labels = outcome.complete().unwrap();

        assert_eq!(labels.len(), model.num_nodes());
        for (node, label) in partial.labeling.certified_nodes() {
            assert_eq!(outcome.labeling.state(node), NodeState::Certified(label));
        }
        let energy = outcome.energy.unwrap();
        assert!((model.energy(&labels).unwrap() - energy).abs() < 1e-9);
    }
}

#[test]
fn fallback_only_run_labels_whole_grid() {
    init_logger();
    let model = noisy_grid();
    let config = SolverConfig::default()
        .with_fallback(FallbackKind::TrwBp)
        .without_certification();
    let outcome = run(&model, config);

    assert_eq!(outcome.certified_count(), 0);
    assert!(outcome.rounds.is_empty());
    assert_eq!(outcome.residual_nodes, model.num_nodes());
    assert_eq!(outcome.complete().unwrap().len(), model.num_nodes());
    let fallback = outcome.fallback.unwrap();
    assert_eq!(fallback.live_nodes, model.num_nodes());
    assert!(fallback.lower_bound.unwrap() <= outcome.energy.unwrap() + 1e-9);
}

#[test]
fn strategies_agree_on_grid() {
    init_logger();
    let model = noisy_grid();
    let per_label = SolverConfig::default().with_strategy(GraphStrategy::PerLabel);
    let shared = SolverConfig::default().with_strategy(GraphStrategy::Shared);
    let fresh = run_certification(&model, per_label).unwrap();
    let shared = run_certification(&model, shared).unwrap();

    assert_eq!(fresh.labeling, shared.labeling);
    assert_eq!(fresh.model, shared.model);
    assert_eq!(fresh.rounds.len(), shared.rounds.len());
    for (a, b) in fresh.rounds.iter().zip(&shared.rounds) {
        assert_eq!(a.newly_certified, b.newly_certified);
        assert!((a.cut_value - b.cut_value).abs() < 1e-9);
    }
}

#[test]
fn live_nodes_shrink_monotonically() {
    init_logger();
    let outcome = run(&noisy_grid(), SolverConfig::default());

    let mut certified_so_far = 0;
    for round in &outcome.rounds {
        assert!(round.live_nodes_after <= round.live_nodes_before);
        assert_eq!(
            round.live_nodes_before - round.live_nodes_after,
            round.newly_certified
        );
        assert!(round.live_edges_after <= round.live_edges_before);
        certified_so_far += round.newly_certified;
    }
    assert_eq!(certified_so_far, outcome.certified_count());
    assert_eq!(outcome.residual_nodes, 20 - certified_so_far);
}

#[test]
fn invalid_model_is_rejected_before_any_work() {
    let rows = [vec![0.0, 1.0], vec![1.0, 0.0]];
    let negative = EnergyModel::from_rows(&rows, vec![PottsEdge::new(0, 1, -1.0)]);
    assert!(matches!(negative, Err(EnergyError::InvalidModel(_))));

    let ragged = EnergyModel::from_rows(&[vec![0.0, 1.0], vec![1.0]], vec![]);
    assert!(matches!(ragged, Err(EnergyError::InvalidModel(_))));
}
