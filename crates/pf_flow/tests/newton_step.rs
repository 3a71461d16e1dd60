// crates/pf_flow/tests/newton_step.rs

//! Newton 步端到端测试
//!
//! # 测试覆盖
//!
//! - 单相两单元可压缩流动：收敛、质量守恒、压力趋于一致
//! - 两相三单元：每相质量守恒、饱和度和为 1
//! - 幽灵邻居：只在拥有自由度上求解，幽灵压力保持不变
//! - 越界回退：单元检查（含 NaN）、全局否决、回退用尽后恢复步初状态
//! - 线性求解失败不重试
//! - 诊断级别 3 写出 Matrix Market 文件

use pf_flow::comm::Communicator;
use pf_flow::newton::check_bounds;
use pf_flow::numerics::linear_algebra::{CsrMatrix, SolverResult, SolverStatus};
use pf_flow::prelude::*;
use pf_flow::{LinearSolve, NewtonState, NonConvergence};

// ============================================================================
// 测试辅助函数
// ============================================================================

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn single_phase_updater() -> PhaseStateUpdater {
    let fluid = CompressibleFluid::new(
        vec![PhaseFluidProps::incompressible("water", 1000.0, 1e-3).with_compressibility(1e-9)],
        1e5,
    );
    let relperm = BrooksCoreyRelPerm::new(vec![BrooksCoreyPhase::new("water", 0.0, 1.0)]);
    PhaseStateUpdater::new(
        Box::new(fluid),
        Box::new(relperm),
        Box::new(PoreCompressibility::new(1e5, 1e-10)),
        &names(&["water", "oil", "gas"]),
    )
    .unwrap()
}

fn two_phase_updater() -> PhaseStateUpdater {
    let fluid = CompressibleFluid::new(
        vec![
            PhaseFluidProps::incompressible("water", 1000.0, 1e-3).with_compressibility(1e-9),
            PhaseFluidProps::incompressible("oil", 800.0, 2e-3).with_compressibility(1e-9),
        ],
        1e5,
    );
    let relperm = BrooksCoreyRelPerm::new(vec![
        BrooksCoreyPhase::new("oil", 0.0, 2.0),
        BrooksCoreyPhase::new("water", 0.0, 2.0),
    ]);
    PhaseStateUpdater::new(
        Box::new(fluid),
        Box::new(relperm),
        Box::new(PoreCompressibility::rigid()),
        &names(&["water", "oil", "gas"]),
    )
    .unwrap()
}

/// 一维单元链
fn chain(pressures: &[f64], np: usize, transmissibility: f64) -> (FlowDomain, ConnectionSet) {
    let n = pressures.len();
    let mut sub = SubRegion::new(n, np);
    sub.pressure = pressures.to_vec();
    if np == 2 {
        for i in 0..n {
            sub.set_saturation(i, &[0.5, 0.5]).unwrap();
        }
    }
    let domain = FlowDomain::new(np, vec![Region::new("rock", vec![sub])]).unwrap();
    let conns: Vec<Connection> = (0..n - 1)
        .map(|i| Connection::two_point(CellKey::new(0, 0, i), CellKey::new(0, 0, i + 1), transmissibility))
        .collect();
    let list = ConnectionList::new(ConnectionKind::TwoPoint, conns, &domain).unwrap();
    (domain, ConnectionSet::matrix_only(list))
}

/// 每相总质量 Σ V φ ρ S
fn phase_masses(domain: &FlowDomain) -> Vec<f64> {
    let np = domain.num_phases();
    let mut mass = vec![0.0; np];
    for (_, _, sub) in domain.subregions() {
        for i in 0..sub.n_cells() {
            let pore = sub.volume[i] * sub.porosity_ref[i] * sub.pv_mult[i];
            for (ip, m) in mass.iter_mut().enumerate() {
                *m += pore * sub.density[i][ip] * sub.saturation[i][ip];
            }
        }
    }
    mass
}

fn controller(updater: PhaseStateUpdater, config: FlowConfig) -> NewtonStepController {
    NewtonStepController::new(config, updater).unwrap()
}

// ============================================================================
// 收敛
// ============================================================================

#[test]
fn test_single_phase_two_cells_converge() {
    let (mut domain, conns) = chain(&[1.0e7, 0.5e7], 1, 1e-12);
    let dofs = DofManager::number(&mut domain);
    let updater = single_phase_updater();
    updater.update(&mut domain);
    let before = phase_masses(&domain);

    let mut config = FlowConfig::default();
    config.newton.rtol = 1e-10;
    let mut newton = controller(updater, config);
    let mut coupling = CouplingAdapter::new();
    let report = newton.step(&mut domain, &conns, &dofs, &mut coupling, 0.0, 1e3).unwrap();

    assert!(report.outcome.is_converged(), "{report:?}");
    assert!(report.newton_iterations >= 1);
    assert_eq!(report.transitions.first(), Some(&NewtonState::StepSetup));
    assert_eq!(report.transitions.last(), Some(&NewtonState::StepComplete));

    let sub = &domain.regions[0].subregions[0];
    assert!(sub.pressure[0] < 1.0e7 && sub.pressure[1] > 0.5e7);
    assert!(sub.pressure[0] >= sub.pressure[1]);
    assert!(sub.delta_pressure.iter().all(|&d| d == 0.0));

    let after = phase_masses(&domain);
    assert!((after[0] - before[0]).abs() < 1e-6 * before[0]);
}

#[test]
fn test_uniform_state_converges_without_update() {
    let (mut domain, conns) = chain(&[2e6, 2e6, 2e6], 1, 1e-12);
    let dofs = DofManager::number(&mut domain);
    let mut newton = controller(single_phase_updater(), FlowConfig::default());
    let report = newton
        .step(&mut domain, &conns, &dofs, &mut CouplingAdapter::new(), 0.0, 10.0)
        .unwrap();
    assert_eq!(report.outcome, StepOutcome::Converged { iterations: 0 });
    assert_eq!(report.residual_history, vec![0.0]);
}

#[test]
fn test_ghost_neighbour_solves_on_owned_block() {
    let (mut domain, conns) = chain(&[1.0e7, 0.8e7, 0.5e7], 1, 1e-12);
    domain.regions[0].subregions[0].ghost_rank[2] = 1;
    let dofs = DofManager::number(&mut domain);
    assert_eq!(dofs.n_local_rows(), 2);
    assert_eq!(dofs.n_cols(), 3);
    let updater = single_phase_updater();
    updater.update(&mut domain);

    let mut config = FlowConfig::default();
    config.newton.rtol = 1e-10;
    let mut newton = controller(updater, config);
    let report = newton
        .step(&mut domain, &conns, &dofs, &mut CouplingAdapter::new(), 0.0, 1e3)
        .unwrap();

    assert!(report.outcome.is_converged(), "{report:?}");
    let sub = &domain.regions[0].subregions[0];
    assert_eq!(sub.pressure[2], 0.5e7);
    assert!(sub.pressure[0] < 1.0e7);
    assert!(sub.pressure[1] < 0.8e7 && sub.pressure[1] > 0.5e7);
}

#[test]
fn test_two_phase_chain_conserves_each_phase() {
    let (mut domain, conns) = chain(&[2.0e7, 1.5e7, 1.0e7], 2, 1e-13);
    let dofs = DofManager::number(&mut domain);
    let updater = two_phase_updater();
    updater.update(&mut domain);
    let before = phase_masses(&domain);

    let mut config = FlowConfig::default();
    config.newton.max_iterations = 25;
    config.newton.rtol = 1e-10;
    let mut newton = controller(updater, config);
    let report = newton
        .step(&mut domain, &conns, &dofs, &mut CouplingAdapter::new(), 0.0, 100.0)
        .unwrap();
    assert!(report.outcome.is_converged(), "{report:?}");

    let after = phase_masses(&domain);
    for ip in 0..2 {
        assert!((after[ip] - before[ip]).abs() < 1e-5 * before[ip]);
    }
    let sub = &domain.regions[0].subregions[0];
    for i in 0..3 {
        let total: f64 = sub.saturation[i][..2].iter().sum();
        assert!((total - 1.0).abs() < 1e-12);
        assert!(sub.saturation[i][0] >= 0.0 && sub.saturation[i][0] <= 1.0);
    }
    let history = &report.residual_history;
    assert!(history.last().unwrap() < &history[0]);
}

// ============================================================================
// 越界回退
// ============================================================================

#[test]
fn test_bounds_check_per_cell() {
    let (mut domain, _) = chain(&[1e5, 1e5], 2, 1e-13);
    let dofs = DofManager::number(&mut domain);

    // [Δp0, ΔS0, Δp1, ΔS1]
    assert!(check_bounds(&domain, &dofs, &[0.0, 0.4, 0.0, 0.0], 1.0));
    assert!(!check_bounds(&domain, &dofs, &[0.0, 0.6, 0.0, 0.0], 1.0));
    assert!(check_bounds(&domain, &dofs, &[0.0, 0.6, 0.0, 0.0], 0.5));
    assert!(!check_bounds(&domain, &dofs, &[0.0, 0.0, 0.0, -0.6], 1.0));
    assert!(!check_bounds(&domain, &dofs, &[-2e5, 0.0, 0.0, 0.0], 1.0));
    assert!(check_bounds(&domain, &dofs, &[-2e5, 0.0, 0.0, 0.0], 0.5));
}

#[test]
fn test_bounds_check_rejects_nan() {
    let (mut domain, _) = chain(&[1e5, 1e5], 2, 1e-13);
    let dofs = DofManager::number(&mut domain);
    assert!(!check_bounds(&domain, &dofs, &[f64::NAN, 0.0, 0.0, 0.0], 1.0));
    assert!(!check_bounds(&domain, &dofs, &[0.0, 0.0, 0.0, f64::NAN], 1.0));
}

/// 任意进程否决即全局否决
struct RejectingPeer;

impl Communicator for RejectingPeer {
    fn rank(&self) -> usize {
        0
    }
    fn size(&self) -> usize {
        2
    }
    fn min_i32(&self, local: i32) -> i32 {
        local.min(0)
    }
    fn sum_f64(&self, local: f64) -> f64 {
        local
    }
    fn synchronize_ghosts(&self, _domain: &mut FlowDomain) -> FlowResult<()> {
        Ok(())
    }
}

#[test]
fn test_global_rejection_exhausts_backtracking() {
    let (mut domain, conns) = chain(&[1.0e7, 0.5e7], 1, 1e-12);
    let dofs = DofManager::number(&mut domain);
    let config = FlowConfig::default();
    let max_backtracks = config.newton.max_backtracks;
    let mut newton = controller(single_phase_updater(), config).with_communicator(Box::new(RejectingPeer));

    let report = newton
        .step(&mut domain, &conns, &dofs, &mut CouplingAdapter::new(), 0.0, 1e3)
        .unwrap();

    assert_eq!(report.outcome, StepOutcome::Failed(NonConvergence::BacktrackExhausted));
    assert_eq!(report.backtracks, max_backtracks);
    let rejected = report.transitions.iter().filter(|s| **s == NewtonState::Rejected).count();
    assert_eq!(rejected, max_backtracks);
    assert_eq!(report.transitions.last(), Some(&NewtonState::Failed));

    let sub = &domain.regions[0].subregions[0];
    assert_eq!(sub.pressure, vec![1.0e7, 0.5e7]);
    assert!(sub.delta_pressure.iter().all(|&d| d == 0.0));
}

/// 永不收敛的线性求解器
struct FailingSolver;

impl LinearSolve for FailingSolver {
    fn solve(&mut self, _matrix: &CsrMatrix, _rhs: &[f64], _x: &mut [f64]) -> FlowResult<SolverResult> {
        Ok(SolverResult {
            status: SolverStatus::MaxIterationsReached,
            iterations: 1,
            residual_norm: 1.0,
            initial_residual_norm: 1.0,
        })
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

#[test]
fn test_linear_failure_fails_step_without_retry() {
    let (mut domain, conns) = chain(&[1.0e7, 0.5e7], 1, 1e-12);
    let dofs = DofManager::number(&mut domain);
    let mut newton = controller(single_phase_updater(), FlowConfig::default())
        .with_linear_solver(Box::new(FailingSolver));

    let report = newton
        .step(&mut domain, &conns, &dofs, &mut CouplingAdapter::new(), 0.0, 1e3)
        .unwrap();
    assert_eq!(report.outcome, StepOutcome::Failed(NonConvergence::LinearSolveFailed));
    assert_eq!(report.newton_iterations, 1);
    assert_eq!(report.residual_history.len(), 1);
}

#[test]
fn test_max_iterations_reported() {
    let (mut domain, conns) = chain(&[1.0e7, 0.5e7], 1, 1e-12);
    let dofs = DofManager::number(&mut domain);
    let mut config = FlowConfig::default();
    config.newton.max_iterations = 1;
    config.newton.rtol = 1e-300;
    config.newton.atol = 0.0;
    let mut newton = controller(single_phase_updater(), config);

    let report = newton
        .step(&mut domain, &conns, &dofs, &mut CouplingAdapter::new(), 0.0, 1e3)
        .unwrap();
    assert_eq!(report.outcome, StepOutcome::Failed(NonConvergence::MaxIterations));
    assert_eq!(report.residual_history.len(), 2);
}

#[test]
fn test_phase_count_mismatch_is_error() {
    let (mut domain, conns) = chain(&[1e6, 1e6], 2, 1e-12);
    let dofs = DofManager::number(&mut domain);
    let mut newton = controller(single_phase_updater(), FlowConfig::default());
    let result = newton.step(&mut domain, &conns, &dofs, &mut CouplingAdapter::new(), 0.0, 1.0);
    assert!(matches!(result, Err(FlowError::PhaseMismatch(_))));
}

// ============================================================================
// 诊断输出
// ============================================================================

#[test]
fn test_dump_writes_matrix_market_files() {
    let dir = tempfile::tempdir().unwrap();
    let (mut domain, conns) = chain(&[1.0e7, 0.5e7], 1, 1e-12);
    let dofs = DofManager::number(&mut domain);
    let mut config = FlowConfig::default();
    config.diagnostics.log_level = 3;
    config.diagnostics.dump_dir = dir.path().to_path_buf();
    let mut newton = controller(single_phase_updater(), config);

    let report = newton
        .step(&mut domain, &conns, &dofs, &mut CouplingAdapter::new(), 0.0, 1e3)
        .unwrap();
    assert!(report.outcome.is_converged());

    for iter in 0..report.residual_history.len() {
        assert!(dir.path().join(format!("matrix_0.000000_{iter}.mtx")).exists());
        assert!(dir.path().join(format!("rhs_0.000000_{iter}.mtx")).exists());
    }
}
