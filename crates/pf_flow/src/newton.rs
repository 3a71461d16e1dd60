// crates/pf_flow/src/newton.rs

//! Newton 步控制器
//!
//! 状态机：
//!
//! ```text
//! StepSetup → { AssembleResidual → LinearSolve → BoundsCheck → ApplyUpdate → StateUpdate }*
//!           → Converged → StepComplete
//!
//! BoundsCheck ──越界──▶ Rejected（缩小比例，复用同一解）──▶ BoundsCheck
//! 线性求解失败 / 回退用尽 / 超过最大迭代 ──▶ Failed（恢复到步初状态）
//! ```
//!
//! 不收敛不是错误：它作为 [`StepOutcome::Failed`] 返回，由调用方缩小
//! 时间步后重试。

use pf_config::FlowConfig;
use pf_foundation::ensure;

use crate::assembly::{AssembledSystem, AssemblyDriver};
use crate::comm::{Communicator, SerialCommunicator};
use crate::context::StepContext;
use crate::coupling::{CouplingAdapter, CouplingSummary};
use crate::dof::DofManager;
use crate::error::{FlowError, FlowResult};
use crate::mesh::ConnectionSet;
use crate::numerics::linear_algebra::{BiCgStabLinearSolver, LinearSolve};
use crate::state::FlowDomain;
use crate::update::PhaseStateUpdater;

// ============================================================
// 状态与结果
// ============================================================

/// 控制器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NewtonState {
    /// 步初准备
    StepSetup,
    /// 组装残差与雅可比
    AssembleResidual,
    /// 线性求解
    LinearSolve,
    /// 越界检查
    BoundsCheck,
    /// 越界，缩小比例
    Rejected,
    /// 累加增量
    ApplyUpdate,
    /// 刷新派生状态
    StateUpdate,
    /// 收敛
    Converged,
    /// 步完成
    StepComplete,
    /// 失败
    Failed,
}

/// 不收敛原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonConvergence {
    /// 线性求解器未收敛
    LinearSolveFailed,
    /// 越界回退次数用尽
    BacktrackExhausted,
    /// 达到最大 Newton 迭代次数
    MaxIterations,
}

/// 时间步结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// 收敛
    Converged {
        /// 线性求解次数
        iterations: usize,
    },
    /// 不收敛，需要外部缩小时间步
    Failed(NonConvergence),
}

impl StepOutcome {
    /// 是否收敛
    #[inline]
    pub fn is_converged(&self) -> bool {
        matches!(self, Self::Converged { .. })
    }
}

/// 时间步报告
#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    /// 结果
    pub outcome: StepOutcome,
    /// Newton 迭代（线性求解）次数
    pub newton_iterations: usize,
    /// 越界回退总次数
    pub backtracks: usize,
    /// 状态转移序列
    pub transitions: Vec<NewtonState>,
    /// 每次组装后的全局残差范数
    pub residual_history: Vec<f64>,
    /// 尖端替换总数
    pub tip_overrides: usize,
    /// 步完成时的耦合摘要
    pub coupling: CouplingSummary,
}

impl StepReport {
    fn new() -> Self {
        Self {
            outcome: StepOutcome::Failed(NonConvergence::MaxIterations),
            newton_iterations: 0,
            backtracks: 0,
            transitions: vec![NewtonState::StepSetup],
            residual_history: Vec::new(),
            tip_overrides: 0,
            coupling: CouplingSummary::default(),
        }
    }

    fn enter(&mut self, state: NewtonState) {
        self.transitions.push(state);
    }
}

// ============================================================
// 控制器
// ============================================================

/// Newton 步控制器
pub struct NewtonStepController {
    config: FlowConfig,
    updater: PhaseStateUpdater,
    assembler: AssemblyDriver,
    linear_solver: Box<dyn LinearSolve>,
    comm: Box<dyn Communicator>,
}

impl NewtonStepController {
    /// 以内置 BiCGStab 与单进程通信创建
    pub fn new(config: FlowConfig, updater: PhaseStateUpdater) -> FlowResult<Self> {
        config.validate()?;
        let assembler = AssemblyDriver::new(updater.phase_map().clone(), config.diagnostics.clone());
        let linear_solver = BiCgStabLinearSolver::new(&config.linear)
            .verbose(config.diagnostics.log_level >= 2);
        Ok(Self {
            config,
            updater,
            assembler,
            linear_solver: Box::new(linear_solver),
            comm: Box::new(SerialCommunicator),
        })
    }

    /// 替换线性求解器
    pub fn with_linear_solver(mut self, solver: Box<dyn LinearSolve>) -> Self {
        self.linear_solver = solver;
        self
    }

    /// 替换通信器
    pub fn with_communicator(mut self, comm: Box<dyn Communicator>) -> Self {
        self.comm = comm;
        self
    }

    /// 配置
    pub fn config(&self) -> &FlowConfig {
        &self.config
    }

    /// 状态更新器
    pub fn updater(&self) -> &PhaseStateUpdater {
        &self.updater
    }

    /// 推进一个时间步 `[time, time + dt]`
    ///
    /// 返回 `Err` 仅表示配置或前置条件错误；不收敛通过
    /// [`StepReport::outcome`] 报告，此时计算域已恢复到步初状态。
    pub fn step(
        &mut self,
        domain: &mut FlowDomain,
        connections: &ConnectionSet,
        dofs: &DofManager,
        coupling: &mut CouplingAdapter,
        time: f64,
        dt: f64,
    ) -> FlowResult<StepReport> {
        let mut report = StepReport::new();
        let ctx = self.setup_step(domain, coupling, time, dt)?;

        let max_iterations = self.config.newton.max_iterations;
        let mut initial_norm = None;

        for iteration in 0..=max_iterations {
            report.enter(NewtonState::AssembleResidual);
            let system = self.assembler.assemble(domain, connections, dofs, &ctx)?;
            self.assembler.dump(&system, time, iteration)?;
            report.tip_overrides += system.tip_overrides;

            let norm = self.global_norm(&system);
            report.residual_history.push(norm);
            let r0 = *initial_norm.get_or_insert(norm);
            log::debug!("Newton 迭代 {iteration}: ‖R‖ = {norm:.6e}");

            if self.is_converged(norm, r0) {
                report.enter(NewtonState::Converged);
                report.outcome = StepOutcome::Converged {
                    iterations: report.newton_iterations,
                };
                self.complete_step(domain, coupling, &mut report, time, dt)?;
                return Ok(report);
            }
            if iteration == max_iterations {
                break;
            }

            report.enter(NewtonState::LinearSolve);
            report.newton_iterations += 1;
            let Some(solution) = self.solve(&system)? else {
                return self.fail(domain, report, NonConvergence::LinearSolveFailed);
            };

            report.enter(NewtonState::BoundsCheck);
            let Some(scale) = self.bounded_scale(domain, dofs, &solution, &mut report) else {
                return self.fail(domain, report, NonConvergence::BacktrackExhausted);
            };

            report.enter(NewtonState::ApplyUpdate);
            apply_update(domain, dofs, &solution, scale);
            self.comm.synchronize_ghosts(domain)?;

            report.enter(NewtonState::StateUpdate);
            self.updater.update(domain);
        }

        self.fail(domain, report, NonConvergence::MaxIterations)
    }

    fn setup_step(
        &self,
        domain: &mut FlowDomain,
        coupling: &mut CouplingAdapter,
        time: f64,
        dt: f64,
    ) -> FlowResult<StepContext> {
        let np = self.updater.num_phases();
        if domain.num_phases() != np {
            return Err(FlowError::phase_mismatch(format!(
                "计算域有 {} 相，本构模型有 {np} 相",
                domain.num_phases()
            )));
        }
        ensure!(dt > 0.0, FlowError::precondition(format!("时间步长必须为正: {dt:e}")));

        coupling.on_step_setup(domain, time, dt)?;
        let tip = coupling.tip_override(time + dt, &self.config.fracture);
        if tip.is_some() {
            log::debug!("尖端通量替换在本步生效");
        }

        domain.zero_deltas();
        self.updater.update(domain);
        domain.backup_fields();

        Ok(StepContext::new(&self.config, np, time, dt).with_tip(tip))
    }

    fn global_norm(&self, system: &AssembledSystem) -> f64 {
        let local = system.local_residual_norm();
        self.comm.sum_f64(local * local).sqrt()
    }

    fn is_converged(&self, norm: f64, initial: f64) -> bool {
        let newton = &self.config.newton;
        norm <= newton.atol || (initial > 0.0 && norm / initial <= newton.rtol)
    }

    /// 只在拥有自由度上求解；幽灵列的增量由 [`Communicator::synchronize_ghosts`] 给出
    fn solve(&mut self, system: &AssembledSystem) -> FlowResult<Option<Vec<f64>>> {
        let rhs: Vec<f64> = system.residual.iter().map(|r| -r).collect();
        let mut solution = vec![0.0; rhs.len()];
        let owned;
        let jacobian = if system.jacobian.n_cols() > system.jacobian.n_rows() {
            owned = system.jacobian.leading_columns(system.jacobian.n_rows());
            &owned
        } else {
            &system.jacobian
        };
        let result = self.linear_solver.solve(jacobian, &rhs, &mut solution)?;
        if result.is_converged() {
            log::trace!(
                "{} 收敛: {} 次迭代, 相对残差 {:.3e}",
                self.linear_solver.name(),
                result.iterations,
                result.relative_residual()
            );
            Ok(Some(solution))
        } else {
            log::warn!(
                "{} 未收敛: {:?}, {} 次迭代, 残差 {:.3e}",
                self.linear_solver.name(),
                result.status,
                result.iterations,
                result.residual_norm
            );
            Ok(None)
        }
    }

    /// 从 1 开始逐次缩小，直到所有进程都接受；用尽时返回 None
    fn bounded_scale(
        &self,
        domain: &FlowDomain,
        dofs: &DofManager,
        solution: &[f64],
        report: &mut StepReport,
    ) -> Option<f64> {
        let newton = &self.config.newton;
        let mut scale = 1.0;
        let mut attempts = 0;
        loop {
            let local_ok = check_bounds(domain, dofs, solution, scale);
            if self.comm.all(local_ok) {
                return Some(scale);
            }
            if attempts == newton.max_backtracks {
                log::warn!("越界回退 {attempts} 次后仍不可接受");
                return None;
            }
            attempts += 1;
            report.backtracks += 1;
            report.enter(NewtonState::Rejected);
            scale *= newton.backtrack_factor;
            log::debug!("候选解越界，缩放至 {scale}");
            report.enter(NewtonState::BoundsCheck);
        }
    }

    fn complete_step(
        &self,
        domain: &mut FlowDomain,
        coupling: &mut CouplingAdapter,
        report: &mut StepReport,
        time: f64,
        dt: f64,
    ) -> FlowResult<()> {
        domain.commit_deltas();
        report.coupling = coupling.on_step_complete(domain, time, dt)?;
        report.enter(NewtonState::StepComplete);
        log::info!(
            "时间步 t = {time:e}, dt = {dt:e} 收敛: {} 次 Newton 迭代, {} 次回退",
            report.newton_iterations,
            report.backtracks
        );
        Ok(())
    }

    fn fail(
        &self,
        domain: &mut FlowDomain,
        mut report: StepReport,
        reason: NonConvergence,
    ) -> FlowResult<StepReport> {
        log::warn!("时间步不收敛: {reason:?}，恢复到步初状态");
        self.reset_state_to_beginning_of_step(domain);
        report.enter(NewtonState::Failed);
        report.outcome = StepOutcome::Failed(reason);
        Ok(report)
    }

    /// 丢弃步内增量并刷新派生状态
    pub fn reset_state_to_beginning_of_step(&self, domain: &mut FlowDomain) {
        domain.zero_deltas();
        self.updater.update(domain);
    }
}

// ============================================================
// 候选解
// ============================================================

/// 候选解 `Δ + scale·x` 是否满足 p ≥ 0 与 0 ≤ S ≤ 1（仅拥有单元，NaN 视为越界）
pub fn check_bounds(domain: &FlowDomain, dofs: &DofManager, solution: &[f64], scale: f64) -> bool {
    let np = domain.num_phases();
    dofs.owned_cells().iter().all(|&key| {
        let sub = domain.subregion(key);
        let i = key.index;
        let dof = sub.dof_number[i];

        let pressure = sub.trial_pressure(i) + scale * solution[dof];
        if !(pressure >= 0.0) {
            return false;
        }

        let mut sat = sub.trial_saturation(i);
        for j in 0..np - 1 {
            let ds = scale * solution[dof + 1 + j];
            sat[j] += ds;
            sat[np - 1] -= ds;
        }
        sat[..np].iter().all(|s| (0.0..=1.0).contains(s))
    })
}

/// 把 `scale·x` 加到拥有单元的增量上
pub fn apply_update(domain: &mut FlowDomain, dofs: &DofManager, solution: &[f64], scale: f64) {
    let np = domain.num_phases();
    for &key in dofs.owned_cells() {
        let sub = &mut domain.regions[key.region].subregions[key.subregion];
        let i = key.index;
        let dof = sub.dof_number[i];

        sub.delta_pressure[i] += scale * solution[dof];
        for j in 0..np - 1 {
            let ds = scale * solution[dof + 1 + j];
            sub.delta_saturation[i][j] += ds;
            sub.delta_saturation[i][np - 1] -= ds;
        }
    }
}
