// crates/pf_flow/src/numerics/linear_algebra/solver.rs

//! 迭代线性求解器
//!
//! [`LinearSolve`] 是 Newton 控制器看到的唯一接口；内置实现为右预条件
//! BiCGStab，每次求解重新构建 Jacobi 预条件器。

use pf_config::LinearConfig;
use pf_foundation::PfError;

use super::csr::CsrMatrix;
use super::preconditioner::{JacobiPreconditioner, Preconditioner};
use super::vector_ops::{axpy, dot, norm2};
use crate::error::FlowResult;

const BREAKDOWN_TOL: f64 = 1e-30;
const DIVERGENCE_FACTOR: f64 = 1e6;

/// 求解状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverStatus {
    /// 收敛
    Converged,
    /// 达到最大迭代次数
    MaxIterationsReached,
    /// 发散
    Diverged,
    /// 停滞（内积退化）
    Stagnated,
}

/// 求解结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverResult {
    /// 状态
    pub status: SolverStatus,
    /// 迭代次数
    pub iterations: usize,
    /// 最终残差范数
    pub residual_norm: f64,
    /// 初始残差范数
    pub initial_residual_norm: f64,
}

impl SolverResult {
    /// 是否收敛
    #[inline]
    pub fn is_converged(&self) -> bool {
        self.status == SolverStatus::Converged
    }

    /// 相对残差
    pub fn relative_residual(&self) -> f64 {
        if self.initial_residual_norm > 0.0 {
            self.residual_norm / self.initial_residual_norm
        } else {
            0.0
        }
    }

    fn finish(status: SolverStatus, iterations: usize, residual_norm: f64, initial: f64) -> Self {
        Self {
            status,
            iterations,
            residual_norm,
            initial_residual_norm: initial,
        }
    }
}

/// 线性求解器接口
pub trait LinearSolve: Send {
    /// 求解 A x = b，x 为初值并返回解
    fn solve(&mut self, matrix: &CsrMatrix, rhs: &[f64], x: &mut [f64]) -> FlowResult<SolverResult>;

    /// 名称
    fn name(&self) -> &'static str;
}

/// Jacobi 预条件 BiCGStab
#[derive(Debug, Clone)]
pub struct BiCgStabLinearSolver {
    rtol: f64,
    atol: f64,
    max_iterations: usize,
    verbose: bool,
    r: Vec<f64>,
    r0: Vec<f64>,
    p: Vec<f64>,
    v: Vec<f64>,
    s: Vec<f64>,
    t: Vec<f64>,
    z: Vec<f64>,
}

impl BiCgStabLinearSolver {
    /// 由配置创建
    pub fn new(config: &LinearConfig) -> Self {
        Self {
            rtol: config.rtol,
            atol: config.atol,
            max_iterations: config.max_iterations,
            verbose: false,
            r: Vec::new(),
            r0: Vec::new(),
            p: Vec::new(),
            v: Vec::new(),
            s: Vec::new(),
            t: Vec::new(),
            z: Vec::new(),
        }
    }

    /// 输出每次迭代的残差（trace 级别）
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    fn ensure_workspace(&mut self, n: usize) {
        if self.r.len() != n {
            for w in [
                &mut self.r,
                &mut self.r0,
                &mut self.p,
                &mut self.v,
                &mut self.s,
                &mut self.t,
                &mut self.z,
            ] {
                *w = vec![0.0; n];
            }
        }
    }

    fn iterate(
        &mut self,
        matrix: &CsrMatrix,
        b: &[f64],
        x: &mut [f64],
        precond: &dyn Preconditioner,
    ) -> SolverResult {
        let n = b.len();
        self.ensure_workspace(n);

        matrix.mul_vec(x, &mut self.r);
        for (ri, bi) in self.r.iter_mut().zip(b) {
            *ri = bi - *ri;
        }

        let initial = norm2(&self.r);
        if initial < self.atol {
            return SolverResult::finish(SolverStatus::Converged, 0, initial, initial);
        }

        self.r0.copy_from_slice(&self.r);
        self.p.fill(0.0);
        self.v.fill(0.0);

        let mut rho_old = 1.0;
        let mut alpha = 1.0;
        let mut omega = 1.0;

        for iter in 0..self.max_iterations {
            let rho = dot(&self.r0, &self.r);
            if rho.abs() < BREAKDOWN_TOL {
                let res = norm2(&self.r);
                return SolverResult::finish(SolverStatus::Stagnated, iter, res, initial);
            }

            let beta = if iter == 0 {
                0.0
            } else {
                (rho / rho_old) * (alpha / omega)
            };
            rho_old = rho;

            for i in 0..n {
                self.p[i] = self.r[i] + beta * (self.p[i] - omega * self.v[i]);
            }

            precond.apply(&self.p, &mut self.z);
            matrix.mul_vec(&self.z, &mut self.v);

            let r0v = dot(&self.r0, &self.v);
            if r0v.abs() < BREAKDOWN_TOL {
                let res = norm2(&self.r);
                return SolverResult::finish(SolverStatus::Stagnated, iter, res, initial);
            }
            alpha = rho / r0v;

            for i in 0..n {
                self.s[i] = self.r[i] - alpha * self.v[i];
            }

            let s_norm = norm2(&self.s);
            if s_norm < self.atol || s_norm / initial < self.rtol {
                axpy(alpha, &self.z, x);
                return SolverResult::finish(SolverStatus::Converged, iter + 1, s_norm, initial);
            }

            // x += α M⁻¹p，z 仍保存 M⁻¹p
            axpy(alpha, &self.z, x);

            precond.apply(&self.s, &mut self.z);
            matrix.mul_vec(&self.z, &mut self.t);

            let tt = dot(&self.t, &self.t);
            omega = if tt < BREAKDOWN_TOL {
                0.0
            } else {
                dot(&self.t, &self.s) / tt
            };
            if omega.abs() < BREAKDOWN_TOL {
                return SolverResult::finish(SolverStatus::Stagnated, iter + 1, s_norm, initial);
            }

            axpy(omega, &self.z, x);
            for i in 0..n {
                self.r[i] = self.s[i] - omega * self.t[i];
            }

            let res = norm2(&self.r);
            if self.verbose {
                log::trace!("BiCGStab 第 {} 次迭代: 残差 = {:.6e}", iter + 1, res);
            }

            if res < self.atol || res / initial < self.rtol {
                return SolverResult::finish(SolverStatus::Converged, iter + 1, res, initial);
            }
            if res > initial * DIVERGENCE_FACTOR || !res.is_finite() {
                return SolverResult::finish(SolverStatus::Diverged, iter + 1, res, initial);
            }
        }

        let res = norm2(&self.r);
        SolverResult::finish(SolverStatus::MaxIterationsReached, self.max_iterations, res, initial)
    }
}

impl LinearSolve for BiCgStabLinearSolver {
    fn solve(&mut self, matrix: &CsrMatrix, rhs: &[f64], x: &mut [f64]) -> FlowResult<SolverResult> {
        if !matrix.is_square() {
            return Err(PfError::size_mismatch("jacobian.n_cols", matrix.n_rows(), matrix.n_cols()).into());
        }
        PfError::check_size("rhs", matrix.n_rows(), rhs.len())?;
        PfError::check_size("solution", matrix.n_rows(), x.len())?;

        let precond = JacobiPreconditioner::from_matrix(matrix);
        Ok(self.iterate(matrix, rhs, x, &precond))
    }

    fn name(&self) -> &'static str {
        "BiCGStab"
    }
}
