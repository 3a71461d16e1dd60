// crates/pf_flow/src/numerics/linear_algebra/mod.rs

//! 稀疏线性代数
//!
//! Newton 步每次迭代组装一个 CSR 雅可比矩阵，再用带 Jacobi 预条件的
//! BiCGStab 求解。线性求解器通过 [`LinearSolve`] trait 注入，便于替换。

pub mod csr;
pub mod preconditioner;
pub mod solver;
pub mod vector_ops;

pub use csr::{CsrBuilder, CsrMatrix, CsrPattern};
pub use preconditioner::{JacobiPreconditioner, Preconditioner};
pub use solver::{BiCgStabLinearSolver, LinearSolve, SolverResult, SolverStatus};
pub use vector_ops::{axpy, dot, norm2, norm_inf};
