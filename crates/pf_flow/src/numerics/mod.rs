// crates/pf_flow/src/numerics/mod.rs

//! 数值工具：稀疏线性代数与矩阵导出

pub mod linear_algebra;
pub mod matrix_market;
