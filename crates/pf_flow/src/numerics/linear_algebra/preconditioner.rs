// crates/pf_flow/src/numerics/linear_algebra/preconditioner.rs

//! 预条件器：z = M⁻¹ r

use super::csr::CsrMatrix;

/// 预条件器 trait
pub trait Preconditioner: Send + Sync {
    /// z = M⁻¹ r
    fn apply(&self, r: &[f64], z: &mut [f64]);

    /// 名称
    fn name(&self) -> &'static str;
}

/// 对角（Jacobi）预条件器
///
/// 对角元绝对值不超过 1e-14 的行保持单位缩放。
#[derive(Debug, Clone)]
pub struct JacobiPreconditioner {
    inv_diag: Vec<f64>,
}

impl JacobiPreconditioner {
    /// 由矩阵对角元构建
    pub fn from_matrix(matrix: &CsrMatrix) -> Self {
        let inv_diag = (0..matrix.n_rows())
            .map(|i| match matrix.diagonal_value(i) {
                Some(d) if d.abs() > 1e-14 => 1.0 / d,
                _ => 1.0,
            })
            .collect();
        Self { inv_diag }
    }
}

impl Preconditioner for JacobiPreconditioner {
    fn apply(&self, r: &[f64], z: &mut [f64]) {
        debug_assert_eq!(r.len(), self.inv_diag.len());
        for ((zi, ri), d) in z.iter_mut().zip(r).zip(&self.inv_diag) {
            *zi = ri * d;
        }
    }

    fn name(&self) -> &'static str {
        "Jacobi"
    }
}
