// crates/pf_flow/src/constitutive/solid.rs

//! 固体模型：孔隙体积乘子

/// 固体模型
pub trait SolidModel: Send + Sync {
    /// 返回 (pv_mult, ∂pv_mult/∂p)
    fn evaluate(&self, pressure: f64) -> (f64, f64);
}

/// 指数型孔隙压缩
///
/// `pv_mult = exp(c (p − p_ref))`
#[derive(Debug, Clone, Copy)]
pub struct PoreCompressibility {
    /// 参考压力 [Pa]
    pub reference_pressure: f64,
    /// 孔隙压缩系数 [1/Pa]
    pub compressibility: f64,
}

impl PoreCompressibility {
    /// 创建模型
    pub fn new(reference_pressure: f64, compressibility: f64) -> Self {
        Self {
            reference_pressure,
            compressibility,
        }
    }

    /// 刚性骨架
    pub fn rigid() -> Self {
        Self::new(0.0, 0.0)
    }
}

impl SolidModel for PoreCompressibility {
    fn evaluate(&self, pressure: f64) -> (f64, f64) {
        let mult = (self.compressibility * (pressure - self.reference_pressure)).exp();
        (mult, self.compressibility * mult)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rigid() {
        assert_eq!(PoreCompressibility::rigid().evaluate(3e7), (1.0, 0.0));
    }

    #[test]
    fn test_compressible() {
        let solid = PoreCompressibility::new(1e5, 1e-9);
        let (m, dm) = solid.evaluate(1e5 + 1e6);
        assert!((m - (1e-3f64).exp()).abs() < 1e-14);
        assert!((dm - 1e-9 * m).abs() < 1e-24);
    }
}
