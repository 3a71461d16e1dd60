// crates/pf_flow/src/constitutive/relperm.rs

//! 相对渗透率模型

use serde::{Deserialize, Serialize};

use crate::state::PhaseMatrix;

/// 相对渗透率模型
///
/// 输入输出均按模型自身的相顺序（`phase_names`），与流体模型顺序的
/// 对应关系由 [`crate::phase_map::PhaseRowMap`] 处理。
pub trait RelPermModel: Send + Sync {
    /// 相名
    fn phase_names(&self) -> &[String];

    /// 求 kr 及 ∂kr_i/∂S_j
    fn evaluate(&self, saturation: &[f64], relperm: &mut [f64], d_relperm_ds: &mut PhaseMatrix);
}

/// Brooks-Corey 单相参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrooksCoreyPhase {
    /// 相名
    pub name: String,
    /// 残余饱和度
    pub residual_saturation: f64,
    /// 指数
    pub exponent: f64,
    /// 端点相对渗透率
    pub max_relperm: f64,
}

impl BrooksCoreyPhase {
    /// 创建参数
    pub fn new(name: impl Into<String>, residual_saturation: f64, exponent: f64) -> Self {
        Self {
            name: name.into(),
            residual_saturation,
            exponent,
            max_relperm: 1.0,
        }
    }
}

/// Brooks-Corey 相对渗透率
///
/// `S_e = (S − S_r) / (1 − Σ S_r)`，`kr = kr_max · S_e^n`，`S_e` 截断到 [0, 1]。
#[derive(Debug, Clone)]
pub struct BrooksCoreyRelPerm {
    names: Vec<String>,
    phases: Vec<BrooksCoreyPhase>,
    mobile_volume: f64,
}

impl BrooksCoreyRelPerm {
    /// 创建模型
    pub fn new(phases: Vec<BrooksCoreyPhase>) -> Self {
        let total_residual: f64 = phases.iter().map(|p| p.residual_saturation).sum();
        Self {
            names: phases.iter().map(|p| p.name.clone()).collect(),
            phases,
            mobile_volume: (1.0 - total_residual).max(f64::EPSILON),
        }
    }
}

impl RelPermModel for BrooksCoreyRelPerm {
    fn phase_names(&self) -> &[String] {
        &self.names
    }

    fn evaluate(&self, saturation: &[f64], relperm: &mut [f64], d_relperm_ds: &mut PhaseMatrix) {
        for row in d_relperm_ds.iter_mut() {
            row.fill(0.0);
        }
        for (ip, phase) in self.phases.iter().enumerate() {
            let se = (saturation[ip] - phase.residual_saturation) / self.mobile_volume;
            if se <= 0.0 {
                relperm[ip] = 0.0;
            } else if se >= 1.0 {
                relperm[ip] = phase.max_relperm;
            } else {
                let n = phase.exponent;
                relperm[ip] = phase.max_relperm * se.powf(n);
                d_relperm_ds[ip][ip] = phase.max_relperm * n * se.powf(n - 1.0) / self.mobile_volume;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MAX_PHASES;

    fn water_oil() -> BrooksCoreyRelPerm {
        BrooksCoreyRelPerm::new(vec![
            BrooksCoreyPhase::new("water", 0.1, 2.0),
            BrooksCoreyPhase::new("oil", 0.1, 3.0),
        ])
    }

    #[test]
    fn test_endpoints() {
        let model = water_oil();
        let mut kr = [0.0; 2];
        let mut dkr = [[0.0; MAX_PHASES]; MAX_PHASES];
        model.evaluate(&[0.05, 0.95], &mut kr, &mut dkr);
        assert_eq!(kr[0], 0.0);
        assert_eq!(dkr[0][0], 0.0);
        assert_eq!(kr[1], 1.0);
    }

    #[test]
    fn test_derivative_matches_difference() {
        let model = water_oil();
        let mut kr = [0.0; 2];
        let mut kr_p = [0.0; 2];
        let mut kr_m = [0.0; 2];
        let mut dkr = [[0.0; MAX_PHASES]; MAX_PHASES];
        let mut scratch = dkr;
        let s = 0.4;
        let h = 1e-6;
        model.evaluate(&[s, 1.0 - s], &mut kr, &mut dkr);
        model.evaluate(&[s + h, 1.0 - s], &mut kr_p, &mut scratch);
        model.evaluate(&[s - h, 1.0 - s], &mut kr_m, &mut scratch);
        let fd = (kr_p[0] - kr_m[0]) / (2.0 * h);
        assert!((fd - dkr[0][0]).abs() < 1e-6);
    }

    #[test]
    fn test_single_phase_is_fully_mobile() {
        let model = BrooksCoreyRelPerm::new(vec![BrooksCoreyPhase::new("water", 0.0, 1.0)]);
        let mut kr = [0.0; 1];
        let mut dkr = [[0.0; MAX_PHASES]; MAX_PHASES];
        model.evaluate(&[1.0], &mut kr, &mut dkr);
        assert_eq!(kr[0], 1.0);
    }
}
