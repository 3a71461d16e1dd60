// crates/pf_flow/src/constitutive/damage.rs

//! 相场损伤回调：退化函数与体积/偏量应变能分解
//!
//! 力学侧在积分点上调用这些函数；流动侧只消费其结果（通过
//! [`crate::coupling::StrainEnergySource`]）。应力采用 Voigt 记法
//! `[σxx, σyy, σzz, σyz, σxz, σxy]`。

use pf_foundation::PfError;

use crate::error::FlowResult;

/// 退化函数 g(d)
pub trait DegradationFunction: Send + Sync {
    /// g(d)
    fn value(&self, d: f64) -> f64;
    /// g'(d)
    fn derivative(&self, d: f64) -> f64;
    /// g''(d)
    fn second_derivative(&self, d: f64) -> f64;
}

/// 标准二次退化 `g = (1 − d)²`
#[derive(Debug, Clone, Copy, Default)]
pub struct QuadraticDegradation;

impl DegradationFunction for QuadraticDegradation {
    fn value(&self, d: f64) -> f64 {
        (1.0 - d) * (1.0 - d)
    }

    fn derivative(&self, d: f64) -> f64 {
        -2.0 * (1.0 - d)
    }

    fn second_derivative(&self, _d: f64) -> f64 {
        2.0
    }
}

/// Lorentz 型退化函数
///
/// `g = (1−d)² / ((1−d)² + m·d·(1 + p·d))`，`m = G_c / (2 l ψ_c)`，`p = 1`
#[derive(Debug, Clone, Copy)]
pub struct LorentzDegradation {
    /// 正则化长度 l [m]
    pub length_scale: f64,
    /// 临界断裂能 G_c [J/m²]
    pub critical_fracture_energy: f64,
    /// 临界应变能密度 ψ_c [J/m³]
    pub critical_strain_energy: f64,
}

impl LorentzDegradation {
    const P: f64 = 1.0;

    /// 创建退化函数，参数必须为正
    pub fn new(
        length_scale: f64,
        critical_fracture_energy: f64,
        critical_strain_energy: f64,
    ) -> FlowResult<Self> {
        for (field, v) in [
            ("length_scale", length_scale),
            ("critical_fracture_energy", critical_fracture_energy),
            ("critical_strain_energy", critical_strain_energy),
        ] {
            if !(v > 0.0) {
                return Err(PfError::out_of_range(field, v, f64::MIN_POSITIVE, f64::INFINITY).into());
            }
        }
        Ok(Self {
            length_scale,
            critical_fracture_energy,
            critical_strain_energy,
        })
    }

    /// 形状参数 m
    #[inline]
    pub fn m(&self) -> f64 {
        self.critical_fracture_energy / (2.0 * self.length_scale * self.critical_strain_energy)
    }

    /// 损伤起始的能量阈值 3 G_c / (16 l)
    pub fn energy_threshold(&self) -> f64 {
        3.0 * self.critical_fracture_energy / (16.0 * self.length_scale)
    }

    #[inline]
    fn denominator(&self, d: f64) -> f64 {
        (1.0 - d).powi(2) + self.m() * d * (1.0 + Self::P * d)
    }
}

impl DegradationFunction for LorentzDegradation {
    fn value(&self, d: f64) -> f64 {
        (1.0 - d).powi(2) / self.denominator(d)
    }

    fn derivative(&self, d: f64) -> f64 {
        let (m, p) = (self.m(), Self::P);
        -m * (1.0 - d) * (1.0 + (2.0 * p + 1.0) * d) / self.denominator(d).powi(2)
    }

    fn second_derivative(&self, d: f64) -> f64 {
        let (m, p) = (self.m(), Self::P);
        let poly = d.powi(3) * (2.0 * m * p * p + m * p + 2.0 * p + 1.0)
            + d.powi(2) * (-3.0 * m * p * p - 3.0 * p)
            + d * (-3.0 * m * p - 3.0)
            + (-m + p + 2.0);
        -2.0 * m * poly / self.denominator(d).powi(3)
    }
}

// ============================================================================
// 应变能分解
// ============================================================================

/// 积分点的未退化应力与应变能密度
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StrainPoint {
    /// 未退化应力（Voigt）
    pub stress: [f64; 6],
    /// 弹性应变能密度
    pub strain_energy_density: f64,
}

impl StrainPoint {
    /// 应力迹
    #[inline]
    pub fn trace(&self) -> f64 {
        self.stress[0] + self.stress[1] + self.stress[2]
    }

    /// 受压时为 1
    #[inline]
    pub fn compression_indicator(&self) -> f64 {
        if self.trace() < 0.0 {
            1.0
        } else {
            0.0
        }
    }

    /// 退化后的应力：受压时体积部分不退化
    pub fn degraded_stress(&self, g: f64) -> [f64; 6] {
        let vol = self.trace() / 3.0 * (1.0 - g) * self.compression_indicator();
        let mut out = [0.0; 6];
        for (k, s) in out.iter_mut().enumerate() {
            *s = self.stress[k] * g + if k < 3 { vol } else { 0.0 };
        }
        out
    }

    /// 退化刚度：法向块 `g·c + (1−g)·K·χ`，其余 `g·c`
    pub fn degrade_stiffness(&self, stiffness: &mut [[f64; 6]; 6], g: f64, bulk_modulus: f64) {
        let chi = self.compression_indicator();
        for (i, row) in stiffness.iter_mut().enumerate() {
            for (j, c) in row.iter_mut().enumerate() {
                if i < 3 && j < 3 {
                    *c = g * *c + (1.0 - g) * bulk_modulus * chi;
                } else {
                    *c *= g;
                }
            }
        }
    }
}

/// 驱动损伤的有效应变能密度：受压时扣除体积部分
pub fn active_strain_energy_density(point: &StrainPoint, bulk_modulus: f64) -> f64 {
    let third = point.trace() / 3.0;
    point.strain_energy_density
        - point.compression_indicator() * third * third / (2.0 * bulk_modulus)
}

/// 应变能历史场，只增不减
#[derive(Debug, Clone, Default)]
pub struct StrainEnergyHistory {
    values: Vec<f64>,
}

impl StrainEnergyHistory {
    /// 零初始化
    pub fn new(n_points: usize) -> Self {
        Self {
            values: vec![0.0; n_points],
        }
    }

    /// 历史值
    #[inline]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// `history = max(history, candidate)`，返回被抬升的点数
    pub fn update(&mut self, candidates: &[f64]) -> FlowResult<usize> {
        PfError::check_size("strain_energy", self.values.len(), candidates.len())?;
        let mut raised = 0;
        for (h, &c) in self.values.iter_mut().zip(candidates) {
            if c > *h {
                *h = c;
                raised += 1;
            }
        }
        Ok(raised)
    }
}
