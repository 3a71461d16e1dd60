// crates/pf_flow/src/types.rs

//! 核心类型定义
//!
//! - [`CellKey`]: (区域, 子区域, 局部索引) 三元组单元地址
//! - [`Deriv`]: 值 + 对主变量的解析偏导，用于手工链式求导
//! - 局部缓冲区尺寸常量与列偏移

use serde::{Deserialize, Serialize};
use std::ops::{Add, Div, Mul, Sub};

/// 最大相数
pub const MAX_PHASES: usize = 3;

/// 每个单元最大自由度数（压力 + 独立饱和度）
pub const MAX_DOF: usize = MAX_PHASES;

/// 连接模板的最大单元数
pub const MAX_STENCIL: usize = 10;

/// 压力列偏移
pub const PRESSURE_OFFSET: usize = 0;

/// 第 `j` 个独立饱和度的列偏移
#[inline]
pub const fn saturation_offset(j: usize) -> usize {
    1 + j
}

// ============================================================================
// 单元地址
// ============================================================================

/// 单元地址
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CellKey {
    /// 区域序号
    pub region: usize,
    /// 子区域序号
    pub subregion: usize,
    /// 子区域内局部索引
    pub index: usize,
}

impl CellKey {
    /// 创建单元地址
    #[inline]
    pub const fn new(region: usize, subregion: usize, index: usize) -> Self {
        Self {
            region,
            subregion,
            index,
        }
    }
}

// ============================================================================
// 值 + 偏导
// ============================================================================

/// 值与其对单元主变量的偏导
///
/// `d_ds[j]` 是对第 `j` 个独立饱和度的偏导，最后一相饱和度由约束
/// `S_last = 1 - Σ S_j` 消去。
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Deriv {
    /// 值
    pub value: f64,
    /// ∂/∂p
    pub d_dp: f64,
    /// ∂/∂S_j
    pub d_ds: [f64; MAX_DOF - 1],
}

impl Deriv {
    /// 只依赖压力的量
    #[inline]
    pub const fn of_pressure(value: f64, d_dp: f64) -> Self {
        Self {
            value,
            d_dp,
            d_ds: [0.0; MAX_DOF - 1],
        }
    }

    /// 只依赖饱和度的量
    #[inline]
    pub const fn of_saturation(value: f64, d_ds: [f64; MAX_DOF - 1]) -> Self {
        Self {
            value,
            d_dp: 0.0,
            d_ds,
        }
    }

    #[inline]
    fn map2(self, rhs: Self, dv: impl Fn(f64, f64) -> f64) -> Self {
        let mut d_ds = [0.0; MAX_DOF - 1];
        for (j, d) in d_ds.iter_mut().enumerate() {
            *d = dv(self.d_ds[j], rhs.d_ds[j]);
        }
        Self {
            value: self.value,
            d_dp: dv(self.d_dp, rhs.d_dp),
            d_ds,
        }
    }
}

impl Add for Deriv {
    type Output = Deriv;

    #[inline]
    fn add(self, rhs: Deriv) -> Deriv {
        let mut out = self.map2(rhs, |a, b| a + b);
        out.value = self.value + rhs.value;
        out
    }
}

impl Sub for Deriv {
    type Output = Deriv;

    #[inline]
    fn sub(self, rhs: Deriv) -> Deriv {
        let mut out = self.map2(rhs, |a, b| a - b);
        out.value = self.value - rhs.value;
        out
    }
}

impl Mul for Deriv {
    type Output = Deriv;

    #[inline]
    fn mul(self, rhs: Deriv) -> Deriv {
        let (u, v) = (self.value, rhs.value);
        let mut out = self.map2(rhs, |du, dv| du * v + u * dv);
        out.value = u * v;
        out
    }
}

impl Div for Deriv {
    type Output = Deriv;

    #[inline]
    fn div(self, rhs: Deriv) -> Deriv {
        let (u, v) = (self.value, rhs.value);
        let inv_v2 = 1.0 / (v * v);
        let mut out = self.map2(rhs, |du, dv| (du * v - u * dv) * inv_v2);
        out.value = u / v;
        out
    }
}

impl Mul<f64> for Deriv {
    type Output = Deriv;

    #[inline]
    fn mul(self, s: f64) -> Deriv {
        let mut d_ds = self.d_ds;
        d_ds.iter_mut().for_each(|d| *d *= s);
        Deriv {
            value: self.value * s,
            d_dp: self.d_dp * s,
            d_ds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quotient_rule_matches_mobility_formula() {
        // λ = kr·ρ/μ, dλ/dp = kr(ρ'μ - ρμ')/μ²
        let (kr, rho, drho, mu, dmu) = (0.4, 1000.0, 0.45, 1e-3, 2e-6);
        let lambda = Deriv::of_pressure(kr, 0.0) * Deriv::of_pressure(rho, drho)
            / Deriv::of_pressure(mu, dmu);
        let expected = kr * (drho * mu - rho * dmu) / (mu * mu);
        assert!((lambda.value - kr * rho / mu).abs() < 1e-9);
        assert!((lambda.d_dp - expected).abs() / expected.abs() < 1e-12);
    }

    #[test]
    fn test_saturation_derivative_propagates() {
        let kr = Deriv::of_saturation(0.25, [1.0, -0.5]);
        let scaled = kr * Deriv::of_pressure(4.0, 0.0);
        assert_eq!(scaled.d_ds, [4.0, -2.0]);
        assert_eq!(scaled.d_dp, 0.0);
    }

    #[test]
    fn test_cell_key_ordering() {
        let a = CellKey::new(0, 1, 5);
        let b = CellKey::new(1, 0, 0);
        assert!(a < b);
    }
}
