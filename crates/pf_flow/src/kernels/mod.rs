// crates/pf_flow/src/kernels/mod.rs

//! 局部内核
//!
//! - [`accumulation`]: 单元质量累积项
//! - [`flux`]: 两点连接通量
//! - [`junction`]: 裂缝汇接通量（开度立方律、尖端替换）
//!
//! 内核只写入自己的局部缓冲区，由 [`crate::assembly::AssemblyDriver`]
//! 统一散射到全局系统。

pub mod accumulation;
pub mod flux;
pub mod junction;

pub use accumulation::{accumulation, LocalAccumulation};
pub use flux::two_point_flux;
pub use junction::{aperture_term, junction_flux};

use crate::types::{MAX_DOF, MAX_PHASES, MAX_STENCIL};

/// 单元 × 自由度 的偏导行
pub type StencilDerivs = [[f64; MAX_DOF]; MAX_STENCIL];

/// 单个连接的局部通量块
///
/// 行索引为模板内单元序号 `k`，列同样按模板序号，散射时再换成全局编号。
#[derive(Debug, Clone)]
pub struct LocalFluxBlock {
    /// 模板大小
    pub size: usize,
    /// 相数
    pub num_phases: usize,
    /// `flux[k][ip]`：单元 k 相 ip 的净流出
    pub flux: [[f64; MAX_PHASES]; MAX_STENCIL],
    /// `jacobian[k][ip][m][dof]`：∂flux[k][ip]/∂x[m][dof]
    pub jacobian: [[StencilDerivs; MAX_PHASES]; MAX_STENCIL],
    /// `d_aperture[k][ip][m]`：∂flux[k][ip]/∂aperture[m]
    pub d_aperture: [[[f64; MAX_STENCIL]; MAX_PHASES]; MAX_STENCIL],
    /// 触发尖端替换的 (单元对, 相) 数
    pub tip_overrides: usize,
}

impl LocalFluxBlock {
    /// 零初始化
    pub fn new(size: usize, num_phases: usize) -> Self {
        Self {
            size,
            num_phases,
            flux: [[0.0; MAX_PHASES]; MAX_STENCIL],
            jacobian: [[[[0.0; MAX_DOF]; MAX_STENCIL]; MAX_PHASES]; MAX_STENCIL],
            d_aperture: [[[0.0; MAX_STENCIL]; MAX_PHASES]; MAX_STENCIL],
            tip_overrides: 0,
        }
    }

    /// 单元对 (k0, k1) 的通量：k0 流出 `flux`，k1 流入同量
    pub fn add_pair(&mut self, k0: usize, k1: usize, ip: usize, flux: f64, d_flux: &StencilDerivs) {
        self.add_row(k0, ip, flux, d_flux, 1.0);
        self.add_row(k1, ip, flux, d_flux, -1.0);
    }

    /// 单行累加 `sign·flux` 及其偏导
    pub fn add_row(&mut self, k: usize, ip: usize, flux: f64, d_flux: &StencilDerivs, sign: f64) {
        self.flux[k][ip] += sign * flux;
        for m in 0..self.size {
            for d in 0..self.num_phases {
                self.jacobian[k][ip][m][d] += sign * d_flux[m][d];
            }
        }
    }

    /// 单元对 (k0, k1) 的开度偏导
    pub fn add_pair_aperture(&mut self, k0: usize, k1: usize, ip: usize, d_aper: &[f64; MAX_STENCIL]) {
        for m in 0..self.size {
            self.d_aperture[k0][ip][m] += d_aper[m];
            self.d_aperture[k1][ip][m] -= d_aper[m];
        }
    }

    /// 各单元通量之和（守恒检查）
    pub fn net_flux(&self, ip: usize) -> f64 {
        (0..self.size).map(|k| self.flux[k][ip]).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_pair_is_antisymmetric() {
        let mut block = LocalFluxBlock::new(3, 2);
        let mut d = [[0.0; MAX_DOF]; MAX_STENCIL];
        d[2][1] = 4.0;
        block.add_pair(0, 2, 1, 1.5, &d);
        assert_eq!(block.flux[0][1], 1.5);
        assert_eq!(block.flux[2][1], -1.5);
        assert_eq!(block.jacobian[2][1][2][1], -4.0);
        assert_eq!(block.net_flux(1), 0.0);
    }
}
