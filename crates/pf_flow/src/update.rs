// crates/pf_flow/src/update.rs

//! 状态更新级联
//!
//! 由试探主变量 `p + Δp`、`S + ΔS` 依次刷新：
//!
//! 1. 流体：相密度、粘度
//! 2. 固体：孔隙体积乘子
//! 3. 相对渗透率（经相名置换回流体相顺序）
//! 4. 质量流度 `λ = kr·ρ/μ`
//!
//! 每个单元只写自身字段，幂等；子区域之间用 rayon 并行。越界输入不在
//! 此处拒绝，由 Newton 控制器的越界检查负责。

use rayon::prelude::*;

use crate::constitutive::{FluidModel, RelPermModel, SolidModel};
use crate::error::FlowResult;
use crate::phase_map::PhaseRowMap;
use crate::state::{FlowDomain, SubRegion};
use crate::types::{Deriv, MAX_DOF, MAX_PHASES};

/// 状态更新器
pub struct PhaseStateUpdater {
    fluid: Box<dyn FluidModel>,
    relperm: Box<dyn RelPermModel>,
    solid: Box<dyn SolidModel>,
    phase_map: PhaseRowMap,
}

impl PhaseStateUpdater {
    /// 创建更新器，并按润湿性表解析相映射
    pub fn new(
        fluid: Box<dyn FluidModel>,
        relperm: Box<dyn RelPermModel>,
        solid: Box<dyn SolidModel>,
        wettability_order: &[String],
    ) -> FlowResult<Self> {
        let phase_map =
            PhaseRowMap::build(wettability_order, fluid.phase_names(), relperm.phase_names())?;
        Ok(Self {
            fluid,
            relperm,
            solid,
            phase_map,
        })
    }

    /// 相映射
    #[inline]
    pub fn phase_map(&self) -> &PhaseRowMap {
        &self.phase_map
    }

    /// 相数
    #[inline]
    pub fn num_phases(&self) -> usize {
        self.phase_map.num_phases()
    }

    /// 刷新全部子区域
    pub fn update(&self, domain: &mut FlowDomain) {
        domain
            .regions
            .par_iter_mut()
            .flat_map(|region| region.subregions.par_iter_mut())
            .for_each(|sub| self.update_subregion(sub));
    }

    /// 刷新单个子区域
    pub fn update_subregion(&self, sub: &mut SubRegion) {
        for i in 0..sub.n_cells() {
            self.update_cell(sub, i);
        }
    }

    /// 刷新单个单元
    pub fn update_cell(&self, sub: &mut SubRegion, i: usize) {
        let np = self.num_phases();
        let p = sub.trial_pressure(i);
        let sat = sub.trial_saturation(i);

        // 流体
        let fluid = self.fluid.evaluate(p);
        sub.density[i] = fluid.density;
        sub.d_density_dp[i] = fluid.d_density_dp;
        sub.viscosity[i] = fluid.viscosity;
        sub.d_viscosity_dp[i] = fluid.d_viscosity_dp;

        // 固体
        let (pv_mult, d_pv_mult_dp) = self.solid.evaluate(p);
        sub.pv_mult[i] = pv_mult;
        sub.d_pv_mult_dp[i] = d_pv_mult_dp;

        // 相对渗透率：相渗顺序 → 流体顺序
        let mut sat_rp = [0.0; MAX_PHASES];
        for (k, s) in sat_rp.iter_mut().enumerate().take(np) {
            *s = sat[self.phase_map.fluid_index_of_relperm(k)];
        }
        let mut kr_rp = [0.0; MAX_PHASES];
        let mut dkr_rp = [[0.0; MAX_PHASES]; MAX_PHASES];
        self.relperm
            .evaluate(&sat_rp[..np], &mut kr_rp[..np], &mut dkr_rp);

        let mut kr = [0.0; MAX_PHASES];
        let mut dkr = [[0.0; MAX_PHASES]; MAX_PHASES];
        for k in 0..np {
            let ip = self.phase_map.fluid_index_of_relperm(k);
            kr[ip] = kr_rp[k];
            for l in 0..np {
                dkr[ip][self.phase_map.fluid_index_of_relperm(l)] = dkr_rp[k][l];
            }
        }
        sub.relperm[i] = kr;
        sub.d_relperm_ds[i] = dkr;

        // 流度
        let mut d_mob_ds = [[0.0; MAX_PHASES]; MAX_PHASES];
        for ip in 0..np {
            let kr_ip = relperm_deriv(&kr, &dkr, ip, np);
            let rho = Deriv::of_pressure(fluid.density[ip], fluid.d_density_dp[ip]);
            let mu = Deriv::of_pressure(fluid.viscosity[ip], fluid.d_viscosity_dp[ip]);
            let mobility = kr_ip * rho / mu;
            sub.mobility[i][ip] = mobility.value;
            sub.d_mobility_dp[i][ip] = mobility.d_dp;
            d_mob_ds[ip][..MAX_DOF - 1].copy_from_slice(&mobility.d_ds);
        }
        sub.d_mobility_ds[i] = d_mob_ds;
    }
}

/// kr_ip 对独立饱和度的偏导：`∂kr/∂S_j − ∂kr/∂S_last`
fn relperm_deriv(kr: &[f64; MAX_PHASES], dkr: &[[f64; MAX_PHASES]; MAX_PHASES], ip: usize, np: usize) -> Deriv {
    let mut d_ds = [0.0; MAX_DOF - 1];
    let last = np - 1;
    for (j, d) in d_ds.iter_mut().enumerate().take(last) {
        *d = dkr[ip][j] - dkr[ip][last];
    }
    Deriv::of_saturation(kr[ip], d_ds)
}
