// crates/pf_flow/src/kernels/flux.rs

//! 两点（多点）有限体积通量
//!
//! 对每相：
//!
//! ```text
//! ρ̄      = ½(ρ_0 + ρ_1)                只取模板前两个单元
//! ΔΦ     = Σ_k w_k (p_k − ρ̄ g_k)
//! k_up   = ΔΦ ≥ 0 ? 0 : 1
//! F      = dt · λ_up · ΔΦ
//! ∂F/∂p_k = dt · λ_up · (w_k − ∂ρ̄/∂p_k · Σ w g)  (+ dt · ∂λ_up/∂p · ΔΦ，k = k_up)
//! ∂F/∂S_j = dt · ∂λ_up/∂S_j · ΔΦ                 (仅上游单元)
//! ```
//!
//! 通量作用在模板前两个单元上：单元 0 流出 F，单元 1 流入 F。

use super::{LocalFluxBlock, StencilDerivs};
use crate::context::StepContext;
use crate::mesh::Connection;
use crate::state::FlowDomain;
use crate::types::{saturation_offset, MAX_DOF, MAX_STENCIL, PRESSURE_OFFSET};

/// 计算单个两点连接的局部通量块
pub fn two_point_flux(conn: &Connection, domain: &FlowDomain, ctx: &StepContext) -> LocalFluxBlock {
    let n = conn.size();
    let np = ctx.num_phases;
    let cell = |k: usize| domain.cell(conn.cells[k]);
    let mut block = LocalFluxBlock::new(n, np);

    let sum_wg: f64 = (0..n)
        .map(|k| conn.weights[k] * cell(k).gravity_coef())
        .sum();

    for ip in 0..np {
        let mut dens_mean = 0.0;
        let mut d_dens_mean_dp = [0.0; MAX_STENCIL];
        for (k, d) in d_dens_mean_dp.iter_mut().enumerate().take(2) {
            let (rho, drho) = cell(k).density(ip);
            dens_mean += 0.5 * rho;
            *d = 0.5 * drho;
        }

        let pot_dif: f64 = (0..n)
            .map(|k| {
                let c = cell(k);
                conn.weights[k] * (c.pressure() - dens_mean * c.gravity_coef())
            })
            .sum();

        let k_up = if pot_dif >= 0.0 { 0 } else { 1 };
        let up = cell(k_up);
        let lambda = up.mobility(ip);
        let flux = ctx.dt * lambda * pot_dif;

        let mut d_flux: StencilDerivs = [[0.0; MAX_DOF]; MAX_STENCIL];
        for k in 0..n {
            d_flux[k][PRESSURE_OFFSET] =
                ctx.dt * lambda * (conn.weights[k] - d_dens_mean_dp[k] * sum_wg);
        }
        d_flux[k_up][PRESSURE_OFFSET] += ctx.dt * up.d_mobility_dp(ip) * pot_dif;
        for j in 0..np - 1 {
            d_flux[k_up][saturation_offset(j)] += ctx.dt * up.d_mobility_ds(ip, j) * pot_dif;
        }

        block.add_pair(0, 1, ip, flux, &d_flux);
    }

    block
}
