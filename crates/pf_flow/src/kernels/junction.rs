// crates/pf_flow/src/kernels/junction.rs

//! 裂缝汇接通量
//!
//! 立方律渗透率：每个单元的开度项 A_k 由积分规则给出，
//! `sumOfWeights = Σ w_k A_k`。对模板中每一对 (k0 < k1)：
//!
//! ```text
//! harm   = (w0 A0)(w1 A1) / sumOfWeights
//! weight = c · harm + (1 − c) · ¼ (w0 A0 + w1 A1)
//! ΔΦ     = p0 − p1 − ½(ρ0 + ρ1)(g0 − g1)
//! F      = λ_up · weight · ΔΦ · dt
//! ```
//!
//! 当尖端条件成立且单元对中恰有一个尖端单元时，该对的标准通量及其
//! 压力、开度偏导清零，改用粘性主导的渐近通量
//! `q = dt · λ_up · L/12 · gap³ · ∇p`。

use pf_config::{ApertureIntegration, TipFluxPolicy};
use pf_foundation::require;

use super::{LocalFluxBlock, StencilDerivs};
use crate::context::StepContext;
use crate::error::{FlowError, FlowResult};
use crate::mesh::Connection;
use crate::state::FlowDomain;
use crate::types::{saturation_offset, MAX_DOF, MAX_STENCIL, PRESSURE_OFFSET};

/// 开度项及其对当前开度的导数
///
/// # 参数
///
/// - `aperture0`: 步初开度
/// - `aperture`: 当前开度
#[inline]
pub fn aperture_term(rule: ApertureIntegration, aperture0: f64, aperture: f64) -> (f64, f64) {
    let (a0, a) = (aperture0, aperture);
    match rule {
        ApertureIntegration::ForwardEuler => (a0 * a0 * a0, 0.0),
        ApertureIntegration::Simpson => (
            0.25 * (a0 * a0 * a0 + a0 * a0 * a + a0 * a * a + a * a * a),
            0.25 * (a0 * a0 + 2.0 * a0 * a + 3.0 * a * a),
        ),
        ApertureIntegration::BackwardEuler => (a * a * a, 3.0 * a * a),
    }
}

/// 计算单个汇接连接的局部通量块
///
/// 开度项非正或 `sumOfWeights` 非正视为开度协作方违反前置条件。
pub fn junction_flux(
    conn: &Connection,
    domain: &FlowDomain,
    ctx: &StepContext,
) -> FlowResult<LocalFluxBlock> {
    let n = conn.size();
    let np = ctx.num_phases;
    let c = ctx.mean_perm_coeff;
    let cell = |k: usize| domain.cell(conn.cells[k]);
    let mut block = LocalFluxBlock::new(n, np);

    let mut aper_term = [0.0; MAX_STENCIL];
    let mut d_aper_term = [0.0; MAX_STENCIL];
    let mut sum_of_weights = 0.0;
    for k in 0..n {
        let (a, a0) = cell(k).apertures();
        let (term, d_term) = aperture_term(ctx.aperture_integration, a0, a);
        if !(term > 0.0) {
            return Err(FlowError::precondition(format!(
                "单元 {:?} 的开度项非正: {term:e}（a = {a:e}, a0 = {a0:e}）",
                conn.cells[k]
            )));
        }
        aper_term[k] = term;
        d_aper_term[k] = d_term;
        sum_of_weights += term * conn.weights[k];
    }
    if !(sum_of_weights > 0.0) {
        return Err(FlowError::precondition(format!(
            "汇接连接的权重和非正: {sum_of_weights:e}"
        )));
    }

    for k0 in 0..n {
        for k1 in (k0 + 1)..n {
            let pair = [k0, k1];
            let wa = [
                conn.weights[k0] * aper_term[k0],
                conn.weights[k1] * aper_term[k1],
            ];
            let harmonic = wa[0] * wa[1] / sum_of_weights;
            let weight = c * harmonic + (1.0 - c) * 0.25 * (wa[0] + wa[1]);

            // sumOfWeights 依赖模板内全部单元的开度，对不在该对中的单元也有偏导
            let mut d_weight = [0.0; MAX_STENCIL];
            for m in 0..n {
                let in_pair = m == k0 || m == k1;
                let own = if in_pair { 1.0 / aper_term[m] } else { 0.0 };
                let d_harmonic = (own - conn.weights[m] / sum_of_weights) * harmonic * d_aper_term[m];
                let d_arith = if in_pair {
                    0.25 * (1.0 - c) * conn.weights[m] * d_aper_term[m]
                } else {
                    0.0
                };
                d_weight[m] = c * d_harmonic + d_arith;
            }

            let tip_local = tip_in_pair(conn, ctx, pair);

            for ip in 0..np {
                let (c0, c1) = (cell(k0), cell(k1));
                let (rho0, drho0) = c0.density(ip);
                let (rho1, drho1) = c1.density(ip);
                let dens_mean = 0.5 * (rho0 + rho1);
                let d_dens_mean = [0.5 * drho0, 0.5 * drho1];
                let d_grav = c0.gravity_coef() - c1.gravity_coef();

                let pot_dif = c0.pressure() - c1.pressure() - dens_mean * d_grav;
                let k_up = if pot_dif >= 0.0 { 0 } else { 1 };
                let up = cell(pair[k_up]);
                let lambda = up.mobility(ip);
                let d_lambda_dp = up.d_mobility_dp(ip);

                if let (Some(i_tip), Some(tip)) = (tip_local, ctx.tip.as_ref()) {
                    let gap = require!(
                        tip.gap(conn.cells[pair[i_tip]]),
                        FlowError::precondition("尖端单元缺少张开量")
                    );
                    let edge_length = require!(
                        conn.edge_length,
                        FlowError::precondition("尖端替换需要裂缝连接边长")
                    );
                    let geometry = edge_length / 12.0 * gap.powi(3) * tip.pressure_gradient(gap);

                    let modified = ctx.dt * lambda * geometry;
                    let mut d_modified: StencilDerivs = [[0.0; MAX_DOF]; MAX_STENCIL];
                    d_modified[pair[k_up]][PRESSURE_OFFSET] = ctx.dt * d_lambda_dp * geometry;
                    for j in 0..np - 1 {
                        d_modified[pair[k_up]][saturation_offset(j)] =
                            ctx.dt * up.d_mobility_ds(ip, j) * geometry;
                    }

                    let channel = pair[1 - i_tip];
                    let tip_cell = pair[i_tip];
                    block.add_row(channel, ip, modified, &d_modified, 1.0);
                    if tip.policy == TipFluxPolicy::Conservative {
                        block.add_row(tip_cell, ip, modified, &d_modified, -1.0);
                    }
                    block.tip_overrides += 1;
                    continue;
                }

                let flux = lambda * weight * pot_dif * ctx.dt;

                let mut d_flux: StencilDerivs = [[0.0; MAX_DOF]; MAX_STENCIL];
                d_flux[k0][PRESSURE_OFFSET] =
                    lambda * weight * (1.0 - d_dens_mean[0] * d_grav) * ctx.dt;
                d_flux[k1][PRESSURE_OFFSET] =
                    lambda * weight * (-1.0 - d_dens_mean[1] * d_grav) * ctx.dt;
                d_flux[pair[k_up]][PRESSURE_OFFSET] += d_lambda_dp * weight * pot_dif * ctx.dt;
                for j in 0..np - 1 {
                    d_flux[pair[k_up]][saturation_offset(j)] +=
                        up.d_mobility_ds(ip, j) * weight * pot_dif * ctx.dt;
                }

                let mut d_aper = [0.0; MAX_STENCIL];
                for m in 0..n {
                    d_aper[m] = lambda * d_weight[m] * pot_dif * ctx.dt;
                }

                block.add_pair(k0, k1, ip, flux, &d_flux);
                block.add_pair_aperture(k0, k1, ip, &d_aper);
            }
        }
    }

    Ok(block)
}

/// 单元对中恰好一个尖端单元时，返回其在对内的位置
fn tip_in_pair(conn: &Connection, ctx: &StepContext, pair: [usize; 2]) -> Option<usize> {
    let tip = ctx.tip.as_ref()?;
    match (
        tip.is_tip(conn.cells[pair[0]]),
        tip.is_tip(conn.cells[pair[1]]),
    ) {
        (true, false) => Some(0),
        (false, true) => Some(1),
        _ => None,
    }
}
