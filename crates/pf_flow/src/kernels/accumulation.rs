// crates/pf_flow/src/kernels/accumulation.rs

//! 质量累积项
//!
//! ```text
//! R_ip     = V (φ ρ_ip S_ip)_new − V (φ_old ρ_old,ip S_old,ip)
//! φ_new    = φ_ref · pv_mult
//! ∂R/∂p    = V S_ip (φ' ρ_ip + φ ρ'_ip)
//! ∂R/∂S_j  = V φ ρ_ip ∂S_ip/∂S_j        (+1：ip = j；−1：ip 为最后一相)
//! ```

use crate::state::SubRegion;
use crate::types::{saturation_offset, MAX_DOF, MAX_PHASES, PRESSURE_OFFSET};

/// 单元累积项的局部残差与雅可比
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LocalAccumulation {
    /// 按相的残差
    pub residual: [f64; MAX_PHASES],
    /// `jacobian[ip][dof]`
    pub jacobian: [[f64; MAX_DOF]; MAX_PHASES],
}

/// 计算子区域第 `i` 个单元的累积项
pub fn accumulation(sub: &SubRegion, i: usize) -> LocalAccumulation {
    let np = sub.num_phases();
    let volume = sub.volume[i];
    let poro_new = sub.porosity_ref[i] * sub.pv_mult[i];
    let d_poro_dp = sub.porosity_ref[i] * sub.d_pv_mult_dp[i];
    let poro_old = sub.porosity_old[i];
    let sat_new = sub.trial_saturation(i);

    let mut out = LocalAccumulation::default();
    for ip in 0..np {
        let rho = sub.density[i][ip];
        let drho = sub.d_density_dp[i][ip];
        let sat_old = sub.saturation[i][ip];

        out.residual[ip] =
            volume * (poro_new * rho * sat_new[ip] - poro_old * sub.density_old[i][ip] * sat_old);
        out.jacobian[ip][PRESSURE_OFFSET] = volume * sat_new[ip] * (d_poro_dp * rho + poro_new * drho);

        let pore_mass = volume * poro_new * rho;
        if ip + 1 < np {
            out.jacobian[ip][saturation_offset(ip)] = pore_mass;
        } else {
            for j in 0..np - 1 {
                out.jacobian[ip][saturation_offset(j)] = -pore_mass;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_phase_cell() -> SubRegion {
        let mut sub = SubRegion::new(1, 2);
        sub.volume[0] = 2.0;
        sub.porosity_ref[0] = 0.25;
        sub.set_saturation(0, &[0.3, 0.7]).unwrap();
        sub.density[0] = [1000.0, 800.0, 0.0];
        sub.d_density_dp[0] = [1e-6, 2e-6, 0.0];
        sub.pv_mult[0] = 1.0;
        sub.d_pv_mult_dp[0] = 1e-9;
        sub.backup_fields();
        sub
    }

    #[test]
    fn test_zero_at_step_start() {
        let sub = two_phase_cell();
        let acc = accumulation(&sub, 0);
        assert_eq!(acc.residual[0], 0.0);
        assert_eq!(acc.residual[1], 0.0);
    }

    #[test]
    fn test_saturation_change() {
        let mut sub = two_phase_cell();
        sub.delta_saturation[0] = [0.1, -0.1, 0.0];
        let acc = accumulation(&sub, 0);
        // V φ ρ ΔS
        assert!((acc.residual[0] - 2.0 * 0.25 * 1000.0 * 0.1).abs() < 1e-9);
        assert!((acc.residual[1] + 2.0 * 0.25 * 800.0 * 0.1).abs() < 1e-9);
        assert_eq!(acc.jacobian[0][1], 2.0 * 0.25 * 1000.0);
        assert_eq!(acc.jacobian[1][1], -2.0 * 0.25 * 800.0);
    }

    #[test]
    fn test_pressure_derivative() {
        let sub = two_phase_cell();
        let acc = accumulation(&sub, 0);
        let expected = 2.0 * 0.3 * (0.25 * 1e-9 * 1000.0 + 0.25 * 1e-6);
        assert!((acc.jacobian[0][0] - expected).abs() < 1e-18);
    }
}
