// crates/pf_flow/src/constitutive/fluid.rs

//! 流体模型：相密度与粘度

use serde::{Deserialize, Serialize};

use crate::state::PhaseArray;
use crate::types::MAX_PHASES;

/// 单点流体性质（流体相顺序）
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FluidPoint {
    /// 密度
    pub density: PhaseArray,
    /// ∂ρ/∂p
    pub d_density_dp: PhaseArray,
    /// 粘度
    pub viscosity: PhaseArray,
    /// ∂μ/∂p
    pub d_viscosity_dp: PhaseArray,
}

/// 流体模型
pub trait FluidModel: Send + Sync {
    /// 相名（决定流体相顺序）
    fn phase_names(&self) -> &[String];

    /// 在给定压力下求值
    fn evaluate(&self, pressure: f64) -> FluidPoint;
}

/// 单相参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseFluidProps {
    /// 相名
    pub name: String,
    /// 参考密度 [kg/m³]
    pub reference_density: f64,
    /// 压缩系数 [1/Pa]
    pub compressibility: f64,
    /// 参考粘度 [Pa·s]
    pub reference_viscosity: f64,
    /// 粘度压力系数 [1/Pa]
    pub viscosibility: f64,
}

impl PhaseFluidProps {
    /// 不可压、粘度恒定的相
    pub fn incompressible(name: impl Into<String>, density: f64, viscosity: f64) -> Self {
        Self {
            name: name.into(),
            reference_density: density,
            compressibility: 0.0,
            reference_viscosity: viscosity,
            viscosibility: 0.0,
        }
    }

    /// 设置压缩系数
    pub fn with_compressibility(mut self, c: f64) -> Self {
        self.compressibility = c;
        self
    }
}

/// 指数型可压缩流体
///
/// `ρ = ρ₀·exp(c (p − p₀))`，`μ = μ₀·exp(c_μ (p − p₀))`
#[derive(Debug, Clone)]
pub struct CompressibleFluid {
    names: Vec<String>,
    phases: Vec<PhaseFluidProps>,
    reference_pressure: f64,
}

impl CompressibleFluid {
    /// 创建模型，最多 `MAX_PHASES` 相
    pub fn new(phases: Vec<PhaseFluidProps>, reference_pressure: f64) -> Self {
        debug_assert!(!phases.is_empty() && phases.len() <= MAX_PHASES);
        Self {
            names: phases.iter().map(|p| p.name.clone()).collect(),
            phases,
            reference_pressure,
        }
    }
}

impl FluidModel for CompressibleFluid {
    fn phase_names(&self) -> &[String] {
        &self.names
    }

    fn evaluate(&self, pressure: f64) -> FluidPoint {
        let dp = pressure - self.reference_pressure;
        let mut out = FluidPoint::default();
        for (ip, phase) in self.phases.iter().enumerate() {
            let rho = phase.reference_density * (phase.compressibility * dp).exp();
            let mu = phase.reference_viscosity * (phase.viscosibility * dp).exp();
            out.density[ip] = rho;
            out.d_density_dp[ip] = phase.compressibility * rho;
            out.viscosity[ip] = mu;
            out.d_viscosity_dp[ip] = phase.viscosibility * mu;
        }
        out
    }
}
