// crates/pf_flow/src/constitutive/mod.rs

//! 本构模型接口
//!
//! 每个模型都是纯函数：给定单元主变量，返回值与解析偏导。状态更新器
//! ([`crate::update::PhaseStateUpdater`]) 负责把结果写入子区域字段。
//!
//! - [`fluid`]: 相密度与粘度
//! - [`relperm`]: 相对渗透率
//! - [`solid`]: 孔隙体积乘子
//! - [`damage`]: 损伤退化函数与应变能分解（由力学侧调用）

pub mod damage;
pub mod fluid;
pub mod relperm;
pub mod solid;

pub use damage::{
    active_strain_energy_density, DegradationFunction, LorentzDegradation,
    QuadraticDegradation, StrainEnergyHistory, StrainPoint,
};
pub use fluid::{CompressibleFluid, FluidModel, FluidPoint, PhaseFluidProps};
pub use relperm::{BrooksCoreyPhase, BrooksCoreyRelPerm, RelPermModel};
pub use solid::{PoreCompressibility, SolidModel};
