// crates/pf_flow/src/lib.rs

//! PoroFrac 全隐式多相流核心
//!
//! 在非结构网格上离散孔隙与裂缝介质中的多相流动，每个时间步用 Newton
//! 迭代求解非线性系统。包括：
//! - 状态更新级联 (update)：流体 → 固体 → 相渗 → 流度
//! - 局部内核 (kernels)：两点通量、裂缝汇接通量（含尖端替换）、累积项
//! - 组装 (assembly)：残差/雅可比散射与诊断导出
//! - Newton 控制器 (newton)：越界回退与收敛判定
//! - 耦合边界 (coupling)：开度、尖端数据、变形钩子、应变能历史
//!
//! # 外部协作方
//!
//! - [`LinearSolve`]: 线性求解，内置 [`BiCgStabLinearSolver`]
//! - [`Communicator`]: 跨进程归约与幽灵同步，内置 [`SerialCommunicator`]
//! - [`FluidModel`] / [`RelPermModel`] / [`SolidModel`]: 本构模型

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod assembly;
pub mod comm;
pub mod constitutive;
pub mod context;
pub mod coupling;
pub mod dof;
pub mod error;
pub mod kernels;
pub mod mesh;
pub mod newton;
pub mod numerics;
pub mod phase_map;
pub mod state;
pub mod types;
pub mod update;

// 重导出核心类型
pub use assembly::{AssembledSystem, AssemblyDriver};
pub use comm::{Communicator, SerialCommunicator};
pub use context::StepContext;
pub use coupling::{
    average_gap, CouplingAdapter, CouplingSummary, DeformationHook, FractureElement,
    NoDeformation, NodeDisplacement, StrainEnergySource, TipMaterial, TipOverride, TipRegion,
    VolDevStrainEnergy,
};
pub use dof::DofManager;
pub use error::{FlowError, FlowResult};
pub use mesh::{Connection, ConnectionKind, ConnectionList, ConnectionSet};
pub use newton::{NewtonState, NewtonStepController, NonConvergence, StepOutcome, StepReport};
pub use phase_map::PhaseRowMap;
pub use state::{CellView, FlowDomain, Region, SubRegion};
pub use types::{CellKey, Deriv, MAX_DOF, MAX_PHASES, MAX_STENCIL};
pub use update::PhaseStateUpdater;

// 重导出本构模型
pub use constitutive::{
    BrooksCoreyPhase, BrooksCoreyRelPerm, CompressibleFluid, FluidModel, PhaseFluidProps,
    PoreCompressibility, RelPermModel, SolidModel,
};

// 重导出线性代数
pub use numerics::linear_algebra::{
    BiCgStabLinearSolver, CsrMatrix, LinearSolve, SolverResult, SolverStatus,
};

/// 预导入模块
pub mod prelude {
    pub use crate::{
        BrooksCoreyPhase, BrooksCoreyRelPerm, CellKey, CompressibleFluid, Connection,
        ConnectionKind, ConnectionList, ConnectionSet, CouplingAdapter, DofManager, FlowDomain,
        FlowError, FlowResult, NewtonStepController, PhaseFluidProps, PhaseStateUpdater,
        PoreCompressibility, Region, StepOutcome, SubRegion,
    };
    pub use pf_config::FlowConfig;
}
