// crates/pf_config/src/lib.rs

//! PoroFrac Config Layer
//!
//! 配置层，提供流动求解器的全部可调参数。本层无泛型，全部数值为 f64。
//!
//! # 模块概览
//!
//! - [`flow_config`]: `FlowConfig` 及其分节（Newton、线性求解、裂缝、相、重力、诊断）
//! - [`options`]: 离散选项枚举
//! - [`error`]: 配置错误类型

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod flow_config;
pub mod options;

// 重导出核心类型
pub use error::ConfigError;
pub use flow_config::{
    DiagnosticsConfig, FlowConfig, FractureConfig, GravityConfig, LinearConfig, NewtonConfig,
    PhaseConfig,
};
pub use options::{ApertureIntegration, TimeIntegration, TipFluxPolicy};
