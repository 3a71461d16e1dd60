// crates/pf_config/src/options.rs

//! 离散选项枚举
//!
//! 这些枚举在配置文件中以 snake_case 字符串出现，例如
//! `"aperture_integration": "simpson"`。

use serde::{Deserialize, Serialize};

/// 裂缝开度立方项的时间积分规则
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApertureIntegration {
    /// `a0³`，对当前开度导数为零
    ForwardEuler,
    /// `¼(a0³ + a0²a + a0a² + a³)`
    Simpson,
    /// `a³`
    #[default]
    BackwardEuler,
}

/// 裂缝尖端通量替换后的守恒处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TipFluxPolicy {
    /// 通道单元得到渐近通量，尖端单元等量扣除，雅可比镜像
    #[default]
    Conservative,
    /// 只修改通道单元所在行（历史行为，成对通量不反对称）
    ChannelOnly,
}

/// 时间积分方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeIntegration {
    /// 全隐式瞬态（包含累积项）
    #[default]
    ImplicitTransient,
    /// 稳态（跳过累积项）
    SteadyState,
}
