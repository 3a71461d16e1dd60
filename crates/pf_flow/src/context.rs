// crates/pf_flow/src/context.rs

//! 时间步上下文
//!
//! 每个时间步开始时重建一次，之后以只读方式传给所有内核，直到下一次
//! 重建。内核不读取任何全局状态。

use pf_config::{ApertureIntegration, FlowConfig, TimeIntegration, TipFluxPolicy};

use crate::coupling::TipOverride;

/// 时间步上下文
#[derive(Debug, Clone)]
pub struct StepContext {
    /// 步初时刻 [s]
    pub time: f64,
    /// 时间步长 [s]
    pub dt: f64,
    /// 相数
    pub num_phases: usize,
    /// 开度立方项积分规则
    pub aperture_integration: ApertureIntegration,
    /// 调和/算术平均混合系数
    pub mean_perm_coeff: f64,
    /// 时间积分方式
    pub time_integration: TimeIntegration,
    /// 尖端通量替换数据（条件不满足时为 None）
    pub tip: Option<TipOverride>,
}

impl StepContext {
    /// 由配置构建
    pub fn new(config: &FlowConfig, num_phases: usize, time: f64, dt: f64) -> Self {
        Self {
            time,
            dt,
            num_phases,
            aperture_integration: config.fracture.aperture_integration,
            mean_perm_coeff: config.fracture.mean_perm_coeff,
            time_integration: config.time_integration,
            tip: None,
        }
    }

    /// 附加尖端替换数据
    pub fn with_tip(mut self, tip: Option<TipOverride>) -> Self {
        self.tip = tip;
        self
    }

    /// 尖端替换策略（无替换时为 None）
    pub fn tip_policy(&self) -> Option<TipFluxPolicy> {
        self.tip.as_ref().map(|t| t.policy)
    }

    /// 是否计算累积项
    #[inline]
    pub fn includes_accumulation(&self) -> bool {
        self.time_integration == TimeIntegration::ImplicitTransient
    }
}
