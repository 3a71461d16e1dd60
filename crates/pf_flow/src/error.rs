// crates/pf_flow/src/error.rs

//! 流动求解错误类型
//!
//! 在 `PfError` 之上扩展与流动求解相关的错误。越界回退与线性求解失败
//! 不属于错误，它们通过 [`crate::newton::StepOutcome`] 报告。

use pf_config::ConfigError;
use pf_foundation::PfError;
use thiserror::Error;

/// 流动求解结果类型
pub type FlowResult<T> = Result<T, FlowError>;

/// 流动求解错误
#[derive(Error, Debug)]
pub enum FlowError {
    /// 基础层错误
    #[error(transparent)]
    Foundation(#[from] PfError),

    /// 配置错误
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// 流体模型与相渗模型的相集合不一致
    #[error("相映射错误: {0}")]
    PhaseMismatch(String),

    /// 几何或开度协作方违反前置条件
    #[error("前置条件违反: {0}")]
    Precondition(String),

    /// 连接模板无效
    #[error("无效连接 #{index}: {reason}")]
    InvalidConnection {
        /// 连接序号
        index: usize,
        /// 原因
        reason: String,
    },

    /// IO 错误（诊断输出）
    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),
}

impl FlowError {
    /// 相映射错误
    pub fn phase_mismatch(message: impl Into<String>) -> Self {
        Self::PhaseMismatch(message.into())
    }

    /// 前置条件违反
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition(message.into())
    }

    /// 无效连接
    pub fn invalid_connection(index: usize, reason: impl Into<String>) -> Self {
        Self::InvalidConnection {
            index,
            reason: reason.into(),
        }
    }

    /// 是否为配置类错误（建模阶段即应终止）
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::PhaseMismatch(_) | Self::Foundation(PfError::Config { .. })
        )
    }
}
