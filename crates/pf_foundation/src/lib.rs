// crates/pf_foundation/src/lib.rs

//! PoroFrac Foundation Layer
//!
//! 基础层，提供整个工作区共享的错误类型与校验宏。
//!
//! # 模块概览
//!
//! - [`error`]: 统一错误类型 `PfError` / `PfResult`
//!
//! # 层级架构
//!
//! ```text
//! Layer 4: pf_cli        ─> 命令行驱动
//! Layer 3: pf_flow       ─> 多相流组装与 Newton 求解
//! Layer 2: pf_config     ─> FlowConfig
//! Layer 1: pf_foundation ─> PfError, ensure!, require! (本层)
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;

// 重导出常用类型
pub use error::{PfError, PfResult};

/// Prelude 模块，包含常用类型
pub mod prelude {
    pub use crate::error::{PfError, PfResult};
    pub use crate::{ensure, require};
}
