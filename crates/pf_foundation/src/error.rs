// crates/pf_foundation/src/error.rs

//! 基础错误类型
//!
//! `PfError` 只描述与物理无关的输入问题：长度、范围、索引和配置。
//! 流动求解的错误在 `pf_flow::FlowError` 中包装本类型。
//!
//! # 示例
//!
//! ```
//! use pf_foundation::error::{PfError, PfResult};
//!
//! fn read_table() -> PfResult<()> {
//!     Err(PfError::config("润湿性表为空"))
//! }
//! assert!(read_table().is_err());
//! ```

use thiserror::Error;

/// 统一结果类型
pub type PfResult<T> = Result<T, PfError>;

/// PoroFrac 基础错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PfError {
    /// 无效输入
    #[error("无效的输入数据: {message}")]
    InvalidInput {
        /// 说明无效原因
        message: String,
    },

    /// 物理量超出允许范围
    #[error("{field} = {value:e} 超出范围 [{min:e}, {max:e}]")]
    OutOfRange {
        /// 字段名
        field: &'static str,
        /// 实际值
        value: f64,
        /// 最小允许值
        min: f64,
        /// 最大允许值
        max: f64,
    },

    /// 单元场长度不一致
    #[error("{name} 长度应为 {expected}，实际为 {actual}")]
    SizeMismatch {
        /// 字段名
        name: &'static str,
        /// 期望长度
        expected: usize,
        /// 实际长度
        actual: usize,
    },

    /// 区域、子区域或单元索引越界
    #[error("{index_type} 索引 {index} 超出范围 0..{len}")]
    IndexOutOfBounds {
        /// 索引类别
        index_type: &'static str,
        /// 访问的索引
        index: usize,
        /// 上界
        len: usize,
    },

    /// 配置错误
    #[error("配置错误: {message}")]
    Config {
        /// 具体错误信息
        message: String,
    },
}

impl PfError {
    /// 无效输入
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// 超出范围
    pub fn out_of_range(field: &'static str, value: f64, min: f64, max: f64) -> Self {
        Self::OutOfRange {
            field,
            value,
            min,
            max,
        }
    }

    /// 长度不一致
    pub fn size_mismatch(name: &'static str, expected: usize, actual: usize) -> Self {
        Self::SizeMismatch {
            name,
            expected,
            actual,
        }
    }

    /// 索引越界
    pub fn index_out_of_bounds(index_type: &'static str, index: usize, len: usize) -> Self {
        Self::IndexOutOfBounds {
            index_type,
            index,
            len,
        }
    }

    /// 配置错误
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    // ========================================================================
    // 校验辅助
    // ========================================================================

    /// 长度必须相等
    #[inline]
    pub fn check_size(name: &'static str, expected: usize, actual: usize) -> PfResult<()> {
        if expected == actual {
            Ok(())
        } else {
            Err(Self::size_mismatch(name, expected, actual))
        }
    }

    /// 闭区间检查，NaN 视为越界
    #[inline]
    pub fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> PfResult<()> {
        if (min..=max).contains(&value) {
            Ok(())
        } else {
            Err(Self::out_of_range(field, value, min, max))
        }
    }

    /// 索引必须小于长度
    #[inline]
    pub fn check_index(index_type: &'static str, index: usize, len: usize) -> PfResult<()> {
        if index < len {
            Ok(())
        } else {
            Err(Self::index_out_of_bounds(index_type, index, len))
        }
    }
}

// ========================================================================
// 校验宏
// ========================================================================

/// 条件不满足时提前返回错误
///
/// ```
/// use pf_foundation::{ensure, PfError, PfResult};
///
/// fn positive(v: f64) -> PfResult<f64> {
///     ensure!(v > 0.0, PfError::invalid_input("必须为正"));
///     Ok(v)
/// }
/// assert!(positive(-1.0).is_err());
/// ```
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $err:expr $(,)?) => {
        if !$cond {
            return Err($err.into());
        }
    };
}

/// 解包 `Option`，为 `None` 时提前返回错误
#[macro_export]
macro_rules! require {
    ($opt:expr, $err:expr $(,)?) => {
        match $opt {
            Some(v) => v,
            None => return Err($err.into()),
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PfError::config("润湿性表为空");
        assert!(err.to_string().contains("配置错误"));
    }

    #[test]
    fn test_index_message_names_kind() {
        let msg = PfError::index_out_of_bounds("cell", 10, 5).to_string();
        assert!(msg.contains("cell"));
        assert!(msg.contains("10"));
    }

    #[test]
    fn test_check_size() {
        assert!(PfError::check_size("pressure", 4, 4).is_ok());
        assert_eq!(
            PfError::check_size("pressure", 4, 3),
            Err(PfError::size_mismatch("pressure", 4, 3))
        );
    }

    #[test]
    fn test_check_range_rejects_nan() {
        assert!(PfError::check_range("saturation", 0.5, 0.0, 1.0).is_ok());
        assert!(PfError::check_range("saturation", 1.0, 0.0, 1.0).is_ok());
        assert!(PfError::check_range("saturation", -0.1, 0.0, 1.0).is_err());
        assert!(PfError::check_range("saturation", f64::NAN, 0.0, 1.0).is_err());
    }

    #[test]
    fn test_check_index() {
        assert!(PfError::check_index("region", 0, 1).is_ok());
        assert!(PfError::check_index("region", 1, 1).is_err());
    }

    #[test]
    fn test_ensure_and_require() {
        fn volume(v: Option<f64>) -> PfResult<f64> {
            let v = require!(v, PfError::invalid_input("缺少体积"));
            ensure!(v > 0.0, PfError::out_of_range("volume", v, 0.0, f64::INFINITY));
            Ok(v)
        }

        assert_eq!(volume(Some(2.0)), Ok(2.0));
        assert!(matches!(volume(Some(-1.0)), Err(PfError::OutOfRange { .. })));
        assert!(matches!(volume(None), Err(PfError::InvalidInput { .. })));
    }
}
