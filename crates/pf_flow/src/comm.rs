// crates/pf_flow/src/comm.rs

//! 跨进程通信边界
//!
//! 分区间的归约与幽灵单元同步都通过 [`Communicator`] 完成，流动核心
//! 只把它当作原子调用。单进程运行使用 [`SerialCommunicator`]。

use crate::error::FlowResult;
use crate::state::FlowDomain;

/// 跨进程通信
pub trait Communicator: Send + Sync {
    /// 本进程编号
    fn rank(&self) -> usize;

    /// 进程总数
    fn size(&self) -> usize;

    /// 全局最小值（用于逻辑与）
    fn min_i32(&self, local: i32) -> i32;

    /// 全局求和
    fn sum_f64(&self, local: f64) -> f64;

    /// 把拥有进程的增量复制到幽灵单元
    fn synchronize_ghosts(&self, domain: &mut FlowDomain) -> FlowResult<()>;

    /// 全局逻辑与
    fn all(&self, local: bool) -> bool {
        self.min_i32(i32::from(local)) == 1
    }
}

/// 单进程通信：归约为恒等，无幽灵单元可同步
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialCommunicator;

impl Communicator for SerialCommunicator {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn min_i32(&self, local: i32) -> i32 {
        local
    }

    fn sum_f64(&self, local: f64) -> f64 {
        local
    }

    fn synchronize_ghosts(&self, _domain: &mut FlowDomain) -> FlowResult<()> {
        Ok(())
    }
}
