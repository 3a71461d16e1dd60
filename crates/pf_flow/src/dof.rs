// crates/pf_flow/src/dof.rs

//! 自由度编号
//!
//! 每个单元占 `num_phases` 个连续自由度：压力在前，随后是前
//! `num_phases − 1` 个饱和度。拥有单元先编号，幽灵单元排在其后，
//! 因此本地矩阵的行恰好是前 `n_local_rows` 个自由度。

use crate::state::FlowDomain;
use crate::types::CellKey;

/// 自由度编号结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DofManager {
    dofs_per_cell: usize,
    n_owned_cells: usize,
    n_ghost_cells: usize,
    owned: Vec<CellKey>,
}

impl DofManager {
    /// 为计算域编号，结果写入各子区域的 `dof_number`
    pub fn number(domain: &mut FlowDomain) -> Self {
        let dofs_per_cell = domain.num_phases();
        let mut owned = Vec::new();
        let mut ghosts = Vec::new();
        for (r, s, sub) in domain.subregions() {
            for i in 0..sub.n_cells() {
                let key = CellKey::new(r, s, i);
                if sub.is_owned(i) {
                    owned.push(key);
                } else {
                    ghosts.push(key);
                }
            }
        }

        for (ordinal, key) in owned.iter().chain(&ghosts).enumerate() {
            domain.regions[key.region].subregions[key.subregion].dof_number[key.index] =
                ordinal * dofs_per_cell;
        }

        log::debug!(
            "自由度编号完成: 拥有单元 {}, 幽灵单元 {}, 每单元 {} 个自由度",
            owned.len(),
            ghosts.len(),
            dofs_per_cell
        );

        Self {
            dofs_per_cell,
            n_owned_cells: owned.len(),
            n_ghost_cells: ghosts.len(),
            owned,
        }
    }

    /// 每单元自由度数
    #[inline]
    pub fn dofs_per_cell(&self) -> usize {
        self.dofs_per_cell
    }

    /// 本地方程行数
    #[inline]
    pub fn n_local_rows(&self) -> usize {
        self.n_owned_cells * self.dofs_per_cell
    }

    /// 列数（含幽灵单元）
    #[inline]
    pub fn n_cols(&self) -> usize {
        (self.n_owned_cells + self.n_ghost_cells) * self.dofs_per_cell
    }

    /// 单元总数（开度块的列数）
    #[inline]
    pub fn n_cells(&self) -> usize {
        self.n_owned_cells + self.n_ghost_cells
    }

    /// 单元序号
    #[inline]
    pub fn cell_ordinal(&self, dof: usize) -> usize {
        dof / self.dofs_per_cell
    }

    /// 按编号顺序的拥有单元
    pub fn owned_cells(&self) -> &[CellKey] {
        &self.owned
    }
}
