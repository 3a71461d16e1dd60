// crates/pf_flow/src/phase_map.rs

//! 相 → 残差行映射
//!
//! 由声明式润湿性表（最润湿相在前）在建模阶段一次性解析：某相的行偏移
//! 等于它在「实际存在的相」中按润湿性排序的名次。
//!
//! | 存在的相      | 行 0  | 行 1 | 行 2 |
//! |---------------|-------|------|------|
//! | water, oil    | water | oil  |      |
//! | oil, gas      | oil   | gas  |      |
//! | water,oil,gas | water | oil  | gas  |
//!
//! 流体模型与相渗模型按相名匹配，允许顺序不同。

use crate::error::{FlowError, FlowResult};
use crate::types::MAX_PHASES;

/// 相到残差行的双射，以及相渗顺序到流体顺序的置换
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseRowMap {
    names: Vec<String>,
    rows: [usize; MAX_PHASES],
    relperm_to_fluid: [usize; MAX_PHASES],
}

impl PhaseRowMap {
    /// 解析映射
    ///
    /// # 参数
    ///
    /// - `wettability_order`: 润湿性表
    /// - `fluid_phases`: 流体模型相名（流体相顺序，即相索引）
    /// - `relperm_phases`: 相渗模型相名
    pub fn build(
        wettability_order: &[String],
        fluid_phases: &[String],
        relperm_phases: &[String],
    ) -> FlowResult<Self> {
        let np = fluid_phases.len();
        if np == 0 || np > MAX_PHASES {
            return Err(FlowError::phase_mismatch(format!(
                "相数 {np} 不在 1..={MAX_PHASES} 范围内"
            )));
        }
        if relperm_phases.len() != np {
            return Err(FlowError::phase_mismatch(format!(
                "流体模型有 {np} 相，相渗模型有 {} 相",
                relperm_phases.len()
            )));
        }
        for (i, name) in fluid_phases.iter().enumerate() {
            if fluid_phases[..i].contains(name) {
                return Err(FlowError::phase_mismatch(format!("流体相名重复: {name}")));
            }
        }

        let mut relperm_to_fluid = [0; MAX_PHASES];
        for (k, name) in relperm_phases.iter().enumerate() {
            relperm_to_fluid[k] = fluid_phases
                .iter()
                .position(|f| f == name)
                .ok_or_else(|| {
                    FlowError::phase_mismatch(format!("相渗模型的相 '{name}' 不在流体模型中"))
                })?;
        }

        let mut rank_in_table = [0; MAX_PHASES];
        for (ip, name) in fluid_phases.iter().enumerate() {
            rank_in_table[ip] = wettability_order
                .iter()
                .position(|w| w == name)
                .ok_or_else(|| {
                    FlowError::phase_mismatch(format!("相 '{name}' 不在润湿性表中"))
                })?;
        }

        let mut rows = [0; MAX_PHASES];
        for ip in 0..np {
            rows[ip] = (0..np)
                .filter(|&jp| rank_in_table[jp] < rank_in_table[ip])
                .count();
        }

        Ok(Self {
            names: fluid_phases.to_vec(),
            rows,
            relperm_to_fluid,
        })
    }

    /// 相数
    #[inline]
    pub fn num_phases(&self) -> usize {
        self.names.len()
    }

    /// 相名（流体相顺序）
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// 相 `ip` 的残差行偏移
    #[inline]
    pub fn row(&self, ip: usize) -> usize {
        self.rows[ip]
    }

    /// 按名字查行偏移
    pub fn row_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name).map(|ip| self.rows[ip])
    }

    /// 相渗相 `k` 对应的流体相索引
    #[inline]
    pub fn fluid_index_of_relperm(&self, k: usize) -> usize {
        self.relperm_to_fluid[k]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn table() -> Vec<String> {
        names(&["water", "oil", "gas"])
    }

    #[test]
    fn test_oil_gas_rows() {
        let map = PhaseRowMap::build(&table(), &names(&["gas", "oil"]), &names(&["oil", "gas"]))
            .unwrap();
        assert_eq!(map.row_of("oil"), Some(0));
        assert_eq!(map.row_of("gas"), Some(1));
        assert_eq!(map.fluid_index_of_relperm(0), 1);
    }

    #[test]
    fn test_three_phase_identity() {
        let map = PhaseRowMap::build(&table(), &table(), &table()).unwrap();
        for ip in 0..3 {
            assert_eq!(map.row(ip), ip);
            assert_eq!(map.fluid_index_of_relperm(ip), ip);
        }
    }

    #[test]
    fn test_unknown_phase_rejected() {
        let err = PhaseRowMap::build(&table(), &names(&["water", "co2"]), &names(&["co2", "water"]))
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_count_mismatch_rejected() {
        assert!(PhaseRowMap::build(&table(), &names(&["water", "oil"]), &names(&["water"])).is_err());
    }
}
