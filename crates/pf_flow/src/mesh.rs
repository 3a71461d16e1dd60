// crates/pf_flow/src/mesh.rs

//! 连接模板
//!
//! 网格拓扑由外部提供：每个连接是 2..=`MAX_STENCIL` 个单元及其传导率
//! 权重。两点连接的权重带符号（`+T, −T`），裂缝汇接连接的权重为正的
//! 半传导率，与开度立方项组合。时间步内连接集合不变。

use serde::{Deserialize, Serialize};

use crate::error::{FlowError, FlowResult};
use crate::state::FlowDomain;
use crate::types::{CellKey, MAX_STENCIL};

/// 连接类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionKind {
    /// 两点（及多点）有限体积连接，通量作用在前两个单元上
    TwoPoint,
    /// 裂缝汇接，对模板内所有单元两两计算通量
    Junction,
}

/// 单个连接
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    /// 模板单元
    pub cells: Vec<CellKey>,
    /// 对应的传导率权重
    pub weights: Vec<f64>,
    /// 裂缝连接边长 [m]（尖端渐近通量需要）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edge_length: Option<f64>,
}

impl Connection {
    /// 两点连接，权重为 `[T, −T]`
    pub fn two_point(a: CellKey, b: CellKey, transmissibility: f64) -> Self {
        Self {
            cells: vec![a, b],
            weights: vec![transmissibility, -transmissibility],
            edge_length: None,
        }
    }

    /// 一般连接
    pub fn new(cells: Vec<CellKey>, weights: Vec<f64>) -> Self {
        Self {
            cells,
            weights,
            edge_length: None,
        }
    }

    /// 设置裂缝连接边长
    pub fn with_edge_length(mut self, length: f64) -> Self {
        self.edge_length = Some(length);
        self
    }

    /// 模板大小
    #[inline]
    pub fn size(&self) -> usize {
        self.cells.len()
    }
}

/// 同类连接列表（构建时校验）
#[derive(Debug, Clone)]
pub struct ConnectionList {
    kind: ConnectionKind,
    connections: Vec<Connection>,
}

impl ConnectionList {
    /// 创建并校验连接列表
    pub fn new(
        kind: ConnectionKind,
        connections: Vec<Connection>,
        domain: &FlowDomain,
    ) -> FlowResult<Self> {
        for (index, conn) in connections.iter().enumerate() {
            let n = conn.size();
            if !(2..=MAX_STENCIL).contains(&n) {
                return Err(FlowError::invalid_connection(
                    index,
                    format!("模板大小 {n} 不在 2..={MAX_STENCIL} 范围内"),
                ));
            }
            if conn.weights.len() != n {
                return Err(FlowError::invalid_connection(
                    index,
                    format!("权重数 {} 与单元数 {n} 不一致", conn.weights.len()),
                ));
            }
            if conn.weights.iter().any(|w| !w.is_finite()) {
                return Err(FlowError::invalid_connection(index, "权重必须为有限值"));
            }
            for &cell in &conn.cells {
                domain.check_key(cell)?;
            }
            if kind == ConnectionKind::Junction && conn.weights.iter().any(|&w| w <= 0.0) {
                return Err(FlowError::invalid_connection(index, "汇接连接的权重必须为正"));
            }
        }
        Ok(Self { kind, connections })
    }

    /// 空列表
    pub fn empty(kind: ConnectionKind) -> Self {
        Self {
            kind,
            connections: Vec::new(),
        }
    }

    /// 连接类型
    #[inline]
    pub fn kind(&self) -> ConnectionKind {
        self.kind
    }

    /// 连接切片
    #[inline]
    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// 连接数
    #[inline]
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// 是否为空
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

/// 一个计算域的全部连接
#[derive(Debug, Clone)]
pub struct ConnectionSet {
    /// 基质两点连接
    pub two_point: ConnectionList,
    /// 裂缝汇接连接
    pub junction: ConnectionList,
}

impl ConnectionSet {
    /// 只有两点连接
    pub fn matrix_only(two_point: ConnectionList) -> Self {
        Self {
            two_point,
            junction: ConnectionList::empty(ConnectionKind::Junction),
        }
    }
}
