// crates/pf_flow/src/assembly.rs

//! 残差与雅可比组装
//!
//! 1. 对每个拥有单元计算累积项
//! 2. 对每个连接计算局部通量块（两点与汇接）
//! 3. 串行散射：行 `dof + row(ip)`，列 `dof + {压力, 饱和度}`
//!
//! 局部内核用 rayon 并行求值，每个内核只写自己的缓冲区；散射是一次
//! 串行累加，与求值顺序无关。幽灵单元不产生方程行，但作为列出现。

use pf_config::{DiagnosticsConfig, TipFluxPolicy};
use rayon::prelude::*;

use crate::context::StepContext;
use crate::dof::DofManager;
use crate::error::FlowResult;
use crate::kernels::{accumulation, junction_flux, two_point_flux, LocalFluxBlock};
use crate::mesh::{Connection, ConnectionList, ConnectionSet};
use crate::numerics::linear_algebra::{norm2, CsrBuilder, CsrMatrix};
use crate::numerics::matrix_market;
use crate::phase_map::PhaseRowMap;
use crate::state::FlowDomain;

/// 组装结果
#[derive(Debug, Clone)]
pub struct AssembledSystem {
    /// ∂R/∂x，行为拥有自由度，列含幽灵自由度
    pub jacobian: CsrMatrix,
    /// 残差 R
    pub residual: Vec<f64>,
    /// ∂R/∂aperture，列为单元序号
    pub d_residual_d_aperture: CsrMatrix,
    /// 本次组装中触发的尖端替换数
    pub tip_overrides: usize,
}

impl AssembledSystem {
    /// 本地残差 2-范数
    pub fn local_residual_norm(&self) -> f64 {
        norm2(&self.residual)
    }
}

/// 组装驱动
#[derive(Debug, Clone)]
pub struct AssemblyDriver {
    phase_map: PhaseRowMap,
    diagnostics: DiagnosticsConfig,
}

impl AssemblyDriver {
    /// 创建
    pub fn new(phase_map: PhaseRowMap, diagnostics: DiagnosticsConfig) -> Self {
        Self {
            phase_map,
            diagnostics,
        }
    }

    /// 相行映射
    pub fn phase_map(&self) -> &PhaseRowMap {
        &self.phase_map
    }

    /// 组装全局残差与雅可比
    pub fn assemble(
        &self,
        domain: &FlowDomain,
        connections: &ConnectionSet,
        dofs: &DofManager,
        ctx: &StepContext,
    ) -> FlowResult<AssembledSystem> {
        let np = ctx.num_phases;
        let n_rows = dofs.n_local_rows();
        let mut jacobian = CsrBuilder::new(n_rows, dofs.n_cols());
        let mut d_aperture = CsrBuilder::new(n_rows, dofs.n_cells());
        let mut residual = vec![0.0; n_rows];

        if ctx.includes_accumulation() {
            let local: Vec<_> = dofs
                .owned_cells()
                .par_iter()
                .map(|&key| {
                    let sub = domain.subregion(key);
                    (sub.dof_number[key.index], accumulation(sub, key.index))
                })
                .collect();

            for (dof, acc) in local {
                for ip in 0..np {
                    let row = dof + self.phase_map.row(ip);
                    residual[row] += acc.residual[ip];
                    for d in 0..np {
                        jacobian.add(row, dof + d, acc.jacobian[ip][d]);
                    }
                }
            }
        }

        let mut tip_overrides = 0;
        for list in [&connections.two_point, &connections.junction] {
            for (conn, block) in list.connections().iter().zip(evaluate_fluxes(list, domain, ctx)?) {
                tip_overrides += block.tip_overrides;
                self.scatter_flux(conn, &block, domain, dofs, &mut residual, &mut jacobian, &mut d_aperture);
            }
        }

        if tip_overrides > 0 && ctx.tip_policy() == Some(TipFluxPolicy::ChannelOnly) {
            log::warn!(
                "尖端通量单侧替换触发 {} 次：尖端单元未扣除对应通量，守恒性不成立",
                tip_overrides
            );
        }

        Ok(AssembledSystem {
            jacobian: jacobian.build(),
            residual,
            d_residual_d_aperture: d_aperture.build(),
            tip_overrides,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn scatter_flux(
        &self,
        conn: &Connection,
        block: &LocalFluxBlock,
        domain: &FlowDomain,
        dofs: &DofManager,
        residual: &mut [f64],
        jacobian: &mut CsrBuilder,
        d_aperture: &mut CsrBuilder,
    ) {
        let np = block.num_phases;
        let cell_dofs: Vec<usize> = conn.cells.iter().map(|&c| domain.cell(c).dof()).collect();

        for (k, &key) in conn.cells.iter().enumerate() {
            if !domain.cell(key).is_owned() {
                continue;
            }
            for ip in 0..np {
                let row = cell_dofs[k] + self.phase_map.row(ip);
                residual[row] += block.flux[k][ip];
                for (m, &col_dof) in cell_dofs.iter().enumerate() {
                    for d in 0..np {
                        jacobian.add(row, col_dof + d, block.jacobian[k][ip][m][d]);
                    }
                    let da = block.d_aperture[k][ip][m];
                    if da != 0.0 {
                        d_aperture.add(row, dofs.cell_ordinal(col_dof), da);
                    }
                }
            }
        }
    }

    /// 按诊断级别输出线性系统：2 打印到日志，≥3 写 Matrix Market 文件
    pub fn dump(&self, system: &AssembledSystem, time: f64, iteration: usize) -> FlowResult<()> {
        match self.diagnostics.log_level {
            0 | 1 => {}
            2 => {
                log::debug!("雅可比 (t = {time}, 迭代 {iteration}):");
                for row in 0..system.jacobian.n_rows() {
                    let entries: Vec<String> = system
                        .jacobian
                        .row_entries(row)
                        .map(|(col, v)| format!("({col}, {v:.6e})"))
                        .collect();
                    log::debug!("  行 {row}: {}", entries.join(" "));
                }
                log::debug!("残差: {:?}", system.residual);
            }
            _ => {
                let (matrix_path, rhs_path) = matrix_market::dump_system(
                    &self.diagnostics.dump_dir,
                    time,
                    iteration,
                    &system.jacobian,
                    &system.residual,
                )?;
                log::info!(
                    "线性系统已写出: {} / {}",
                    matrix_path.display(),
                    rhs_path.display()
                );
            }
        }
        Ok(())
    }
}

fn evaluate_fluxes(
    list: &ConnectionList,
    domain: &FlowDomain,
    ctx: &StepContext,
) -> FlowResult<Vec<LocalFluxBlock>> {
    use crate::mesh::ConnectionKind;

    match list.kind() {
        ConnectionKind::TwoPoint => Ok(list
            .connections()
            .par_iter()
            .map(|conn| two_point_flux(conn, domain, ctx))
            .collect()),
        ConnectionKind::Junction => list
            .connections()
            .par_iter()
            .map(|conn| junction_flux(conn, domain, ctx))
            .collect(),
    }
}
