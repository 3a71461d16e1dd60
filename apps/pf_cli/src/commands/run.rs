// apps/pf_cli/src/commands/run.rs

//! 运行一维两相柱算例
//!
//! 竖直单元柱，上半部分为水、下半部分为油，重力驱动逆向流动。
//! 每个时间步调用一次 Newton 控制器，失败时时间步减半重试。

use anyhow::{bail, Context, Result};
use clap::Args;
use glam::DVec3;
use pf_config::FlowConfig;
use pf_flow::prelude::*;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, warn};

/// 运行参数
#[derive(Args)]
pub struct RunArgs {
    /// 配置文件路径
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 单元数量
    #[arg(long, default_value = "20")]
    pub cells: usize,

    /// 时间步数
    #[arg(long, default_value = "10")]
    pub steps: usize,

    /// 时间步长 [s]
    #[arg(long, default_value = "3600.0")]
    pub dt: f64,

    /// 单元高度 [m]
    #[arg(long, default_value = "1.0")]
    pub cell_height: f64,

    /// 渗透率 [m²]
    #[arg(long, default_value = "1e-13")]
    pub permeability: f64,

    /// 柱底压力 [Pa]
    #[arg(long, default_value = "1e7")]
    pub bottom_pressure: f64,

    /// 每步允许的最多减半次数
    #[arg(long, default_value = "5")]
    pub max_cuts: usize,
}

/// 执行运行命令
pub fn execute(args: RunArgs) -> Result<()> {
    info!("=== PoroFrac 两相柱算例 ===");

    if args.cells < 2 {
        bail!("单元数量至少为 2: {}", args.cells);
    }
    if !(args.dt > 0.0) {
        bail!("时间步长必须为正: {}", args.dt);
    }

    let config = match &args.config {
        Some(path) => FlowConfig::from_file(path)
            .with_context(|| format!("无法加载配置: {}", path.display()))?,
        None => FlowConfig::default(),
    };

    let updater = build_updater(&config)?;
    let (mut domain, connections) = build_column(&args, &config)?;
    let dofs = DofManager::number(&mut domain);
    updater.update(&mut domain);
    let initial_mass = phase_masses(&domain);

    info!(
        "网格: {} 单元, {} 个两点连接, {} 个自由度",
        domain.n_cells(),
        connections.two_point.len(),
        dofs.n_local_rows()
    );

    let mut newton = NewtonStepController::new(config, updater).context("构建 Newton 控制器失败")?;
    let mut coupling = CouplingAdapter::new();

    let start = Instant::now();
    let mut time = 0.0;
    let mut total_iterations = 0;
    for step in 0..args.steps {
        let mut dt = args.dt;
        let mut cuts = 0;
        loop {
            let report = newton.step(&mut domain, &connections, &dofs, &mut coupling, time, dt)?;
            if let StepOutcome::Converged { iterations } = report.outcome {
                time += dt;
                total_iterations += iterations;
                info!(
                    "步 {:>3}: t = {:.3e} s, dt = {:.3e} s, Newton 迭代 {}, 回退 {}",
                    step + 1,
                    time,
                    dt,
                    iterations,
                    report.backtracks
                );
                break;
            }
            if cuts >= args.max_cuts {
                bail!("步 {} 在 {} 次减半后仍未收敛: {:?}", step + 1, cuts, report.outcome);
            }
            cuts += 1;
            dt *= 0.5;
            warn!("步 {} 未收敛 ({:?})，时间步减半为 {:.3e} s", step + 1, report.outcome, dt);
        }
    }

    let final_mass = phase_masses(&domain);
    info!("=== 模拟完成 ===");
    info!("模拟时间: {:.3e} s", time);
    info!("Newton 迭代总数: {}", total_iterations);
    info!("计算时间: {:.2} s", start.elapsed().as_secs_f64());
    for (ip, name) in ["water", "oil"].iter().enumerate() {
        let drift = (final_mass[ip] - initial_mass[ip]) / initial_mass[ip];
        info!("{name} 质量相对变化: {:.3e}", drift);
    }
    print_profile(&domain);

    Ok(())
}

fn build_updater(config: &FlowConfig) -> Result<PhaseStateUpdater> {
    let fluid = CompressibleFluid::new(
        vec![
            PhaseFluidProps::incompressible("water", 1000.0, 1e-3).with_compressibility(4.5e-10),
            PhaseFluidProps::incompressible("oil", 800.0, 2e-3).with_compressibility(1e-9),
        ],
        1e5,
    );
    let relperm = BrooksCoreyRelPerm::new(vec![
        BrooksCoreyPhase::new("water", 0.1, 2.0),
        BrooksCoreyPhase::new("oil", 0.1, 2.0),
    ]);
    let updater = PhaseStateUpdater::new(
        Box::new(fluid),
        Box::new(relperm),
        Box::new(PoreCompressibility::new(1e5, 1e-10)),
        &config.phases.wettability_order,
    )?;
    Ok(updater)
}

/// 竖直单元柱，z 向上；初始压力按平均密度静水分布
fn build_column(args: &RunArgs, config: &FlowConfig) -> Result<(FlowDomain, ConnectionSet)> {
    let n = args.cells;
    let h = args.cell_height;
    let g = DVec3::from_array(config.effective_gravity());
    let mut sub = SubRegion::new(n, 2);
    for i in 0..n {
        let z = (i as f64 + 0.5) * h;
        sub.center[i] = DVec3::new(0.0, 0.0, z);
        sub.volume[i] = h;
        sub.pressure[i] = args.bottom_pressure + 900.0 * g.z * z;
        let water = if i >= n / 2 { 0.8 } else { 0.2 };
        sub.set_saturation(i, &[water, 1.0 - water])?;
    }

    let mut domain = FlowDomain::new(2, vec![Region::new("column", vec![sub])])?;
    domain.precompute_gravity(g);

    let transmissibility = args.permeability / h;
    let conns = (0..n - 1)
        .map(|i| Connection::two_point(CellKey::new(0, 0, i), CellKey::new(0, 0, i + 1), transmissibility))
        .collect();
    let list = ConnectionList::new(ConnectionKind::TwoPoint, conns, &domain)?;
    Ok((domain, ConnectionSet::matrix_only(list)))
}

fn phase_masses(domain: &FlowDomain) -> Vec<f64> {
    let mut mass = vec![0.0; domain.num_phases()];
    for (_, _, sub) in domain.subregions() {
        for i in 0..sub.n_cells() {
            let pore = sub.volume[i] * sub.porosity_ref[i] * sub.pv_mult[i];
            for (ip, m) in mass.iter_mut().enumerate() {
                *m += pore * sub.density[i][ip] * sub.saturation[i][ip];
            }
        }
    }
    mass
}

fn print_profile(domain: &FlowDomain) {
    println!("\n{:>6} {:>14} {:>10}", "单元", "压力 [Pa]", "水饱和度");
    for (_, _, sub) in domain.subregions() {
        for i in (0..sub.n_cells()).rev() {
            println!("{:>6} {:>14.6e} {:>10.4}", i, sub.pressure[i], sub.saturation[i][0]);
        }
    }
}
