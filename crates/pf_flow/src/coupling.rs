// crates/pf_flow/src/coupling.rs

//! 与力学/裂缝求解器的耦合边界
//!
//! 力学侧把开度、尖端几何和材料参数推送进 [`CouplingAdapter`]；流动侧
//! 在每个时间步开始时读取一次：
//!
//! - 开度（当前值与步初值）写入裂缝子区域
//! - 尖端单元集合与渐近压力梯度打包成只读的 [`TipOverride`]
//! - 步完成时调用变形质量通量钩子，并更新应变能历史（只增不减）

use std::collections::{BTreeMap, BTreeSet};

use glam::DVec3;
use pf_config::{FractureConfig, TipFluxPolicy};
use pf_foundation::PfError;

use crate::constitutive::{active_strain_energy_density, StrainEnergyHistory, StrainPoint};
use crate::error::{FlowError, FlowResult};
use crate::state::FlowDomain;
use crate::types::CellKey;

// ============================================================
// 尖端几何
// ============================================================

/// 裂缝单元：两个面与张开量
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FractureElement {
    /// 单元地址
    pub cell: CellKey,
    /// 上下两个面的编号
    pub faces: [usize; 2],
    /// 平均张开量 [m]
    pub gap: f64,
}

/// 面上节点的位移
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeDisplacement {
    /// 节点编号
    pub node: usize,
    /// 位移向量
    pub displacement: DVec3,
}

/// 由两个面的法向与节点位移计算平均张开量，尖端节点不计入
///
/// `N̄ = normalize(n₀ − n₁)`，`gap = Σ_f Σ_a s_f (u_a · N̄) / 2`，`s₀ = −1, s₁ = +1`
pub fn average_gap(
    face_normals: [DVec3; 2],
    face_nodes: [&[NodeDisplacement]; 2],
    tip_nodes: &BTreeSet<usize>,
) -> f64 {
    let n_bar = (face_normals[0] - face_normals[1]).normalize_or_zero();
    let mut gap = 0.0;
    for (f, nodes) in face_nodes.iter().enumerate() {
        let sign = if f == 0 { -1.0 } else { 1.0 };
        for node in nodes.iter().filter(|n| !tip_nodes.contains(&n.node)) {
            gap += sign * node.displacement.dot(n_bar) / 2.0;
        }
    }
    gap
}

/// 尖端区域：带拖尾面的裂缝单元
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TipRegion {
    gaps: BTreeMap<CellKey, f64>,
    /// 已收敛的尖端位置 [m]
    pub tip_location: f64,
    /// 网格尺寸 [m]
    pub mesh_size: f64,
}

impl TipRegion {
    /// 由拖尾面识别尖端单元：任一面属于拖尾面集合
    pub fn from_trailing_faces(
        elements: &[FractureElement],
        trailing_faces: &BTreeSet<usize>,
        tip_location: f64,
        mesh_size: f64,
    ) -> Self {
        let gaps = elements
            .iter()
            .filter(|e| e.faces.iter().any(|f| trailing_faces.contains(f)))
            .map(|e| (e.cell, e.gap))
            .collect();
        Self {
            gaps,
            tip_location,
            mesh_size,
        }
    }

    /// 尖端单元数
    pub fn len(&self) -> usize {
        self.gaps.len()
    }

    /// 是否没有尖端单元
    pub fn is_empty(&self) -> bool {
        self.gaps.is_empty()
    }

    /// 尖端是否已越过一个网格尺寸
    pub fn is_propagated(&self) -> bool {
        self.tip_location > self.mesh_size
    }
}

/// 尖端渐近模型的材料参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TipMaterial {
    /// 体积模量 K [Pa]
    pub bulk_modulus: f64,
    /// 剪切模量 G [Pa]
    pub shear_modulus: f64,
    /// 流体粘度 μ [Pa·s]
    pub viscosity: f64,
    /// 全域注入体积流量 q₀ [m³/s]
    pub injection_rate: f64,
}

impl TipMaterial {
    /// 由半域质量注入速率 [kg/s] 构建（q₀ = 2|q|/1000）
    pub fn from_half_domain_mass_rate(
        bulk_modulus: f64,
        shear_modulus: f64,
        viscosity: f64,
        mass_rate: f64,
    ) -> Self {
        Self {
            bulk_modulus,
            shear_modulus,
            viscosity,
            injection_rate: 2.0 * mass_rate.abs() / 1.0e3,
        }
    }

    /// 泊松比 ν
    pub fn poisson_ratio(&self) -> f64 {
        let (k, g) = (self.bulk_modulus, self.shear_modulus);
        (1.5 * k - g) / (3.0 * k + g)
    }

    /// 杨氏模量 E
    pub fn youngs_modulus(&self) -> f64 {
        let (k, g) = (self.bulk_modulus, self.shear_modulus);
        9.0 * k * g / (3.0 * k + g)
    }

    /// 平面应变模量 E' = E / (1 − ν²)
    pub fn plane_strain_modulus(&self) -> f64 {
        let nu = self.poisson_ratio();
        self.youngs_modulus() / (1.0 - nu * nu)
    }

    /// `∇p · gap²`，与张开量无关的部分
    pub fn gradient_coefficient(&self, total_time: f64) -> f64 {
        let e_prime = self.plane_strain_modulus();
        let mu_prime = 12.0 * self.viscosity;
        let q0 = self.injection_rate;
        let t = total_time;

        let lm = (e_prime * q0.powi(3) * t.powi(4) / mu_prime).powf(1.0 / 6.0);
        let gamma_m0 = 0.616;
        let velocity = 2.0 / 3.0 * lm * gamma_m0 / t;
        let beta_m = 2f64.powf(1.0 / 3.0) * 3f64.powf(5.0 / 6.0);
        let coeff = -(6f64.powf(-2.0 / 3.0)) * (e_prime * e_prime * mu_prime * velocity).powf(1.0 / 3.0);

        -1.0 / 3.0 * coeff * beta_m * beta_m * (e_prime / mu_prime / velocity).powf(-2.0 / 3.0)
    }

    fn validate(&self) -> FlowResult<()> {
        PfError::check_range("bulk_modulus", self.bulk_modulus, f64::MIN_POSITIVE, f64::INFINITY)?;
        PfError::check_range("shear_modulus", self.shear_modulus, f64::MIN_POSITIVE, f64::INFINITY)?;
        PfError::check_range("viscosity", self.viscosity, f64::MIN_POSITIVE, f64::INFINITY)?;
        PfError::check_range("injection_rate", self.injection_rate, 0.0, f64::INFINITY)?;
        Ok(())
    }
}

/// 单个时间步内只读的尖端替换数据
#[derive(Debug, Clone, PartialEq)]
pub struct TipOverride {
    /// 守恒处理方式
    pub policy: TipFluxPolicy,
    gaps: BTreeMap<CellKey, f64>,
    gradient_coefficient: f64,
}

impl TipOverride {
    /// 直接构建
    pub fn new(policy: TipFluxPolicy, gaps: BTreeMap<CellKey, f64>, gradient_coefficient: f64) -> Self {
        Self {
            policy,
            gaps,
            gradient_coefficient,
        }
    }

    /// 是否为尖端单元
    #[inline]
    pub fn is_tip(&self, cell: CellKey) -> bool {
        self.gaps.contains_key(&cell)
    }

    /// 尖端单元的张开量
    #[inline]
    pub fn gap(&self, cell: CellKey) -> Option<f64> {
        self.gaps.get(&cell).copied()
    }

    /// 渐近压力梯度 ∇p（正值）
    #[inline]
    pub fn pressure_gradient(&self, gap: f64) -> f64 {
        self.gradient_coefficient * gap.powi(-2)
    }
}

// ============================================================
// 钩子
// ============================================================

/// 变形驱动的质量通量钩子，默认不做任何事
pub trait DeformationHook: Send + Sync {
    /// 时间步开始、状态更新之前调用
    fn update_eos(&mut self, _domain: &mut FlowDomain, _time: f64, _dt: f64) -> FlowResult<()> {
        Ok(())
    }

    /// 时间步收敛后调用一次
    fn calculate_and_apply_mass_flux(
        &mut self,
        _domain: &mut FlowDomain,
        _time: f64,
        _dt: f64,
    ) -> FlowResult<()> {
        Ok(())
    }
}

/// 无变形耦合
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDeformation;

impl DeformationHook for NoDeformation {}

/// 候选应变能密度来源（力学侧积分点）
pub trait StrainEnergySource: Send + Sync {
    /// 当前积分点的有效应变能密度
    fn active_strain_energy(&self) -> Vec<f64>;
}

/// 体积/偏量分解的应变能来源
#[derive(Debug, Clone, Default)]
pub struct VolDevStrainEnergy {
    /// 体积模量 K [Pa]
    pub bulk_modulus: f64,
    /// 积分点状态
    pub points: Vec<StrainPoint>,
}

impl StrainEnergySource for VolDevStrainEnergy {
    fn active_strain_energy(&self) -> Vec<f64> {
        self.points
            .iter()
            .map(|p| active_strain_energy_density(p, self.bulk_modulus))
            .collect()
    }
}

// ============================================================
// 耦合适配器
// ============================================================

/// 步完成时的耦合摘要
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CouplingSummary {
    /// 应变能历史被抬升的积分点数
    pub history_raised: usize,
}

/// 流动侧与力学侧的耦合适配器
pub struct CouplingAdapter {
    current: BTreeMap<CellKey, f64>,
    committed: BTreeMap<CellKey, f64>,
    tip: Option<(TipRegion, TipMaterial)>,
    hook: Box<dyn DeformationHook>,
    strain_source: Option<Box<dyn StrainEnergySource>>,
    history: StrainEnergyHistory,
}

impl Default for CouplingAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl CouplingAdapter {
    /// 无裂缝、无变形的适配器
    pub fn new() -> Self {
        Self {
            current: BTreeMap::new(),
            committed: BTreeMap::new(),
            tip: None,
            hook: Box::new(NoDeformation),
            strain_source: None,
            history: StrainEnergyHistory::default(),
        }
    }

    /// 推送当前开度；首次出现的单元同时作为步初开度
    pub fn push_apertures(&mut self, values: &[(CellKey, f64)]) -> FlowResult<()> {
        for &(cell, a) in values {
            if !(a > 0.0 && a.is_finite()) {
                return Err(FlowError::precondition(format!(
                    "单元 {cell:?} 的开度必须为正有限值: {a:e}"
                )));
            }
        }
        for &(cell, a) in values {
            self.current.insert(cell, a);
            self.committed.entry(cell).or_insert(a);
        }
        Ok(())
    }

    /// 当前开度
    pub fn aperture(&self, cell: CellKey) -> Option<f64> {
        self.current.get(&cell).copied()
    }

    /// 步初开度
    pub fn committed_aperture(&self, cell: CellKey) -> Option<f64> {
        self.committed.get(&cell).copied()
    }

    /// 把开度写入计算域
    pub fn load_apertures(&self, domain: &mut FlowDomain) -> FlowResult<()> {
        for (&cell, &a) in &self.current {
            domain.check_key(cell)?;
            let sub = &mut domain.regions[cell.region].subregions[cell.subregion];
            sub.aperture[cell.index] = a;
            sub.aperture0[cell.index] = self.committed.get(&cell).copied().unwrap_or(a);
        }
        Ok(())
    }

    /// 设置尖端数据
    pub fn set_tip(&mut self, region: TipRegion, material: TipMaterial) -> FlowResult<()> {
        material.validate()?;
        for (&cell, &gap) in &region.gaps {
            if !(gap > 0.0) {
                return Err(FlowError::precondition(format!(
                    "尖端单元 {cell:?} 的张开量必须为正: {gap:e}"
                )));
            }
        }
        self.tip = Some((region, material));
        Ok(())
    }

    /// 本步的尖端替换数据；尖端未越过网格尺寸或粘度低于阈值时为 None
    pub fn tip_override(&self, total_time: f64, config: &FractureConfig) -> Option<TipOverride> {
        let (region, material) = self.tip.as_ref()?;
        if !region.is_propagated()
            || material.viscosity < config.viscosity_threshold
            || region.is_empty()
            || !(total_time > 0.0)
        {
            return None;
        }
        Some(TipOverride::new(
            config.tip_flux_policy,
            region.gaps.clone(),
            material.gradient_coefficient(total_time),
        ))
    }

    /// 设置变形钩子
    pub fn set_deformation_hook(&mut self, hook: Box<dyn DeformationHook>) {
        self.hook = hook;
    }

    /// 设置应变能来源，历史场按积分点数重置
    pub fn set_strain_energy_source(&mut self, source: Box<dyn StrainEnergySource>) {
        let n = source.active_strain_energy().len();
        self.history = StrainEnergyHistory::new(n);
        self.strain_source = Some(source);
    }

    /// 应变能历史
    pub fn strain_energy_history(&self) -> &StrainEnergyHistory {
        &self.history
    }

    /// 时间步开始
    pub fn on_step_setup(&mut self, domain: &mut FlowDomain, time: f64, dt: f64) -> FlowResult<()> {
        self.load_apertures(domain)?;
        self.hook.update_eos(domain, time, dt)
    }

    /// 时间步收敛后：质量通量钩子、应变能历史、开度历史
    pub fn on_step_complete(
        &mut self,
        domain: &mut FlowDomain,
        time: f64,
        dt: f64,
    ) -> FlowResult<CouplingSummary> {
        self.hook.calculate_and_apply_mass_flux(domain, time, dt)?;

        let mut summary = CouplingSummary::default();
        if let Some(source) = &self.strain_source {
            summary.history_raised = self.history.update(&source.active_strain_energy())?;
        }

        self.committed = self.current.clone();
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{Region, SubRegion};

    fn material() -> TipMaterial {
        TipMaterial::from_half_domain_mass_rate(20e9, 12e9, 1.0e-2, -0.05)
    }

    #[test]
    fn test_injection_rate_conversion() {
        assert!((material().injection_rate - 1.0e-4).abs() < 1e-18);
    }

    #[test]
    fn test_elastic_constants() {
        let m = material();
        let nu = (30e9 - 12e9) / (60e9 + 12e9);
        assert!((m.poisson_ratio() - nu).abs() < 1e-15);
        let e = 9.0 * 20e9 * 12e9 / 72e9;
        assert!((m.plane_strain_modulus() - e / (1.0 - nu * nu)).abs() < 1e-3);
    }

    #[test]
    fn test_gradient_is_positive() {
        assert!(material().gradient_coefficient(10.0) > 0.0);
    }

    #[test]
    fn test_tip_cells_from_trailing_faces() {
        let elements = [
            FractureElement { cell: CellKey::new(1, 0, 0), faces: [10, 11], gap: 1e-3 },
            FractureElement { cell: CellKey::new(1, 0, 1), faces: [12, 13], gap: 5e-4 },
        ];
        let trailing: BTreeSet<usize> = [13].into_iter().collect();
        let region = TipRegion::from_trailing_faces(&elements, &trailing, 2.0, 1.0);
        assert_eq!(region.len(), 1);
        assert!(region.is_propagated());

        let mut adapter = CouplingAdapter::new();
        adapter.set_tip(region, material()).unwrap();
        let tip = adapter.tip_override(5.0, &FractureConfig::default()).unwrap();
        assert!(tip.is_tip(CellKey::new(1, 0, 1)));
        assert!(!tip.is_tip(CellKey::new(1, 0, 0)));
        assert_eq!(tip.gap(CellKey::new(1, 0, 1)), Some(5e-4));
    }

    #[test]
    fn test_tip_inactive_below_viscosity_threshold() {
        let elements = [FractureElement { cell: CellKey::new(0, 0, 0), faces: [0, 1], gap: 1e-3 }];
        let trailing: BTreeSet<usize> = [1].into_iter().collect();
        let mut adapter = CouplingAdapter::new();
        let mut thin = material();
        thin.viscosity = 1e-3;
        adapter
            .set_tip(TipRegion::from_trailing_faces(&elements, &trailing, 2.0, 1.0), thin)
            .unwrap();
        assert!(adapter.tip_override(5.0, &FractureConfig::default()).is_none());
    }

    #[test]
    fn test_tip_inactive_before_propagation() {
        let elements = [FractureElement { cell: CellKey::new(0, 0, 0), faces: [0, 1], gap: 1e-3 }];
        let trailing: BTreeSet<usize> = [0].into_iter().collect();
        let mut adapter = CouplingAdapter::new();
        adapter
            .set_tip(TipRegion::from_trailing_faces(&elements, &trailing, 0.5, 1.0), material())
            .unwrap();
        assert!(adapter.tip_override(5.0, &FractureConfig::default()).is_none());
    }

    #[test]
    fn test_average_gap_excludes_tip_nodes() {
        let normals = [DVec3::new(0.0, 1.0, 0.0), DVec3::new(0.0, -1.0, 0.0)];
        let top = [
            NodeDisplacement { node: 0, displacement: DVec3::new(0.0, -1e-3, 0.0) },
            NodeDisplacement { node: 1, displacement: DVec3::new(0.0, -5.0, 0.0) },
        ];
        let bottom = [NodeDisplacement { node: 2, displacement: DVec3::new(0.0, 1e-3, 0.0) }];
        let tip_nodes: BTreeSet<usize> = [1].into_iter().collect();
        let gap = average_gap(normals, [&top, &bottom], &tip_nodes);
        // N̄ = +y；(−1)(−1e-3)/2 + (+1)(1e-3)/2
        assert!((gap - 1e-3).abs() < 1e-15);
    }

    #[test]
    fn test_apertures_rejected_when_non_positive() {
        let mut adapter = CouplingAdapter::new();
        assert!(adapter.push_apertures(&[(CellKey::new(0, 0, 0), 0.0)]).is_err());
        assert!(adapter.aperture(CellKey::new(0, 0, 0)).is_none());
    }

    #[test]
    fn test_aperture_history_follows_steps() {
        let sub = SubRegion::new(1, 1);
        let mut domain = FlowDomain::new(1, vec![Region::new("frac", vec![sub])]).unwrap();
        let cell = CellKey::new(0, 0, 0);
        let mut adapter = CouplingAdapter::new();
        adapter.push_apertures(&[(cell, 1e-3)]).unwrap();
        adapter.push_apertures(&[(cell, 2e-3)]).unwrap();
        adapter.on_step_setup(&mut domain, 0.0, 1.0).unwrap();
        assert_eq!(domain.regions[0].subregions[0].aperture[0], 2e-3);
        assert_eq!(domain.regions[0].subregions[0].aperture0[0], 1e-3);

        adapter.on_step_complete(&mut domain, 0.0, 1.0).unwrap();
        assert_eq!(adapter.committed_aperture(cell), Some(2e-3));
    }

    #[test]
    fn test_strain_energy_history_raised_once_per_step() {
        let source = VolDevStrainEnergy {
            bulk_modulus: 10.0,
            points: vec![
                StrainPoint { stress: [1.0, 0.0, 0.0, 0.0, 0.0, 0.0], strain_energy_density: 4.0 },
                StrainPoint { stress: [-3.0, -3.0, -3.0, 0.0, 0.0, 0.0], strain_energy_density: 1.0 },
            ],
        };
        let mut adapter = CouplingAdapter::new();
        adapter.set_strain_energy_source(Box::new(source));
        let mut domain = FlowDomain::new(1, vec![]).unwrap();
        let summary = adapter.on_step_complete(&mut domain, 0.0, 1.0).unwrap();
        assert_eq!(summary.history_raised, 2);
        assert_eq!(adapter.strain_energy_history().values()[0], 4.0);
        assert!((adapter.strain_energy_history().values()[1] - 0.55).abs() < 1e-12);
    }
}
