// crates/pf_flow/src/state.rs

//! 多相流单元状态
//!
//! 单元按 区域 → 子区域 分组存放，子区域内采用 SoA 布局：
//! ```text
//! pressure:        [p_0, p_1, ...]
//! delta_pressure:  [Δp_0, Δp_1, ...]
//! saturation:      [[S_0^w, S_0^o, S_0^g], [S_1^w, ...], ...]
//! ```
//!
//! 主变量以「步初值 + 步内增量」保存。试探值 `p + Δp`、`S + ΔS` 由
//! [`CellView`] 提供，内核只通过它读取状态。

use glam::DVec3;
use pf_foundation::{ensure, PfError};

use crate::error::FlowResult;
use crate::types::{CellKey, MAX_PHASES};

/// 每相的标量数组
pub type PhaseArray = [f64; MAX_PHASES];

/// 相 × 相 矩阵
pub type PhaseMatrix = [[f64; MAX_PHASES]; MAX_PHASES];

// ============================================================
// 子区域
// ============================================================

/// 子区域：同一组本构模型作用的一批单元
#[derive(Debug, Clone)]
pub struct SubRegion {
    n_cells: usize,
    num_phases: usize,

    // ========== 几何与并行 ==========
    /// 单元体积 [m³]
    pub volume: Vec<f64>,
    /// 单元中心
    pub center: Vec<DVec3>,
    /// 幽灵单元的所属进程；负值表示本进程拥有
    pub ghost_rank: Vec<i32>,
    /// 全局首自由度编号
    pub dof_number: Vec<usize>,
    /// 重力系数 g·x
    pub gravity_coef: Vec<f64>,

    // ========== 主变量 ==========
    /// 步初压力 [Pa]
    pub pressure: Vec<f64>,
    /// 步内压力增量
    pub delta_pressure: Vec<f64>,
    /// 步初相饱和度
    pub saturation: Vec<PhaseArray>,
    /// 步内相饱和度增量
    pub delta_saturation: Vec<PhaseArray>,

    // ========== 本构派生量 ==========
    /// 相密度 [kg/m³]
    pub density: Vec<PhaseArray>,
    /// ∂ρ/∂p
    pub d_density_dp: Vec<PhaseArray>,
    /// 相粘度 [Pa·s]
    pub viscosity: Vec<PhaseArray>,
    /// ∂μ/∂p
    pub d_viscosity_dp: Vec<PhaseArray>,
    /// 孔隙体积乘子
    pub pv_mult: Vec<f64>,
    /// ∂pv_mult/∂p
    pub d_pv_mult_dp: Vec<f64>,
    /// 相对渗透率（流体相顺序）
    pub relperm: Vec<PhaseArray>,
    /// ∂kr_i/∂S_j（全部相，未消去约束）
    pub d_relperm_ds: Vec<PhaseMatrix>,
    /// 质量流度 kr·ρ/μ
    pub mobility: Vec<PhaseArray>,
    /// ∂λ/∂p
    pub d_mobility_dp: Vec<PhaseArray>,
    /// ∂λ_i/∂S_j（j 为独立饱和度）
    pub d_mobility_ds: Vec<PhaseMatrix>,

    // ========== 历史量 ==========
    /// 参考孔隙度
    pub porosity_ref: Vec<f64>,
    /// 步初孔隙度
    pub porosity_old: Vec<f64>,
    /// 步初相密度
    pub density_old: Vec<PhaseArray>,

    // ========== 裂缝 ==========
    /// 当前开度 [m]（基质单元为 0）
    pub aperture: Vec<f64>,
    /// 步初开度 [m]
    pub aperture0: Vec<f64>,
}

impl SubRegion {
    /// 创建零初始化的子区域
    pub fn new(n_cells: usize, num_phases: usize) -> Self {
        let mut initial_sat = [0.0; MAX_PHASES];
        initial_sat[0] = 1.0;
        Self {
            n_cells,
            num_phases,
            volume: vec![1.0; n_cells],
            center: vec![DVec3::ZERO; n_cells],
            ghost_rank: vec![-1; n_cells],
            dof_number: vec![0; n_cells],
            gravity_coef: vec![0.0; n_cells],
            pressure: vec![0.0; n_cells],
            delta_pressure: vec![0.0; n_cells],
            saturation: vec![initial_sat; n_cells],
            delta_saturation: vec![[0.0; MAX_PHASES]; n_cells],
            density: vec![[0.0; MAX_PHASES]; n_cells],
            d_density_dp: vec![[0.0; MAX_PHASES]; n_cells],
            viscosity: vec![[0.0; MAX_PHASES]; n_cells],
            d_viscosity_dp: vec![[0.0; MAX_PHASES]; n_cells],
            pv_mult: vec![1.0; n_cells],
            d_pv_mult_dp: vec![0.0; n_cells],
            relperm: vec![[0.0; MAX_PHASES]; n_cells],
            d_relperm_ds: vec![[[0.0; MAX_PHASES]; MAX_PHASES]; n_cells],
            mobility: vec![[0.0; MAX_PHASES]; n_cells],
            d_mobility_dp: vec![[0.0; MAX_PHASES]; n_cells],
            d_mobility_ds: vec![[[0.0; MAX_PHASES]; MAX_PHASES]; n_cells],
            porosity_ref: vec![0.2; n_cells],
            porosity_old: vec![0.2; n_cells],
            density_old: vec![[0.0; MAX_PHASES]; n_cells],
            aperture: vec![0.0; n_cells],
            aperture0: vec![0.0; n_cells],
        }
    }

    /// 单元数量
    #[inline]
    pub fn n_cells(&self) -> usize {
        self.n_cells
    }

    /// 相数
    #[inline]
    pub fn num_phases(&self) -> usize {
        self.num_phases
    }

    /// 是否为本进程拥有的单元
    #[inline]
    pub fn is_owned(&self, i: usize) -> bool {
        self.ghost_rank[i] < 0
    }

    /// 试探压力 p + Δp
    #[inline]
    pub fn trial_pressure(&self, i: usize) -> f64 {
        self.pressure[i] + self.delta_pressure[i]
    }

    /// 试探饱和度 S + ΔS
    #[inline]
    pub fn trial_saturation(&self, i: usize) -> PhaseArray {
        let mut s = [0.0; MAX_PHASES];
        for (ip, v) in s.iter_mut().enumerate().take(self.num_phases) {
            *v = self.saturation[i][ip] + self.delta_saturation[i][ip];
        }
        s
    }

    /// 设置单元初始饱和度（全部相）
    pub fn set_saturation(&mut self, i: usize, sat: &[f64]) -> FlowResult<()> {
        PfError::check_size("saturation", self.num_phases, sat.len())?;
        self.saturation[i][..self.num_phases].copy_from_slice(sat);
        Ok(())
    }

    /// 增量清零
    pub fn zero_deltas(&mut self) {
        self.delta_pressure.fill(0.0);
        self.delta_saturation.fill([0.0; MAX_PHASES]);
    }

    /// 备份步初孔隙度与密度
    pub fn backup_fields(&mut self) {
        for i in 0..self.n_cells {
            self.porosity_old[i] = self.porosity_ref[i] * self.pv_mult[i];
        }
        self.density_old.copy_from_slice(&self.density);
    }

    /// 将增量并入步初值
    pub fn commit_deltas(&mut self) {
        for i in 0..self.n_cells {
            self.pressure[i] += self.delta_pressure[i];
            for ip in 0..self.num_phases {
                self.saturation[i][ip] += self.delta_saturation[i][ip];
            }
        }
        self.zero_deltas();
    }

    /// 校验全部单元场长度一致
    pub fn validate(&self) -> FlowResult<()> {
        let n = self.n_cells;
        PfError::check_range("num_phases", self.num_phases as f64, 1.0, MAX_PHASES as f64)?;
        let sizes = [
            ("volume", self.volume.len()),
            ("center", self.center.len()),
            ("ghost_rank", self.ghost_rank.len()),
            ("dof_number", self.dof_number.len()),
            ("gravity_coef", self.gravity_coef.len()),
            ("pressure", self.pressure.len()),
            ("delta_pressure", self.delta_pressure.len()),
            ("saturation", self.saturation.len()),
            ("delta_saturation", self.delta_saturation.len()),
            ("density", self.density.len()),
            ("d_density_dp", self.d_density_dp.len()),
            ("viscosity", self.viscosity.len()),
            ("d_viscosity_dp", self.d_viscosity_dp.len()),
            ("pv_mult", self.pv_mult.len()),
            ("d_pv_mult_dp", self.d_pv_mult_dp.len()),
            ("relperm", self.relperm.len()),
            ("d_relperm_ds", self.d_relperm_ds.len()),
            ("mobility", self.mobility.len()),
            ("d_mobility_dp", self.d_mobility_dp.len()),
            ("d_mobility_ds", self.d_mobility_ds.len()),
            ("porosity_ref", self.porosity_ref.len()),
            ("porosity_old", self.porosity_old.len()),
            ("density_old", self.density_old.len()),
            ("aperture", self.aperture.len()),
            ("aperture0", self.aperture0.len()),
        ];
        for (name, len) in sizes {
            PfError::check_size(name, n, len)?;
        }
        ensure!(
            self.volume.iter().all(|&v| v > 0.0),
            PfError::invalid_input("单元体积必须为正")
        );
        Ok(())
    }
}

// ============================================================
// 区域与计算域
// ============================================================

/// 区域：同一材料的子区域集合
#[derive(Debug, Clone)]
pub struct Region {
    /// 区域名
    pub name: String,
    /// 子区域
    pub subregions: Vec<SubRegion>,
}

impl Region {
    /// 创建区域
    pub fn new(name: impl Into<String>, subregions: Vec<SubRegion>) -> Self {
        Self {
            name: name.into(),
            subregions,
        }
    }
}

/// 流动计算域
#[derive(Debug, Clone)]
pub struct FlowDomain {
    num_phases: usize,
    /// 区域列表
    pub regions: Vec<Region>,
}

impl FlowDomain {
    /// 创建计算域
    pub fn new(num_phases: usize, regions: Vec<Region>) -> FlowResult<Self> {
        PfError::check_range("num_phases", num_phases as f64, 1.0, MAX_PHASES as f64)?;
        for region in &regions {
            for sub in &region.subregions {
                PfError::check_size("subregion.num_phases", num_phases, sub.num_phases())?;
                sub.validate()?;
            }
        }
        Ok(Self {
            num_phases,
            regions,
        })
    }

    /// 相数
    #[inline]
    pub fn num_phases(&self) -> usize {
        self.num_phases
    }

    /// 子区域只读引用
    #[inline]
    pub fn subregion(&self, key: CellKey) -> &SubRegion {
        &self.regions[key.region].subregions[key.subregion]
    }

    /// 单元只读视图
    #[inline]
    pub fn cell(&self, key: CellKey) -> CellView<'_> {
        CellView {
            sub: self.subregion(key),
            i: key.index,
        }
    }

    /// 检查单元地址有效
    pub fn check_key(&self, key: CellKey) -> FlowResult<()> {
        PfError::check_index("region", key.region, self.regions.len())?;
        let region = &self.regions[key.region];
        PfError::check_index("subregion", key.subregion, region.subregions.len())?;
        PfError::check_index("cell", key.index, region.subregions[key.subregion].n_cells())?;
        Ok(())
    }

    /// 遍历全部子区域
    pub fn subregions(&self) -> impl Iterator<Item = (usize, usize, &SubRegion)> {
        self.regions.iter().enumerate().flat_map(|(r, region)| {
            region
                .subregions
                .iter()
                .enumerate()
                .map(move |(s, sub)| (r, s, sub))
        })
    }

    /// 遍历全部子区域（可变）
    pub fn subregions_mut(&mut self) -> impl Iterator<Item = &mut SubRegion> {
        self.regions
            .iter_mut()
            .flat_map(|region| region.subregions.iter_mut())
    }

    /// 单元总数（含幽灵单元）
    pub fn n_cells(&self) -> usize {
        self.subregions().map(|(_, _, sub)| sub.n_cells()).sum()
    }

    /// 由单元中心与重力向量计算重力系数 g·x
    pub fn precompute_gravity(&mut self, gravity: DVec3) {
        for sub in self.subregions_mut() {
            for i in 0..sub.n_cells() {
                sub.gravity_coef[i] = gravity.dot(sub.center[i]);
            }
        }
    }

    /// 全部增量清零
    pub fn zero_deltas(&mut self) {
        self.subregions_mut().for_each(SubRegion::zero_deltas);
    }

    /// 备份步初历史量
    pub fn backup_fields(&mut self) {
        self.subregions_mut().for_each(SubRegion::backup_fields);
    }

    /// 将增量并入步初值
    pub fn commit_deltas(&mut self) {
        self.subregions_mut().for_each(SubRegion::commit_deltas);
    }
}

// ============================================================
// 单元视图
// ============================================================

/// 单元只读视图
#[derive(Clone, Copy)]
pub struct CellView<'a> {
    sub: &'a SubRegion,
    i: usize,
}

impl<'a> CellView<'a> {
    /// 试探压力
    #[inline]
    pub fn pressure(&self) -> f64 {
        self.sub.trial_pressure(self.i)
    }

    /// 相密度与 ∂ρ/∂p
    #[inline]
    pub fn density(&self, ip: usize) -> (f64, f64) {
        (self.sub.density[self.i][ip], self.sub.d_density_dp[self.i][ip])
    }

    /// 相流度
    #[inline]
    pub fn mobility(&self, ip: usize) -> f64 {
        self.sub.mobility[self.i][ip]
    }

    /// ∂λ/∂p
    #[inline]
    pub fn d_mobility_dp(&self, ip: usize) -> f64 {
        self.sub.d_mobility_dp[self.i][ip]
    }

    /// ∂λ_ip/∂S_j
    #[inline]
    pub fn d_mobility_ds(&self, ip: usize, j: usize) -> f64 {
        self.sub.d_mobility_ds[self.i][ip][j]
    }

    /// 重力系数
    #[inline]
    pub fn gravity_coef(&self) -> f64 {
        self.sub.gravity_coef[self.i]
    }

    /// 当前与步初开度
    #[inline]
    pub fn apertures(&self) -> (f64, f64) {
        (self.sub.aperture[self.i], self.sub.aperture0[self.i])
    }

    /// 全局首自由度
    #[inline]
    pub fn dof(&self) -> usize {
        self.sub.dof_number[self.i]
    }

    /// 是否本进程拥有
    #[inline]
    pub fn is_owned(&self) -> bool {
        self.sub.is_owned(self.i)
    }
}
