// crates/pf_config/src/flow_config.rs

//! 流动求解配置
//!
//! 统一的 `FlowConfig`，从 JSON 文件加载并校验。所有数值均为 f64。
//!
//! # 示例
//!
//! ```
//! use pf_config::FlowConfig;
//!
//! let config = FlowConfig::default();
//! assert!(config.validate().is_ok());
//! assert_eq!(config.newton.max_backtracks, 8);
//! ```

use crate::error::ConfigError;
use crate::options::{ApertureIntegration, TimeIntegration, TipFluxPolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ============================================================================
// Newton 迭代
// ============================================================================

/// Newton 迭代配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewtonConfig {
    /// 每个时间步的最大 Newton 迭代次数
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// 相对残差容差 ‖R‖/‖R₀‖
    #[serde(default = "default_newton_rtol")]
    pub rtol: f64,
    /// 绝对残差容差 ‖R‖
    #[serde(default = "default_newton_atol")]
    pub atol: f64,
    /// 越界回退的最大次数
    #[serde(default = "default_max_backtracks")]
    pub max_backtracks: usize,
    /// 每次回退的缩放因子
    #[serde(default = "default_backtrack_factor")]
    pub backtrack_factor: f64,
}

fn default_max_iterations() -> usize { 10 }
fn default_newton_rtol() -> f64 { 1e-6 }
fn default_newton_atol() -> f64 { 1e-10 }
fn default_max_backtracks() -> usize { 8 }
fn default_backtrack_factor() -> f64 { 0.5 }

impl Default for NewtonConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            rtol: default_newton_rtol(),
            atol: default_newton_atol(),
            max_backtracks: default_max_backtracks(),
            backtrack_factor: default_backtrack_factor(),
        }
    }
}

// ============================================================================
// 线性求解
// ============================================================================

/// 内置线性求解器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearConfig {
    /// 相对容差
    #[serde(default = "default_linear_rtol")]
    pub rtol: f64,
    /// 绝对容差
    #[serde(default = "default_linear_atol")]
    pub atol: f64,
    /// 最大迭代次数
    #[serde(default = "default_linear_max_iter")]
    pub max_iterations: usize,
}

fn default_linear_rtol() -> f64 { 1e-10 }
fn default_linear_atol() -> f64 { 1e-14 }
fn default_linear_max_iter() -> usize { 500 }

impl Default for LinearConfig {
    fn default() -> Self {
        Self {
            rtol: default_linear_rtol(),
            atol: default_linear_atol(),
            max_iterations: default_linear_max_iter(),
        }
    }
}

// ============================================================================
// 裂缝
// ============================================================================

/// 裂缝连接（汇接）配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FractureConfig {
    /// 开度立方项的积分规则
    #[serde(default)]
    pub aperture_integration: ApertureIntegration,
    /// 调和平均与算术平均的混合系数 c ∈ [0, 1]
    #[serde(default = "default_mean_perm_coeff")]
    pub mean_perm_coeff: f64,
    /// 尖端通量替换的守恒处理
    #[serde(default)]
    pub tip_flux_policy: TipFluxPolicy,
    /// 尖端渐近模型生效的最小粘度 [Pa·s]
    #[serde(default = "default_viscosity_threshold")]
    pub viscosity_threshold: f64,
}

fn default_mean_perm_coeff() -> f64 { 0.8 }
fn default_viscosity_threshold() -> f64 { 2e-3 }

impl Default for FractureConfig {
    fn default() -> Self {
        Self {
            aperture_integration: ApertureIntegration::default(),
            mean_perm_coeff: default_mean_perm_coeff(),
            tip_flux_policy: TipFluxPolicy::default(),
            viscosity_threshold: default_viscosity_threshold(),
        }
    }
}

// ============================================================================
// 相与重力
// ============================================================================

/// 相配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseConfig {
    /// 润湿性顺序（最润湿相在前），决定残差行偏移
    #[serde(default = "default_wettability_order")]
    pub wettability_order: Vec<String>,
}

fn default_wettability_order() -> Vec<String> {
    vec!["water".into(), "oil".into(), "gas".into()]
}

impl Default for PhaseConfig {
    fn default() -> Self {
        Self {
            wettability_order: default_wettability_order(),
        }
    }
}

/// 重力配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GravityConfig {
    /// 是否启用重力项
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// 重力加速度向量 [m/s²]
    #[serde(default = "default_gravity_vector")]
    pub vector: [f64; 3],
}

fn default_true() -> bool { true }
fn default_gravity_vector() -> [f64; 3] { [0.0, 0.0, -9.81] }

impl Default for GravityConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            vector: default_gravity_vector(),
        }
    }
}

// ============================================================================
// 诊断
// ============================================================================

/// 诊断输出配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticsConfig {
    /// 0 静默；1 迭代摘要；2 打印线性系统；≥3 写 Matrix Market 文件
    #[serde(default)]
    pub log_level: u8,
    /// Matrix Market 文件输出目录
    #[serde(default = "default_dump_dir")]
    pub dump_dir: PathBuf,
}

fn default_dump_dir() -> PathBuf { PathBuf::from("dump") }

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            log_level: 0,
            dump_dir: default_dump_dir(),
        }
    }
}

// ============================================================================
// 顶层配置
// ============================================================================

/// 流动求解配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlowConfig {
    /// Newton 迭代
    #[serde(default)]
    pub newton: NewtonConfig,
    /// 线性求解
    #[serde(default)]
    pub linear: LinearConfig,
    /// 裂缝
    #[serde(default)]
    pub fracture: FractureConfig,
    /// 相
    #[serde(default)]
    pub phases: PhaseConfig,
    /// 重力
    #[serde(default)]
    pub gravity: GravityConfig,
    /// 时间积分
    #[serde(default)]
    pub time_integration: TimeIntegration,
    /// 诊断
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,
}

impl FlowConfig {
    /// 从 JSON 文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;

        let config: FlowConfig =
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// 保存配置到 JSON 文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content =
            serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))?;
        std::fs::write(path, content).map_err(ConfigError::Io)?;
        Ok(())
    }

    /// 启用重力时的重力向量，否则为零向量
    pub fn effective_gravity(&self) -> [f64; 3] {
        if self.gravity.enabled {
            self.gravity.vector
        } else {
            [0.0; 3]
        }
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<(), ConfigError> {
        let n = &self.newton;
        if n.max_iterations == 0 {
            return Err(ConfigError::invalid(
                "newton.max_iterations",
                n.max_iterations,
                "至少需要一次迭代",
            ));
        }
        if !(n.rtol > 0.0) {
            return Err(ConfigError::invalid("newton.rtol", n.rtol, "必须为正"));
        }
        if n.atol < 0.0 {
            return Err(ConfigError::invalid("newton.atol", n.atol, "不能为负"));
        }
        if !(n.backtrack_factor > 0.0 && n.backtrack_factor < 1.0) {
            return Err(ConfigError::invalid(
                "newton.backtrack_factor",
                n.backtrack_factor,
                "必须在 (0, 1) 范围内",
            ));
        }

        if !(self.linear.rtol > 0.0) {
            return Err(ConfigError::invalid("linear.rtol", self.linear.rtol, "必须为正"));
        }
        if self.linear.max_iterations == 0 {
            return Err(ConfigError::invalid(
                "linear.max_iterations",
                self.linear.max_iterations,
                "至少需要一次迭代",
            ));
        }

        let c = self.fracture.mean_perm_coeff;
        if !(0.0..=1.0).contains(&c) {
            return Err(ConfigError::invalid(
                "fracture.mean_perm_coeff",
                c,
                "必须在 [0, 1] 范围内",
            ));
        }
        if self.fracture.viscosity_threshold < 0.0 {
            return Err(ConfigError::invalid(
                "fracture.viscosity_threshold",
                self.fracture.viscosity_threshold,
                "不能为负",
            ));
        }

        let order = &self.phases.wettability_order;
        if order.is_empty() {
            return Err(ConfigError::Missing("phases.wettability_order".into()));
        }
        for (i, name) in order.iter().enumerate() {
            if order[..i].contains(name) {
                return Err(ConfigError::invalid(
                    "phases.wettability_order",
                    name,
                    "相名重复",
                ));
            }
        }

        if self.gravity.vector.iter().any(|g| !g.is_finite()) {
            return Err(ConfigError::invalid(
                "gravity.vector",
                format!("{:?}", self.gravity.vector),
                "分量必须为有限值",
            ));
        }

        if self.diagnostics.log_level > 3 {
            return Err(ConfigError::invalid(
                "diagnostics.log_level",
                self.diagnostics.log_level,
                "必须在 0..=3 范围内",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = FlowConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.fracture.aperture_integration, ApertureIntegration::BackwardEuler);
        assert_eq!(config.phases.wettability_order, vec!["water", "oil", "gas"]);
        assert!((config.fracture.viscosity_threshold - 2e-3).abs() < 1e-15);
    }

    #[test]
    fn test_invalid_mean_perm_coeff() {
        let mut config = FlowConfig::default();
        config.fracture.mean_perm_coeff = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_backtrack_factor() {
        let mut config = FlowConfig::default();
        config.newton.backtrack_factor = 1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duplicate_phase_rejected() {
        let mut config = FlowConfig::default();
        config.phases.wettability_order = vec!["water".into(), "water".into()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{ "newton": { "max_iterations": 25 }, "time_integration": "steady_state" }"#;
        let config: FlowConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.newton.max_iterations, 25);
        assert_eq!(config.newton.max_backtracks, 8);
        assert_eq!(config.time_integration, TimeIntegration::SteadyState);
    }

    #[test]
    fn test_gravity_disabled() {
        let mut config = FlowConfig::default();
        config.gravity.enabled = false;
        assert_eq!(config.effective_gravity(), [0.0; 3]);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flow.json");
        let mut config = FlowConfig::default();
        config.fracture.tip_flux_policy = TipFluxPolicy::ChannelOnly;
        config.save_to_file(&path).unwrap();

        let loaded = FlowConfig::from_file(&path).unwrap();
        assert_eq!(loaded.fracture.tip_flux_policy, TipFluxPolicy::ChannelOnly);
    }
}
