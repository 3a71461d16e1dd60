// apps/pf_cli/src/commands/validate.rs

//! 配置验证命令

use anyhow::{bail, Context, Result};
use clap::Args;
use pf_config::{FlowConfig, TipFluxPolicy};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// 验证参数
#[derive(Args)]
pub struct ValidateArgs {
    /// 配置文件路径
    #[arg(short, long)]
    pub config: PathBuf,

    /// 严格模式（警告也视为错误）
    #[arg(long)]
    pub strict: bool,
}

#[derive(Default)]
struct ValidationResult {
    errors: Vec<String>,
    warnings: Vec<String>,
}

impl ValidationResult {
    fn is_ok(&self, strict: bool) -> bool {
        self.errors.is_empty() && (!strict || self.warnings.is_empty())
    }
}

/// 执行验证命令
pub fn execute(args: ValidateArgs) -> Result<()> {
    info!("=== PoroFrac 配置验证 ===");
    let mut result = ValidationResult::default();
    validate_config(&args.config, &mut result)?;
    print_validation_result(&result, args.strict)
}

fn validate_config(path: &Path, result: &mut ValidationResult) -> Result<()> {
    println!("检查配置文件: {}", path.display());

    if !path.exists() {
        result.errors.push(format!("配置文件不存在: {}", path.display()));
        return Ok(());
    }

    let content = std::fs::read_to_string(path).context("无法读取配置文件")?;
    let config: FlowConfig = match serde_json::from_str(&content) {
        Ok(c) => c,
        Err(e) => {
            result.errors.push(format!("JSON 解析错误: {e}"));
            return Ok(());
        }
    };

    if let Err(e) = config.validate() {
        result.errors.push(e.to_string());
        return Ok(());
    }

    check_warnings(&config, result);
    println!("  ✓ 配置文件格式有效");
    Ok(())
}

fn check_warnings(config: &FlowConfig, result: &mut ValidationResult) {
    if config.fracture.tip_flux_policy == TipFluxPolicy::ChannelOnly {
        result
            .warnings
            .push("尖端通量只写入通道单元，汇接质量不守恒".to_string());
    }
    if config.diagnostics.log_level >= 3 {
        result.warnings.push(format!(
            "诊断级别 {} 会在每次迭代写出矩阵文件到 {}",
            config.diagnostics.log_level,
            config.diagnostics.dump_dir.display()
        ));
    }
    if config.newton.max_backtracks == 0 {
        result.warnings.push("未允许越界回退，任何越界都会使时间步失败".to_string());
    }
}

fn print_validation_result(result: &ValidationResult, strict: bool) -> Result<()> {
    println!("\n=== 验证结果 ===");

    if !result.errors.is_empty() {
        println!("\n错误 ({}):", result.errors.len());
        for err in &result.errors {
            error!("  ✗ {}", err);
        }
    }

    if !result.warnings.is_empty() {
        println!("\n警告 ({}):", result.warnings.len());
        for warning in &result.warnings {
            warn!("  ⚠ {}", warning);
        }
    }

    if result.is_ok(strict) {
        println!("\n✓ 验证通过");
        Ok(())
    } else {
        println!("\n✗ 验证失败");
        bail!(
            "验证失败：发现 {} 个错误，{} 个警告",
            result.errors.len(),
            result.warnings.len()
        )
    }
}
