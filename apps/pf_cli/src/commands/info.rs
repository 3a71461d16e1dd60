// apps/pf_cli/src/commands/info.rs

//! 信息显示命令

use anyhow::{Context, Result};
use clap::Args;
use pf_config::FlowConfig;
use pf_flow::{MAX_DOF, MAX_PHASES, MAX_STENCIL};
use std::path::PathBuf;
use tracing::info;

/// 信息显示参数
#[derive(Args)]
pub struct InfoArgs {
    /// 显示系统信息
    #[arg(long)]
    pub system: bool,

    /// 以 JSON 输出默认配置
    #[arg(long)]
    pub defaults: bool,

    /// 把默认配置写入文件
    #[arg(long)]
    pub write_defaults: Option<PathBuf>,
}

/// 执行信息命令
pub fn execute(args: InfoArgs) -> Result<()> {
    info!("=== PoroFrac 信息 ===");

    if let Some(path) = &args.write_defaults {
        FlowConfig::default()
            .save_to_file(path)
            .with_context(|| format!("无法写入默认配置: {}", path.display()))?;
        info!("默认配置已写入 {}", path.display());
    }

    if args.system {
        print_system_info();
    }

    if args.defaults {
        print_default_config()?;
    }

    if !args.system && !args.defaults && args.write_defaults.is_none() {
        print_system_info();
        println!();
        print_default_config()?;
    }

    Ok(())
}

fn print_system_info() {
    println!("=== 系统信息 ===");
    println!("PoroFrac CLI 版本: {}", env!("CARGO_PKG_VERSION"));
    println!("目标平台: {}", std::env::consts::ARCH);
    println!("操作系统: {}", std::env::consts::OS);

    println!("\n编译期上限:");
    println!("  最大相数: {MAX_PHASES}");
    println!("  每单元最大自由度: {MAX_DOF}");
    println!("  最大连接模板: {MAX_STENCIL}");
}

fn print_default_config() -> Result<()> {
    println!("=== 默认配置 ===");
    let json = serde_json::to_string_pretty(&FlowConfig::default())?;
    println!("{json}");
    Ok(())
}
