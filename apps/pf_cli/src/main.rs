// apps/pf_cli/src/main.rs

//! PoroFrac 命令行界面
//!
//! 全隐式多相渗流 Newton 步的命令行入口。库内日志经 `log` 门面
//! 输出，由这里安装的 tracing 订阅者统一收集。

mod commands;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// PoroFrac 多相渗流求解器命令行工具
#[derive(Parser)]
#[command(name = "pf_cli")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "PoroFrac fully implicit multiphase flow solver", long_about = None)]
struct Cli {
    /// 日志级别 (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 运行一维两相算例
    Run(commands::run::RunArgs),
    /// 显示信息
    Info(commands::info::InfoArgs),
    /// 验证配置
    Validate(commands::validate::ValidateArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // 同时安装 log → tracing 桥接
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("初始化日志失败: {e}"))?;

    match cli.command {
        Commands::Run(args) => commands::run::execute(args),
        Commands::Info(args) => commands::info::execute(args),
        Commands::Validate(args) => commands::validate::execute(args),
    }
}
