//! 米游社商品兑换工具启动入口。
//!
//! 职责：
//! - 按命令行参数个数选择配置文件路径（共 2 或 4 个 argv 时取最后一个）
//! - 加载配置文件；文件损坏或不可访问时输出诊断并以非零状态退出
//! - 按偏好设置开启日志文件输出
//! - 输出账户与兑换计划概况
//!
//! 作者：mys-goods 项目组
//! 创建时间：2026-10-14
//! 修改时间：2026-10-14

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::Parser;
use mys_goods_core::paths;
use mys_goods_core::{ConfigError, ConfigStore, Preference};
use tracing::level_filters::LevelFilter;
use tracing::{debug, error, info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// 命令行参数。
///
/// 说明：
/// - 只接受位置参数；共 1 个或 3 个时，最后一个作为配置文件路径
/// - 不提供 `-h`/`-V` 等内置选项，任何参数都按位置参数计数
#[derive(Debug, Parser)]
#[command(name = "mys-goods-tool", disable_help_flag = true, disable_version_flag = true)]
struct Cli {
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

/// 程序入口：加载配置（唯一加载点），随后初始化完整日志并输出概况。
///
/// 异常处理：
/// - 配置加载失败时进程以状态码 1 退出，不会带着部分有效的配置继续运行
fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut argv = vec![std::env::args().next().unwrap_or_default()];
    argv.extend(cli.args);
    let config_path = paths::config_path_from_args(&argv);

    let store = {
        let _console = tracing::subscriber::set_default(
            fmt()
                .with_env_filter(env_filter())
                .with_target(false)
                .finish(),
        );
        match ConfigStore::bootstrap(&config_path) {
            Ok(store) => store,
            Err(e) => {
                report_fatal(&e);
                std::process::exit(1);
            }
        }
    };

    init_logging(&store.preference);
    summarize(&store);
    Ok(())
}

fn env_filter() -> EnvFilter {
    EnvFilter::from_default_env().add_directive(LevelFilter::INFO.into())
}

/// 输出配置加载失败的诊断，区分“内容格式错误”与“文件不可访问”。
fn report_fatal(e: &ConfigError) {
    error!("{e}");
    if e.is_malformed() {
        error!("请修正配置文件内容后重试；删除该文件可重新生成默认配置");
    } else {
        error!("请检查配置文件所在目录的读写权限");
    }
    debug!("配置加载失败详情: {e:?}");
}

/// 安装全局日志：控制台输出，外加可选的日志文件输出。
///
/// 异常处理：
/// - 日志文件无法打开时仅输出警告，继续只使用控制台
fn init_logging(preference: &Preference) {
    let (file_layer, file_error) = match (preference.enable_log_output, &preference.log_path) {
        (true, Some(path)) => match open_log_file(path) {
            Ok(file) => (
                Some(
                    fmt::layer()
                        .with_writer(Mutex::new(file))
                        .with_ansi(false)
                        .with_target(false),
                ),
                None,
            ),
            Err(e) => (None, Some(e)),
        },
        _ => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_target(false))
        .with(file_layer)
        .init();

    if let Some(e) = file_error {
        warn!("日志文件不可用，仅输出到控制台: {e:#}");
    }
}

fn open_log_file(path: &Path) -> Result<std::fs::File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        paths::ensure_dir(parent)?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("打开日志文件失败: {}", path.display()))
}

/// 输出配置概况：账户登录态是否完整、兑换计划引用的账户。
fn summarize(store: &ConfigStore) {
    info!("配置文件: {}", store.path().display());
    info!(
        "已加载 {} 个账户，{} 个兑换计划",
        store.accounts.len(),
        store.exchange_plans.len()
    );
    for (key, account) in &store.accounts {
        let uid = account.logical_id().unwrap_or("未知");
        if account.cookies.is_complete() {
            info!("账户 {key}（米游社 UID {uid}）登录态完整");
        } else {
            warn!("账户 {key}（米游社 UID {uid}）Cookies 不完整，需要重新登录");
        }
    }
    for plan in &store.exchange_plans {
        let uid = store
            .resolve_account(plan)
            .and_then(|a| a.logical_id())
            .unwrap_or("未知");
        info!("兑换计划：商品 {} → 地址 {}（账户 UID {uid}）", plan.good_id, plan.address_id);
    }
}
