//! 统一路径约定：程序所在目录、配置文件与日志文件的默认位置。
//!
//! 作者：mys-goods 项目组
//! 创建时间：2026-10-14
//! 修改时间：2026-10-14

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// 默认配置文件名。
pub const CONFIG_FILE_NAME: &str = "config.json";

/// 程序所在目录。
///
/// 返回值：
/// - 可执行文件所在目录；无法确定时回退为当前目录 `.`
pub fn program_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// 默认配置文件路径：`<程序目录>/config.json`。
pub fn default_config_path() -> PathBuf {
    program_dir().join(CONFIG_FILE_NAME)
}

/// 默认日志文件路径：`<程序目录>/logs/mys_goods_tool.log`。
pub fn default_log_path() -> PathBuf {
    program_dir().join("logs").join("mys_goods_tool.log")
}

/// 根据命令行参数选择配置文件路径。
///
/// 参数：
/// - `args`：完整的 argv（含程序名）
///
/// 返回值：
/// - argv 长度为 2 或 4 时取最后一个参数
/// - 其他情况返回 [`default_config_path`]
pub fn config_path_from_args(args: &[String]) -> PathBuf {
    match args {
        [_, path] | [_, _, _, path] => PathBuf::from(path),
        _ => default_config_path(),
    }
}

/// 确保目录存在（不存在则递归创建）。
///
/// 异常处理：
/// - 目录创建失败（权限、路径非法等）会返回错误。
pub fn ensure_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path).with_context(|| format!("创建目录失败: {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn two_or_four_args_select_last() {
        assert_eq!(config_path_from_args(&argv(&["tool", "a.json"])), PathBuf::from("a.json"));
        assert_eq!(
            config_path_from_args(&argv(&["tool", "x", "y", "b.json"])),
            PathBuf::from("b.json")
        );
    }

    #[test]
    fn other_counts_use_default() {
        for items in [&["tool"][..], &["tool", "x", "y"][..], &[][..]] {
            assert_eq!(config_path_from_args(&argv(items)), default_config_path());
        }
    }

    #[test]
    fn defaults_live_next_to_the_executable() {
        assert_eq!(default_config_path().file_name().unwrap(), CONFIG_FILE_NAME);
        assert!(default_log_path().starts_with(program_dir()));
    }
}
