// ==========================================
// CSV 导入器 - 文件系统操作
// ==========================================
// 职责: 带权限位的目录创建、可写检查、跨设备移动、原子写入、覆盖前暂存
// 说明: 权限位仅在 unix 上生效
// ==========================================

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

/// 递归创建目录（使用给定权限位）
pub fn create_dir_all_with_mode(path: &Path, mode: u32) -> io::Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;
    builder.create(path)
}

/// 设置文件权限位
pub fn set_file_mode(path: &Path, mode: u32) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    }
    #[cfg(not(unix))]
    let _ = (path, mode);
    Ok(())
}

/// 路径是否可写（依据权限位；不存在视为不可写）
pub fn is_writable(path: &Path) -> bool {
    fs::metadata(path)
        .map(|m| !m.permissions().readonly())
        .unwrap_or(false)
}

/// 移动文件
///
/// 先尝试 rename；失败（例如跨设备）时退化为 复制 + 删除源文件。
/// 复制成功但删除源文件失败时，删掉副本并返回错误，保持源文件不动。
pub fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(rename_err) => {
            if !from.is_file() {
                return Err(rename_err);
            }
            debug!(from = %from.display(), to = %to.display(), error = %rename_err, "rename 失败，改为复制");
            fs::copy(from, to).map_err(|_| rename_err)?;
            if let Err(e) = fs::remove_file(from) {
                let _ = fs::remove_file(to);
                return Err(e);
            }
            Ok(())
        }
    }
}

/// 原子写入：先写同目录临时文件并落盘，再 rename 覆盖目标
///
/// 失败时目标文件保持原样，临时文件被清理
pub fn write_atomic(path: &Path, contents: &[u8], mode: u32) -> io::Result<()> {
    let temp_path = temp_sibling(path)?;

    let result = (|| {
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)?;
        file.write_all(contents)?;
        file.sync_all()?;
        drop(file);
        set_file_mode(&temp_path, mode)?;
        fs::rename(&temp_path, path)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result
}

/// 将已存在的文件改名为同目录隐藏备份，返回备份路径
///
/// 文件不存在时返回 None
pub fn set_aside(path: &Path) -> io::Result<Option<PathBuf>> {
    if !path.exists() {
        return Ok(None);
    }
    let backup = sibling(path, "bak")?;
    fs::rename(path, &backup)?;
    debug!(path = %path.display(), backup = %backup.display(), "已有文件已暂存");
    Ok(Some(backup))
}

/// 将 set_aside 的备份放回原位置
pub fn restore_aside(backup: &Path, path: &Path) -> io::Result<()> {
    fs::rename(backup, path)
}

fn temp_sibling(path: &Path) -> io::Result<PathBuf> {
    sibling(path, "tmp")
}

fn sibling(path: &Path, suffix: &str) -> io::Result<PathBuf> {
    let dir = path
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "目标路径没有父目录"))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(dir.join(format!(".{}.{}.{}", name, Uuid::new_v4().simple(), suffix)))
}
