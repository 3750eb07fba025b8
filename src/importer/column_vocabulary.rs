// ==========================================
// CSV 导入器 - 列词表推导
// ==========================================
// 职责: 由文件首行推导有序列标签，供映射编辑预览
// 规则:
// - 有表头: 首行解码后的值原样返回（保留空字段）
// - 无表头: 生成 "Column 0", "Column 1", ...，长度等于首行字段数
// - 文件不可读/为空/首行为空行: 返回空序列（“无预览”，不是错误）
// 只读、幂等；文件句柄在所有路径上随读取器释放
// ==========================================

use crate::importer::file_parser::{CsvRow, RowReader};
use csv::StringRecord;
use std::path::Path;
use tracing::debug;

/// 示例预览默认行数
pub const EXAMPLE_LENGTH: usize = 3;

/// 生成的列标签
pub fn column_label(index: usize) -> String {
    format!("Column {}", index)
}

/// 推导列词表
///
/// # 参数
/// - path: CSV 文件路径
/// - has_header: 首行是否为表头
///
/// # 返回
/// - Vec<String>: 列标签；文件不可读/为空/首行解析失败时为空
pub fn derive(path: &Path, has_header: bool) -> Vec<String> {
    let first_row = match read_first_row(path) {
        Some(row) => row,
        None => return Vec::new(),
    };

    if has_header {
        first_row.iter().map(str::to_string).collect()
    } else {
        (0..first_row.len()).map(column_label).collect()
    }
}

/// 读取示例行（用于映射编辑时展示数据样貌）
///
/// # 参数
/// - path: CSV 文件路径
/// - has_header: 为 true 时先跳过首行
/// - limit: 最多返回的行数
///
/// # 返回
/// - 解码后的行；遇到不可读文件返回空，遇到解析错误在该行处截止
pub fn preview_rows(path: &Path, has_header: bool, limit: usize) -> Vec<Vec<String>> {
    let rows = match RowReader::open(path) {
        Ok(rows) => rows,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "预览: 文件不可读");
            return Vec::new();
        }
    };

    let skip = usize::from(has_header);
    rows.skip(skip)
        .map_while(Result::ok)
        .filter_map(|(_, line)| match line {
            CsvRow::Record(record) => Some(record.iter().map(str::to_string).collect()),
            CsvRow::Blank => None,
        })
        .take(limit)
        .collect()
}

fn read_first_row(path: &Path) -> Option<StringRecord> {
    let mut rows = match RowReader::open(path) {
        Ok(rows) => rows,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "列词表: 文件不可读");
            return None;
        }
    };

    match rows.next()? {
        Ok((_, CsvRow::Record(record))) => Some(record),
        Ok((_, CsvRow::Blank)) => None,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "列词表: 首行解析失败");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn csv_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_header_row_returned_verbatim_with_empty_fields() {
        let file = csv_file("title,,\"body, text\"\n1,2,3\n");
        let vocab = derive(file.path(), true);
        assert_eq!(vocab, vec!["title", "", "body, text"]);
    }

    #[test]
    fn test_generated_labels_without_header() {
        let file = csv_file("a,b,c,d\n1,2\n");
        let vocab = derive(file.path(), false);
        assert_eq!(vocab, vec!["Column 0", "Column 1", "Column 2", "Column 3"]);
    }

    #[test]
    fn test_missing_file_yields_empty() {
        assert!(derive(Path::new("/nonexistent/file.csv"), true).is_empty());
        assert!(derive(Path::new("/nonexistent/file.csv"), false).is_empty());
    }

    #[test]
    fn test_empty_file_yields_empty() {
        let file = csv_file("");
        assert!(derive(file.path(), true).is_empty());
        assert!(derive(file.path(), false).is_empty());
    }

    #[test]
    fn test_derive_is_idempotent() {
        let file = csv_file("x,y\n");
        assert_eq!(derive(file.path(), true), derive(file.path(), true));
    }

    #[test]
    fn test_preview_rows_skips_header_and_limits() {
        let file = csv_file("h1,h2\n1,a\n2,b\n3,c\n4,d\n");

        let with_header = preview_rows(file.path(), true, EXAMPLE_LENGTH);
        assert_eq!(with_header.len(), 3);
        assert_eq!(with_header[0], vec!["1", "a"]);

        let without_header = preview_rows(file.path(), false, EXAMPLE_LENGTH);
        assert_eq!(without_header[0], vec!["h1", "h2"]);
        assert_eq!(without_header.len(), 3);
    }

    #[test]
    fn test_preview_short_file() {
        let file = csv_file("h1,h2\n1,a\n");
        assert_eq!(preview_rows(file.path(), true, EXAMPLE_LENGTH).len(), 1);
    }
}
