// ==========================================
// CSV 导入器 - 命令行入口
// ==========================================
// 用法:
//   csv-importer list [--sort KEY] [--desc] [--search TEXT]
//   csv-importer show HANDLE
//   csv-importer columns FILE [--header]
//   csv-importer preview FILE [--header] [--limit N]
//   csv-importer run HANDLE [--file FILE] [--actor ID]
//   csv-importer delete HANDLE...
// 环境变量: CSV_IMPORTER_WORKSPACE / CSV_IMPORTER_DB_PATH / RUST_LOG
// ==========================================

use anyhow::{anyhow, bail, Context, Result};
use csv_importer::db::default_db_path;
use csv_importer::{logging, ConfigManager, ImporterApi, ImporterConfig, ListQuery, SortKey, SqliteRecordStore};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

const USAGE: &str = "\
用法:
  csv-importer list [--sort name|file|section|modified|author] [--desc] [--search TEXT]
  csv-importer show HANDLE
  csv-importer columns FILE [--header]
  csv-importer preview FILE [--header] [--limit N]
  csv-importer run HANDLE [--file FILE] [--actor ID]
  csv-importer delete HANDLE...";

fn main() -> Result<ExitCode> {
    logging::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some((command, rest)) = args.split_first() else {
        eprintln!("{}", USAGE);
        return Ok(ExitCode::from(64));
    };

    let db_path = default_db_path();
    tracing::debug!(db_path = %db_path, "使用数据库");
    let records = SqliteRecordStore::new(&db_path)
        .with_context(|| format!("无法打开数据库: {}", db_path))?;
    let config = ConfigManager::from_connection(records.connection())?
        .load_importer_config(ImporterConfig::from_env())?;
    let api = ImporterApi::new(config, records);

    match command.as_str() {
        "list" => cmd_list(&api, rest),
        "show" => cmd_show(&api, rest),
        "columns" => cmd_columns(&api, rest),
        "preview" => cmd_preview(&api, rest),
        "run" => cmd_run(&api, rest),
        "delete" => cmd_delete(&api, rest),
        "help" | "--help" | "-h" => {
            println!("{}", USAGE);
            Ok(ExitCode::SUCCESS)
        }
        other => {
            eprintln!("未知命令: {}\n{}", other, USAGE);
            Ok(ExitCode::from(64))
        }
    }
}

fn cmd_list(api: &ImporterApi<SqliteRecordStore>, args: &[String]) -> Result<ExitCode> {
    let mut query = ListQuery::default();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--sort" => query.sort = SortKey::parse(next_value(&mut iter, "--sort")?),
            "--desc" => query.descending = true,
            "--search" => query.search = Some(next_value(&mut iter, "--search")?.to_string()),
            other => bail!("list: 未知参数 {}", other),
        }
    }

    for def in api.list(&query) {
        let section = def.destination.as_ref().map(|s| s.name.as_str()).unwrap_or("-");
        let file = def
            .source_file
            .as_ref()
            .map(|s| s.original_name.as_str())
            .unwrap_or("-");
        println!(
            "{}\t{}\t{}\t{}\t{}\t{}",
            def.handle,
            def.name,
            file,
            section,
            def.updated_at.format("%Y-%m-%d %H:%M"),
            def.author.name
        );
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_show(api: &ImporterApi<SqliteRecordStore>, args: &[String]) -> Result<ExitCode> {
    let handle = args.first().ok_or_else(|| anyhow!("show: 缺少 HANDLE"))?;
    let def = api.load(handle)?;
    println!("{}", serde_json::to_string_pretty(&def)?);
    if let Some(path) = &def.storage_file {
        println!("# {}", path.display());
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_columns(api: &ImporterApi<SqliteRecordStore>, args: &[String]) -> Result<ExitCode> {
    let (file, has_header, _) = file_args(args, "columns")?;
    let columns = api.columns(&file, has_header);
    if columns.is_empty() {
        eprintln!("无预览: {}", file.display());
    }
    for (index, label) in columns.iter().enumerate() {
        println!("{}\t{}", index, label);
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_preview(api: &ImporterApi<SqliteRecordStore>, args: &[String]) -> Result<ExitCode> {
    let (file, has_header, limit) = file_args(args, "preview")?;
    let header = api.columns(&file, has_header);
    if !header.is_empty() {
        println!("{}", header.join("\t"));
    }
    for row in api.preview(&file, has_header, limit) {
        println!("{}", row.join("\t"));
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_run(api: &ImporterApi<SqliteRecordStore>, args: &[String]) -> Result<ExitCode> {
    let mut iter = args.iter();
    let handle = iter.next().ok_or_else(|| anyhow!("run: 缺少 HANDLE"))?;
    let mut data_file: Option<PathBuf> = None;
    let mut actor_id: i64 = 1;
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--file" => data_file = Some(PathBuf::from(next_value(&mut iter, "--file")?)),
            "--actor" => {
                let value = next_value(&mut iter, "--actor")?;
                actor_id = value
                    .parse()
                    .with_context(|| format!("--actor 需要整数: {}", value))?;
            }
            other => bail!("run: 未知参数 {}", other),
        }
    }

    let original_name = data_file.as_deref().map(file_name_of);
    let data = data_file
        .as_deref()
        .zip(original_name.as_deref());

    let mut errors = Vec::new();
    let summary = api.run_saved(handle, data, actor_id, &mut errors)?;

    for message in &errors {
        eprintln!("{}", message);
    }
    println!(
        "run_id={} rows={} committed={} blank={} errors={} aborted={}",
        summary.run_id,
        summary.rows_read,
        summary.records_committed,
        summary.rows_skipped_blank,
        summary.errors_appended,
        summary.aborted
    );

    Ok(if summary.aborted {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn cmd_delete(api: &ImporterApi<SqliteRecordStore>, args: &[String]) -> Result<ExitCode> {
    if args.is_empty() {
        bail!("delete: 至少需要一个 HANDLE");
    }
    let outcome = api.delete_many(args);
    for handle in &outcome.deleted {
        println!("已删除 {}", handle);
    }
    for (handle, reason) in &outcome.failed {
        eprintln!("删除失败 {}: {}", handle, reason);
    }
    Ok(if outcome.failed.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

// FILE [--header] [--limit N]
fn file_args(args: &[String], command: &str) -> Result<(PathBuf, bool, Option<usize>)> {
    let mut iter = args.iter();
    let file = iter
        .next()
        .map(PathBuf::from)
        .ok_or_else(|| anyhow!("{}: 缺少 FILE", command))?;
    let mut has_header = false;
    let mut limit = None;
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--header" => has_header = true,
            "--limit" => {
                let value = next_value(&mut iter, "--limit")?;
                limit = Some(
                    value
                        .parse()
                        .with_context(|| format!("--limit 需要非负整数: {}", value))?,
                );
            }
            other => bail!("{}: 未知参数 {}", command, other),
        }
    }
    Ok((file, has_header, limit))
}

fn next_value<'a>(iter: &mut std::slice::Iter<'a, String>, flag: &str) -> Result<&'a str> {
    iter.next()
        .map(String::as_str)
        .ok_or_else(|| anyhow!("{} 需要一个值", flag))
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
