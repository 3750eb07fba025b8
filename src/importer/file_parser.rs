// ==========================================
// CSV 导入器 - CSV 读取器构建
// ==========================================
// 规则: 逗号分隔、双引号包裹、双写引号转义（RFC 4180 风格）
//       引号内允许出现分隔符与换行
// 说明: 不做表头识别（表头与否由导入定义决定），允许行长度不一致
// 行号: RowReader 为每条记录与每个空行编号，csv 读取器跳过的空行也占行号
// ==========================================

use csv::{Reader, ReaderBuilder, StringRecord};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

/// 统一的 CSV 读取配置
pub fn csv_reader_builder() -> ReaderBuilder {
    let mut builder = ReaderBuilder::new();
    builder
        .delimiter(b',')
        .quote(b'"')
        .double_quote(true)
        .has_headers(false)
        .flexible(true); // 允许行长度不一致
    builder
}

/// 从任意输入创建 CSV 读取器
pub fn csv_reader_from<R: Read>(input: R) -> Reader<R> {
    csv_reader_builder().from_reader(input)
}

// ==========================================
// RowReader - 带行号的逐行读取
// ==========================================

/// 一行数据：空行（只有行结束符）或一条记录
#[derive(Debug, Clone, PartialEq)]
pub enum CsvRow {
    Blank,
    Record(StringRecord),
}

/// 逐行读取 CSV，空行与记录各占一个行号（从 0 起）
///
/// csv 读取器静默丢弃空行；这里用同一输入的第二个字节流，
/// 按读取器每次消费的字节区间找回被丢弃的行结束符。
/// 引号内换行不增加行号：一条记录只占一个行号。
pub struct RowReader<R> {
    records: Reader<R>,
    raw: BufReader<R>,
    raw_pos: u64,
    after_cr: bool, // 上一区间以 \r 结尾（随后的 \n 属于同一个行结束符）
    next_row: usize,
    blank_pending: usize,
    record_pending: Option<StringRecord>,
    done: bool,
}

impl RowReader<File> {
    /// 打开文件（同一文件打开两次：记录解析与行结束符计数各一）
    pub fn open(path: &Path) -> io::Result<Self> {
        Ok(Self::new(File::open(path)?, File::open(path)?))
    }
}

impl<R: Read> RowReader<R> {
    /// input 与 raw 必须是同一份数据
    pub fn new(input: R, raw: R) -> Self {
        Self {
            records: csv_reader_from(input),
            raw: BufReader::new(raw),
            raw_pos: 0,
            after_cr: false,
            next_row: 0,
            blank_pending: 0,
            record_pending: None,
            done: false,
        }
    }

    /// 下一行的行号
    pub fn next_row_number(&self) -> usize {
        self.next_row
    }

    fn take_row(&mut self) -> usize {
        let row = self.next_row;
        self.next_row += 1;
        row
    }

    /// 推进原始字节流至 end，返回区间开头的空行数
    fn blank_lines_through(&mut self, end: u64) -> io::Result<usize> {
        let mut blank = 0;
        let mut in_prefix = true;
        while self.raw_pos < end {
            let buf = self.raw.fill_buf()?;
            if buf.is_empty() {
                break;
            }
            let remaining = usize::try_from(end - self.raw_pos).unwrap_or(usize::MAX);
            let take = buf.len().min(remaining);
            for &b in &buf[..take] {
                if in_prefix {
                    match b {
                        b'\n' if self.after_cr => {}
                        b'\n' | b'\r' => blank += 1,
                        _ => in_prefix = false,
                    }
                }
                self.after_cr = b == b'\r';
            }
            self.raw.consume(take);
            self.raw_pos += take as u64;
        }
        Ok(blank)
    }
}

impl<R: Read> Iterator for RowReader<R> {
    type Item = csv::Result<(usize, CsvRow)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.blank_pending > 0 {
                self.blank_pending -= 1;
                return Some(Ok((self.take_row(), CsvRow::Blank)));
            }
            if let Some(record) = self.record_pending.take() {
                return Some(Ok((self.take_row(), CsvRow::Record(record))));
            }
            if self.done {
                return None;
            }

            let mut record = StringRecord::new();
            let has_record = match self.records.read_record(&mut record) {
                Ok(has_record) => has_record,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            };
            let end = self.records.position().byte();
            match self.blank_lines_through(end) {
                Ok(blank) => self.blank_pending = blank,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e.into()));
                }
            }
            if has_record {
                self.record_pending = Some(record);
            } else {
                self.done = true;
            }
        }
    }
}
