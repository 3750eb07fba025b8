// ==========================================
// CSV 导入器 - 时钟
// ==========================================
// 用途: 记录创建时间（本地 + UTC）、定义审计时间
// ==========================================

use crate::domain::RECORD_TIMESTAMP_FORMAT;
use chrono::{DateTime, Local, NaiveDateTime, Utc};
use std::sync::Arc;

pub trait Clock: Send + Sync {
    /// 当前 UTC 时间
    fn now_utc(&self) -> DateTime<Utc>;

    /// 当前本地时间（无时区）
    fn now_local(&self) -> NaiveDateTime {
        self.now_utc().with_timezone(&Local).naive_local()
    }

    /// 目标存储格式的本地时间戳
    fn local_stamp(&self) -> String {
        self.now_local().format(RECORD_TIMESTAMP_FORMAT).to_string()
    }

    /// 目标存储格式的 UTC 时间戳
    fn utc_stamp(&self) -> String {
        self.now_utc().format(RECORD_TIMESTAMP_FORMAT).to_string()
    }
}

/// 系统时钟
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// 固定时钟（测试/回放）
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    utc: DateTime<Utc>,
    local: NaiveDateTime,
}

impl FixedClock {
    /// 本地时间与 UTC 相同，不受运行环境时区影响
    pub fn at(utc: DateTime<Utc>) -> Self {
        Self {
            utc,
            local: utc.naive_utc(),
        }
    }

    pub fn with_local(utc: DateTime<Utc>, local: NaiveDateTime) -> Self {
        Self { utc, local }
    }
}

impl Clock for FixedClock {
    fn now_utc(&self) -> DateTime<Utc> {
        self.utc
    }

    fn now_local(&self) -> NaiveDateTime {
        self.local
    }
}

impl<T: Clock + ?Sized> Clock for Arc<T> {
    fn now_utc(&self) -> DateTime<Utc> {
        (**self).now_utc()
    }

    fn now_local(&self) -> NaiveDateTime {
        (**self).now_local()
    }
}
