use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use std::sync::{Mutex, PoisonError};

/// 引擎分配时间戳时使用的时钟
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// 系统时钟（精确到微秒）
///
/// 同一实例内严格递增：同一微秒内的两次调用（或系统时间回拨）
/// 仍然得到不同且有序的时间戳
#[derive(Debug, Default)]
pub struct SystemClock {
    last: Mutex<Option<DateTime<Utc>>>,
}

impl SystemClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        let now = Utc::now().trunc_subsecs(6);
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);

        let next = match *last {
            Some(prev) if now <= prev => prev + chrono::Duration::microseconds(1),
            _ => now,
        };
        *last = Some(next);
        next
    }
}

/// 定宽文本格式（RFC 3339，微秒，UTC）
/// 字典序与时间顺序一致，SQLite 直接按文本排序
pub fn to_text(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn from_text(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
