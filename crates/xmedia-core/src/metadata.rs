//! 元数据与章节.
//!
//! 章节时间统一换算到固定时间基 1/10000. 元数据字段为有序字典, 重复设置同名
//! 字段会覆盖旧值. 写入输出时所有权整体转移, 转移后本容器为空.
//!
//! 文本格式 (每行一条, `|` 分隔):
//! - 三段: `HH:MM:SS|HH:MM:SS|章节标题`
//! - 两段: `字段名|字段值`

use std::path::Path;

use crate::error::{XMediaError, XMediaResult};
use crate::rational::{Rational, rescale_q};

/// 章节固定时间基
pub const CHAPTER_TIME_BASE: Rational = Rational::new(1, 10000);

/// 章节
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    /// 章节编号, 从 1 开始
    pub id: i64,
    /// 时间基
    pub time_base: Rational,
    /// 起始时间戳
    pub start: i64,
    /// 结束时间戳
    pub end: i64,
    /// 标题
    pub title: Option<String>,
}

impl Chapter {
    /// 由秒数创建, 结束时间为区间末尾前一个刻度
    pub fn from_seconds(id: i64, start_sec: u64, end_sec: u64, title: Option<&str>) -> Self {
        let to_ticks = |sec: u64| {
            let us = i64::try_from(sec).unwrap_or(i64::MAX / 1_000_000) * 1_000_000;
            rescale_q(us, Rational::MICRO, CHAPTER_TIME_BASE)
        };
        Self {
            id,
            time_base: CHAPTER_TIME_BASE,
            start: to_ticks(start_sec),
            end: to_ticks(end_sec) - 1,
            title: title.map(str::to_string),
        }
    }

    /// 由 `HH:MM:SS` 字符串创建
    pub fn from_time(id: i64, start: &str, end: &str, title: Option<&str>) -> XMediaResult<Self> {
        let start_sec = parse_hms(start)?;
        let end_sec = parse_hms(end)?;
        Ok(Self::from_seconds(id, start_sec, end_sec, title))
    }
}

/// 解析 `HH:MM:SS` 为秒数
pub fn parse_hms(text: &str) -> XMediaResult<u64> {
    let parts: Vec<&str> = text.trim().split(':').collect();
    let invalid = || XMediaError::InvalidData(format!("无效时间: {text}"));
    if parts.len() != 3 {
        return Err(invalid());
    }
    let mut total = 0u64;
    for (part, scale) in parts.iter().zip([3600u64, 60, 1]) {
        let v: u64 = part.parse().map_err(|_| invalid())?;
        total += v * scale;
    }
    Ok(total)
}

/// 元数据容器
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    fields: Vec<(String, String)>,
    chapters: Vec<Chapter>,
}

impl Metadata {
    /// 创建空容器
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置字段, 同名字段覆盖
    pub fn add_field(&mut self, name: &str, value: &str) -> XMediaResult<()> {
        if name.is_empty() {
            return Err(XMediaError::InvalidArgument("元数据字段名为空".into()));
        }
        match self.fields.iter_mut().find(|(k, _)| k == name) {
            Some(entry) => entry.1 = value.to_string(),
            None => self.fields.push((name.to_string(), value.to_string())),
        }
        Ok(())
    }

    /// 读取字段
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    fn next_chapter_id(&self) -> i64 {
        i64::try_from(self.chapters.len()).unwrap_or(i64::MAX - 1) + 1
    }

    /// 追加章节, 时间戳已在给定时间基下
    pub fn add_chapter(&mut self, time_base: Rational, start: i64, end: i64, title: Option<&str>) {
        let id = self.next_chapter_id();
        self.chapters.push(Chapter {
            id,
            time_base,
            start,
            end,
            title: title.map(str::to_string),
        });
    }

    /// 追加 `HH:MM:SS` 区间章节
    pub fn add_chapter_time(&mut self, start: &str, end: &str, title: Option<&str>) -> XMediaResult<()> {
        let chapter = Chapter::from_time(self.next_chapter_id(), start, end, title)?;
        self.chapters.push(chapter);
        Ok(())
    }

    /// 追加秒数区间章节
    pub fn add_chapter_seconds(&mut self, start_sec: u64, end_sec: u64, title: Option<&str>) {
        let chapter = Chapter::from_seconds(self.next_chapter_id(), start_sec, end_sec, title);
        self.chapters.push(chapter);
    }

    /// 全部字段
    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    /// 全部章节
    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    /// 是否不含任何字段与章节
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.chapters.is_empty()
    }

    /// 取走全部内容, 本容器随之清空
    pub fn take(&mut self) -> Self {
        std::mem::take(self)
    }

    /// 拆分为字段与章节
    pub fn into_parts(self) -> (Vec<(String, String)>, Vec<Chapter>) {
        (self.fields, self.chapters)
    }

    /// 解析文本格式; 空行忽略, 段数不是 2 或 3 的行视为错误
    pub fn parse_text(text: &str) -> XMediaResult<Self> {
        let mut meta = Self::new();
        for (line_no, raw) in text.lines().enumerate() {
            let line = raw.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }
            let parts: Vec<&str> = line.split('|').collect();
            match parts.as_slice() {
                [start, end, title] => meta.add_chapter_time(start, end, Some(title))?,
                [name, value] => meta.add_field(name, value)?,
                _ => {
                    return Err(XMediaError::InvalidData(format!(
                        "元数据第 {} 行格式错误: {line}",
                        line_no + 1
                    )));
                }
            }
        }
        Ok(meta)
    }

    /// 从文件加载
    pub fn load_file(path: impl AsRef<Path>) -> XMediaResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let meta = Self::parse_text(&text)?;
        log::debug!(
            "已加载元数据 {}: {} 个字段, {} 个章节",
            path.display(),
            meta.fields.len(),
            meta.chapters.len()
        );
        Ok(meta)
    }
}
