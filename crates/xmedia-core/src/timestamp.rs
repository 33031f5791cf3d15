//! 输出数据包时间戳策略与单调性修正.
//!
//! 每个写出的数据包先按所选 [`TsMode`] 改写 PTS/DTS, 再在 `ts_fix > 0` 时
//! 修正回退或重复的时间戳, 最后由调用方把结果记入流记录的 `last_pts/last_dts`.

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::{XMediaError, XMediaResult};
use crate::media_type::MediaType;
use crate::rational::{Rational, Rounding, rescale_q, rescale_q_rnd};
use crate::stream::StreamState;

/// 时间戳策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TsMode {
    /// 按墙钟流逝时间计算
    Calculate,
    /// 按包计数与帧率/采样率推算
    Compute,
    /// 从源时间基换算到目标时间基
    #[default]
    Rescale,
    /// 换算并四舍五入, 保留无效标记
    Round,
    /// 原样透传
    Source,
}

impl TsMode {
    /// 策略名称
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Calculate => "calculate",
            Self::Compute => "compute",
            Self::Rescale => "rescale",
            Self::Round => "round",
            Self::Source => "source",
        }
    }
}

impl fmt::Display for TsMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TsMode {
    type Err = XMediaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "calculate" => Ok(Self::Calculate),
            "compute" => Ok(Self::Compute),
            "rescale" => Ok(Self::Rescale),
            "round" => Ok(Self::Round),
            "source" => Ok(Self::Source),
            _ => Err(XMediaError::InvalidArgument(format!("未知时间戳策略: {s}"))),
        }
    }
}

/// 数据包时间字段, `None` 表示无时间戳
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PacketTimestamps {
    /// 显示时间戳
    pub pts: Option<i64>,
    /// 解码时间戳
    pub dts: Option<i64>,
    /// 时长
    pub duration: i64,
    /// 字节位置, -1 表示交给复用器决定
    pub pos: i64,
}

/// 按策略改写时间戳
#[derive(Debug, Clone)]
pub struct TimestampFixer {
    mode: TsMode,
    ts_fix: i64,
    start: Option<Instant>,
}

impl TimestampFixer {
    /// 创建; `ts_fix` 为 0 时关闭单调性修正
    pub fn new(mode: TsMode, ts_fix: i64) -> Self {
        Self {
            mode,
            ts_fix,
            start: None,
        }
    }

    /// 当前策略
    pub fn mode(&self) -> TsMode {
        self.mode
    }

    /// 修正增量
    pub fn ts_fix(&self) -> i64 {
        self.ts_fix
    }

    /// 按策略改写时间戳
    ///
    /// `state` 提供源时间基 (描述符 time_base)、帧率/采样率与已写包数,
    /// `dst_tb` 为输出流时间基.
    pub fn apply(
        &mut self,
        ts: &mut PacketTimestamps,
        state: &StreamState,
        dst_tb: Rational,
    ) -> XMediaResult<()> {
        let desc = &state.descriptor;
        match self.mode {
            TsMode::Source => {}
            TsMode::Rescale => {
                let src_tb = source_time_base(state)?;
                let rescale = |v: i64| rescale_q_rnd(v, src_tb, dst_tb, Rounding::NearInf, true);
                ts.pts = ts.pts.map(rescale);
                ts.dts = ts.dts.map(rescale);
                if ts.duration > 0 {
                    ts.duration = rescale_q(ts.duration, src_tb, dst_tb);
                }
                ts.pos = -1;
            }
            TsMode::Round => {
                let src_tb = source_time_base(state)?;
                let rescale = |v: i64| rescale_q_rnd(v, src_tb, dst_tb, Rounding::NearInf, true);
                ts.pts = ts.pts.map(rescale);
                ts.dts = ts.dts.map(rescale);
            }
            TsMode::Calculate => {
                let now = Instant::now();
                let start = *self.start.get_or_insert(now);
                let pts = elapsed_to_ts(now.duration_since(start), dst_tb);
                ts.pts = Some(pts);
                ts.dts = Some(pts);
            }
            TsMode::Compute => {
                let count = i64::try_from(state.packet_count).unwrap_or(i64::MAX);
                match desc.media_type {
                    MediaType::Video => {
                        let fps = desc
                            .frame_rate
                            .filter(Rational::is_valid)
                            .ok_or_else(|| {
                                XMediaError::InvalidArgument("COMPUTE 策略需要有效帧率".into())
                            })?;
                        let src_tb = fps.invert();
                        ts.duration = rescale_q(1, src_tb, dst_tb);
                        let pts = rescale_q(count, src_tb, dst_tb);
                        ts.pts = Some(pts);
                        ts.dts = Some(pts);
                    }
                    MediaType::Audio => {
                        let rate = desc.sample_rate.filter(|&r| r > 0).ok_or_else(|| {
                            XMediaError::InvalidArgument("COMPUTE 策略需要有效采样率".into())
                        })?;
                        let src_tb = Rational::new(1, i32::try_from(rate).unwrap_or(i32::MAX));
                        let frame_size = i64::from(desc.frame_size.unwrap_or(0).max(0));
                        ts.duration = rescale_q(frame_size, src_tb, dst_tb);
                        let pts = rescale_q(count.saturating_mul(frame_size), src_tb, dst_tb);
                        ts.pts = Some(pts);
                        ts.dts = Some(pts);
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }

    /// 单调性修正: 当前 PTS/DTS 未超过上一包时改写为 `last + ts_fix`
    ///
    /// 返回是否发生了修正.
    pub fn fix_monotonic(&self, ts: &mut PacketTimestamps, state: &StreamState) -> bool {
        if self.ts_fix <= 0 {
            return false;
        }
        let stale = |last: Option<i64>, cur: Option<i64>| match (last, cur) {
            (Some(l), Some(c)) => c <= l,
            (Some(_), None) => true,
            _ => false,
        };
        if !stale(state.last_pts, ts.pts) && !stale(state.last_dts, ts.dts) {
            return false;
        }
        ts.pts = state.last_pts.map(|l| l + self.ts_fix).or(ts.pts);
        ts.dts = state.last_dts.map(|l| l + self.ts_fix).or(ts.dts);
        true
    }
}

impl Default for TimestampFixer {
    fn default() -> Self {
        Self::new(TsMode::default(), 0)
    }
}

fn source_time_base(state: &StreamState) -> XMediaResult<Rational> {
    state
        .descriptor
        .time_base
        .filter(Rational::is_valid)
        .ok_or_else(|| XMediaError::InvalidArgument("源时间基未设置".into()))
}

/// 墙钟流逝时间换算为目标时间基下的时间戳: `elapsed_us * den / 1_000_000`
pub fn elapsed_to_ts(elapsed: Duration, dst_tb: Rational) -> i64 {
    let micros = i128::try_from(elapsed.as_micros()).unwrap_or(i128::MAX);
    let v = micros.saturating_mul(i128::from(dst_tb.den)) / 1_000_000;
    i64::try_from(v).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::CodecDescriptor;

    fn video_state(count: u64) -> StreamState {
        let mut d = CodecDescriptor::new(MediaType::Video, crate::CodecId::H264);
        d.time_base = Some(Rational::new(1, 1000));
        d.frame_rate = Some(Rational::new(25, 1));
        StreamState {
            descriptor: d,
            packet_count: count,
            ..StreamState::default()
        }
    }

    fn at(pts: i64) -> PacketTimestamps {
        PacketTimestamps {
            pts: Some(pts),
            dts: Some(pts),
            duration: 0,
            pos: 0,
        }
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!("COMPUTE".parse::<TsMode>().unwrap(), TsMode::Compute);
        assert_eq!(TsMode::default(), TsMode::Rescale);
        assert!("wall".parse::<TsMode>().is_err());
    }

    #[test]
    fn test_rescale_resets_pos() {
        let mut fixer = TimestampFixer::new(TsMode::Rescale, 0);
        let mut ts = PacketTimestamps {
            pts: Some(40),
            dts: None,
            duration: 40,
            pos: 1234,
        };
        fixer
            .apply(&mut ts, &video_state(0), Rational::new(1, 90000))
            .unwrap();
        assert_eq!(ts.pts, Some(3600));
        assert_eq!(ts.dts, None);
        assert_eq!(ts.duration, 3600);
        assert_eq!(ts.pos, -1);
    }

    #[test]
    fn test_compute_video_uses_packet_count() {
        let mut fixer = TimestampFixer::new(TsMode::Compute, 0);
        let dst = Rational::new(1, 12800);
        for n in 0..4u64 {
            let mut ts = at(999);
            fixer.apply(&mut ts, &video_state(n), dst).unwrap();
            assert_eq!(ts.pts, Some(n as i64 * 512));
            assert_eq!(ts.dts, ts.pts);
            assert_eq!(ts.duration, 512);
        }
    }

    #[test]
    fn test_compute_audio_uses_frame_size() {
        let mut d = CodecDescriptor::new(MediaType::Audio, crate::CodecId::Aac);
        d.sample_rate = Some(48000);
        d.frame_size = Some(1024);
        let state = StreamState {
            descriptor: d,
            packet_count: 3,
            ..StreamState::default()
        };
        let mut ts = at(0);
        TimestampFixer::new(TsMode::Compute, 0)
            .apply(&mut ts, &state, Rational::new(1, 48000))
            .unwrap();
        assert_eq!(ts.pts, Some(3072));
        assert_eq!(ts.duration, 1024);
    }

    #[test]
    fn test_compute_without_frame_rate_fails() {
        let mut state = video_state(0);
        state.descriptor.frame_rate = None;
        let mut ts = at(0);
        let err = TimestampFixer::new(TsMode::Compute, 0).apply(&mut ts, &state, Rational::new(1, 90000));
        assert!(err.is_err());
    }

    #[test]
    fn test_round_passes_missing_dts() {
        let mut ts = PacketTimestamps {
            pts: Some(1),
            dts: None,
            duration: 0,
            pos: 7,
        };
        TimestampFixer::new(TsMode::Round, 0)
            .apply(&mut ts, &video_state(0), Rational::new(1, 90000))
            .unwrap();
        assert_eq!(ts.pts, Some(90));
        assert_eq!(ts.dts, None);
        assert_eq!(ts.pos, 7);
    }

    #[test]
    fn test_monotonic_fix_sequence() {
        let fixer = TimestampFixer::new(TsMode::Source, 1);
        let mut state = video_state(0);
        let mut written = Vec::new();
        for pts in [0, 100, 100, 50, 300] {
            let mut ts = at(pts);
            fixer.fix_monotonic(&mut ts, &state);
            state.last_pts = ts.pts;
            state.last_dts = ts.dts;
            written.push(ts.pts.unwrap());
        }
        assert_eq!(written, vec![0, 100, 101, 102, 300]);
    }

    #[test]
    fn test_monotonic_fix_disabled() {
        let fixer = TimestampFixer::new(TsMode::Source, 0);
        let mut state = video_state(0);
        state.last_pts = Some(100);
        state.last_dts = Some(100);
        let mut ts = at(50);
        assert!(!fixer.fix_monotonic(&mut ts, &state));
        assert_eq!(ts.pts, Some(50));
    }

    #[test]
    fn test_elapsed_to_ts() {
        let tb = Rational::new(1, 90000);
        assert_eq!(elapsed_to_ts(Duration::from_millis(500), tb), 45000);
        assert_eq!(elapsed_to_ts(Duration::ZERO, tb), 0);
    }
}
