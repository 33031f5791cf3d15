//! 有理数类型与时间戳换算.
//!
//! 对标 FFmpeg 的 `AVRational` 与 `av_rescale_rnd`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// 有理数, 由分子和分母组成
///
/// 用于表示时间基 (time_base)、帧率、宽高比等.
/// 例如: 时间基 1/90000 表示 90kHz 时钟, 帧率 30000/1001 表示 29.97fps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "[i32; 2]", into = "[i32; 2]")]
pub struct Rational {
    /// 分子
    pub num: i32,
    /// 分母
    pub den: i32,
}

impl Rational {
    /// 创建新的有理数
    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    /// 零值
    pub const ZERO: Self = Self { num: 0, den: 1 };

    /// 微秒时间基 (1/1_000_000)
    pub const MICRO: Self = Self {
        num: 1,
        den: 1_000_000,
    };

    /// 判断是否有效 (分子分母均为正)
    pub const fn is_valid(&self) -> bool {
        self.num > 0 && self.den > 0
    }

    /// 转换为 f64 浮点数, 分母为 0 时返回 `f64::NAN`
    pub fn to_f64(self) -> f64 {
        if self.den == 0 {
            return f64::NAN;
        }
        f64::from(self.num) / f64::from(self.den)
    }

    /// 求倒数
    pub const fn invert(self) -> Self {
        Self {
            num: self.den,
            den: self.num,
        }
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

impl From<(i32, i32)> for Rational {
    fn from((num, den): (i32, i32)) -> Self {
        Self { num, den }
    }
}

impl From<[i32; 2]> for Rational {
    fn from([num, den]: [i32; 2]) -> Self {
        Self { num, den }
    }
}

impl From<Rational> for [i32; 2] {
    fn from(r: Rational) -> Self {
        [r.num, r.den]
    }
}

/// 换算时的舍入方式, 对应 `AVRounding`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
    /// 向零舍入
    Zero,
    /// 远离零舍入
    Inf,
    /// 向负无穷舍入
    Down,
    /// 向正无穷舍入
    Up,
    /// 四舍五入, 中点远离零
    NearInf,
}

/// 计算 `a * b / c`, 按给定方式舍入
///
/// `pass_minmax` 为真时 `i64::MIN` / `i64::MAX` 原样返回 (用于保留"无时间戳"标记).
/// `c` 为 0 时返回 `i64::MIN`.
pub fn rescale_rnd(a: i64, b: i64, c: i64, rnd: Rounding, pass_minmax: bool) -> i64 {
    if pass_minmax && (a == i64::MIN || a == i64::MAX) {
        return a;
    }
    if c <= 0 || b < 0 {
        return i64::MIN;
    }
    if a < 0 {
        let flipped = match rnd {
            Rounding::Down => Rounding::Up,
            Rounding::Up => Rounding::Down,
            other => other,
        };
        return rescale_rnd(-(a.max(-i64::MAX)), b, c, flipped, false).saturating_neg();
    }

    let (a, b, c) = (i128::from(a), i128::from(b), i128::from(c));
    let r = match rnd {
        Rounding::NearInf => c / 2,
        Rounding::Inf | Rounding::Up => c - 1,
        Rounding::Zero | Rounding::Down => 0,
    };
    let v = (a * b + r) / c;
    i64::try_from(v).unwrap_or(i64::MIN)
}

/// 将时间戳从时间基 `from` 换算到 `to`, 四舍五入
pub fn rescale_q(a: i64, from: Rational, to: Rational) -> i64 {
    rescale_q_rnd(a, from, to, Rounding::NearInf, false)
}

/// 带舍入方式的时间基换算
pub fn rescale_q_rnd(a: i64, from: Rational, to: Rational, rnd: Rounding, pass_minmax: bool) -> i64 {
    let b = i64::from(from.num) * i64::from(to.den);
    let c = i64::from(to.num) * i64::from(from.den);
    rescale_rnd(a, b, c, rnd, pass_minmax)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rational_display() {
        let r = Rational::new(30000, 1001);
        assert_eq!(format!("{r}"), "30000/1001");
    }

    #[test]
    fn test_rational_validity() {
        assert!(Rational::new(1, 25).is_valid());
        assert!(!Rational::new(0, 1).is_valid());
        assert!(!Rational::new(1, 0).is_valid());
        assert!(Rational::new(1, 0).to_f64().is_nan());
    }

    #[test]
    fn test_rescale_frame_index_to_90k() {
        let fps = Rational::new(1, 25);
        let tb = Rational::new(1, 90000);
        assert_eq!(rescale_q(1, fps, tb), 3600);
        assert_eq!(rescale_q(25, fps, tb), 90000);
    }

    #[test]
    fn test_rescale_rounding_modes() {
        // 10 * 1 / 3 = 3.33
        assert_eq!(rescale_rnd(10, 1, 3, Rounding::NearInf, false), 3);
        assert_eq!(rescale_rnd(10, 1, 3, Rounding::Up, false), 4);
        assert_eq!(rescale_rnd(10, 1, 3, Rounding::Down, false), 3);
        // 负数: -3.33
        assert_eq!(rescale_rnd(-10, 1, 3, Rounding::Down, false), -4);
        assert_eq!(rescale_rnd(-10, 1, 3, Rounding::Up, false), -3);
        assert_eq!(rescale_rnd(-10, 1, 3, Rounding::NearInf, false), -3);
    }

    #[test]
    fn test_rescale_pass_minmax() {
        let from = Rational::new(1, 1000);
        let to = Rational::new(1, 90000);
        assert_eq!(
            rescale_q_rnd(i64::MIN, from, to, Rounding::NearInf, true),
            i64::MIN
        );
        assert_eq!(rescale_q_rnd(2, from, to, Rounding::NearInf, true), 180);
    }

    #[test]
    fn test_rescale_zero_divisor() {
        assert_eq!(rescale_rnd(5, 1, 0, Rounding::NearInf, false), i64::MIN);
    }

    #[test]
    fn test_rational_json_pair() {
        let json = serde_json::to_string(&Rational::new(1, 25)).unwrap();
        assert_eq!(json, "[1,25]");
        let back: Rational = serde_json::from_str("[30000,1001]").unwrap();
        assert_eq!(back, Rational::new(30000, 1001));
    }
}
