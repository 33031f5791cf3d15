//! 等比适配几何.

use xmedia_core::{XMediaError, XMediaResult};

/// 源图像在目标画布中的等比适配结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Letterbox {
    /// 画布宽度
    pub canvas_width: u32,
    /// 画布高度
    pub canvas_height: u32,
    /// 适配后宽度
    pub width: u32,
    /// 适配后高度
    pub height: u32,
    /// 水平偏移
    pub x: u32,
    /// 垂直偏移
    pub y: u32,
}

impl Letterbox {
    /// 计算源尺寸在目标画布内保持宽高比的最大适配尺寸与居中偏移
    ///
    /// 比较 `dst_w/dst_h` 与 `src_w/src_h` 时使用整数交叉相乘, 避免浮点误差:
    /// 画布相对更窄 (或相等) 时宽度铺满, 否则高度铺满.
    pub fn fit(src_w: u32, src_h: u32, dst_w: u32, dst_h: u32) -> XMediaResult<Self> {
        if src_w == 0 || src_h == 0 || dst_w == 0 || dst_h == 0 {
            return Err(XMediaError::InvalidArgument(format!(
                "等比缩放尺寸无效: {src_w}x{src_h} -> {dst_w}x{dst_h}"
            )));
        }
        let (sw, sh, dw, dh) = (
            u64::from(src_w),
            u64::from(src_h),
            u64::from(dst_w),
            u64::from(dst_h),
        );
        let (fw, fh) = if dw * sh <= dh * sw {
            (dw, sh * dw / sw)
        } else {
            (sw * dh / sh, dh)
        };
        // fw <= dw, fh <= dh, 均可放回 u32
        let (width, height) = (fw.max(1) as u32, fh.max(1) as u32);
        Ok(Self {
            canvas_width: dst_w,
            canvas_height: dst_h,
            width,
            height,
            x: (dst_w - width) / 2,
            y: (dst_h - height) / 2,
        })
    }

    /// 是否铺满整个画布 (无需黑边)
    pub fn is_full(&self) -> bool {
        self.width == self.canvas_width && self.height == self.canvas_height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pillarbox_4_3_into_16_9() {
        let lb = Letterbox::fit(640, 480, 1280, 720).unwrap();
        assert_eq!((lb.width, lb.height), (960, 720));
        assert_eq!((lb.x, lb.y), (160, 0));
        assert!(!lb.is_full());
    }

    #[test]
    fn test_letterbox_16_9_into_4_3() {
        let lb = Letterbox::fit(1920, 1080, 640, 480).unwrap();
        assert_eq!((lb.width, lb.height), (640, 360));
        assert_eq!((lb.x, lb.y), (0, 60));
    }

    #[test]
    fn test_same_ratio_is_full() {
        let lb = Letterbox::fit(1280, 720, 640, 360).unwrap();
        assert!(lb.is_full());
        assert_eq!((lb.x, lb.y), (0, 0));
    }

    #[test]
    fn test_zero_size_rejected() {
        assert!(Letterbox::fit(0, 480, 1280, 720).is_err());
        assert!(Letterbox::fit(640, 480, 1280, 0).is_err());
    }
}
