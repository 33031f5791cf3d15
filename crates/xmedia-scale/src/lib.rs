//! # xmedia-scale
//!
//! 等比缩放 (letterbox) 的几何计算, 以及 YUV420P 平面上的黑底填充与居中叠加.
//!
//! 本 crate 只处理内存中的平面数据, 缩放本身由运行时完成:
//! 先按 [`Letterbox::fit`] 求出适配尺寸, 把源帧缩放到该尺寸,
//! 再用 [`overlay_yuv420_centered`] 贴到黑底目标帧中央.

pub mod letterbox;
pub mod plane;

pub use letterbox::Letterbox;
pub use plane::{
    PlaneMut, PlaneRef, Yuv420Mut, Yuv420Ref, fill_black_yuv420, overlay_plane,
    overlay_yuv420_centered,
};
