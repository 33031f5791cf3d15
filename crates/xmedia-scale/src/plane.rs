//! YUV420P 平面视图、黑底填充与居中叠加.
//!
//! 平面按行存储, `stride` 为行字节数 (可大于有效宽度). 叠加按行并行复制.

use rayon::prelude::*;
use xmedia_core::{XMediaError, XMediaResult};

/// YUV 黑色的亮度值
pub const BLACK_LUMA: u8 = 0x00;
/// YUV 黑色的色度值
pub const BLACK_CHROMA: u8 = 0x80;

fn check_geometry(len: usize, stride: usize, width: usize, height: usize) -> XMediaResult<()> {
    if stride == 0 || stride < width {
        return Err(XMediaError::InvalidArgument(format!(
            "平面行字节数 {stride} 小于宽度 {width}"
        )));
    }
    let need = match height {
        0 => 0,
        h => (h - 1) * stride + width,
    };
    if len < need {
        return Err(XMediaError::InvalidArgument(format!(
            "平面缓冲区不足: {len} < {need}"
        )));
    }
    Ok(())
}

/// 只读平面
#[derive(Debug, Clone, Copy)]
pub struct PlaneRef<'a> {
    data: &'a [u8],
    stride: usize,
    width: usize,
    height: usize,
}

impl<'a> PlaneRef<'a> {
    /// 创建并校验缓冲区大小
    pub fn new(data: &'a [u8], stride: usize, width: usize, height: usize) -> XMediaResult<Self> {
        check_geometry(data.len(), stride, width, height)?;
        Ok(Self {
            data,
            stride,
            width,
            height,
        })
    }

    /// 第 `y` 行的有效像素
    pub fn row(&self, y: usize) -> &'a [u8] {
        let start = y * self.stride;
        &self.data[start..start + self.width]
    }

    /// 宽度
    pub fn width(&self) -> usize {
        self.width
    }

    /// 高度
    pub fn height(&self) -> usize {
        self.height
    }
}

/// 可写平面
#[derive(Debug)]
pub struct PlaneMut<'a> {
    data: &'a mut [u8],
    stride: usize,
    width: usize,
    height: usize,
}

impl<'a> PlaneMut<'a> {
    /// 创建并校验缓冲区大小
    pub fn new(data: &'a mut [u8], stride: usize, width: usize, height: usize) -> XMediaResult<Self> {
        check_geometry(data.len(), stride, width, height)?;
        Ok(Self {
            data,
            stride,
            width,
            height,
        })
    }

    /// 以单一值填充有效区域
    pub fn fill(&mut self, value: u8) {
        let width = self.width;
        self.data
            .par_chunks_mut(self.stride)
            .take(self.height)
            .for_each(|row| row[..width].fill(value));
    }

    /// 第 `y` 行的有效像素
    pub fn row(&self, y: usize) -> &[u8] {
        let start = y * self.stride;
        &self.data[start..start + self.width]
    }

    /// 宽度
    pub fn width(&self) -> usize {
        self.width
    }

    /// 高度
    pub fn height(&self) -> usize {
        self.height
    }
}

/// 只读 YUV420P 图像
#[derive(Debug, Clone, Copy)]
pub struct Yuv420Ref<'a> {
    /// 亮度
    pub y: PlaneRef<'a>,
    /// 色度 U
    pub u: PlaneRef<'a>,
    /// 色度 V
    pub v: PlaneRef<'a>,
}

/// 可写 YUV420P 图像
#[derive(Debug)]
pub struct Yuv420Mut<'a> {
    /// 亮度
    pub y: PlaneMut<'a>,
    /// 色度 U
    pub u: PlaneMut<'a>,
    /// 色度 V
    pub v: PlaneMut<'a>,
}

/// 连续存储 (无行填充) 的 YUV420P 缓冲区长度
pub const fn yuv420_size(width: usize, height: usize) -> usize {
    width * height + 2 * ((width / 2) * (height / 2))
}

impl<'a> Yuv420Ref<'a> {
    /// 按连续存储切分缓冲区
    pub fn packed(buf: &'a [u8], width: usize, height: usize) -> XMediaResult<Self> {
        let (cw, ch) = (width / 2, height / 2);
        let luma = width * height;
        let chroma = cw * ch;
        if buf.len() < yuv420_size(width, height) {
            return Err(XMediaError::InvalidArgument(format!(
                "YUV420P 缓冲区不足: {} < {}",
                buf.len(),
                yuv420_size(width, height)
            )));
        }
        let (y, rest) = buf.split_at(luma);
        let (u, v) = rest.split_at(chroma);
        Ok(Self {
            y: PlaneRef::new(y, width, width, height)?,
            u: PlaneRef::new(u, cw, cw, ch)?,
            v: PlaneRef::new(&v[..chroma], cw, cw, ch)?,
        })
    }
}

impl<'a> Yuv420Mut<'a> {
    /// 按连续存储切分缓冲区
    pub fn packed(buf: &'a mut [u8], width: usize, height: usize) -> XMediaResult<Self> {
        let (cw, ch) = (width / 2, height / 2);
        let luma = width * height;
        let chroma = cw * ch;
        if buf.len() < yuv420_size(width, height) {
            return Err(XMediaError::InvalidArgument(format!(
                "YUV420P 缓冲区不足: {} < {}",
                buf.len(),
                yuv420_size(width, height)
            )));
        }
        let (y, rest) = buf.split_at_mut(luma);
        let (u, v) = rest.split_at_mut(chroma);
        Ok(Self {
            y: PlaneMut::new(y, width, width, height)?,
            u: PlaneMut::new(u, cw, cw, ch)?,
            v: PlaneMut::new(&mut v[..chroma], cw, cw, ch)?,
        })
    }
}

/// 填充黑色: Y 为 0, U/V 为 0x80
pub fn fill_black_yuv420(image: &mut Yuv420Mut<'_>) {
    image.y.fill(BLACK_LUMA);
    image.u.fill(BLACK_CHROMA);
    image.v.fill(BLACK_CHROMA);
}

/// 把 `src` 平面复制到 `dst` 的 (`x`, `y`) 处
pub fn overlay_plane(
    dst: &mut PlaneMut<'_>,
    src: &PlaneRef<'_>,
    x: usize,
    y: usize,
) -> XMediaResult<()> {
    if x + src.width > dst.width || y + src.height > dst.height {
        return Err(XMediaError::InvalidArgument(format!(
            "叠加区域越界: {}x{}@({x},{y}) 超出 {}x{}",
            src.width, src.height, dst.width, dst.height
        )));
    }
    let width = src.width;
    dst.data
        .par_chunks_mut(dst.stride)
        .skip(y)
        .take(src.height)
        .zip(src.data.par_chunks(src.stride))
        .for_each(|(drow, srow)| drow[x..x + width].copy_from_slice(&srow[..width]));
    Ok(())
}

/// 把 `src` 居中叠加到 `dst`; 色度平面的偏移取亮度偏移的一半
///
/// 返回亮度平面上的偏移.
pub fn overlay_yuv420_centered(
    dst: &mut Yuv420Mut<'_>,
    src: &Yuv420Ref<'_>,
) -> XMediaResult<(usize, usize)> {
    let (dw, dh) = (dst.y.width, dst.y.height);
    let (sw, sh) = (src.y.width, src.y.height);
    if sw > dw || sh > dh {
        return Err(XMediaError::InvalidArgument(format!(
            "叠加源 {sw}x{sh} 大于目标 {dw}x{dh}"
        )));
    }
    let (x, y) = ((dw - sw) / 2, (dh - sh) / 2);
    overlay_plane(&mut dst.y, &src.y, x, y)?;
    overlay_plane(&mut dst.u, &src.u, x / 2, y / 2)?;
    overlay_plane(&mut dst.v, &src.v, x / 2, y / 2)?;
    Ok((x, y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Letterbox;

    #[test]
    fn test_fill_black_respects_stride() {
        // 4x2 亮度, 行字节数 6, 行尾填充保持不变
        let mut buf = vec![0xAAu8; 12];
        let mut plane = PlaneMut::new(&mut buf, 6, 4, 2).unwrap();
        plane.fill(0x10);
        assert_eq!(&buf[..6], &[0x10, 0x10, 0x10, 0x10, 0xAA, 0xAA]);
        assert_eq!(&buf[6..], &[0x10, 0x10, 0x10, 0x10, 0xAA, 0xAA]);
    }

    #[test]
    fn test_black_frame_values() {
        let mut buf = vec![0x55u8; yuv420_size(8, 4)];
        let mut img = Yuv420Mut::packed(&mut buf, 8, 4).unwrap();
        fill_black_yuv420(&mut img);
        assert!(buf[..32].iter().all(|&v| v == BLACK_LUMA));
        assert!(buf[32..].iter().all(|&v| v == BLACK_CHROMA));
    }

    #[test]
    fn test_overlay_out_of_bounds() {
        let src = vec![1u8; 4];
        let mut dst = vec![0u8; 9];
        let src = PlaneRef::new(&src, 2, 2, 2).unwrap();
        let mut dst = PlaneMut::new(&mut dst, 3, 3, 3).unwrap();
        assert!(overlay_plane(&mut dst, &src, 2, 0).is_err());
        overlay_plane(&mut dst, &src, 1, 1).unwrap();
        assert_eq!(dst.row(0), &[0, 0, 0]);
        assert_eq!(dst.row(1), &[0, 1, 1]);
        assert_eq!(dst.row(2), &[0, 1, 1]);
    }

    #[test]
    fn test_centered_pillarbox() {
        // 640x480 -> 1280x720, 适配为 960x720, 左右各 160 像素黑边
        let lb = Letterbox::fit(640, 480, 1280, 720).unwrap();
        let (fw, fh) = (lb.width as usize, lb.height as usize);
        let src_buf = vec![0xC8u8; yuv420_size(fw, fh)];
        let src = Yuv420Ref::packed(&src_buf, fw, fh).unwrap();

        let mut dst_buf = vec![0u8; yuv420_size(1280, 720)];
        let mut dst = Yuv420Mut::packed(&mut dst_buf, 1280, 720).unwrap();
        fill_black_yuv420(&mut dst);
        let (x, y) = overlay_yuv420_centered(&mut dst, &src).unwrap();
        assert_eq!((x, y), (lb.x as usize, lb.y as usize));

        let row = dst.y.row(360);
        assert!(row[..160].iter().all(|&v| v == BLACK_LUMA));
        assert!(row[160..1120].iter().all(|&v| v == 0xC8));
        assert!(row[1120..].iter().all(|&v| v == BLACK_LUMA));

        let chroma = dst.u.row(100);
        assert!(chroma[..80].iter().all(|&v| v == BLACK_CHROMA));
        assert!(chroma[80..560].iter().all(|&v| v == 0xC8));
        assert!(chroma[560..].iter().all(|&v| v == BLACK_CHROMA));
    }
}
