//! YUV 4:2:0 → BGRA conversion.
//!
//! A [`PixelConverter`] is built for one exact resolution: it
//! precomputes the chroma column index and the per-value colour
//! contributions (BT.601, limited range). [`ConverterCache`] keeps the
//! current converter and rebuilds it only when the resolution changes.

use tracing::debug;

use crate::video::codec::YuvFrame;
use crate::video::types::{DecodedFrame, PixelFormat};

// ── PixelConverter ───────────────────────────────────────────────

pub struct PixelConverter {
    width: u32,
    height: u32,
    /// Chroma sample index for each output column.
    chroma_col: Vec<usize>,
    /// 298 * (Y - 16) for every Y value.
    luma: [i32; 256],
    /// Red, green and blue chroma contributions per U / V value.
    v_red: [i32; 256],
    uv_green_u: [i32; 256],
    uv_green_v: [i32; 256],
    u_blue: [i32; 256],
}

impl PixelConverter {
    pub fn new(width: u32, height: u32) -> Self {
        let mut luma = [0i32; 256];
        let mut v_red = [0i32; 256];
        let mut uv_green_u = [0i32; 256];
        let mut uv_green_v = [0i32; 256];
        let mut u_blue = [0i32; 256];
        for i in 0..256 {
            let c = i as i32 - 16;
            let d = i as i32 - 128;
            luma[i] = 298 * c;
            v_red[i] = 409 * d;
            uv_green_u[i] = -100 * d;
            uv_green_v[i] = -208 * d;
            u_blue[i] = 516 * d;
        }

        Self {
            width,
            height,
            chroma_col: (0..width as usize).map(|x| x / 2).collect(),
            luma,
            v_red,
            uv_green_u,
            uv_green_v,
            u_blue,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Convert `frame` into a freshly allocated BGRA frame.
    ///
    /// Returns `None` if the planes are too small for the declared size.
    pub fn convert(&self, frame: &YuvFrame<'_>) -> Option<DecodedFrame> {
        if frame.width != self.width || frame.height != self.height {
            return None;
        }
        let w = self.width as usize;
        let h = self.height as usize;
        let cw = w.div_ceil(2);
        let ch = h.div_ceil(2);
        if w == 0
            || h == 0
            || frame.y_stride < w
            || frame.uv_stride < cw
            || frame.y.len() < frame.y_stride * (h - 1) + w
            || frame.u.len() < frame.uv_stride * (ch - 1) + cw
            || frame.v.len() < frame.uv_stride * (ch - 1) + cw
        {
            return None;
        }

        let bpp = PixelFormat::Bgra8.bytes_per_pixel();
        let mut data = vec![0u8; w * h * bpp];

        for (row, out) in data.chunks_exact_mut(w * bpp).enumerate() {
            let y_row = &frame.y[row * frame.y_stride..];
            let u_row = &frame.u[(row / 2) * frame.uv_stride..];
            let v_row = &frame.v[(row / 2) * frame.uv_stride..];

            for (x, px) in out.chunks_exact_mut(bpp).enumerate() {
                let c = self.luma[y_row[x] as usize];
                let cx = self.chroma_col[x];
                let u = u_row[cx] as usize;
                let v = v_row[cx] as usize;

                let r = (c + self.v_red[v] + 128) >> 8;
                let g = (c + self.uv_green_u[u] + self.uv_green_v[v] + 128) >> 8;
                let b = (c + self.u_blue[u] + 128) >> 8;

                px[0] = clamp(b);
                px[1] = clamp(g);
                px[2] = clamp(r);
                px[3] = 0xFF;
            }
        }

        Some(DecodedFrame {
            width: self.width,
            height: self.height,
            format: PixelFormat::Bgra8,
            data,
        })
    }
}

#[inline]
fn clamp(v: i32) -> u8 {
    v.clamp(0, 255) as u8
}

// ── ConverterCache ───────────────────────────────────────────────

/// Holds the converter for the current resolution.
#[derive(Default)]
pub struct ConverterCache {
    current: Option<PixelConverter>,
    rebuilds: u64,
}

impl ConverterCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Converter for `width`×`height`, rebuilt only on a size change.
    pub fn get(&mut self, width: u32, height: u32) -> &PixelConverter {
        let stale = self
            .current
            .as_ref()
            .is_none_or(|c| c.dimensions() != (width, height));
        if stale {
            debug!(width, height, "building pixel converter");
            self.rebuilds += 1;
            self.current = Some(PixelConverter::new(width, height));
        }
        self.current
            .get_or_insert_with(|| PixelConverter::new(width, height))
    }

    /// How many converters have been built so far.
    pub fn rebuilds(&self) -> u64 {
        self.rebuilds
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn planes(w: usize, h: usize, y: u8, u: u8, v: u8) -> (Vec<u8>, Vec<u8>, Vec<u8>) {
        let cw = w.div_ceil(2);
        let ch = h.div_ceil(2);
        (vec![y; w * h], vec![u; cw * ch], vec![v; cw * ch])
    }

    fn frame<'a>(w: u32, h: u32, p: &'a (Vec<u8>, Vec<u8>, Vec<u8>)) -> YuvFrame<'a> {
        YuvFrame {
            width: w,
            height: h,
            y: &p.0,
            u: &p.1,
            v: &p.2,
            y_stride: w as usize,
            uv_stride: (w as usize).div_ceil(2),
        }
    }

    #[test]
    fn black_and_white() {
        let conv = PixelConverter::new(4, 2);

        let black = planes(4, 2, 16, 128, 128);
        let out = conv.convert(&frame(4, 2, &black)).unwrap();
        assert_eq!(out.data.len(), 4 * 2 * 4);
        assert_eq!(out.pixel(0, 0), &[0, 0, 0, 0xFF]);

        let white = planes(4, 2, 235, 128, 128);
        let out = conv.convert(&frame(4, 2, &white)).unwrap();
        assert_eq!(out.pixel(3, 1), &[255, 255, 255, 0xFF]);
    }

    #[test]
    fn pure_red_lands_in_third_byte() {
        // BT.601 limited-range red.
        let red = planes(2, 2, 81, 90, 240);
        let out = PixelConverter::new(2, 2).convert(&frame(2, 2, &red)).unwrap();
        let px = out.pixel(1, 1);
        assert!(px[2] > 240, "red {px:?}");
        assert!(px[0] < 16 && px[1] < 16, "blue/green {px:?}");
    }

    #[test]
    fn odd_dimensions_are_supported() {
        let p = planes(3, 3, 128, 128, 128);
        let out = PixelConverter::new(3, 3).convert(&frame(3, 3, &p)).unwrap();
        assert_eq!(out.data.len(), 3 * 3 * 4);
    }

    #[test]
    fn short_planes_are_rejected() {
        let mut p = planes(4, 4, 128, 128, 128);
        p.0.truncate(10);
        assert!(PixelConverter::new(4, 4).convert(&frame(4, 4, &p)).is_none());
    }

    #[test]
    fn size_mismatch_is_rejected() {
        let p = planes(4, 4, 128, 128, 128);
        assert!(PixelConverter::new(8, 4).convert(&frame(4, 4, &p)).is_none());
    }

    #[test]
    fn cache_rebuilds_only_on_resolution_change() {
        let mut cache = ConverterCache::new();
        cache.get(1080, 2400);
        cache.get(1080, 2400);
        cache.get(1080, 2400);
        assert_eq!(cache.rebuilds(), 1);

        cache.get(2400, 1080);
        assert_eq!(cache.rebuilds(), 2);
        assert_eq!(cache.get(2400, 1080).dimensions(), (2400, 1080));
        assert_eq!(cache.rebuilds(), 2);
    }
}
