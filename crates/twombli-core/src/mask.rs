//! Binary masks in row-major layout.

use crate::error::ShapeMismatch;
#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Binary mask with one byte per pixel; every value is `0` or `1`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BinaryMask {
    pub w: usize,
    pub h: usize,
    data: Vec<u8>,
}

impl BinaryMask {
    /// All-background mask.
    pub fn new(w: usize, h: usize) -> Self {
        Self {
            w,
            h,
            data: vec![0; w * h],
        }
    }

    pub fn from_fn(w: usize, h: usize, mut f: impl FnMut(usize, usize) -> bool) -> Self {
        let mut data = Vec::with_capacity(w * h);
        for y in 0..h {
            for x in 0..w {
                data.push(f(x, y) as u8);
            }
        }
        Self { w, h, data }
    }

    /// Build a mask from an 8-bit plane; any non-zero byte is foreground.
    ///
    /// Returns `None` when `bytes` does not hold exactly `w * h` values.
    pub fn from_bytes(w: usize, h: usize, bytes: &[u8]) -> Option<Self> {
        if bytes.len() != w * h {
            return None;
        }
        Some(Self {
            w,
            h,
            data: bytes.iter().map(|&b| (b != 0) as u8).collect(),
        })
    }

    #[inline]
    pub fn at(&self, x: usize, y: usize) -> bool {
        self.data[y * self.w + x] != 0
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: bool) {
        self.data[y * self.w + x] = value as u8;
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Number of foreground pixels.
    pub fn count(&self) -> usize {
        self.data.iter().filter(|&&v| v != 0).count()
    }

    pub fn check_shape(&self, w: usize, h: usize) -> Result<(), ShapeMismatch> {
        if self.w == w && self.h == h && self.data.len() == w * h {
            Ok(())
        } else {
            Err(ShapeMismatch {
                w,
                h,
                got_w: self.w,
                got_h: self.h,
            })
        }
    }

    /// Pixelwise OR of `other` into `self`.
    pub fn union_with(&mut self, other: &BinaryMask) -> Result<(), ShapeMismatch> {
        other.check_shape(self.w, self.h)?;

        #[cfg(feature = "rayon")]
        self.data
            .par_iter_mut()
            .zip(other.data.par_iter())
            .for_each(|(a, &b)| *a |= b);

        #[cfg(not(feature = "rayon"))]
        for (a, &b) in self.data.iter_mut().zip(other.data.iter()) {
            *a |= b;
        }

        Ok(())
    }

    /// Reset the one-pixel frame around the mask to background.
    pub fn clear_border(&mut self) {
        if self.w == 0 || self.h == 0 {
            return;
        }
        for x in 0..self.w {
            self.set(x, 0, false);
            self.set(x, self.h - 1, false);
        }
        for y in 0..self.h {
            self.set(0, y, false);
            self.set(self.w - 1, y, false);
        }
    }

    /// 8-bit rendering with foreground at `on` and background at 0.
    pub fn to_bytes(&self, on: u8) -> Vec<u8> {
        self.data.iter().map(|&v| if v != 0 { on } else { 0 }).collect()
    }
}
