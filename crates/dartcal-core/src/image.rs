/// Borrowed 8-bit grayscale buffer, row-major, `data.len() == width * height`.
#[derive(Clone, Copy, Debug)]
pub struct GrayImageView<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [u8],
}

/// Owned counterpart of [`GrayImageView`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrayImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ImageError {
    #[error("invalid grayscale buffer length (expected {expected} bytes, got {got})")]
    InvalidBufferLength { expected: usize, got: usize },
}

impl<'a> GrayImageView<'a> {
    /// Wrap a raw buffer, checking its length against the dimensions.
    ///
    /// Dimensions whose product overflows `usize` report `expected: usize::MAX`.
    pub fn new(width: usize, height: usize, data: &'a [u8]) -> Result<Self, ImageError> {
        let expected = width.checked_mul(height).unwrap_or(usize::MAX);
        if data.len() != expected {
            return Err(ImageError::InvalidBufferLength {
                expected,
                got: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    #[inline]
    pub fn contains(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && (x as usize) < self.width && (y as usize) < self.height
    }

    /// Pixel value with coordinates clamped to the image border.
    ///
    /// An empty view reads as black.
    #[inline]
    pub fn get_clamped(&self, x: i64, y: i64) -> u8 {
        if self.width == 0 || self.height == 0 {
            return 0;
        }
        let max_x = i64::try_from(self.width - 1).unwrap_or(i64::MAX);
        let max_y = i64::try_from(self.height - 1).unwrap_or(i64::MAX);
        let cx = x.clamp(0, max_x) as usize;
        let cy = y.clamp(0, max_y) as usize;
        self.data.get(cy * self.width + cx).copied().unwrap_or(0)
    }
}

impl GrayImage {
    /// Build an image by evaluating `f(x, y)` for every pixel.
    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> u8) -> Self {
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            data,
        }
    }

    pub fn view(&self) -> GrayImageView<'_> {
        GrayImageView {
            width: self.width,
            height: self.height,
            data: &self.data,
        }
    }
}
