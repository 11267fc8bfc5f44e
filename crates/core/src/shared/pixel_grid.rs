use ndarray::ArrayView3;

/// Number of interleaved channels in every grid (RGB).
pub const CHANNELS: usize = 3;

/// A decoded image: contiguous RGB bytes in row-major order.
///
/// Owned by a single request. Format conversion happens at the decoding
/// boundary only; everything downstream reads pixels through this type.
#[derive(Clone, Debug, PartialEq)]
pub struct PixelGrid {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl PixelGrid {
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * CHANNELS,
            "data length must equal width * height * 3"
        );
        Self {
            data,
            width,
            height,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// RGB value at `(x, y)`. Callers must stay within bounds.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let offset = ((y as usize) * (self.width as usize) + x as usize) * CHANNELS;
        [
            self.data[offset],
            self.data[offset + 1],
            self.data[offset + 2],
        ]
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("PixelGrid data length must match dimensions")
    }

    fn shape(&self) -> (usize, usize, usize) {
        (self.height as usize, self.width as usize, CHANNELS)
    }
}
