use ndarray::ArrayView3;

/// A single captured frame: contiguous interleaved bytes in row-major order.
///
/// Frames are treated as immutable once captured; stabilization produces a
/// new frame rather than shifting pixels in place. Format conversion happens
/// at I/O boundaries only.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    index: usize,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8, index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
            index,
        }
    }

    /// Copy of `self` carrying a different frame index.
    ///
    /// Used when a cached frame stands in for a newer one.
    pub fn reindexed(&self, index: usize) -> Self {
        Self {
            index,
            ..self.clone()
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

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// `(width, height, channels)`.
    pub fn dimensions(&self) -> (u32, u32, u8) {
        (self.width, self.height, self.channels)
    }

    /// Bytes per row.
    pub fn stride(&self) -> usize {
        self.width as usize * self.channels as usize
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("Frame data length must match dimensions")
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.channels as usize,
        )
    }
}
