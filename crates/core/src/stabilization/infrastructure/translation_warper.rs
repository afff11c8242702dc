use crate::shared::frame::Frame;
use crate::stabilization::domain::frame_warper::{EdgeFill, FrameWarper};
use crate::stabilization::domain::transform::Translation;

/// CPU warper for whole-pixel translations.
///
/// Sub-pixel offsets are rounded (half away from zero); each output row is
/// assembled from at most one contiguous slice of the source row plus the
/// edge fill, so the cost is a straight memory copy.
pub struct TranslationWarper {
    edge_fill: EdgeFill,
}

impl TranslationWarper {
    pub fn new(edge_fill: EdgeFill) -> Self {
        Self { edge_fill }
    }

    pub fn edge_fill(&self) -> EdgeFill {
        self.edge_fill
    }
}

impl Default for TranslationWarper {
    fn default() -> Self {
        Self::new(EdgeFill::default())
    }
}

impl FrameWarper for TranslationWarper {
    fn warp(
        &self,
        frame: &Frame,
        translation: &Translation,
    ) -> Result<Frame, Box<dyn std::error::Error>> {
        let (dx, dy) = translation.rounded();
        if dx == 0 && dy == 0 {
            return Ok(frame.clone());
        }

        let w = frame.width() as i64;
        let h = frame.height() as i64;
        // Anything past a full frame width/height exposes only fill.
        let dx = dx.clamp(-w, w);
        let dy = dy.clamp(-h, h);
        let ch = frame.channels() as usize;
        let stride = frame.stride();
        let src = frame.data();
        let mut out = vec![0u8; src.len()];

        // Output columns [x0, x1) read source columns [x0 - dx, x1 - dx).
        let x0 = dx.clamp(0, w) as usize;
        let x1 = (w + dx).clamp(0, w) as usize;

        for y in 0..h {
            let sy = y - dy;
            let sy = match self.edge_fill {
                EdgeFill::Black if !(0..h).contains(&sy) => continue,
                EdgeFill::Black => sy,
                EdgeFill::Replicate => sy.clamp(0, h - 1),
            } as usize;

            let src_row = &src[sy * stride..(sy + 1) * stride];
            let dst_row = &mut out[y as usize * stride..(y as usize + 1) * stride];

            if x0 < x1 {
                let sx0 = (x0 as i64 - dx) as usize;
                dst_row[x0 * ch..x1 * ch].copy_from_slice(&src_row[sx0 * ch..(sx0 + x1 - x0) * ch]);
            }

            if self.edge_fill == EdgeFill::Replicate {
                let first = &src_row[..ch];
                let last = &src_row[stride - ch..];
                let left_edge = if x1 == 0 { last } else { first };
                let right_edge = if x0 == w as usize { first } else { last };
                for px in dst_row[..x0 * ch].chunks_exact_mut(ch) {
                    px.copy_from_slice(left_edge);
                }
                for px in dst_row[x1.max(x0) * ch..].chunks_exact_mut(ch) {
                    px.copy_from_slice(right_edge);
                }
            }
        }

        Ok(Frame::new(
            out,
            frame.width(),
            frame.height(),
            frame.channels(),
            frame.index(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    /// 1-channel frame whose pixel value encodes its position: 10*row + col.
    fn ramp(width: u32, height: u32) -> Frame {
        let data = (0..height)
            .flat_map(|y| (0..width).map(move |x| (10 * y + x) as u8))
            .collect();
        Frame::new(data, width, height, 1, 3)
    }

    fn px(frame: &Frame, x: usize, y: usize) -> u8 {
        frame.data()[y * frame.width() as usize + x]
    }

    #[test]
    fn test_identity_returns_copy() {
        let frame = ramp(4, 3);
        let out = TranslationWarper::default()
            .warp(&frame, &Translation::IDENTITY)
            .unwrap();
        assert_eq!(out, frame);
    }

    #[test]
    fn test_shift_right_down_black_fill() {
        let frame = ramp(4, 3);
        let out = TranslationWarper::new(EdgeFill::Black)
            .warp(&frame, &Translation::new(1.0, 1.0))
            .unwrap();

        // Row 0 and column 0 exposed
        for x in 0..4 {
            assert_eq!(px(&out, x, 0), 0);
        }
        assert_eq!(px(&out, 0, 1), 0);
        // Output (1,1) samples input (0,0); (3,2) samples (2,1)
        assert_eq!(px(&out, 1, 1), 0);
        assert_eq!(px(&out, 2, 1), 1);
        assert_eq!(px(&out, 3, 2), 12);
    }

    #[test]
    fn test_shift_left_up_black_fill() {
        let frame = ramp(4, 3);
        let out = TranslationWarper::new(EdgeFill::Black)
            .warp(&frame, &Translation::new(-2.0, -1.0))
            .unwrap();

        assert_eq!(px(&out, 0, 0), 12);
        assert_eq!(px(&out, 1, 1), 23);
        assert_eq!(px(&out, 2, 0), 0);
        assert_eq!(px(&out, 0, 2), 0);
    }

    #[test]
    fn test_replicate_fill_repeats_edges() {
        let frame = ramp(4, 3);
        let out = TranslationWarper::new(EdgeFill::Replicate)
            .warp(&frame, &Translation::new(2.0, -1.0))
            .unwrap();

        // Row 0 reads source row 1; columns 0..2 repeat source column 0
        assert_eq!(px(&out, 0, 0), 10);
        assert_eq!(px(&out, 1, 0), 10);
        assert_eq!(px(&out, 2, 0), 10);
        assert_eq!(px(&out, 3, 0), 11);
        // Bottom row exposed: repeats source row 2
        assert_eq!(px(&out, 3, 2), 21);
    }

    #[test]
    fn test_shift_beyond_frame_black_is_blank() {
        let frame = ramp(4, 3);
        let out = TranslationWarper::new(EdgeFill::Black)
            .warp(&frame, &Translation::new(10.0, 0.0))
            .unwrap();
        assert!(out.data().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_shift_beyond_frame_replicate_uses_nearest_column() {
        let frame = ramp(4, 3);
        let out = TranslationWarper::new(EdgeFill::Replicate)
            .warp(&frame, &Translation::new(-10.0, 0.0))
            .unwrap();
        for x in 0..4 {
            assert_eq!(px(&out, x, 1), 13);
        }
    }

    #[test]
    fn test_huge_shift_replicate_uses_nearest_row() {
        let frame = ramp(4, 3);
        let out = TranslationWarper::new(EdgeFill::Replicate)
            .warp(&frame, &Translation::new(0.0, -1e20))
            .unwrap();
        for x in 0..4 {
            assert_eq!(px(&out, x, 0), 20 + x as u8);
            assert_eq!(px(&out, x, 2), 20 + x as u8);
        }
    }

    #[test]
    fn test_multichannel_pixels_move_together() {
        let data = vec![
            1, 2, 3, 4, 5, 6, //
            7, 8, 9, 10, 11, 12,
        ];
        let frame = Frame::new(data, 2, 2, 3, 0);
        let out = TranslationWarper::new(EdgeFill::Black)
            .warp(&frame, &Translation::new(1.0, 0.0))
            .unwrap();
        assert_eq!(out.data(), &[0, 0, 0, 1, 2, 3, 0, 0, 0, 7, 8, 9]);
    }

    #[rstest]
    #[case(EdgeFill::Black, 0.0, 0.0)]
    #[case(EdgeFill::Black, 37.6, -12.2)]
    #[case(EdgeFill::Replicate, -400.0, 300.0)]
    #[case(EdgeFill::Replicate, 0.49, 0.0)]
    #[case(EdgeFill::Black, 0.0, -1e20)]
    #[case(EdgeFill::Replicate, 1e20, 0.0)]
    #[case(EdgeFill::Black, f64::INFINITY, f64::NEG_INFINITY)]
    fn test_dimensions_preserved(#[case] fill: EdgeFill, #[case] tx: f64, #[case] ty: f64) {
        let frame = Frame::new(vec![9u8; 64 * 48 * 3], 64, 48, 3, 17);
        let out = TranslationWarper::new(fill)
            .warp(&frame, &Translation::new(tx, ty))
            .unwrap();
        assert_eq!(out.dimensions(), frame.dimensions());
        assert_eq!(out.index(), 17);
        assert_eq!(out.data().len(), frame.data().len());
    }
}
