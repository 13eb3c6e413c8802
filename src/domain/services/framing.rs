use ndarray::{concatenate, s, Array2, ArrayView2, ArrayView3, Axis};

use crate::domain::DomainError;

/// Cuts audio into half-overlapping fixed-length segments and stitches
/// per-segment model output back into a single roll.
#[derive(Debug, Clone, Copy)]
pub struct SegmentFramer {
    segment_samples: usize,
}

impl SegmentFramer {
    pub fn new(segment_samples: usize) -> Result<Self, DomainError> {
        if segment_samples == 0 || segment_samples % 2 != 0 {
            return Err(DomainError::invalid_input(format!(
                "segment length must be a positive even number of samples, got {}",
                segment_samples
            )));
        }
        Ok(Self { segment_samples })
    }

    pub fn segment_samples(&self) -> usize {
        self.segment_samples
    }

    pub fn hop(&self) -> usize {
        self.segment_samples / 2
    }

    /// Length after zero padding to a whole number of segments (at least one).
    pub fn padded_len(&self, len: usize) -> usize {
        len.div_ceil(self.segment_samples).max(1) * self.segment_samples
    }

    pub fn segment_count(&self, len: usize) -> usize {
        2 * (self.padded_len(len) / self.segment_samples) - 1
    }

    pub fn enframe(&self, audio: &[f32]) -> Vec<Vec<f32>> {
        let mut padded = audio.to_vec();
        padded.resize(self.padded_len(audio.len()), 0.0);

        let mut segments = Vec::with_capacity(self.segment_count(audio.len()));
        let mut pointer = 0;
        while pointer + self.segment_samples <= padded.len() {
            segments.push(padded[pointer..pointer + self.segment_samples].to_vec());
            pointer += self.hop();
        }
        segments
    }

    /// Stitches `[segments, frames, classes]` output into `[frames, classes]`.
    ///
    /// Each segment's trailing frame is dropped, then the first 75% of the
    /// first segment, the middle 50% of inner segments and the last 75% of
    /// the final segment are kept. A single segment is returned unchanged.
    pub fn deframe(&self, segments: ArrayView3<f32>) -> Result<Array2<f32>, DomainError> {
        let (count, frames_plus_one, classes) = segments.dim();

        match count {
            0 => return Ok(Array2::zeros((0, classes))),
            1 => return Ok(segments.index_axis(Axis(0), 0).to_owned()),
            _ => {}
        }

        if frames_plus_one < 2 {
            return Err(DomainError::inference(format!(
                "segment output has too few frames: {}",
                frames_plus_one
            )));
        }

        let frames = frames_plus_one - 1;
        let quarter = frames / 4;
        let three_quarters = frames * 3 / 4;

        let mut parts: Vec<ArrayView2<f32>> = Vec::with_capacity(count);
        parts.push(segments.slice(s![0, 0..three_quarters, ..]));
        for i in 1..count - 1 {
            parts.push(segments.slice(s![i, quarter..three_quarters, ..]));
        }
        parts.push(segments.slice(s![count - 1, quarter..frames, ..]));

        concatenate(Axis(0), &parts)
            .map_err(|e| DomainError::inference(format!("Failed to stitch segments: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn test_rejects_odd_segment() {
        assert!(SegmentFramer::new(7).is_err());
        assert!(SegmentFramer::new(0).is_err());
    }

    #[test]
    fn test_enframe_counts_and_padding() {
        let framer = SegmentFramer::new(8).unwrap();

        let segments = framer.enframe(&[1.0; 20]);
        // 20 samples pad to 24 -> 3 segments of 8 with hop 4 -> 5 windows
        assert_eq!(segments.len(), 5);
        assert_eq!(framer.segment_count(20), 5);
        assert!(segments.iter().all(|s| s.len() == 8));
        assert_eq!(segments[1][0], 1.0);
        assert_eq!(segments[4][7], 0.0);
    }

    #[test]
    fn test_enframe_short_audio_is_one_segment() {
        let framer = SegmentFramer::new(8).unwrap();
        let segments = framer.enframe(&[0.5; 3]);
        assert_eq!(segments.len(), 1);
        assert_eq!(&segments[0][..4], &[0.5, 0.5, 0.5, 0.0]);

        assert_eq!(framer.enframe(&[]).len(), 1);
    }

    #[test]
    fn test_deframe_keeps_centre_of_each_segment() {
        let framer = SegmentFramer::new(8).unwrap();
        // 3 segments, 8 + 1 frames, 2 classes; each filled with its index
        let mut output = Array3::<f32>::zeros((3, 9, 2));
        for i in 0..3 {
            output.slice_mut(s![i, .., ..]).fill(i as f32);
        }

        let stitched = framer.deframe(output.view()).unwrap();
        // 6 + 4 + 6 frames = two segments' worth
        assert_eq!(stitched.dim(), (16, 2));
        assert!(stitched.slice(s![0..6, ..]).iter().all(|&v| v == 0.0));
        assert!(stitched.slice(s![6..10, ..]).iter().all(|&v| v == 1.0));
        assert!(stitched.slice(s![10..16, ..]).iter().all(|&v| v == 2.0));
    }

    #[test]
    fn test_deframe_single_segment_unchanged() {
        let framer = SegmentFramer::new(8).unwrap();
        let output = Array3::<f32>::from_elem((1, 9, 3), 0.25);
        let stitched = framer.deframe(output.view()).unwrap();
        assert_eq!(stitched.dim(), (9, 3));
    }
}
