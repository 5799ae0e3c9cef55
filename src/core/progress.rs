use super::types::UploadKind;

/// Combines the video and thumbnail progress streams into one fraction.
///
/// Each stream keeps the largest fraction seen so far, so duplicate or
/// out-of-order events never move the combined value backwards. A stream that
/// has not reported yet counts as 0. The two streams are weighted equally
/// regardless of payload size.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProgressAggregator {
    video: f64,
    thumbnail: f64,
}

impl ProgressAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a fraction for one stream and returns the combined value.
    pub fn observe(&mut self, kind: UploadKind, fraction: f64) -> f64 {
        if fraction.is_nan() {
            return self.combined();
        }

        let fraction = fraction.clamp(0.0, 1.0);
        let slot = match kind {
            UploadKind::Video => &mut self.video,
            UploadKind::Thumbnail => &mut self.thumbnail,
        };
        if fraction > *slot {
            *slot = fraction;
        }

        self.combined()
    }

    pub fn latest(&self, kind: UploadKind) -> f64 {
        match kind {
            UploadKind::Video => self.video,
            UploadKind::Thumbnail => self.thumbnail,
        }
    }

    pub fn combined(&self) -> f64 {
        combine(self.video, self.thumbnail)
    }

    pub fn percentage(&self) -> f64 {
        self.combined() * 100.0
    }
}

/// Unweighted average of the two per-stream fractions.
pub fn combine(video: f64, thumbnail: f64) -> f64 {
    (video + thumbnail) / 2.0
}
