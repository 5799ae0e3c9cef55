//! Remote key layout for one video/thumbnail pair.
//!
//! Both objects of a session share one identifier: `clips/{id}.mp4` and
//! `screenshots/{id}.png`. Other clients read these keys, so the layout is
//! fixed.

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use super::types::UploadKind;

pub const VIDEO_PREFIX: &str = "clips";
pub const VIDEO_EXTENSION: &str = "mp4";
pub const THUMBNAIL_PREFIX: &str = "screenshots";
pub const THUMBNAIL_EXTENSION: &str = "png";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RemotePaths {
    pub id: Uuid,
    pub video: String,
    pub thumbnail: String,
}

impl RemotePaths {
    pub fn generate() -> Self {
        Self::for_id(Uuid::new_v4())
    }

    pub fn for_id(id: Uuid) -> Self {
        Self {
            id,
            video: format!("{}/{}", VIDEO_PREFIX, Self::name(id, UploadKind::Video)),
            thumbnail: format!("{}/{}", THUMBNAIL_PREFIX, Self::name(id, UploadKind::Thumbnail)),
        }
    }

    pub fn path(&self, kind: UploadKind) -> &str {
        match kind {
            UploadKind::Video => &self.video,
            UploadKind::Thumbnail => &self.thumbnail,
        }
    }

    /// Object name without the prefix, as stored in the clip record.
    pub fn file_name(&self, kind: UploadKind) -> String {
        Self::name(self.id, kind)
    }

    fn name(id: Uuid, kind: UploadKind) -> String {
        match kind {
            UploadKind::Video => format!("{}.{}", id, VIDEO_EXTENSION),
            UploadKind::Thumbnail => format!("{}.{}", id, THUMBNAIL_EXTENSION),
        }
    }
}
