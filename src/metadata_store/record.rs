//! Wire shape of gallery records:
//! `{ id, createdTime, fields: { image, layout, cropData, cropped_img } }`.
//! `cropData` holds the crop rectangle as a JSON-encoded string.

use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::photo::{CropRect, Layout, NewPhoto, Photo, PhotoUpdate};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layout: Option<String>,
    #[serde(rename = "cropData", skip_serializing_if = "Option::is_none")]
    pub crop_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cropped_img: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Record {
    pub id: String,
    #[serde(rename = "createdTime")]
    pub created_time: Option<String>,
    #[serde(default)]
    pub fields: RecordFields,
}

#[derive(Debug, Deserialize)]
pub struct RecordPage {
    pub records: Vec<Record>,
    pub offset: Option<String>,
}

/// Body of create and update requests.
#[derive(Debug, Serialize)]
pub struct WriteBody {
    pub fields: RecordFields,
}

impl From<&NewPhoto> for WriteBody {
    fn from(photo: &NewPhoto) -> Self {
        WriteBody {
            fields: RecordFields {
                image: Some(photo.image_url.clone()),
                layout: Some(photo.layout.as_str().to_string()),
                ..Default::default()
            },
        }
    }
}

impl TryFrom<&PhotoUpdate> for WriteBody {
    type Error = serde_json::Error;

    fn try_from(update: &PhotoUpdate) -> Result<Self, Self::Error> {
        let crop_data = update
            .crop_rect
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        Ok(WriteBody {
            fields: RecordFields {
                image: None,
                layout: update.layout.map(|l| l.as_str().to_string()),
                crop_data,
                cropped_img: update.cropped_image_url.clone(),
            },
        })
    }
}

impl Record {
    /// Lenient decode. Records without an image cannot be shown and yield
    /// `None`; a bad layout falls back to `1x1`; bad crop data is dropped.
    pub fn into_photo(self) -> Option<Photo> {
        let image_url = match self.fields.image {
            Some(url) if !url.trim().is_empty() => url,
            _ => {
                warn!("Skipping record {} without image", self.id);
                return None;
            }
        };

        let layout = self
            .fields
            .layout
            .as_deref()
            .map(Layout::parse_lenient)
            .unwrap_or_default();

        let crop_rect = self.fields.crop_data.as_deref().and_then(|raw| {
            serde_json::from_str::<CropRect>(raw)
                .map_err(|e| warn!("Ignoring unreadable cropData on {}: {}", self.id, e))
                .ok()
        });

        let created_time = self
            .created_time
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc));

        Some(Photo {
            id: self.id,
            image_url,
            cropped_image_url: self.fields.cropped_img.filter(|u| !u.trim().is_empty()),
            layout,
            crop_rect,
            created_time,
        })
    }
}
