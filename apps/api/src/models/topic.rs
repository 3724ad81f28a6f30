use std::io::Cursor;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use image::{GenericImageView, ImageReader};
use serde::{Deserialize, Serialize};

use crate::errors::LayoutError;

/// A topic exactly as the client sends it.
///
/// Text: `{ "media": "text", "topic": "Stacks", "content": ["LIFO order"] }`
/// Image: `{ "media": "image", "data": "<base64>" }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicPayload {
    pub media: String,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub content: Vec<String>,
    /// Base64-encoded image bytes (PNG or JPEG).
    #[serde(default)]
    pub data: Option<String>,
}

/// One schedulable content block.
#[derive(Debug, Clone, PartialEq)]
pub enum Topic {
    Text(TextTopic),
    Image(ImageTopic),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextTopic {
    pub title: String,
    pub bullets: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageTopic {
    pub data: Bytes,
    pub pixel_width: u32,
    pub pixel_height: u32,
}

impl ImageTopic {
    /// Decodes the whole image once to reject corrupt or truncated payloads
    /// and to read its intrinsic size. `index` names the topic in errors.
    pub fn from_bytes(data: Bytes, index: usize) -> Result<Self, LayoutError> {
        let decode_error = |reason: String| LayoutError::ImageDecode { index, reason };
        let decoded = ImageReader::new(Cursor::new(data.as_ref()))
            .with_guessed_format()
            .map_err(|e| decode_error(e.to_string()))?
            .decode()
            .map_err(|e| decode_error(e.to_string()))?;
        let (pixel_width, pixel_height) = GenericImageView::dimensions(&decoded);
        if pixel_width == 0 || pixel_height == 0 {
            return Err(decode_error(format!(
                "image has no pixels ({pixel_width}x{pixel_height})"
            )));
        }
        Ok(ImageTopic {
            data,
            pixel_width,
            pixel_height,
        })
    }
}

impl TopicPayload {
    /// Validates the media discriminant and decodes images.
    pub fn into_topic(self, index: usize) -> Result<Topic, LayoutError> {
        match self.media.as_str() {
            "text" => Ok(Topic::Text(TextTopic {
                title: self.topic,
                bullets: self.content,
            })),
            "image" => {
                let encoded = self.data.ok_or_else(|| LayoutError::ImageDecode {
                    index,
                    reason: "missing 'data' field".to_string(),
                })?;
                let raw = STANDARD
                    .decode(encoded.trim())
                    .map_err(|e| LayoutError::ImageDecode {
                        index,
                        reason: format!("invalid base64: {e}"),
                    })?;
                ImageTopic::from_bytes(Bytes::from(raw), index).map(Topic::Image)
            }
            other => Err(LayoutError::UnsupportedMedia {
                index,
                media: other.to_string(),
            }),
        }
    }
}

/// Converts a whole batch; the first bad topic rejects all of them.
pub fn topics_from_payloads(payloads: Vec<TopicPayload>) -> Result<Vec<Topic>, LayoutError> {
    payloads
        .into_iter()
        .enumerate()
        .map(|(i, p)| p.into_topic(i))
        .collect()
}
