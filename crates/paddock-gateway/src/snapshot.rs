// Still-frame payloads returned by `GET /snapshot`.
//
// The gateway does not report frame geometry, so dimensions are read
// straight from the PNG or JPEG header when possible.

use bytes::Bytes;

/// A single still frame as delivered by the gateway.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub data: Bytes,
    pub content_type: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl Snapshot {
    /// Wrap raw image bytes, sniffing dimensions from the header.
    pub fn new(data: Bytes, content_type: Option<String>) -> Self {
        let (width, height) = match image_dimensions(&data) {
            Some((w, h)) => (Some(w), Some(h)),
            None => (None, None),
        };
        Self {
            data,
            content_type,
            width,
            height,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

/// Read `(width, height)` from a PNG or JPEG header.
pub fn image_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    if data.starts_with(PNG_SIGNATURE) {
        png_dimensions(data)
    } else if data.starts_with(&[0xFF, 0xD8]) {
        jpeg_dimensions(data)
    } else {
        None
    }
}

fn be_u16(data: &[u8], at: usize) -> Option<u16> {
    let bytes = data.get(at..at + 2)?;
    Some(u16::from_be_bytes([bytes[0], bytes[1]]))
}

fn be_u32(data: &[u8], at: usize) -> Option<u32> {
    let bytes = data.get(at..at + 4)?;
    Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn png_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    // Signature (8) + chunk length (4), then the IHDR tag.
    if data.get(12..16)? != b"IHDR" {
        return None;
    }
    Some((be_u32(data, 16)?, be_u32(data, 20)?))
}

fn jpeg_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    let mut pos = 2;

    loop {
        // Every segment starts with 0xFF, optionally padded with more 0xFF.
        if *data.get(pos)? != 0xFF {
            return None;
        }
        while *data.get(pos)? == 0xFF {
            pos += 1;
        }
        let marker = *data.get(pos)?;
        pos += 1;

        match marker {
            // Markers without a length field.
            0x01 | 0xD0..=0xD7 => continue,
            // End of image or start of scan before any frame header.
            0xD9 | 0xDA => return None,
            // SOF0..SOF15, excluding DHT, JPG and DAC.
            0xC0..=0xCF if !matches!(marker, 0xC4 | 0xC8 | 0xCC) => {
                let height = be_u16(data, pos + 3)?;
                let width = be_u16(data, pos + 5)?;
                return Some((u32::from(width), u32::from(height)));
            }
            _ => {
                let len = usize::from(be_u16(data, pos)?);
                if len < 2 {
                    return None;
                }
                pos += len;
            }
        }
    }
}
