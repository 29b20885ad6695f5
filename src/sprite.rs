use base64::{engine::general_purpose, Engine as _};
use image::GenericImageView;
use serde::{Deserialize, Serialize};

/// Terminal cells are roughly twice as tall as they are wide.
const CELL_ASPECT: f32 = 2.0;
const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";
const FORMAT_RGBA: u32 = 32;
const FORMAT_PNG: u32 = 100;

/// A decoded sprite ready for the kitty graphics protocol.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpriteData {
    pub payload: String,
    pub width: u32,
    pub height: u32,
    pub format: u32,
}

/// PNG bytes are forwarded as-is; anything else `image` can read is
/// converted to raw RGBA.
pub fn decode_sprite(bytes: &[u8]) -> Result<SpriteData, String> {
    let image = image::load_from_memory(bytes).map_err(|err| err.to_string())?;
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err("empty sprite image".to_string());
    }
    if bytes.starts_with(PNG_MAGIC) {
        return Ok(SpriteData {
            payload: general_purpose::STANDARD.encode(bytes),
            width,
            height,
            format: FORMAT_PNG,
        });
    }
    let rgba = image.to_rgba8();
    Ok(SpriteData {
        payload: general_purpose::STANDARD.encode(rgba.as_raw()),
        width,
        height,
        format: FORMAT_RGBA,
    })
}

/// Builds the chunked kitty transmit-and-display sequence for `sprite`,
/// scaled to `cols` x `rows` cells.
pub fn kitty_sequence(sprite: &SpriteData, cols: u16, rows: u16, id: u32) -> Result<String, String> {
    if sprite.payload.is_empty() {
        return Err("sprite payload is empty".to_string());
    }
    let mut sequences = String::new();
    let chunk_size = 4096;
    let payload = sprite.payload.as_bytes();
    let total_chunks = payload.len().div_ceil(chunk_size);

    for (index, chunk) in payload.chunks(chunk_size).enumerate() {
        let more = u8::from(index + 1 < total_chunks);
        let chunk_str = std::str::from_utf8(chunk).map_err(|err| err.to_string())?;
        if index == 0 {
            let mut params = format!(
                "f={},s={},v={},a=T,t=d,i={},q=2",
                sprite.format, sprite.width, sprite.height, id
            );
            if cols > 0 {
                params.push_str(&format!(",c={cols}"));
            }
            if rows > 0 {
                params.push_str(&format!(",r={rows}"));
            }
            params.push_str(&format!(",m={more}"));
            sequences.push_str(&format!("\x1b_G{params};{chunk_str}\x1b\\"));
        } else {
            sequences.push_str(&format!("\x1b_Gm={more};{chunk_str}\x1b\\"));
        }
    }
    Ok(sequences)
}

/// Largest cell box with the sprite's aspect ratio that fits in
/// `max_cols` x `max_rows`.
pub fn fit_cells(sprite: &SpriteData, max_cols: u16, max_rows: u16) -> (u16, u16) {
    if max_cols == 0 || max_rows == 0 || sprite.height == 0 {
        return (max_cols, max_rows);
    }
    let image_ratio = sprite.width as f32 / sprite.height as f32;
    let cols_for_max_rows = image_ratio * max_rows as f32 * CELL_ASPECT;
    if cols_for_max_rows <= max_cols as f32 {
        let cols = cols_for_max_rows.max(1.0).round() as u16;
        return (cols.max(1), max_rows);
    }
    let rows_for_max_cols = max_cols as f32 / (image_ratio * CELL_ASPECT);
    let rows = rows_for_max_cols.max(1.0).round() as u16;
    (max_cols, rows.clamp(1, max_rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sprite(width: u32, height: u32, payload_len: usize) -> SpriteData {
        SpriteData {
            payload: "A".repeat(payload_len),
            width,
            height,
            format: FORMAT_PNG,
        }
    }

    #[test]
    fn decodes_png_without_reencoding() {
        let image = image::RgbaImage::from_pixel(2, 3, image::Rgba([255, 0, 0, 255]));
        let mut bytes = Vec::new();
        image
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .expect("encode png");

        let decoded = decode_sprite(&bytes).expect("decode");
        assert_eq!((decoded.width, decoded.height), (2, 3));
        assert_eq!(decoded.format, FORMAT_PNG);
        assert_eq!(
            general_purpose::STANDARD.decode(&decoded.payload).expect("base64"),
            bytes
        );
    }

    #[test]
    fn rejects_garbage() {
        assert!(decode_sprite(b"not an image").is_err());
    }

    #[test]
    fn kitty_sequence_chunks_large_payloads() {
        let sequence = kitty_sequence(&sprite(96, 96, 9000), 10, 5, 7).expect("sequence");
        assert_eq!(sequence.matches("\x1b_G").count(), 3);
        assert!(sequence.starts_with("\x1b_Gf=100,s=96,v=96,a=T,t=d,i=7,q=2,c=10,r=5,m=1;"));
        assert!(sequence.contains("\x1b_Gm=0;"));
    }

    #[test]
    fn fit_keeps_square_sprites_square_in_pixels() {
        assert_eq!(fit_cells(&sprite(96, 96, 1), 26, 6), (12, 6));
        assert_eq!(fit_cells(&sprite(96, 96, 1), 8, 6), (8, 4));
    }
}
