use anyhow::ensure;
use image::ImageBuffer;

use crate::resolution::Resolution;

use super::Image;

/// Converts packed `Y0 U Y1 V` data (2 pixels per 4 bytes) with BT.601 coefficients.
pub(super) fn decode_yuyv(res: Resolution, data: &[u8]) -> anyhow::Result<Image> {
    ensure!(
        res.width() % 2 == 0,
        "YUYV frames must have an even width (got {res})"
    );
    let expected = res.num_pixels() as usize * 2;
    ensure!(
        data.len() >= expected,
        "truncated YUYV frame: got {} bytes, expected {} for {}",
        data.len(),
        expected,
        res,
    );

    let mut rgba = Vec::with_capacity(res.num_pixels() as usize * 4);
    for chunk in data[..expected].chunks_exact(4) {
        let [y0, u, y1, v] = [chunk[0], chunk[1], chunk[2], chunk[3]];
        rgba.extend_from_slice(&yuv_to_rgba(y0, u, v));
        rgba.extend_from_slice(&yuv_to_rgba(y1, u, v));
    }

    let buf = ImageBuffer::from_raw(res.width(), res.height(), rgba)
        .ok_or_else(|| anyhow::anyhow!("YUYV conversion produced a mismatched buffer"))?;
    Ok(Image { buf })
}

fn yuv_to_rgba(y: u8, u: u8, v: u8) -> [u8; 4] {
    let c = f32::from(y) - 16.0;
    let d = f32::from(u) - 128.0;
    let e = f32::from(v) - 128.0;

    let r = 1.164 * c + 1.596 * e;
    let g = 1.164 * c - 0.392 * d - 0.813 * e;
    let b = 1.164 * c + 2.017 * d;

    [clamp(r), clamp(g), clamp(b), 255]
}

fn clamp(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}
