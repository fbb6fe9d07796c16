//! Test fixtures: hand-built JPEG headers, PNG via the image encoder, minimal PDF.

use image::{ImageFormat, Rgb, RgbImage};

fn segment(marker: u8, body: &[u8]) -> Vec<u8> {
    let mut out = vec![0xff, marker];
    out.extend_from_slice(&((body.len() + 2) as u16).to_be_bytes());
    out.extend_from_slice(body);
    out
}

/// Minimal v2 RGB display profile with no tags.
pub fn icc_profile() -> Vec<u8> {
    let mut profile = vec![0u8; 132];
    profile[0..4].copy_from_slice(&132u32.to_be_bytes());
    profile[8] = 2;
    profile[9] = 0x10;
    profile[12..16].copy_from_slice(b"mntr");
    profile[16..20].copy_from_slice(b"RGB ");
    profile[20..24].copy_from_slice(b"XYZ ");
    profile[36..40].copy_from_slice(b"acsp");
    profile
}

fn iim_dataset(dataset: u8, value: &str) -> Vec<u8> {
    let mut out = vec![0x1c, 2, dataset];
    out.extend_from_slice(&(value.len() as u16).to_be_bytes());
    out.extend_from_slice(value.as_bytes());
    out
}

/// APP13 body carrying an IPTC headline and caption.
fn photoshop_iptc(headline: &str, caption: &str) -> Vec<u8> {
    let mut iim = iim_dataset(105, headline);
    iim.extend(iim_dataset(120, caption));

    let mut body = b"Photoshop 3.0\0".to_vec();
    body.extend_from_slice(b"8BIM");
    body.extend_from_slice(&0x0404u16.to_be_bytes());
    body.extend_from_slice(&[0, 0]);
    body.extend_from_slice(&(iim.len() as u32).to_be_bytes());
    body.extend_from_slice(&iim);
    if iim.len() % 2 == 1 {
        body.push(0);
    }
    body
}

/// Baseline JPEG of exactly `total` bytes: JFIF, optional ICC (APP2), optional
/// IPTC headline/caption (APP13), SOF0, SOS and filler scan data.
pub fn jpeg(width: u16, height: u16, with_icc: bool, iptc: Option<(&str, &str)>, total: usize) -> Vec<u8> {
    let mut out = vec![0xff, 0xd8];
    out.extend(segment(0xe0, b"JFIF\0\x01\x02\0\0\x01\0\x01\0\0"));

    if with_icc {
        let mut body = b"ICC_PROFILE\0\x01\x01".to_vec();
        body.extend(icc_profile());
        out.extend(segment(0xe2, &body));
    }
    if let Some((headline, caption)) = iptc {
        out.extend(segment(0xed, &photoshop_iptc(headline, caption)));
    }

    let mut sof = vec![8];
    sof.extend_from_slice(&height.to_be_bytes());
    sof.extend_from_slice(&width.to_be_bytes());
    sof.extend_from_slice(&[3, 1, 0x22, 0, 2, 0x11, 1, 3, 0x11, 1]);
    out.extend(segment(0xc0, &sof));
    out.extend(segment(0xda, &[1, 1, 0, 0, 0x3f, 0]));

    while out.len() + 2 < total {
        out.push(0x5a);
    }
    out.extend_from_slice(&[0xff, 0xd9]);
    out
}

pub fn png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb([12, 120, 200]));
    let mut buffer = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut buffer), ImageFormat::Png)
        .expect("Failed to encode PNG fixture");
    buffer
}

/// Minimal valid PDF.
pub fn pdf() -> Vec<u8> {
    b"%PDF-1.4
1 0 obj
<< /Type /Catalog /Pages 2 0 R >>
endobj
2 0 obj
<< /Type /Pages /Kids [] /Count 0 >>
endobj
trailer
<< /Size 3 /Root 1 0 R >>
%%EOF
"
    .to_vec()
}
