//! Incremental image header scanner.
//!
//! The scanner is fed the upload chunk by chunk and keeps only what it needs to
//! locate the image dimensions and the raw ICC, EXIF and IPTC segments. It reports
//! [`ScanState::Complete`] as soon as it reaches pixel data (JPEG start-of-scan, PNG
//! `IDAT`), the end of the image, or its byte budget, so the caller can stop feeding it.

use std::io::Cursor;

use image::{ImageFormat, ImageReader};

use crate::segments::{be_u16, be_u32, iptc};

const PNG_SIGNATURE: &[u8; 8] = b"\x89PNG\r\n\x1a\n";
const JPEG_SOI: &[u8; 2] = &[0xff, 0xd8];
const EXIF_ID: &[u8] = b"Exif\0\0";
const ICC_ID: &[u8] = b"ICC_PROFILE\0";
const PHOTOSHOP_ID: &[u8] = b"Photoshop 3.0\0";

/// Bytes needed before the container format can be guessed.
const SNIFF_LEN: usize = 16;

/// Structural header information and raw embedded segments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeaderInfo {
    pub format: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Total byte size of the upload, filled in from the storage acknowledgment.
    pub size_bytes: u64,
    pub icc: Option<Vec<u8>>,
    /// Compressed PNG `iCCP` chunk body, inflated during extraction.
    pub png_iccp: Option<Vec<u8>>,
    pub exif: Option<Vec<u8>>,
    pub iptc: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    NeedMore,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Container {
    Unknown,
    Jpeg,
    Png,
    Other,
}

/// Feed-driven header decoder.
#[derive(Debug)]
pub struct HeaderScanner {
    container: Container,
    /// Unconsumed bytes; everything before `pos` has been parsed.
    buf: Vec<u8>,
    pos: usize,
    /// Bytes consumed and discarded from the front of `buf`.
    discarded: usize,
    max_header_bytes: usize,
    state: ScanState,
    info: HeaderInfo,
    icc_chunks: Vec<(u8, Vec<u8>)>,
}

impl HeaderScanner {
    pub fn new(max_header_bytes: usize) -> Self {
        Self {
            container: Container::Unknown,
            buf: Vec::new(),
            pos: 0,
            discarded: 0,
            max_header_bytes,
            state: ScanState::NeedMore,
            info: HeaderInfo::default(),
            icc_chunks: Vec::new(),
        }
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    /// Feed the next chunk of the upload.
    pub fn feed(&mut self, chunk: &[u8]) -> ScanState {
        if self.state == ScanState::Complete {
            return self.state;
        }
        self.buf.extend_from_slice(chunk);

        if self.container == Container::Unknown {
            if self.buf.len() < SNIFF_LEN {
                return self.state;
            }
            self.sniff();
        }

        self.state = match self.container {
            Container::Jpeg => self.scan_jpeg(),
            Container::Png => self.scan_png(),
            Container::Other => self.probe_other(),
            Container::Unknown => ScanState::NeedMore,
        };

        if self.state == ScanState::NeedMore && self.discarded + self.buf.len() >= self.max_header_bytes {
            tracing::debug!(
                max_header_bytes = self.max_header_bytes,
                "Header byte budget reached before pixel data"
            );
            self.state = ScanState::Complete;
        }
        self.compact();
        self.state
    }

    /// Finish scanning and return what was found. Works whether or not the scanner
    /// reached [`ScanState::Complete`]; a stream shorter than the sniffing window
    /// is probed here.
    pub fn finish(mut self) -> HeaderInfo {
        if self.container == Container::Unknown && !self.buf.is_empty() {
            self.sniff();
            match self.container {
                Container::Jpeg => {
                    self.scan_jpeg();
                }
                Container::Png => {
                    self.scan_png();
                }
                Container::Other => {
                    self.probe_other();
                }
                Container::Unknown => {}
            }
        }

        if !self.icc_chunks.is_empty() {
            self.icc_chunks.sort_by_key(|(seq, _)| *seq);
            self.info.icc = Some(self.icc_chunks.into_iter().flat_map(|(_, c)| c).collect());
        }
        self.info
    }

    fn sniff(&mut self) {
        self.container = if self.buf.starts_with(JPEG_SOI) {
            self.pos = 2;
            Container::Jpeg
        } else if self.buf.starts_with(PNG_SIGNATURE) {
            self.pos = PNG_SIGNATURE.len();
            Container::Png
        } else {
            Container::Other
        };
        self.info.format = image::guess_format(&self.buf)
            .ok()
            .map(|f| format_name(f).to_string());
    }

    /// Drop parsed bytes so the buffer only holds the segment being assembled.
    fn compact(&mut self) {
        if matches!(self.container, Container::Jpeg | Container::Png) && self.pos > 0 {
            let pos = self.pos.min(self.buf.len());
            self.buf.drain(..pos);
            self.discarded += pos;
            self.pos -= pos;
        }
    }

    fn scan_jpeg(&mut self) -> ScanState {
        loop {
            let Some(&first) = self.buf.get(self.pos) else {
                return ScanState::NeedMore;
            };
            if first != 0xff {
                tracing::debug!("JPEG marker expected, stopping header scan");
                return ScanState::Complete;
            }
            // Fill bytes before the marker.
            let mut at = self.pos + 1;
            while self.buf.get(at) == Some(&0xff) {
                at += 1;
            }
            let Some(&marker) = self.buf.get(at) else {
                return ScanState::NeedMore;
            };

            match marker {
                // Start of scan or end of image: no header segments beyond this point.
                0xda | 0xd9 => return ScanState::Complete,
                0x01 | 0xd0..=0xd7 => {
                    self.pos = at + 1;
                    continue;
                }
                _ => {}
            }

            let Some(len) = be_u16(&self.buf, at + 1) else {
                return ScanState::NeedMore;
            };
            let len = len as usize;
            if len < 2 {
                return ScanState::Complete;
            }
            let body_start = at + 3;
            let body_end = at + 1 + len;
            if self.buf.len() < body_end {
                return ScanState::NeedMore;
            }

            let body = self.buf[body_start..body_end].to_vec();
            self.jpeg_segment(marker, &body);
            self.pos = body_end;
        }
    }

    fn jpeg_segment(&mut self, marker: u8, body: &[u8]) {
        match marker {
            // SOFn, excluding DHT, JPG and DAC which share the range.
            0xc0..=0xcf if !matches!(marker, 0xc4 | 0xc8 | 0xcc) => {
                if self.info.width.is_none() {
                    self.info.height = be_u16(body, 1).map(u32::from);
                    self.info.width = be_u16(body, 3).map(u32::from);
                }
            }
            0xe1 if body.starts_with(EXIF_ID) => {
                if self.info.exif.is_none() {
                    self.info.exif = Some(body[EXIF_ID.len()..].to_vec());
                }
            }
            0xe2 if body.starts_with(ICC_ID) => {
                let header = ICC_ID.len();
                if let Some(&seq) = body.get(header) {
                    let data = body.get(header + 2..).unwrap_or_default();
                    self.icc_chunks.push((seq, data.to_vec()));
                }
            }
            0xed if body.starts_with(PHOTOSHOP_ID) => {
                match iptc::from_photoshop_irb(&body[PHOTOSHOP_ID.len()..]) {
                    Ok(iim) => self.info.iptc = Some(iim),
                    Err(e) => tracing::debug!(error = %e, "APP13 segment without usable IPTC"),
                }
            }
            _ => {}
        }
    }

    fn scan_png(&mut self) -> ScanState {
        loop {
            let (Some(len), Some(kind)) = (
                be_u32(&self.buf, self.pos),
                self.buf.get(self.pos + 4..self.pos + 8),
            ) else {
                return ScanState::NeedMore;
            };
            let kind: [u8; 4] = [kind[0], kind[1], kind[2], kind[3]];

            if &kind == b"IDAT" || &kind == b"IEND" {
                return ScanState::Complete;
            }

            let data_start = self.pos + 8;
            let data_end = data_start + len as usize;
            // Data plus CRC.
            if self.buf.len() < data_end + 4 {
                return ScanState::NeedMore;
            }

            let data = self.buf[data_start..data_end].to_vec();
            match &kind {
                b"IHDR" => {
                    self.info.width = be_u32(&data, 0);
                    self.info.height = be_u32(&data, 4);
                }
                b"iCCP" => self.info.png_iccp = Some(data),
                b"eXIf" => self.info.exif = Some(data),
                _ => {}
            }
            self.pos = data_end + 4;
        }
    }

    /// Formats without a native walker: read dimensions from the buffered prefix.
    fn probe_other(&mut self) -> ScanState {
        let reader = match ImageReader::new(Cursor::new(&self.buf)).with_guessed_format() {
            Ok(reader) => reader,
            Err(_) => return ScanState::NeedMore,
        };
        if reader.format().is_none() {
            return ScanState::Complete;
        }
        match reader.into_dimensions() {
            Ok((width, height)) => {
                self.info.width = Some(width);
                self.info.height = Some(height);
                ScanState::Complete
            }
            Err(_) => ScanState::NeedMore,
        }
    }
}

fn format_name(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Jpeg => "jpeg",
        ImageFormat::Png => "png",
        ImageFormat::Gif => "gif",
        ImageFormat::WebP => "webp",
        other => other.extensions_str().first().copied().unwrap_or("unknown"),
    }
}
