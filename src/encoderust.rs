use crate::error::*;
use crate::{Encoder, FrameSet};
use imgref::*;
use rgb::*;
use std::borrow::Cow;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

/// Encodes the frames in-process, with pngquant-style palettes
#[derive(Debug, Copy, Clone)]
pub struct GifEncoder {
    /// 1-100
    pub quality: u8,
    /// Lower quality, but faster encode
    pub fast: bool,
    /// If true, looping is disabled
    pub once: bool,
}

impl Default for GifEncoder {
    fn default() -> Self {
        Self {
            quality: 100,
            fast: false,
            once: false,
        }
    }
}

struct RustEncoder<W: Write> {
    writer: Option<W>,
    gif_enc: Option<gif::Encoder<W>>,
    screen: (usize, usize),
}

impl Encoder for GifEncoder {
    fn encode(&mut self, frames: &FrameSet, output: &Path) -> CatResult<()> {
        if frames.is_empty() {
            return Err(Error::NoFrames);
        }
        let file = File::create(output).map_err(|err| Error::Write(output.to_owned(), err))?;
        self.write(frames, BufWriter::new(file))
    }
}

impl GifEncoder {
    /// `writer` can be any writer, such as `File` or `&mut Vec`.
    pub fn write<W: Write>(&self, frames: &FrameSet, writer: W) -> CatResult<()> {
        let fps = frames.fps().max(1) as usize;
        let mut enc = RustEncoder {
            writer: Some(writer),
            gif_enc: None,
            screen: (0, 0),
        };

        // identical consecutive frames become one, with the sum of their delays
        let mut pending: Option<(ImgVec<RGBA8>, u16)> = None;
        let mut prev_data = Vec::new();
        let mut written = 0;
        for (i, path) in frames.files().iter().enumerate() {
            // See telecine/pulldown.
            let delay = ((i + 1) * 100 / fps - i * 100 / fps) as u16;

            let data = fs::read(path).map_err(|err| Error::Read(path.clone(), err))?;
            if let Some((_, pending_delay)) = pending.as_mut().filter(|_| data == prev_data) {
                *pending_delay = pending_delay.saturating_add(delay);
                continue;
            }
            let image = decode_frame(path, &data)?;
            prev_data = data;

            if let Some((pending_image, pending_delay)) = pending.as_mut() {
                if pending_image.as_ref() == image.as_ref() {
                    *pending_delay = pending_delay.saturating_add(delay);
                    continue;
                }
            }
            if let Some((done_image, done_delay)) = pending.replace((image, delay)) {
                written += enc.write_frame(done_image.as_ref(), done_delay, self)?;
            }
        }
        if let Some((image, delay)) = pending {
            written += enc.write_frame(image.as_ref(), delay, self)?;
        }
        log::info!("encoded {} GIF frames from {} files", written, frames.len());
        if written == 0 {
            return Err(Error::NoFrames);
        }
        Ok(())
    }

    fn quantize(&self, image: ImgRef<'_, RGBA8>) -> CatResult<(Vec<RGBA8>, Vec<u8>)> {
        let mut liq = imagequant::new();
        liq.set_speed(if self.fast { 10 } else { 4 })?;
        liq.set_quality(0, self.quality.clamp(1, 100))?;
        let mut img = liq.new_image_borrowed(image.buf(), image.width(), image.height(), 0.)?;
        let mut res = liq.quantize(&mut img)?;
        res.set_dithering_level(0.5)?;

        let (pal, pal_img) = res.remapped(&mut img)?;
        debug_assert_eq!(image.width() * image.height(), pal_img.len());
        Ok((pal, pal_img))
    }
}

fn decode_frame(path: &Path, data: &[u8]) -> CatResult<ImgVec<RGBA8>> {
    // trace screenshots are usually JPEG, whatever the file name says
    let image = image::load_from_memory(data)
        .map_err(|err| Error::Image(path.to_owned(), err))?
        .into_rgba8();
    let (width, height) = image.dimensions();
    Ok(ImgVec::new(image.into_raw().as_rgba().to_vec(), width as usize, height as usize))
}

impl<W: Write> RustEncoder<W> {
    /// Returns number of frames written
    fn write_frame(&mut self, image: ImgRef<'_, RGBA8>, delay: u16, settings: &GifEncoder) -> CatResult<usize> {
        // skip frames with no display time
        if delay == 0 {
            return Ok(0);
        }

        let (width, height) = (image.width(), image.height());
        if self.gif_enc.is_some() && self.screen != (width, height) {
            return Err(Error::WrongSize(format!("Frame has wrong size ({}×{}, expected {}×{})",
                width, height, self.screen.0, self.screen.1)));
        }
        if width > usize::from(u16::MAX) || height > usize::from(u16::MAX) {
            return Err(Error::WrongSize(format!("Frame is too large for a GIF ({}×{})", width, height)));
        }

        let (pal, image8) = settings.quantize(image)?;

        let writer = &mut self.writer;
        let enc = match self.gif_enc {
            None => {
                let w = writer.take().ok_or(Error::ThreadSend)?;
                let mut enc = gif::Encoder::new(w, width as u16, height as u16, &[])?;
                if !settings.once {
                    enc.write_extension(gif::ExtensionData::Repetitions(gif::Repeat::Infinite))?;
                }
                self.screen = (width, height);
                self.gif_enc.get_or_insert(enc)
            },
            Some(ref mut enc) => enc,
        };

        let mut transparent_index = None;
        let mut pal_rgb = Vec::with_capacity(3 * pal.len());
        for (i, p) in pal.iter().enumerate() {
            if p.a == 0 {
                transparent_index = Some(i as u8);
            }
            pal_rgb.extend_from_slice([p.rgb()].as_bytes());
        }

        enc.write_frame(&gif::Frame {
            delay,
            dispose: gif::DisposalMethod::Keep,
            transparent: transparent_index,
            width: width as u16,
            height: height as u16,
            palette: Some(pal_rgb),
            buffer: Cow::Borrowed(&image8),
            ..gif::Frame::default()
        })?;
        Ok(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn solid_png(dir: &Path, index: usize, color: [u8; 3], width: u32) {
        let img = image::RgbaImage::from_pixel(width, 3, image::Rgba([color[0], color[1], color[2], 255]));
        img.save(dir.join(format!("screenshot-{:04}.png", index))).unwrap();
    }

    fn decoded_delays(gif_data: &[u8]) -> Vec<u16> {
        let mut decoder = gif::DecodeOptions::new().read_info(gif_data).unwrap();
        let mut delays = Vec::new();
        while let Some(frame) = decoder.read_next_frame().unwrap() {
            delays.push(frame.delay);
        }
        delays
    }

    #[test]
    fn merges_repeated_frames() {
        let dir = TempDir::new().unwrap();
        solid_png(dir.path(), 0, [255, 0, 0], 4);
        solid_png(dir.path(), 1, [255, 0, 0], 4);
        solid_png(dir.path(), 2, [0, 0, 255], 4);
        let frames = FrameSet::scan(dir.path(), "screenshot", 10).unwrap();

        let mut out = Vec::new();
        GifEncoder::default().write(&frames, &mut out).unwrap();
        assert!(out.starts_with(b"GIF89a"));
        assert_eq!(decoded_delays(&out), [20, 10]);
    }

    #[test]
    fn delays_follow_frame_rate() {
        let dir = TempDir::new().unwrap();
        for (i, color) in [[0, 0, 0], [90, 90, 90], [180, 180, 180], [255, 255, 255]].iter().enumerate() {
            solid_png(dir.path(), i, *color, 2);
        }
        let frames = FrameSet::scan(dir.path(), "screenshot", 3).unwrap();
        let mut out = Vec::new();
        GifEncoder { fast: true, ..GifEncoder::default() }.write(&frames, &mut out).unwrap();
        assert_eq!(decoded_delays(&out), [33, 33, 34, 33]);
    }

    #[test]
    fn reads_jpeg_content() {
        let dir = TempDir::new().unwrap();
        let img = image::RgbImage::from_pixel(8, 8, image::Rgb([10, 200, 30]));
        img.save_with_format(dir.path().join("screenshot-0000.png"), image::ImageFormat::Jpeg).unwrap();
        let frames = FrameSet::scan(dir.path(), "screenshot", 10).unwrap();
        let mut out = Vec::new();
        GifEncoder::default().write(&frames, &mut out).unwrap();
        assert_eq!(decoded_delays(&out).len(), 1);
    }

    #[test]
    fn rejects_mixed_sizes() {
        let dir = TempDir::new().unwrap();
        solid_png(dir.path(), 0, [255, 0, 0], 4);
        solid_png(dir.path(), 1, [0, 255, 0], 5);
        let frames = FrameSet::scan(dir.path(), "screenshot", 10).unwrap();
        let mut out = Vec::new();
        let err = GifEncoder::default().write(&frames, &mut out).unwrap_err();
        assert!(matches!(err, Error::WrongSize(_)));
        assert_eq!(err.kind(), ErrorKind::Encode);
    }

    #[test]
    fn not_an_image() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("screenshot-0000.png"), b"hello").unwrap();
        let frames = FrameSet::scan(dir.path(), "screenshot", 10).unwrap();
        let err = GifEncoder::default().encode(&frames, &dir.path().join("out.gif")).unwrap_err();
        assert!(matches!(err, Error::Image(..)));
    }
}
