/*
 snapline: timeline screenshots to images and animGIFs
 © 2017 snapline contributors

 This program is free software: you can redistribute it and/or modify
 it under the terms of the GNU Affero General Public License as
 published by the Free Software Foundation, either version 3 of the
 License, or (at your option) any later version.

 This program is distributed in the hope that it will be useful,
 but WITHOUT ANY WARRANTY; without even the implied warranty of
 MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 GNU Affero General Public License for more details.

 You should have received a copy of the GNU Affero General Public License
 along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/
//! Replays the screenshots of a browser performance trace.
//!
//! Screenshots are resampled to a constant frame rate, written as numbered images,
//! and optionally assembled into an animated GIF.

#[macro_use] extern crate quick_error;

mod error;
pub use crate::error::*;
pub mod timeline;
pub use crate::timeline::{Entry, EntryArgs, TimeBoundaries, Timeline};
pub mod resample;
pub use crate::resample::{Frame, Resampling};
pub mod materialize;
use crate::materialize::FrameNaming;
pub mod progress;
use crate::progress::*;
mod writequeue;
use crate::writequeue::FrameJob;
mod encoderust;
pub use crate::encoderust::GifEncoder;
mod encodemagick;
pub use crate::encodemagick::ImageMagick;

use std::fs;
use std::path::{Path, PathBuf};
use std::thread::available_parallelism;

pub const DEFAULT_FPS: u32 = 10;
/// Where `to_images` writes if `output` isn't set
pub const DEFAULT_IMAGES_DIR: &str = "screenshots";
/// Where `to_gif` writes if `output` isn't set
pub const DEFAULT_GIF: &str = "timeline.gif";
const MAX_JOBS: usize = 8;

/// Conversion settings for `to_images()` and `to_gif()`
///
/// `None` fields use the defaults of the conversion they're passed to.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Folder for `to_images`, GIF file for `to_gif`
    pub output: Option<PathBuf>,
    /// Scratch folder for the frames of a GIF. Files in it are deleted before use!
    pub tmp: Option<PathBuf>,
    /// Frames per second
    pub fps: u32,
    /// File name prefix of the frames, `screenshot` if not set
    pub prefix: Option<String>,
    pub resampling: Resampling,
    /// Entries in this category define the time range of the trace
    pub boundary_category: String,
    /// Number of frames written in parallel. 0 picks a number based on CPUs.
    pub jobs: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output: None,
            tmp: None,
            fps: DEFAULT_FPS,
            prefix: None,
            resampling: Resampling::default(),
            boundary_category: timeline::BOUNDARY_CATEGORY.to_owned(),
            jobs: 0,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> CatResult<()> {
        resample::validate_fps(self.fps)?;
        if let Some(prefix) = &self.prefix {
            // path separators, and glob characters that would break `FrameSet::glob_pattern`
            if prefix.is_empty() || prefix.contains(|c: char| matches!(c, '/' | '\\' | '*' | '?' | '[' | ']')) {
                return Err(Error::Config(format!("'{}' can't be used as a file name prefix", prefix)));
            }
        }
        if self.boundary_category.is_empty() {
            return Err(Error::Config("boundary category is empty".into()));
        }
        Ok(())
    }

    fn workers(&self) -> usize {
        if self.jobs > 0 {
            return self.jobs;
        }
        available_parallelism().map(|n| n.get().min(MAX_JOBS)).unwrap_or(4)
    }

    fn images_dir(&self) -> PathBuf {
        self.output.clone().unwrap_or_else(|| DEFAULT_IMAGES_DIR.into())
    }

    fn gif_path(&self) -> PathBuf {
        self.output.clone().unwrap_or_else(|| DEFAULT_GIF.into())
    }

    fn tmp_dir(&self) -> PathBuf {
        self.tmp.clone().unwrap_or_else(|| std::env::temp_dir().join("screenshots"))
    }
}

/// Numbered frame images in a folder, in frame order
#[derive(Debug, Clone)]
pub struct FrameSet {
    dir: PathBuf,
    prefix: String,
    files: Vec<PathBuf>,
    fps: u32,
}

impl FrameSet {
    /// Finds `<prefix>-<number>.png` files in `dir`, in natural order
    pub fn scan(dir: &Path, prefix: &str, fps: u32) -> CatResult<Self> {
        let read_err = |err: std::io::Error| Error::Read(dir.to_owned(), err);
        let mut names = Vec::new();
        for item in fs::read_dir(dir).map_err(read_err)? {
            let name = item.map_err(read_err)?.file_name();
            let name = match name.to_str() {
                Some(name) => name,
                None => continue,
            };
            let is_frame = name.strip_prefix(prefix)
                .and_then(|n| n.strip_prefix('-'))
                .and_then(|n| n.strip_suffix(".png"))
                .map_or(false, |n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()));
            if is_frame {
                names.push(name.to_owned());
            }
        }
        names.sort_by(|a, b| natord::compare(a, b));

        Ok(Self {
            files: names.iter().map(|n| dir.join(n)).collect(),
            dir: dir.to_owned(),
            prefix: prefix.to_owned(),
            fps,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Shell-style pattern matching every frame
    pub fn glob_pattern(&self) -> PathBuf {
        self.dir.join(format!("{}-*.png", self.prefix))
    }
}

/// Turns a folder of frames into an animation
pub trait Encoder {
    fn encode(&mut self, frames: &FrameSet, output: &Path) -> CatResult<()>;
}

/// Picks the screenshot for every frame. Doesn't touch the disk.
pub fn plan_frames<'a>(timeline: &'a Timeline, settings: &Settings) -> CatResult<Vec<Frame<'a>>> {
    settings.validate()?;

    let bounds = match settings.resampling {
        Resampling::NearestPreceding => Some(timeline.boundaries(&settings.boundary_category)?),
        Resampling::GapFill => None,
    };

    let mut screenshots = timeline.screenshots();
    if !resample::sort_screenshots(&mut screenshots) {
        log::warn!("screenshots in the trace weren't in time order; sorted them");
    }

    let frames = match bounds {
        Some(bounds) => {
            log::debug!("trace spans {}µs..{}µs", bounds.start, bounds.end);
            resample::nearest_preceding(&screenshots, bounds, settings.fps)?
        },
        None => resample::gap_fill(&screenshots, settings.fps)?,
    };
    log::info!("{} frames from {} screenshots at {}fps", frames.len(), screenshots.len(), settings.fps);
    Ok(frames)
}

/// Writes the frames as numbered images into `settings.output` (default `screenshots`)
///
/// The folder is emptied first. Returns the folder's path.
pub fn to_images(timeline: &Timeline, settings: &Settings, reporter: &mut dyn ProgressReporter) -> CatResult<PathBuf> {
    let frames = write_frames(timeline, settings, &settings.images_dir(), reporter)?;
    Ok(frames.dir)
}

/// Writes the frames into `settings.tmp` and encodes them into `settings.output` (default `timeline.gif`)
///
/// Returns the GIF's path.
pub fn to_gif(timeline: &Timeline, settings: &Settings, encoder: &mut dyn Encoder, reporter: &mut dyn ProgressReporter) -> CatResult<PathBuf> {
    let gif_path = settings.gif_path();
    let frames = write_frames(timeline, settings, &settings.tmp_dir(), reporter)?;
    log::info!("encoding {} frames into {}", frames.len(), gif_path.display());
    encoder.encode(&frames, &gif_path)?;
    Ok(dunce::canonicalize(&gif_path).unwrap_or(gif_path))
}

fn write_frames(timeline: &Timeline, settings: &Settings, dir: &Path, reporter: &mut dyn ProgressReporter) -> CatResult<FrameSet> {
    let frames = plan_frames(timeline, settings)?;

    materialize::prepare_dir(dir)?;
    let dir = dunce::canonicalize(dir).map_err(|err| Error::Write(dir.to_owned(), err))?;

    let naming = FrameNaming::new(settings.prefix.as_deref(), frames.len());
    let jobs = frames.iter().enumerate().map(|(index, frame)| FrameJob {
        index,
        path: dir.join(naming.file_name(index)),
        entry: frame.entry,
    }).collect();

    reporter.set_total(frames.len() as u64);
    writequeue::write_all(jobs, settings.workers(), reporter)?;
    log::info!("wrote {} frames to {}", frames.len(), dir.display());

    FrameSet::scan(&dir, naming.prefix(), settings.fps)
}
