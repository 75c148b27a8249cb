use crate::error::*;
use crate::{Encoder, FrameSet};
use std::ffi::OsString;
use std::path::Path;
use std::process::Command;

/// Hands the frames to ImageMagick's `convert` via its glob pattern
#[derive(Debug, Clone)]
pub struct ImageMagick {
    program: OsString,
}

impl Default for ImageMagick {
    fn default() -> Self {
        Self::new("convert")
    }
}

impl ImageMagick {
    /// `program` is `convert`, `magick`, or a full path to either
    pub fn new(program: impl Into<OsString>) -> Self {
        Self { program: program.into() }
    }

    /// `1xN` is 1/N seconds per frame. `-loop 0` loops forever.
    #[must_use]
    pub fn build_command(&self, frames: &FrameSet, output: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-delay").arg(format!("1x{}", frames.fps()))
            .args(["-loop", "0"])
            .arg(frames.glob_pattern())
            .arg(output);
        cmd
    }
}

impl Encoder for ImageMagick {
    fn encode(&mut self, frames: &FrameSet, output: &Path) -> CatResult<()> {
        if frames.is_empty() {
            return Err(Error::NoFrames);
        }
        let program = self.program.to_string_lossy().into_owned();
        let mut cmd = self.build_command(frames, output);
        log::debug!("running {:?}", cmd);
        let status = cmd.status().map_err(|err| Error::EncoderUnavailable(program.clone(), err))?;
        if !status.success() {
            return Err(Error::EncoderFailed(program, status));
        }
        Ok(())
    }
}
