//! Picks screenshots for evenly spaced frames
use crate::error::*;
use crate::timeline::{Entry, TimeBoundaries};

/// Microseconds per second
const SECOND: u64 = 1_000_000;

/// Longest animation that will be planned. 77 hours at 60fps.
pub const MAX_FRAMES: u64 = 1 << 24;

/// How screenshots are turned into frames at a constant rate
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum Resampling {
    /// Sample the whole trace range at `fps`, each frame showing the latest screenshot taken by then
    #[default]
    NearestPreceding,
    /// Repeat each screenshot to cover the time until the next one. Ignores the trace range.
    GapFill,
}

/// One output frame
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Frame<'a> {
    /// Index into the sorted screenshots
    pub source: usize,
    /// Virtual time of this frame, in microseconds
    pub time: u64,
    pub entry: &'a Entry,
}

pub fn validate_fps(fps: u32) -> CatResult<()> {
    if fps == 0 {
        return Err(Error::Config("fps must be at least 1".into()));
    }
    if u64::from(fps) > SECOND {
        return Err(Error::Config(format!("fps must be at most {}", SECOND)));
    }
    Ok(())
}

/// Time of the `n`th sample after the start, without accumulating rounding errors
#[inline]
fn offset_of_sample(n: u64, fps: u32) -> u64 {
    (u128::from(n) * u128::from(SECOND) / u128::from(fps)) as u64
}

fn too_many_frames(frames: u128, fps: u32) -> Error {
    Error::Config(format!("{} frames at {}fps is more than the limit of {}", frames, fps, MAX_FRAMES))
}

/// Number of frames `nearest_preceding` makes for this range
pub fn frame_count(bounds: TimeBoundaries, fps: u32) -> CatResult<u64> {
    let duration = bounds.duration()
        .ok_or_else(|| Error::Config(format!("trace ends at {}µs, before it starts at {}µs", bounds.end, bounds.start)))?;
    let frames = u128::from(duration) * u128::from(fps) / u128::from(SECOND) + 1;
    u64::try_from(frames).ok()
        .filter(|&n| n <= MAX_FRAMES)
        .ok_or_else(|| too_many_frames(frames, fps))
}

/// Stable, numeric sort by timestamp. Returns `false` if the screenshots weren't in order.
pub fn sort_screenshots(screenshots: &mut [&Entry]) -> bool {
    let sorted = screenshots.windows(2).all(|w| w[0].ts <= w[1].ts);
    if !sorted {
        screenshots.sort_by_key(|e| e.ts);
    }
    sorted
}

/// `screenshots` must be sorted by timestamp
pub fn nearest_preceding<'a>(screenshots: &[&'a Entry], bounds: TimeBoundaries, fps: u32) -> CatResult<Vec<Frame<'a>>> {
    validate_fps(fps)?;
    if screenshots.is_empty() {
        return Err(Error::NoScreenshots);
    }

    let count = frame_count(bounds, fps)?;
    let mut frames = Vec::with_capacity(count as usize);
    let mut cursor = 0;
    for n in 0..count {
        let time = bounds.start + offset_of_sample(n, fps);
        while cursor + 1 < screenshots.len() && screenshots[cursor + 1].ts <= time {
            cursor += 1;
        }
        frames.push(Frame {
            source: cursor,
            time,
            entry: screenshots[cursor],
        });
    }
    Ok(frames)
}

/// `screenshots` must be sorted by timestamp
pub fn gap_fill<'a>(screenshots: &[&'a Entry], fps: u32) -> CatResult<Vec<Frame<'a>>> {
    validate_fps(fps)?;
    if screenshots.is_empty() {
        return Err(Error::NoScreenshots);
    }

    let mut frames = Vec::with_capacity(screenshots.len());
    let mut total = 0u128;
    for (source, &entry) in screenshots.iter().enumerate() {
        let gap = screenshots.get(source + 1).map_or(0, |next| next.ts.saturating_sub(entry.ts));
        let duplicates = u128::from(gap) * u128::from(fps) / u128::from(SECOND);
        total += duplicates + 1;
        if total > u128::from(MAX_FRAMES) {
            return Err(too_many_frames(total, fps));
        }
        frames.extend((0..=duplicates as u64).map(|n| Frame {
            source,
            time: entry.ts + offset_of_sample(n, fps),
            entry,
        }));
    }
    Ok(frames)
}
