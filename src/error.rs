use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;

pub type CatResult<T, E = Error> = Result<T, E>;

/// Coarse classification of [`Error`], for callers that branch on the failure kind
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The trace isn't a sequence of entries
    InvalidInput,
    /// No entry is usable for computing the trace's time range
    EmptyTimeline,
    /// The trace has no screenshot entries
    NoScreenshots,
    /// Bad settings, e.g. `fps` of 0
    Configuration,
    /// A screenshot's payload is missing or isn't base64
    Decode,
    /// Filesystem failure while preparing the folder or writing a frame
    Write,
    /// The animation encoder failed or isn't available
    Encode,
    /// The progress reporter asked to stop
    Aborted,
    /// Worker thread failure
    Internal,
}

quick_error! {
    #[derive(Debug)]
    pub enum Error {
        InvalidInput(msg: String) {
            display("Invalid timeline: {}", msg)
        }
        Json(err: serde_json::Error) {
            display("Invalid timeline JSON: {}", err)
            source(err)
            from()
        }
        EmptyTimeline(category: String) {
            display("The timeline has no '{}' entries to take the time range from", category)
        }
        NoScreenshots {
            display("The timeline has no screenshots")
        }
        Config(msg: String) {
            display("Invalid settings: {}", msg)
        }
        MissingSnapshot(ts: u64) {
            display("The screenshot at {}µs has no image data", ts)
        }
        Decode(ts: u64, err: base64::DecodeError) {
            display("The screenshot at {}µs has bad image data: {}", ts, err)
            source(err)
        }
        Write(path: PathBuf, err: io::Error) {
            display("Can't write {}: {}", path.display(), err)
            source(err)
        }
        Read(path: PathBuf, err: io::Error) {
            display("Can't read frame {}: {}", path.display(), err)
            source(err)
        }
        Image(path: PathBuf, err: image::ImageError) {
            display("Can't decode frame {}: {}", path.display(), err)
            source(err)
        }
        Quant(err: imagequant::Error) {
            display("Color quantization failed: {}", err)
            source(err)
            from()
        }
        Gif(err: gif::EncodingError) {
            display("GIF encoding failed: {}", err)
            source(err)
            from()
        }
        WrongSize(msg: String) {
            display("{}", msg)
        }
        NoFrames {
            display("Found no frames to encode")
        }
        EncoderUnavailable(program: String, err: io::Error) {
            display("Can't run {}: {}", program, err)
            source(err)
        }
        EncoderFailed(program: String, status: ExitStatus) {
            display("{} failed ({})", program, status)
        }
        Aborted {
            display("aborted")
        }
        ThreadSend {
            display("Internal error; unexpectedly aborted")
        }
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidInput(_) | Error::Json(_) => ErrorKind::InvalidInput,
            Error::EmptyTimeline(_) => ErrorKind::EmptyTimeline,
            Error::NoScreenshots => ErrorKind::NoScreenshots,
            Error::Config(_) => ErrorKind::Configuration,
            Error::MissingSnapshot(_) | Error::Decode(..) => ErrorKind::Decode,
            Error::Write(..) => ErrorKind::Write,
            Error::Read(..) | Error::Image(..) | Error::Quant(_) | Error::Gif(_)
            | Error::WrongSize(_) | Error::NoFrames
            | Error::EncoderUnavailable(..) | Error::EncoderFailed(..) => ErrorKind::Encode,
            Error::Aborted => ErrorKind::Aborted,
            Error::ThreadSend => ErrorKind::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_the_failing_stage() {
        assert_eq!(Error::EmptyTimeline("devtools.timeline".into()).kind(), ErrorKind::EmptyTimeline);
        assert_eq!(Error::MissingSnapshot(5).kind(), ErrorKind::Decode);
        let io = io::Error::new(io::ErrorKind::PermissionDenied, "nope");
        assert_eq!(Error::Write("a/b.png".into(), io).kind(), ErrorKind::Write);
        let io = io::Error::new(io::ErrorKind::NotFound, "missing");
        assert_eq!(Error::EncoderUnavailable("convert".into(), io).kind(), ErrorKind::Encode);
    }

    #[test]
    fn write_error_keeps_cause() {
        use std::error::Error as _;
        let io = io::Error::new(io::ErrorKind::PermissionDenied, "nope");
        let err = Error::Write("frames/screenshot-0000.png".into(), io);
        assert!(err.to_string().contains("screenshot-0000.png"));
        assert_eq!(err.source().map(|s| s.to_string()), Some("nope".to_string()));
    }
}
