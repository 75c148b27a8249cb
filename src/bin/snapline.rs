use clap::{crate_name, crate_version, App, AppSettings, Arg, ArgMatches};
use snapline::progress::{NoProgress, ProgressReporter};
use snapline::{Encoder, GifEncoder, ImageMagick, Resampling, Settings, Timeline};

use pbr::ProgressBar;
use std::error::Error as _;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;
use std::time::Duration;

type BinResult<T, E = Box<dyn std::error::Error + Send + Sync>> = Result<T, E>;

fn main() {
    if let Err(e) = bin_main() {
        eprintln!("error: {}", e);
        let mut source = e.source();
        while let Some(cause) = source {
            eprintln!("  caused by: {}", cause);
            source = cause.source();
        }
        std::process::exit(1);
    }
}

fn bin_main() -> BinResult<()> {
    let matches = App::new(crate_name!())
        .version(crate_version!())
        .about("Turns the screenshots of a browser performance trace into an animated GIF or numbered images")
        .setting(AppSettings::UnifiedHelpMessage)
        .setting(AppSettings::DeriveDisplayOrder)
        .setting(AppSettings::ArgRequiredElseHelp)
        .arg(Arg::with_name("output")
            .long("output")
            .short("o")
            .help("Destination GIF, or folder with --images")
            .empty_values(false)
            .takes_value(true)
            .value_name("timeline.gif"))
        .arg(Arg::with_name("images")
            .long("images")
            .help("Write numbered images instead of a GIF"))
        .arg(Arg::with_name("tmp")
            .long("tmp")
            .alias("folder")
            .help("Scratch folder for GIF frames. Files in it are deleted first!")
            .empty_values(false)
            .takes_value(true)
            .value_name("dir"))
        .arg(Arg::with_name("fps")
            .long("fps")
            .help("Frames per second")
            .empty_values(false)
            .value_name("num")
            .default_value("10"))
        .arg(Arg::with_name("prefix")
            .long("prefix")
            .help("File name prefix of the frames")
            .empty_values(false)
            .takes_value(true)
            .value_name("screenshot"))
        .arg(Arg::with_name("gap-fill")
            .long("gap-fill")
            .help("Repeat each screenshot until the next one, instead of sampling the whole trace"))
        .arg(Arg::with_name("category")
            .long("category")
            .help("Trace category that defines the start and end of the trace")
            .empty_values(false)
            .value_name("cat")
            .default_value(snapline::timeline::BOUNDARY_CATEGORY))
        .arg(Arg::with_name("jobs")
            .long("jobs")
            .short("j")
            .help("Number of frames written in parallel")
            .takes_value(true)
            .value_name("num"))
        .arg(Arg::with_name("encoder")
            .long("encoder")
            .help("GIF encoder to use")
            .possible_values(&["builtin", "imagemagick"])
            .default_value("builtin"))
        .arg(Arg::with_name("convert")
            .long("convert")
            .help("ImageMagick program for --encoder=imagemagick")
            .empty_values(false)
            .value_name("program")
            .default_value("convert"))
        .arg(Arg::with_name("quality")
            .long("quality")
            .value_name("1-100")
            .takes_value(true)
            .help("Lower quality may give smaller file (builtin encoder)"))
        .arg(Arg::with_name("fast")
            .long("fast")
            .help("Faster encoding, but lower quality (builtin encoder)"))
        .arg(Arg::with_name("once")
            .long("once")
            .help("Do not loop the GIF (builtin encoder)"))
        .arg(Arg::with_name("quiet")
            .long("quiet")
            .short("q")
            .help("Do not show a progress bar"))
        .arg(Arg::with_name("TRACE")
            .help("Trace JSON file, or - for stdin")
            .empty_values(false)
            .required(true))
        .get_matches_from(wild::args_os());

    let quiet = matches.is_present("quiet");
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let settings = Settings {
        output: matches.value_of_os("output").map(PathBuf::from),
        tmp: matches.value_of_os("tmp").map(PathBuf::from),
        fps: parse_opt(&matches, "fps").map_err(|e| format!("FPS must be a positive number: {}", e))?.unwrap_or(snapline::DEFAULT_FPS),
        prefix: matches.value_of("prefix").map(String::from),
        resampling: if matches.is_present("gap-fill") { Resampling::GapFill } else { Resampling::NearestPreceding },
        boundary_category: matches.value_of("category").unwrap_or(snapline::timeline::BOUNDARY_CATEGORY).to_owned(),
        jobs: parse_opt(&matches, "jobs").map_err(|e| format!("Invalid number of jobs: {}", e))?.unwrap_or(0),
    };

    let timeline = match matches.value_of_os("TRACE").ok_or("Missing trace")? {
        path if path == "-" => Timeline::from_reader(io::stdin().lock())?,
        path => {
            let file = File::open(path).map_err(|e| format!("Can't open {}: {}", PathBuf::from(path).display(), e))?;
            Timeline::from_reader(BufReader::new(file))?
        },
    };

    let mut progress: Box<dyn ProgressReporter> = if quiet {
        Box::new(NoProgress {})
    } else {
        let mut pb = ProgressBar::on(io::stderr(), 0);
        pb.show_speed = false;
        pb.show_percent = false;
        pb.format(" #_. ");
        pb.message("Frame ");
        pb.set_max_refresh_rate(Some(Duration::from_millis(250)));
        Box::new(pb)
    };

    if matches.is_present("images") {
        let dir = snapline::to_images(&timeline, &settings, &mut *progress)?;
        progress.done(&format!("snapline wrote frames to {}", dir.display()));
        return Ok(());
    }

    let mut encoder: Box<dyn Encoder> = match matches.value_of("encoder") {
        Some("imagemagick") => Box::new(ImageMagick::new(matches.value_of_os("convert").unwrap_or_else(|| "convert".as_ref()))),
        _ => Box::new(GifEncoder {
            quality: parse_opt(&matches, "quality").map_err(|e| format!("Invalid quality: {}", e))?.unwrap_or(100u8).min(100),
            fast: matches.is_present("fast"),
            once: matches.is_present("once"),
        }),
    };

    let gif = snapline::to_gif(&timeline, &settings, &mut *encoder, &mut *progress)?;
    progress.done(&format!("snapline created {}", gif.display()));
    Ok(())
}

fn parse_opt<T: std::str::FromStr<Err = std::num::ParseIntError>>(matches: &ArgMatches<'_>, name: &str) -> BinResult<Option<T>, std::num::ParseIntError> {
    match matches.value_of(name) {
        Some(s) => Ok(Some(s.parse()?)),
        None => Ok(None),
    }
}
