use crate::error::*;
use crate::materialize::save_snapshot;
use crate::progress::ProgressReporter;
use crate::timeline::Entry;
use crossbeam_channel::{bounded, unbounded};
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering::SeqCst;
use std::thread;

/// A frame to write. Every job has its own `path`.
pub(crate) struct FrameJob<'a> {
    pub index: usize,
    pub path: PathBuf,
    pub entry: &'a Entry,
}

/// Writes all frames using up to `workers` threads.
///
/// Stops at the first failure; frames already written stay on disk.
pub(crate) fn write_all(jobs: Vec<FrameJob<'_>>, workers: usize, reporter: &mut dyn ProgressReporter) -> CatResult<()> {
    let workers = workers.clamp(1, jobs.len().max(1));
    let (job_tx, job_rx) = bounded::<FrameJob<'_>>(workers * 2);
    let (done_tx, done_rx) = unbounded::<CatResult<usize>>();
    // failure on one thread must stop the others
    let failed = AtomicBool::new(false);
    let failed = &failed;

    thread::scope(|s| {
        for n in 0..workers {
            let job_rx = job_rx.clone();
            let done_tx = done_tx.clone();
            thread::Builder::new().name(format!("write{}", n)).spawn_scoped(s, move || {
                for job in job_rx {
                    if failed.load(SeqCst) {
                        break;
                    }
                    let res = save_snapshot(job.entry, &job.path).map(|_| job.index);
                    if res.is_err() {
                        failed.store(true, SeqCst);
                    }
                    if done_tx.send(res).is_err() {
                        break;
                    }
                }
            }).map_err(|_| Error::ThreadSend)?;
        }
        drop(job_rx);
        drop(done_tx);

        thread::Builder::new().name("feed".into()).spawn_scoped(s, move || {
            for job in jobs {
                if failed.load(SeqCst) || job_tx.send(job).is_err() {
                    break;
                }
            }
        }).map_err(|_| Error::ThreadSend)?;

        let mut first_err = None;
        for res in done_rx {
            match res {
                Ok(index) => {
                    log::trace!("frame {} written", index);
                    if first_err.is_none() && !reporter.increase() {
                        failed.store(true, SeqCst);
                        first_err = Some(Error::Aborted);
                    }
                },
                Err(err) => {
                    failed.store(true, SeqCst);
                    first_err.get_or_insert(err);
                },
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoProgress;
    use std::fs;
    use tempfile::TempDir;

    const PIXEL_PNG: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

    struct Counter(u64, u64);

    impl ProgressReporter for Counter {
        fn increase(&mut self) -> bool {
            self.0 += 1;
            self.0 < self.1
        }
    }

    fn jobs<'a>(dir: &TempDir, entries: &'a [Entry]) -> Vec<FrameJob<'a>> {
        entries.iter().enumerate().map(|(index, entry)| FrameJob {
            index,
            path: dir.path().join(format!("f-{:04}.png", index)),
            entry,
        }).collect()
    }

    #[test]
    fn writes_every_frame() {
        let dir = TempDir::new().unwrap();
        let entries = vec![Entry::screenshot("devtools.timeline", 0, PIXEL_PNG); 40];
        let mut counter = Counter(0, u64::MAX);
        write_all(jobs(&dir, &entries), 4, &mut counter).unwrap();
        assert_eq!(counter.0, 40);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 40);
    }

    #[test]
    fn single_worker() {
        let dir = TempDir::new().unwrap();
        let entries = vec![Entry::screenshot("devtools.timeline", 0, PIXEL_PNG); 3];
        write_all(jobs(&dir, &entries), 0, &mut NoProgress {}).unwrap();
        assert!(dir.path().join("f-0002.png").exists());
    }

    #[test]
    fn no_frames() {
        write_all(Vec::new(), 8, &mut NoProgress {}).unwrap();
    }

    #[test]
    fn fails_on_bad_frame() {
        let dir = TempDir::new().unwrap();
        let mut entries = vec![Entry::screenshot("devtools.timeline", 0, PIXEL_PNG); 20];
        entries[5] = Entry::new("Screenshot", "devtools.timeline", 5);
        let err = write_all(jobs(&dir, &entries), 3, &mut NoProgress {}).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    #[test]
    fn reporter_can_abort() {
        let dir = TempDir::new().unwrap();
        let entries = vec![Entry::screenshot("devtools.timeline", 0, PIXEL_PNG); 50];
        let mut counter = Counter(0, 2);
        let err = write_all(jobs(&dir, &entries), 2, &mut counter).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Aborted);
    }
}
