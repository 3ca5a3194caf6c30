//! # Transfer
//!
//! Resumable, recursive downloads and uploads.
//!
//! A job walks a tree with an explicit LIFO queue of [`TransferTask`]s, so entries are visited
//! depth-first in listing order. A failing file or directory is recorded in the
//! [`TransferReport`] and the job goes on with its siblings; only errors leaving the control
//! connection unusable abort the job.

mod report;
mod task;

use std::ffi::OsStr;
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind, Seek, SeekFrom};
use std::path::Path;

pub use report::{TransferFailure, TransferReport};
pub use task::{CancelToken, Direction, KnownKind, ResumePlan, TransferTask};
use task::{is_plain_name, join_remote};

use crate::command::Command;
use crate::options::TransferOptions;
use crate::types::{FtpError, FtpResult};
use crate::{FtpStream, Status};

impl FtpStream {
    /// Download `remote`, a file or a whole directory tree, to `local`.
    ///
    /// Partially downloaded files are resumed with `REST`; complete ones are skipped.
    ///
    /// ```no_run
    /// use mirrorftp::FtpStream;
    ///
    /// let mut ftp_stream = FtpStream::connect("127.0.0.1:21").unwrap();
    /// ftp_stream.login("test", "test").unwrap();
    /// let report = ftp_stream.download("/pub/docs", "/tmp/docs").unwrap();
    /// println!("{} files, {} bytes", report.files_transferred(), report.bytes_transferred());
    /// ```
    pub fn download<S: AsRef<str>, P: AsRef<Path>>(
        &mut self,
        remote: S,
        local: P,
    ) -> FtpResult<TransferReport> {
        self.download_with(remote, local, &CancelToken::new())
    }

    /// Same as [`FtpStream::download`], stopping at the next task boundary once `cancel` is cancelled
    pub fn download_with<S: AsRef<str>, P: AsRef<Path>>(
        &mut self,
        remote: S,
        local: P,
        cancel: &CancelToken,
    ) -> FtpResult<TransferReport> {
        let task = TransferTask::new(remote, local, Direction::Download, KnownKind::Unknown);
        self.run_job(task, cancel)
    }

    /// Upload `local`, a file or a whole directory tree, to `remote`.
    ///
    /// Partially uploaded files are resumed with `REST`; complete ones are skipped.
    pub fn upload<P: AsRef<Path>, S: AsRef<str>>(
        &mut self,
        local: P,
        remote: S,
    ) -> FtpResult<TransferReport> {
        self.upload_with(local, remote, &CancelToken::new())
    }

    /// Same as [`FtpStream::upload`], stopping at the next task boundary once `cancel` is cancelled
    pub fn upload_with<P: AsRef<Path>, S: AsRef<str>>(
        &mut self,
        local: P,
        remote: S,
        cancel: &CancelToken,
    ) -> FtpResult<TransferReport> {
        let task = TransferTask::new(remote, local, Direction::Upload, KnownKind::Unknown);
        self.run_job(task, cancel)
    }

    fn run_job(&mut self, root: TransferTask, cancel: &CancelToken) -> FtpResult<TransferReport> {
        info!(
            "{:?} {} <-> {}",
            root.direction(),
            root.remote(),
            root.local().display()
        );
        let options = *self.options();
        self.apply_transfer_settings(&options)?;
        let origin = self.pwd()?;
        let mut job = Job {
            stream: self,
            options,
            origin,
            report: TransferReport::default(),
        };

        let mut queue = vec![root];
        while let Some(task) = queue.pop() {
            if cancel.is_cancelled() {
                warn!("job cancelled with {} tasks left", queue.len() + 1);
                job.report.mark_cancelled();
                break;
            }
            match job.run_task(&task) {
                Ok(children) => queue.extend(children.into_iter().rev()),
                Err(err) if err.is_session_fatal() => {
                    error!("{}: {err}; aborting job", task.remote());
                    return Err(err);
                }
                Err(err) => {
                    warn!("{}: {err}", task.remote());
                    job.report.record_failure(task.remote(), err);
                }
            }
        }

        let report = job.report;
        info!(
            "job done: {} files, {} bytes, {} skipped, {} rejected, {} failed",
            report.files_transferred(),
            report.bytes_transferred(),
            report.skipped().len(),
            report.rejected().len(),
            report.failures().len()
        );
        Ok(report)
    }
}

/// State of one running job
struct Job<'a> {
    stream: &'a mut FtpStream,
    options: TransferOptions,
    /// Working directory when the job started; every probe returns there
    origin: String,
    report: TransferReport,
}

impl Job<'_> {
    /// Run `task`, returning the tasks of its children
    fn run_task(&mut self, task: &TransferTask) -> FtpResult<Vec<TransferTask>> {
        match task.direction() {
            Direction::Download => self.download(task),
            Direction::Upload => self.upload(task),
        }
    }

    // -- download

    fn download(&mut self, task: &TransferTask) -> FtpResult<Vec<TransferTask>> {
        let is_directory = match task.kind() {
            KnownKind::Directory => true,
            KnownKind::File => false,
            KnownKind::Unknown => self.probe_directory(task.remote())?,
        };
        if is_directory {
            self.download_directory(task)
        } else {
            self.download_file(task).map(|_| Vec::new())
        }
    }

    /// A remote path is a directory if the server lets us enter it
    fn probe_directory(&mut self, path: &str) -> FtpResult<bool> {
        match self.stream.cwd(path) {
            Ok(()) => {
                self.return_to_origin()?;
                Ok(true)
            }
            Err(FtpError::NavigationError(response)) => {
                trace!("{path} is not a directory: {response}");
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    fn download_directory(&mut self, task: &TransferTask) -> FtpResult<Vec<TransferTask>> {
        debug!(
            "Downloading directory {} into {}",
            task.remote(),
            task.local().display()
        );
        fs::create_dir_all(task.local()).map_err(FtpError::TransferError)?;
        let entries = match self.stream.list_entries(Some(task.remote())) {
            Ok(entries) => entries,
            Err(err) if is_rejection(&err) => {
                warn!("listing of {} rejected: {err}", task.remote());
                self.report.record_rejection(task.remote());
                return Ok(Vec::new());
            }
            Err(err) => return Err(err),
        };

        let mut children = Vec::with_capacity(entries.len());
        for entry in entries.iter() {
            // the name becomes a local path: it must not leave the target directory
            if !is_plain_name(entry.name()) {
                let path = join_remote(task.remote(), entry.name());
                warn!("refusing to download {path}: not a plain file name");
                self.report.record_failure(
                    &path,
                    FtpError::TransferError(io::Error::new(
                        ErrorKind::InvalidData,
                        format!("unsafe entry name {:?}", entry.name()),
                    )),
                );
                continue;
            }
            // symlinks may point to either; probe them
            let kind = if entry.is_directory() {
                KnownKind::Directory
            } else if entry.is_symlink() {
                KnownKind::Unknown
            } else {
                KnownKind::File
            };
            children.push(task.child(OsStr::new(entry.name()), kind));
        }

        Ok(children)
    }

    fn download_file(&mut self, task: &TransferTask) -> FtpResult<()> {
        let local_size = fs::metadata(task.local())
            .ok()
            .filter(|metadata| metadata.is_file())
            .map(|metadata| metadata.len());
        let remote_size = match local_size {
            Some(size) if size > 0 && self.options.verify_resume() => {
                self.remote_size(task.remote())?
            }
            _ => None,
        };
        let plan = ResumePlan::for_download(local_size.unwrap_or(0), remote_size);
        if plan == ResumePlan::Skip {
            debug!("{} is already complete", task.local().display());
            self.report.record_skip(task.remote());
            return Ok(());
        }

        if let Some(parent) = task.local().parent() {
            fs::create_dir_all(parent).map_err(FtpError::TransferError)?;
        }
        let pending = self.stream.prepare_data_connection(&self.options)?;
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(task.local())
            .map_err(FtpError::TransferError)?;
        let offset = self.request_offset(plan.offset())?;
        file.set_len(offset).map_err(FtpError::TransferError)?;
        file.seek(SeekFrom::Start(offset))
            .map_err(FtpError::TransferError)?;

        debug!(
            "Downloading {} to {} from offset {offset}",
            task.remote(),
            task.local().display()
        );
        match self
            .stream
            .receive_with(pending, Command::Retr(task.remote().to_string()), &mut file)
        {
            Ok(bytes) => {
                info!("downloaded {} ({bytes} bytes)", task.remote());
                self.report.record_transfer(bytes);
                Ok(())
            }
            Err(err) if is_rejection(&err) => {
                warn!("download of {} rejected: {err}", task.remote());
                drop(file);
                if local_size.is_none() {
                    if let Err(err) = fs::remove_file(task.local()) {
                        debug!("could not remove {}: {err}", task.local().display());
                    }
                }
                self.report.record_rejection(task.remote());
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    // -- upload

    fn upload(&mut self, task: &TransferTask) -> FtpResult<Vec<TransferTask>> {
        let metadata = fs::metadata(task.local()).map_err(FtpError::TransferError)?;
        if metadata.is_dir() {
            self.upload_directory(task)
        } else {
            self.upload_file(task, metadata.len()).map(|_| Vec::new())
        }
    }

    fn upload_directory(&mut self, task: &TransferTask) -> FtpResult<Vec<TransferTask>> {
        debug!(
            "Uploading directory {} into {}",
            task.local().display(),
            task.remote()
        );
        match self.stream.mkdir(task.remote()) {
            Ok(()) => debug!("created {}", task.remote()),
            Err(FtpError::UnexpectedResponse(response)) => {
                debug!("MKD {} refused, it may exist already: {response}", task.remote())
            }
            Err(err) => return Err(err),
        }
        // the directory must exist now, whoever created it
        self.stream.cwd(task.remote())?;
        self.return_to_origin()?;

        let mut names = fs::read_dir(task.local())
            .and_then(|entries| {
                entries
                    .map(|entry| entry.map(|entry| entry.file_name()))
                    .collect::<Result<Vec<_>, _>>()
            })
            .map_err(FtpError::TransferError)?;
        names.sort();

        Ok(names
            .iter()
            .map(|name| task.child(name, KnownKind::Unknown))
            .collect())
    }

    fn upload_file(&mut self, task: &TransferTask, local_size: u64) -> FtpResult<()> {
        let remote_size = self.remote_size(task.remote())?;
        let plan = ResumePlan::for_upload(local_size, remote_size);
        if plan == ResumePlan::Skip {
            debug!("{} is already complete", task.remote());
            self.report.record_skip(task.remote());
            return Ok(());
        }

        let pending = self.stream.prepare_data_connection(&self.options)?;
        let mut file = File::open(task.local()).map_err(FtpError::TransferError)?;
        let offset = self.request_offset(plan.offset())?;
        file.seek(SeekFrom::Start(offset))
            .map_err(FtpError::TransferError)?;

        debug!(
            "Uploading {} to {} from offset {offset}",
            task.local().display(),
            task.remote()
        );
        match self
            .stream
            .send_with(pending, Command::Store(task.remote().to_string()), &mut file)
        {
            Ok(bytes) => {
                info!("uploaded {} ({bytes} bytes)", task.remote());
                self.report.record_transfer(bytes);
                Ok(())
            }
            Err(err) if is_rejection(&err) => {
                warn!("upload of {} rejected: {err}", task.remote());
                self.report.record_rejection(task.remote());
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    // -- helpers

    /// Size of a remote file; `None` when the server can't tell
    fn remote_size(&mut self, path: &str) -> FtpResult<Option<u64>> {
        match self.stream.size(path) {
            Ok(size) => Ok(Some(size)),
            Err(FtpError::UnexpectedResponse(response)) => {
                debug!("size of {path} is unknown: {response}");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Send `REST offset` when `offset` > 0. Returns the offset the transfer starts from:
    /// 0 if the server refused to restart.
    fn request_offset(&mut self, offset: u64) -> FtpResult<u64> {
        if offset == 0 {
            return Ok(0);
        }
        match self.stream.resume_transfer(offset) {
            Ok(()) => Ok(offset),
            Err(FtpError::UnexpectedResponse(response)) => {
                warn!("REST {offset} refused, restarting from 0: {response}");
                Ok(0)
            }
            Err(err) => Err(err),
        }
    }

    /// Every later relative path depends on the working directory, so losing it ends the job
    fn return_to_origin(&mut self) -> FtpResult<()> {
        let origin = self.origin.clone();
        self.stream.cwd(&origin).map_err(|err| match err {
            FtpError::NavigationError(response) => {
                FtpError::ProtocolError(format!("cannot return to {origin}: {response}"))
            }
            err => err,
        })
    }
}

/// Whether the server refused the file itself (550), as opposed to failing to transfer it
fn is_rejection(err: &FtpError) -> bool {
    err.response()
        .is_some_and(|response| response.status == Status::FileUnavailable)
}
