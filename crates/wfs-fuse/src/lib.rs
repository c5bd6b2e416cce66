#![forbid(unsafe_code)]
//! FUSE adapter for WFS images.
//!
//! Kernel requests arrive through `fuser`, are forwarded to a [`FsOps`]
//! implementation (normally `wfs_core::WfsImage`), and errors are mapped
//! through [`WfsError::to_errno()`].

use fuser::{
    FileAttr, FileType, Filesystem, KernelConfig, MountOption, ReplyAttr, ReplyCreate, ReplyData,
    ReplyDirectory, ReplyEmpty, ReplyEntry, ReplyOpen, ReplyWrite, Request,
};
use std::ffi::OsStr;
use std::os::raw::c_int;
#[cfg(unix)]
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, trace, warn};
use wfs_core::{FileType as WfsFileType, FsOps, InodeAttr, InodeNumber};
use wfs_error::WfsError;

/// TTL for cached attributes and entries.
///
/// The mount never changes the image, so a long TTL is safe.
const ATTR_TTL: Duration = Duration::from_secs(60);

// ── Error type ──────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum FuseError {
    #[error("invalid mountpoint: {0}")]
    InvalidMountpoint(String),
    #[error("mount I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ── FUSE error context ─────────────────────────────────────────────────────

/// Operation, inode and offset of a failed request, for the error log.
pub struct FuseErrorContext<'a> {
    pub error: &'a WfsError,
    pub operation: &'static str,
    pub ino: u64,
    pub offset: Option<u64>,
}

impl FuseErrorContext<'_> {
    /// Log the failure and return the errno for the reply.
    pub fn log_and_errno(&self) -> c_int {
        let errno = self.error.to_errno();
        if errno == libc::ENOENT {
            trace!(
                op = self.operation,
                ino = self.ino,
                errno,
                error = %self.error,
                "FUSE op returned ENOENT"
            );
        } else if self.error.is_corrupt_format() {
            warn!(
                op = self.operation,
                ino = self.ino,
                offset = self.offset,
                errno,
                error = %self.error,
                "corrupt image detected while serving request"
            );
        } else {
            warn!(
                op = self.operation,
                ino = self.ino,
                offset = self.offset,
                errno,
                error = %self.error,
                "FUSE op failed"
            );
        }
        errno
    }
}

// ── Type conversions ────────────────────────────────────────────────────────

fn to_fuser_file_type(ft: WfsFileType) -> FileType {
    match ft {
        WfsFileType::RegularFile => FileType::RegularFile,
        WfsFileType::Directory => FileType::Directory,
    }
}

fn to_file_attr(attr: &InodeAttr) -> FileAttr {
    FileAttr {
        ino: attr.ino.0,
        size: attr.size,
        blocks: attr.blocks,
        atime: attr.atime,
        mtime: attr.mtime,
        ctime: attr.ctime,
        crtime: attr.crtime,
        kind: to_fuser_file_type(attr.kind),
        perm: attr.perm,
        nlink: attr.nlink,
        uid: attr.uid,
        gid: attr.gid,
        rdev: attr.rdev,
        blksize: attr.blksize,
        flags: 0,
    }
}

// ── Mount options ───────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct MountOptions {
    pub read_only: bool,
    pub allow_other: bool,
    pub auto_unmount: bool,
}

impl Default for MountOptions {
    fn default() -> Self {
        Self {
            read_only: true,
            allow_other: false,
            auto_unmount: true,
        }
    }
}

// ── Atomic metrics ──────────────────────────────────────────────────────────

/// Lock-free per-mount request counters.
#[derive(Default)]
pub struct AtomicMetrics {
    requests_total: AtomicU64,
    requests_ok: AtomicU64,
    requests_err: AtomicU64,
    bytes_read: AtomicU64,
}

impl AtomicMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn record_ok(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        self.requests_ok.fetch_add(1, Ordering::Relaxed);
    }

    fn record_err(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        self.requests_err.fetch_add(1, Ordering::Relaxed);
    }

    fn record_bytes_read(&self, n: u64) {
        self.bytes_read.fetch_add(n, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_total: self.requests_total.load(Ordering::Relaxed),
            requests_ok: self.requests_ok.load(Ordering::Relaxed),
            requests_err: self.requests_err.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for AtomicMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.snapshot().fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub requests_total: u64,
    pub requests_ok: u64,
    pub requests_err: u64,
    pub bytes_read: u64,
}

// ── FUSE filesystem adapter ─────────────────────────────────────────────────

struct FuseInner {
    ops: Arc<dyn FsOps>,
    metrics: Arc<AtomicMetrics>,
    read_only: bool,
}

/// FUSE adapter that delegates every request to a [`FsOps`] implementation.
pub struct WfsFuse {
    inner: Arc<FuseInner>,
}

const _: () = {
    const fn assert_send_sync<T: Send + Sync>() {}
    let _ = assert_send_sync::<WfsFuse>;
};

impl std::fmt::Debug for WfsFuse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WfsFuse")
            .field("metrics", &self.inner.metrics)
            .field("read_only", &self.inner.read_only)
            .finish_non_exhaustive()
    }
}

impl WfsFuse {
    #[must_use]
    pub fn new(ops: Box<dyn FsOps>) -> Self {
        Self::with_options(ops, &MountOptions::default())
    }

    #[must_use]
    pub fn with_options(ops: Box<dyn FsOps>, options: &MountOptions) -> Self {
        info!(read_only = options.read_only, "WfsFuse initialized");
        Self {
            inner: Arc::new(FuseInner {
                ops: Arc::from(ops),
                metrics: Arc::new(AtomicMetrics::new()),
                read_only: options.read_only,
            }),
        }
    }

    #[must_use]
    pub fn metrics(&self) -> &AtomicMetrics {
        &self.inner.metrics
    }

    /// Run one request against the backing ops and count the outcome.
    fn call<T, F>(&self, f: F) -> wfs_error::Result<T>
    where
        F: FnOnce(&dyn FsOps) -> wfs_error::Result<T>,
    {
        let result = f(self.inner.ops.as_ref());
        match &result {
            Ok(_) => self.inner.metrics.record_ok(),
            Err(_) => self.inner.metrics.record_err(),
        }
        result
    }

    /// Stateless open: check the inode exists and has the expected kind.
    fn check_open(&self, ino: u64, flags: i32, want: WfsFileType) -> wfs_error::Result<()> {
        self.call(|ops| {
            let attr = ops.getattr(InodeNumber(ino))?;
            match (attr.kind, want) {
                (WfsFileType::Directory, WfsFileType::RegularFile) => {
                    return Err(WfsError::IsDirectory);
                }
                (WfsFileType::RegularFile, WfsFileType::Directory) => {
                    return Err(WfsError::NotDirectory);
                }
                _ => {}
            }
            if self.inner.read_only && flags & libc::O_ACCMODE != libc::O_RDONLY {
                return Err(WfsError::ReadOnly);
            }
            Ok(())
        })
    }

    /// EROFS on a read-only mount, otherwise whatever the backing ops say.
    fn mutate<T, F>(&self, f: F) -> wfs_error::Result<T>
    where
        F: FnOnce(&dyn FsOps) -> wfs_error::Result<T>,
    {
        if self.inner.read_only {
            self.inner.metrics.record_err();
            return Err(WfsError::ReadOnly);
        }
        self.call(f)
    }

    fn reply_error_attr(ctx: &FuseErrorContext<'_>, reply: ReplyAttr) {
        reply.error(ctx.log_and_errno());
    }

    fn reply_error_entry(ctx: &FuseErrorContext<'_>, reply: ReplyEntry) {
        reply.error(ctx.log_and_errno());
    }

    fn reply_error_data(ctx: &FuseErrorContext<'_>, reply: ReplyData) {
        reply.error(ctx.log_and_errno());
    }

    fn reply_error_dir(ctx: &FuseErrorContext<'_>, reply: ReplyDirectory) {
        reply.error(ctx.log_and_errno());
    }

    fn reply_error_empty(ctx: &FuseErrorContext<'_>, reply: ReplyEmpty) {
        reply.error(ctx.log_and_errno());
    }
}

impl Filesystem for WfsFuse {
    fn init(&mut self, _req: &Request<'_>, _config: &mut KernelConfig) -> Result<(), c_int> {
        Ok(())
    }

    fn destroy(&mut self) {
        info!(metrics = ?self.inner.metrics.snapshot(), "WfsFuse unmounted");
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
        match self.call(|ops| ops.getattr(InodeNumber(ino))) {
            Ok(attr) => reply.attr(&ATTR_TTL, &to_file_attr(&attr)),
            Err(e) => {
                Self::reply_error_attr(
                    &FuseErrorContext {
                        error: &e,
                        operation: "getattr",
                        ino,
                        offset: None,
                    },
                    reply,
                );
            }
        }
    }

    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        match self.call(|ops| ops.lookup(InodeNumber(parent), name)) {
            Ok(attr) => reply.entry(&ATTR_TTL, &to_file_attr(&attr), 0),
            Err(e) => {
                Self::reply_error_entry(
                    &FuseErrorContext {
                        error: &e,
                        operation: "lookup",
                        ino: parent,
                        offset: None,
                    },
                    reply,
                );
            }
        }
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, flags: i32, reply: ReplyOpen) {
        match self.check_open(ino, flags, WfsFileType::RegularFile) {
            Ok(()) => reply.opened(0, 0),
            Err(e) => {
                let ctx = FuseErrorContext {
                    error: &e,
                    operation: "open",
                    ino,
                    offset: None,
                };
                reply.error(ctx.log_and_errno());
            }
        }
    }

    fn opendir(&mut self, _req: &Request<'_>, ino: u64, flags: i32, reply: ReplyOpen) {
        match self.check_open(ino, flags, WfsFileType::Directory) {
            Ok(()) => reply.opened(0, 0),
            Err(e) => {
                let ctx = FuseErrorContext {
                    error: &e,
                    operation: "opendir",
                    ino,
                    offset: None,
                };
                reply.error(ctx.log_and_errno());
            }
        }
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        let Ok(byte_offset) = u64::try_from(offset) else {
            reply.error(libc::EINVAL);
            return;
        };
        match self.call(|ops| ops.read(InodeNumber(ino), byte_offset, size)) {
            Ok(data) => {
                self.inner
                    .metrics
                    .record_bytes_read(u64::try_from(data.len()).unwrap_or(u64::MAX));
                reply.data(&data);
            }
            Err(e) => {
                Self::reply_error_data(
                    &FuseErrorContext {
                        error: &e,
                        operation: "read",
                        ino,
                        offset: Some(byte_offset),
                    },
                    reply,
                );
            }
        }
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        let fs_offset = u64::try_from(offset).unwrap_or(0);
        match self.call(|ops| ops.readdir(InodeNumber(ino), fs_offset)) {
            Ok(entries) => {
                for entry in &entries {
                    #[cfg(unix)]
                    let name = OsStr::from_bytes(&entry.name);
                    #[cfg(not(unix))]
                    let owned_name = entry.name_str();
                    #[cfg(not(unix))]
                    let name = OsStr::new(&owned_name);

                    let full = reply.add(
                        entry.ino.0,
                        i64::try_from(entry.offset).unwrap_or(i64::MAX),
                        to_fuser_file_type(entry.kind),
                        name,
                    );
                    if full {
                        break;
                    }
                }
                reply.ok();
            }
            Err(e) => {
                Self::reply_error_dir(
                    &FuseErrorContext {
                        error: &e,
                        operation: "readdir",
                        ino,
                        offset: Some(fs_offset),
                    },
                    reply,
                );
            }
        }
    }

    fn mkdir(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        reply: ReplyEntry,
    ) {
        match self.mutate(|ops| ops.mkdir(InodeNumber(parent), name)) {
            Ok(attr) => reply.entry(&ATTR_TTL, &to_file_attr(&attr), 0),
            Err(e) => {
                Self::reply_error_entry(
                    &FuseErrorContext {
                        error: &e,
                        operation: "mkdir",
                        ino: parent,
                        offset: None,
                    },
                    reply,
                );
            }
        }
    }

    fn rmdir(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        match self.mutate(|ops| ops.rmdir(InodeNumber(parent), name)) {
            Ok(()) => reply.ok(),
            Err(e) => {
                Self::reply_error_empty(
                    &FuseErrorContext {
                        error: &e,
                        operation: "rmdir",
                        ino: parent,
                        offset: None,
                    },
                    reply,
                );
            }
        }
    }

    fn unlink(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        match self.mutate(|ops| ops.unlink(InodeNumber(parent), name)) {
            Ok(()) => reply.ok(),
            Err(e) => {
                Self::reply_error_empty(
                    &FuseErrorContext {
                        error: &e,
                        operation: "unlink",
                        ino: parent,
                        offset: None,
                    },
                    reply,
                );
            }
        }
    }

    fn create(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        _flags: i32,
        reply: ReplyCreate,
    ) {
        match self.mutate(|ops| ops.create(InodeNumber(parent), name)) {
            Ok(attr) => reply.created(&ATTR_TTL, &to_file_attr(&attr), 0, 0, 0),
            Err(e) => {
                let ctx = FuseErrorContext {
                    error: &e,
                    operation: "create",
                    ino: parent,
                    offset: None,
                };
                reply.error(ctx.log_and_errno());
            }
        }
    }

    fn write(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        let byte_offset = u64::try_from(offset).unwrap_or(0);
        match self.mutate(|ops| ops.write(InodeNumber(ino), byte_offset, data)) {
            Ok(written) => reply.written(written),
            Err(e) => {
                let ctx = FuseErrorContext {
                    error: &e,
                    operation: "write",
                    ino,
                    offset: Some(byte_offset),
                };
                reply.error(ctx.log_and_errno());
            }
        }
    }
}

// ── Mount entrypoint ────────────────────────────────────────────────────────

fn build_mount_options(options: &MountOptions) -> Vec<MountOption> {
    let mut opts = vec![
        MountOption::FSName("wfs".to_owned()),
        MountOption::Subtype("wfs".to_owned()),
        MountOption::DefaultPermissions,
        MountOption::NoAtime,
    ];

    if options.read_only {
        opts.push(MountOption::RO);
    }
    if options.allow_other {
        opts.push(MountOption::AllowOther);
    }
    if options.auto_unmount {
        opts.push(MountOption::AutoUnmount);
    }

    opts
}

fn check_mountpoint(mountpoint: &Path) -> Result<(), FuseError> {
    if mountpoint.as_os_str().is_empty() {
        return Err(FuseError::InvalidMountpoint(
            "mountpoint cannot be empty".to_owned(),
        ));
    }
    if !mountpoint.is_dir() {
        return Err(FuseError::InvalidMountpoint(format!(
            "{} is not a directory",
            mountpoint.display()
        )));
    }
    Ok(())
}

/// Mount at `mountpoint` and block until the filesystem is unmounted.
pub fn mount(
    ops: Box<dyn FsOps>,
    mountpoint: impl AsRef<Path>,
    options: &MountOptions,
) -> Result<(), FuseError> {
    let mountpoint = mountpoint.as_ref();
    check_mountpoint(mountpoint)?;
    let fuse_opts = build_mount_options(options);
    let fs = WfsFuse::with_options(ops, options);
    info!(mountpoint = %mountpoint.display(), "mounting WFS image");
    fuser::mount2(fs, mountpoint, &fuse_opts)?;
    Ok(())
}

/// Mount in the background. Dropping the session unmounts.
pub fn mount_background(
    ops: Box<dyn FsOps>,
    mountpoint: impl AsRef<Path>,
    options: &MountOptions,
) -> Result<fuser::BackgroundSession, FuseError> {
    let mountpoint = mountpoint.as_ref();
    check_mountpoint(mountpoint)?;
    let fuse_opts = build_mount_options(options);
    let fs = WfsFuse::with_options(ops, options);
    info!(mountpoint = %mountpoint.display(), "mounting WFS image in background");
    let session = fuser::spawn_mount2(fs, mountpoint, &fuse_opts)?;
    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;
    use wfs_core::{OpenOptions, WfsImage};
    use wfs_harness::ImageBuilder;

    fn sample_ops() -> Box<dyn FsOps> {
        let mut builder = ImageBuilder::new();
        builder.add_dir("/etc").unwrap();
        builder.add_file("/etc/motd", b"welcome\n").unwrap();
        Box::new(
            WfsImage::from_device(Box::new(builder.build()), &OpenOptions::default()).unwrap(),
        )
    }

    fn motd_ino(fuse: &WfsFuse) -> u64 {
        let etc = fuse
            .call(|ops| ops.lookup(InodeNumber::ROOT, OsStr::new("etc")))
            .unwrap();
        fuse.call(|ops| ops.lookup(etc.ino, OsStr::new("motd")))
            .unwrap()
            .ino
            .0
    }

    #[test]
    fn file_type_conversion() {
        assert_eq!(
            to_fuser_file_type(WfsFileType::RegularFile),
            FileType::RegularFile
        );
        assert_eq!(
            to_fuser_file_type(WfsFileType::Directory),
            FileType::Directory
        );
    }

    #[test]
    fn inode_attr_to_file_attr_conversion() {
        let iattr = InodeAttr {
            ino: InodeNumber(4112),
            size: 900,
            blocks: 2,
            atime: SystemTime::UNIX_EPOCH,
            mtime: SystemTime::UNIX_EPOCH,
            ctime: SystemTime::UNIX_EPOCH,
            crtime: SystemTime::UNIX_EPOCH,
            kind: WfsFileType::RegularFile,
            perm: 0o444,
            nlink: 1,
            uid: 0,
            gid: 0,
            rdev: 0,
            blksize: 512,
        };
        let fattr = to_file_attr(&iattr);
        assert_eq!(fattr.ino, 4112);
        assert_eq!(fattr.size, 900);
        assert_eq!(fattr.blocks, 2);
        assert_eq!(fattr.kind, FileType::RegularFile);
        assert_eq!(fattr.perm, 0o444);
        assert_eq!(fattr.nlink, 1);
        assert_eq!(fattr.blksize, 512);
        assert_eq!(fattr.flags, 0);
    }

    #[test]
    fn mount_options_default_is_read_only() {
        let opts = MountOptions::default();
        assert!(opts.read_only);
        assert!(!opts.allow_other);
        assert!(opts.auto_unmount);
    }

    #[test]
    fn build_mount_options_follows_flags() {
        let opts = build_mount_options(&MountOptions::default());
        assert!(opts.contains(&MountOption::RO));
        assert!(opts.contains(&MountOption::AutoUnmount));
        assert!(!opts.contains(&MountOption::AllowOther));

        let writable = build_mount_options(&MountOptions {
            read_only: false,
            allow_other: true,
            auto_unmount: false,
        });
        assert!(!writable.contains(&MountOption::RO));
        assert!(writable.contains(&MountOption::AllowOther));
        assert_eq!(writable.len(), 5);
    }

    #[test]
    fn mount_rejects_bad_mountpoints() {
        let err = mount(sample_ops(), "", &MountOptions::default()).unwrap_err();
        assert!(matches!(err, FuseError::InvalidMountpoint(_)));

        let file = tempfile::NamedTempFile::new().unwrap();
        let err = mount(sample_ops(), file.path(), &MountOptions::default()).unwrap_err();
        assert!(matches!(err, FuseError::InvalidMountpoint(_)));
    }

    #[test]
    fn open_checks_kind_and_access_mode() {
        let fuse = WfsFuse::new(sample_ops());
        let motd = motd_ino(&fuse);
        let root = InodeNumber::ROOT.0;

        assert!(fuse.check_open(motd, libc::O_RDONLY, WfsFileType::RegularFile).is_ok());
        assert!(fuse.check_open(root, libc::O_RDONLY, WfsFileType::Directory).is_ok());
        assert!(matches!(
            fuse.check_open(root, libc::O_RDONLY, WfsFileType::RegularFile),
            Err(WfsError::IsDirectory)
        ));
        assert!(matches!(
            fuse.check_open(motd, libc::O_RDONLY, WfsFileType::Directory),
            Err(WfsError::NotDirectory)
        ));
        let err = fuse
            .check_open(motd, libc::O_WRONLY, WfsFileType::RegularFile)
            .unwrap_err();
        assert_eq!(err.to_errno(), libc::EROFS);
    }

    #[test]
    fn mutations_are_erofs_when_read_only_else_enosys() {
        let ro = WfsFuse::new(sample_ops());
        let err = ro
            .mutate(|ops| ops.mkdir(InodeNumber::ROOT, OsStr::new("new")))
            .unwrap_err();
        assert_eq!(err.to_errno(), libc::EROFS);

        let rw = WfsFuse::with_options(
            sample_ops(),
            &MountOptions {
                read_only: false,
                ..MountOptions::default()
            },
        );
        let motd = motd_ino(&rw);
        let err = rw
            .mutate(|ops| ops.write(InodeNumber(motd), 0, b"x"))
            .unwrap_err();
        assert_eq!(err.to_errno(), libc::ENOSYS);
        let err = rw
            .mutate(|ops| ops.unlink(InodeNumber::ROOT, OsStr::new("etc")))
            .unwrap_err();
        assert_eq!(err.to_errno(), libc::ENOSYS);
    }

    #[test]
    fn metrics_count_outcomes() {
        let fuse = WfsFuse::new(sample_ops());
        let motd = motd_ino(&fuse);
        let _ = fuse.call(|ops| ops.getattr(InodeNumber(3)));
        let _ = fuse.mutate(|ops| ops.rmdir(InodeNumber::ROOT, OsStr::new("etc")));

        let snap = fuse.metrics().snapshot();
        assert_eq!(snap.requests_total, 4);
        assert_eq!(snap.requests_ok, 2);
        assert_eq!(snap.requests_err, 2);

        let data = fuse.call(|ops| ops.read(InodeNumber(motd), 0, 4096)).unwrap();
        assert_eq!(data, b"welcome\n");
    }

    #[test]
    fn error_context_maps_errno() {
        let err = WfsError::NotFound("x".into());
        let ctx = FuseErrorContext {
            error: &err,
            operation: "lookup",
            ino: 1,
            offset: None,
        };
        assert_eq!(ctx.log_and_errno(), libc::ENOENT);

        let err = WfsError::Corruption {
            block: 3,
            detail: "cycle".into(),
        };
        let ctx = FuseErrorContext {
            error: &err,
            operation: "read",
            ino: 4112,
            offset: Some(0),
        };
        assert_eq!(ctx.log_and_errno(), libc::EIO);
    }
}
