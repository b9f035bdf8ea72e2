// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Operation table forwarding every filesystem verb to the backing store.
//!
//! The kernel-facing `fuser::Filesystem` impl at the bottom of this file is
//! pure glue: each method calls the matching `do_*` handler and translates
//! its `io::Result` into a reply. The handlers themselves are callable
//! without a mounted filesystem, which is how the tests drive them.
//!
//! The kernel addresses objects by inode, so the dispatcher keeps a table
//! from inode to virtual path, maintained by lookup/create/mkdir/mknod,
//! patched on rename, and trimmed by forget. Inode numbers are the backing
//! filesystem's own, with the backing root aliased to `FUSE_ROOT_ID`.
//! Everything a handler touches besides these tables is the immutable path
//! resolver, so handlers are safe to run concurrently.

use std::collections::btree_map;
use std::collections::BTreeMap;
use std::ffi::CStr;
use std::ffi::OsStr;
use std::fs::File;
use std::io;
use std::mem::MaybeUninit;
use std::os::unix::fs::FileExt;
use std::os::unix::io::AsRawFd;
use std::os::unix::io::FromRawFd;
use std::os::unix::io::RawFd;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use fuser::FileAttr;
use fuser::FileType;
use fuser::Filesystem;
use fuser::KernelConfig;
use fuser::ReplyAttr;
use fuser::ReplyCreate;
use fuser::ReplyData;
use fuser::ReplyDirectory;
use fuser::ReplyEmpty;
use fuser::ReplyEntry;
use fuser::ReplyOpen;
use fuser::ReplyStatfs;
use fuser::ReplyWrite;
use fuser::Request;
use fuser::TimeOrNow;
use fuser::FUSE_ROOT_ID;
use log::debug;
use log::error;
use log::info;

use crate::handle::ebadf;
use crate::handle::Handle;
use crate::handle::HandleData;
use crate::handle::HandleTable;
use crate::read_dir::DirEntry;
use crate::read_dir::ReadDir;
use crate::resolver::PathResolver;

pub type Inode = u64;

/// Attribute and entry timeout handed back to the kernel. Zero: nothing is
/// cached, every request reaches the backing store.
const TTL: Duration = Duration::from_secs(0);

/// fstat on an open descriptor.
fn fstat(fd: RawFd) -> io::Result<libc::stat> {
    let mut st = MaybeUninit::<libc::stat>::zeroed();
    // SAFETY: fstat writes into st and we check the return value.
    let ret = unsafe { libc::fstat(fd, st.as_mut_ptr()) };
    if ret < 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: fstat initialized the struct on success.
    Ok(unsafe { st.assume_init() })
}

/// lstat on a backing path; symlinks are reported, not followed.
fn lstat(path: &CStr) -> io::Result<libc::stat> {
    let mut st = MaybeUninit::<libc::stat>::zeroed();
    // SAFETY: lstat writes into st and we check the return value.
    let ret = unsafe { libc::lstat(path.as_ptr(), st.as_mut_ptr()) };
    if ret < 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: lstat initialized the struct on success.
    Ok(unsafe { st.assume_init() })
}

fn statvfs(path: &CStr) -> io::Result<libc::statvfs> {
    let mut out = MaybeUninit::<libc::statvfs>::zeroed();
    // SAFETY: statvfs writes into out and we check the return value.
    let ret = unsafe { libc::statvfs(path.as_ptr(), out.as_mut_ptr()) };
    if ret < 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: statvfs initialized the struct on success.
    Ok(unsafe { out.assume_init() })
}

fn timestamp(secs: i64, nsecs: i64) -> SystemTime {
    if secs >= 0 {
        UNIX_EPOCH + Duration::new(secs as u64, nsecs as u32)
    } else {
        UNIX_EPOCH - Duration::from_secs(secs.unsigned_abs()) + Duration::from_nanos(nsecs as u64)
    }
}

fn file_type(mode: libc::mode_t) -> FileType {
    match mode & libc::S_IFMT {
        libc::S_IFDIR => FileType::Directory,
        libc::S_IFLNK => FileType::Symlink,
        libc::S_IFBLK => FileType::BlockDevice,
        libc::S_IFCHR => FileType::CharDevice,
        libc::S_IFIFO => FileType::NamedPipe,
        libc::S_IFSOCK => FileType::Socket,
        _ => FileType::RegularFile,
    }
}

/// Maps a raw dirent `d_type` onto the coarse category the listing reply
/// carries. `DT_UNKNOWN` is reported as a regular file; callers that care
/// issue a per-entry attribute lookup anyway.
fn dirent_type(type_: u8) -> FileType {
    match type_ {
        libc::DT_DIR => FileType::Directory,
        libc::DT_LNK => FileType::Symlink,
        libc::DT_BLK => FileType::BlockDevice,
        libc::DT_CHR => FileType::CharDevice,
        libc::DT_FIFO => FileType::NamedPipe,
        libc::DT_SOCK => FileType::Socket,
        _ => FileType::RegularFile,
    }
}

fn stat_to_attr(st: &libc::stat, ino: Inode) -> FileAttr {
    FileAttr {
        ino,
        size: st.st_size as u64,
        blocks: st.st_blocks as u64,
        atime: timestamp(st.st_atime, st.st_atime_nsec),
        mtime: timestamp(st.st_mtime, st.st_mtime_nsec),
        ctime: timestamp(st.st_ctime, st.st_ctime_nsec),
        crtime: UNIX_EPOCH,
        kind: file_type(st.st_mode),
        perm: (st.st_mode & 0o7777) as u16,
        nlink: st.st_nlink as u32,
        uid: st.st_uid,
        gid: st.st_gid,
        rdev: st.st_rdev as u32,
        blksize: st.st_blksize as u32,
        flags: 0,
    }
}

/// The kernel has already decided about creation by the time a plain open
/// arrives; strip the flags that would redo it, and never leak descriptors
/// across exec.
fn update_open_flags(flags: i32) -> i32 {
    (flags & !(libc::O_CREAT | libc::O_EXCL | libc::O_NOCTTY)) | libc::O_CLOEXEC
}

fn timespec_from(t: Option<TimeOrNow>) -> libc::timespec {
    match t {
        Some(TimeOrNow::SpecificTime(t)) => match t.duration_since(UNIX_EPOCH) {
            Ok(d) => libc::timespec {
                tv_sec: d.as_secs() as libc::time_t,
                tv_nsec: d.subsec_nanos() as libc::c_long,
            },
            // Pre-epoch timestamps: clamp to the epoch.
            Err(_) => libc::timespec {
                tv_sec: 0,
                tv_nsec: 0,
            },
        },
        Some(TimeOrNow::Now) => libc::timespec {
            tv_sec: 0,
            tv_nsec: libc::UTIME_NOW,
        },
        None => libc::timespec {
            tv_sec: 0,
            tv_nsec: libc::UTIME_OMIT,
        },
    }
}

fn errno(err: &io::Error) -> libc::c_int {
    err.raw_os_error().unwrap_or(libc::EIO)
}

#[derive(Debug)]
struct InodeData {
    /// Virtual path relative to the mount root; empty for the root itself.
    path: PathBuf,
    /// Kernel lookup count; decremented by forget, entry evicted at zero.
    refcount: u64,
}

/// Passthrough filesystem over a backing directory.
#[derive(Debug)]
pub struct PassthroughFs {
    resolver: PathResolver,
    /// Real inode number of the backing root, aliased to `FUSE_ROOT_ID`.
    root_ino: u64,
    inodes: Mutex<BTreeMap<Inode, InodeData>>,
    handles: HandleTable,
}

impl PassthroughFs {
    /// Opens the backing root and seeds the inode table with it.
    pub fn new<P: AsRef<Path>>(root: P) -> io::Result<PassthroughFs> {
        let resolver = PathResolver::new(root.as_ref().to_path_buf());
        let st = lstat(&resolver.resolve_c(Path::new(""))?)?;
        if st.st_mode & libc::S_IFMT != libc::S_IFDIR {
            return Err(io::Error::from_raw_os_error(libc::ENOTDIR));
        }

        let mut inodes = BTreeMap::new();
        // The kernel never forgets the root; seed it with a refcount that
        // cannot reach zero. Not sure why libfuse uses 2 but it does.
        inodes.insert(
            FUSE_ROOT_ID,
            InodeData {
                path: PathBuf::new(),
                refcount: 2,
            },
        );

        Ok(PassthroughFs {
            resolver,
            root_ino: st.st_ino as u64,
            inodes: Mutex::new(inodes),
            handles: HandleTable::new(),
        })
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    fn fuse_ino(&self, real: u64) -> Inode {
        if real == self.root_ino {
            FUSE_ROOT_ID
        } else {
            real
        }
    }

    fn inode_path(&self, inode: Inode) -> io::Result<PathBuf> {
        self.inodes
            .lock()
            .unwrap()
            .get(&inode)
            .map(|data| data.path.clone())
            .ok_or_else(ebadf)
    }

    /// Records a kernel-visible entry for `inode`, bumping the lookup count
    /// if the inode is already known.
    fn register_inode(&self, inode: Inode, path: PathBuf) {
        let mut inodes = self.inodes.lock().unwrap();
        match inodes.entry(inode) {
            btree_map::Entry::Occupied(mut e) => {
                let data = e.get_mut();
                data.refcount += 1;
                // A hard link or a racing rename may have moved the inode;
                // the most recent path wins.
                data.path = path;
            }
            btree_map::Entry::Vacant(v) => {
                v.insert(InodeData { path, refcount: 1 });
            }
        }
    }

    pub fn do_forget(&self, inode: Inode, count: u64) {
        if inode == FUSE_ROOT_ID {
            return;
        }
        let mut inodes = self.inodes.lock().unwrap();
        if let Some(data) = inodes.get_mut(&inode) {
            data.refcount = data.refcount.saturating_sub(count);
            if data.refcount == 0 {
                inodes.remove(&inode);
            }
        }
    }

    pub fn do_lookup(&self, parent: Inode, name: &OsStr) -> io::Result<FileAttr> {
        let path = self.inode_path(parent)?.join(name);
        let st = lstat(&self.resolver.resolve_c(&path)?)?;
        let inode = self.fuse_ino(st.st_ino as u64);
        self.register_inode(inode, path);
        Ok(stat_to_attr(&st, inode))
    }

    /// Attribute lookup: by open handle when one is supplied, otherwise by
    /// path with symlinks left unfollowed.
    pub fn do_getattr(&self, inode: Inode, handle: Option<Handle>) -> io::Result<FileAttr> {
        if let Some(handle) = handle {
            if let Some(data) = self.handles.get(handle) {
                if let HandleData::File { file, .. } = &*data {
                    let st = fstat(file.as_raw_fd())?;
                    return Ok(stat_to_attr(&st, self.fuse_ino(st.st_ino as u64)));
                }
            }
        }
        let path = self.inode_path(inode)?;
        let st = lstat(&self.resolver.resolve_c(&path)?)?;
        Ok(stat_to_attr(&st, self.fuse_ino(st.st_ino as u64)))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn do_setattr(
        &self,
        inode: Inode,
        mode: Option<u32>,
        uid: Option<u32>,
        gid: Option<u32>,
        size: Option<u64>,
        atime: Option<TimeOrNow>,
        mtime: Option<TimeOrNow>,
        handle: Option<Handle>,
    ) -> io::Result<FileAttr> {
        let path = self.inode_path(inode)?;
        let cpath = self.resolver.resolve_c(&path)?;

        if let Some(mode) = mode {
            // SAFETY: chmod doesn't modify memory and we check the return
            // value.
            let ret = unsafe { libc::chmod(cpath.as_ptr(), mode as libc::mode_t) };
            if ret < 0 {
                return Err(io::Error::last_os_error());
            }
        }

        if uid.is_some() || gid.is_some() {
            // (uid_t)-1 leaves the id unchanged.
            let uid = uid.unwrap_or(u32::MAX);
            let gid = gid.unwrap_or(u32::MAX);
            // SAFETY: chown doesn't modify memory and we check the return
            // value.
            let ret = unsafe { libc::chown(cpath.as_ptr(), uid, gid) };
            if ret < 0 {
                return Err(io::Error::last_os_error());
            }
        }

        if let Some(size) = size {
            let mut truncated = false;
            if let Some(handle) = handle {
                if let Some(data) = self.handles.get(handle) {
                    if let HandleData::File { file, flags } = &*data {
                        if flags & libc::O_ACCMODE != libc::O_RDONLY {
                            // SAFETY: ftruncate doesn't modify memory and we
                            // check the return value.
                            let ret =
                                unsafe { libc::ftruncate(file.as_raw_fd(), size as libc::off_t) };
                            if ret < 0 {
                                return Err(io::Error::last_os_error());
                            }
                            truncated = true;
                        }
                    }
                }
            }
            if !truncated {
                // The resolved backing path, so the truncate lands in the
                // backing tree no matter what the process cwd is.
                // SAFETY: truncate doesn't modify memory and we check the
                // return value.
                let ret = unsafe { libc::truncate(cpath.as_ptr(), size as libc::off_t) };
                if ret < 0 {
                    return Err(io::Error::last_os_error());
                }
            }
        }

        if atime.is_some() || mtime.is_some() {
            let times = [timespec_from(atime), timespec_from(mtime)];
            // SAFETY: utimensat reads the timespec array and doesn't modify
            // memory; we check the return value.
            let ret = unsafe {
                libc::utimensat(
                    libc::AT_FDCWD,
                    cpath.as_ptr(),
                    times.as_ptr(),
                    libc::AT_SYMLINK_NOFOLLOW,
                )
            };
            if ret < 0 {
                return Err(io::Error::last_os_error());
            }
        }

        let st = lstat(&cpath)?;
        Ok(stat_to_attr(&st, self.fuse_ino(st.st_ino as u64)))
    }

    pub fn do_open(&self, inode: Inode, flags: i32) -> io::Result<Handle> {
        let path = self.inode_path(inode)?;
        let cpath = self.resolver.resolve_c(&path)?;
        let flags = update_open_flags(flags);
        // SAFETY: open doesn't modify memory and we check the return value.
        let fd = unsafe { libc::open(cpath.as_ptr(), flags) };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        // SAFETY: we just opened this fd and nothing else owns it.
        let file = unsafe { File::from_raw_fd(fd) };
        Ok(self.handles.insert(HandleData::File { file, flags }))
    }

    /// Creates and opens a file in one step. The new descriptor is retained
    /// as the returned handle so the follow-up writes need no second open.
    pub fn do_create(
        &self,
        parent: Inode,
        name: &OsStr,
        mode: u32,
        umask: u32,
        flags: i32,
    ) -> io::Result<(FileAttr, Handle)> {
        let path = self.inode_path(parent)?.join(name);
        let cpath = self.resolver.resolve_c(&path)?;
        let flags = (flags & !libc::O_NOCTTY) | libc::O_CREAT | libc::O_CLOEXEC;
        // SAFETY: open doesn't modify memory and we check the return value.
        let fd = unsafe { libc::open(cpath.as_ptr(), flags, (mode & !umask) as libc::c_uint) };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        // SAFETY: we just opened this fd and nothing else owns it.
        let file = unsafe { File::from_raw_fd(fd) };
        let st = fstat(file.as_raw_fd())?;
        let inode = self.fuse_ino(st.st_ino as u64);
        self.register_inode(inode, path);
        let attr = stat_to_attr(&st, inode);
        let handle = self.handles.insert(HandleData::File { file, flags });
        Ok((attr, handle))
    }

    /// Positioned read; a short count is a valid result, not an error.
    pub fn do_read(&self, handle: Handle, offset: i64, size: u32) -> io::Result<Vec<u8>> {
        let data = self.handles.get(handle).ok_or_else(ebadf)?;
        let (file, _) = data.as_file()?;
        let mut buf = vec![0u8; size as usize];
        let n = file.read_at(&mut buf, offset as u64)?;
        buf.truncate(n);
        Ok(buf)
    }

    /// Positioned write; returns the byte count the backing store accepted.
    pub fn do_write(&self, handle: Handle, offset: i64, data: &[u8]) -> io::Result<usize> {
        let hd = self.handles.get(handle).ok_or_else(ebadf)?;
        let (file, _) = hd.as_file()?;
        file.write_at(data, offset as u64)
    }

    pub fn do_fsync(&self, handle: Handle, datasync: bool) -> io::Result<()> {
        let data = self.handles.get(handle).ok_or_else(ebadf)?;
        let (file, _) = data.as_file()?;
        // SAFETY: fsync/fdatasync don't modify memory and we check the
        // return value.
        let ret = if datasync {
            unsafe { libc::fdatasync(file.as_raw_fd()) }
        } else {
            unsafe { libc::fsync(file.as_raw_fd()) }
        };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    pub fn do_release(&self, handle: Handle) -> io::Result<()> {
        self.handles.remove_file(handle)
    }

    pub fn do_opendir(&self, inode: Inode) -> io::Result<Handle> {
        let path = self.inode_path(inode)?;
        let cpath = self.resolver.resolve_c(&path)?;
        let stream = ReadDir::open(&cpath)?;
        Ok(self.handles.insert(HandleData::Dir {
            stream: Mutex::new(stream),
        }))
    }

    /// Iterates the handle's directory stream from `offset`, emitting one
    /// entry per step into `sink`. A `true` return from the sink means its
    /// buffer is full and iteration stops early; the stream position stays
    /// valid for the next request.
    pub fn do_readdir<F>(&self, handle: Handle, offset: i64, mut sink: F) -> io::Result<()>
    where
        F: FnMut(&DirEntry) -> bool,
    {
        let data = self.handles.get(handle).ok_or_else(ebadf)?;
        let stream = data.as_dir()?;
        let mut stream = stream.lock().unwrap();
        stream.seek(offset);
        while let Some(mut entry) = stream.next_entry() {
            entry.ino = self.fuse_ino(entry.ino);
            if sink(&entry) {
                break;
            }
        }
        Ok(())
    }

    pub fn do_fsyncdir(&self, handle: Handle, datasync: bool) -> io::Result<()> {
        let data = self.handles.get(handle).ok_or_else(ebadf)?;
        let fd = data.as_dir()?.lock().unwrap().as_raw_fd();
        // SAFETY: fsync/fdatasync don't modify memory and we check the
        // return value.
        let ret = if datasync {
            unsafe { libc::fdatasync(fd) }
        } else {
            unsafe { libc::fsync(fd) }
        };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    pub fn do_releasedir(&self, handle: Handle) -> io::Result<()> {
        self.handles.remove_dir(handle)
    }

    pub fn do_mkdir(&self, parent: Inode, name: &OsStr, mode: u32, umask: u32) -> io::Result<FileAttr> {
        let path = self.inode_path(parent)?.join(name);
        let cpath = self.resolver.resolve_c(&path)?;
        // SAFETY: mkdir doesn't modify memory and we check the return value.
        let ret = unsafe { libc::mkdir(cpath.as_ptr(), (mode & !umask) as libc::mode_t) };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }
        let st = lstat(&cpath)?;
        let inode = self.fuse_ino(st.st_ino as u64);
        self.register_inode(inode, path);
        Ok(stat_to_attr(&st, inode))
    }

    pub fn do_mknod(
        &self,
        parent: Inode,
        name: &OsStr,
        mode: u32,
        umask: u32,
        rdev: u32,
    ) -> io::Result<FileAttr> {
        let path = self.inode_path(parent)?.join(name);
        let cpath = self.resolver.resolve_c(&path)?;
        // SAFETY: mknod doesn't modify memory and we check the return value.
        let ret = unsafe {
            libc::mknod(
                cpath.as_ptr(),
                (mode & !umask) as libc::mode_t,
                rdev as libc::dev_t,
            )
        };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }
        let st = lstat(&cpath)?;
        let inode = self.fuse_ino(st.st_ino as u64);
        self.register_inode(inode, path);
        Ok(stat_to_attr(&st, inode))
    }

    pub fn do_unlink(&self, parent: Inode, name: &OsStr) -> io::Result<()> {
        let path = self.inode_path(parent)?.join(name);
        let cpath = self.resolver.resolve_c(&path)?;
        // SAFETY: unlink doesn't modify memory and we check the return value.
        let ret = unsafe { libc::unlink(cpath.as_ptr()) };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    /// Directory removal takes its own primitive; aliasing it onto unlink(2)
    /// would fail with EISDIR on this platform.
    pub fn do_rmdir(&self, parent: Inode, name: &OsStr) -> io::Result<()> {
        let path = self.inode_path(parent)?.join(name);
        let cpath = self.resolver.resolve_c(&path)?;
        // SAFETY: rmdir doesn't modify memory and we check the return value.
        let ret = unsafe { libc::rmdir(cpath.as_ptr()) };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    /// Renames through the backing primitive; atomicity and overwrite
    /// semantics are exactly the backing store's.
    pub fn do_rename(
        &self,
        parent: Inode,
        name: &OsStr,
        newparent: Inode,
        newname: &OsStr,
    ) -> io::Result<()> {
        let old = self.inode_path(parent)?.join(name);
        let new = self.inode_path(newparent)?.join(newname);
        let cold = self.resolver.resolve_c(&old)?;
        let cnew = self.resolver.resolve_c(&new)?;
        // SAFETY: rename doesn't modify memory and we check the return value.
        let ret = unsafe { libc::rename(cold.as_ptr(), cnew.as_ptr()) };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }

        // Re-point the moved entry and everything beneath it.
        let mut inodes = self.inodes.lock().unwrap();
        for data in inodes.values_mut() {
            if data.path == old {
                data.path = new.clone();
            } else if let Ok(rest) = data.path.strip_prefix(&old) {
                data.path = new.join(rest);
            }
        }
        Ok(())
    }

    pub fn do_access(&self, inode: Inode, mask: i32) -> io::Result<()> {
        let path = self.inode_path(inode)?;
        let cpath = self.resolver.resolve_c(&path)?;
        // SAFETY: access doesn't modify memory and we check the return value.
        let ret = unsafe { libc::access(cpath.as_ptr(), mask) };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    pub fn do_statfs(&self, inode: Inode) -> io::Result<libc::statvfs> {
        let path = self.inode_path(inode)?;
        statvfs(&self.resolver.resolve_c(&path)?)
    }
}

impl Filesystem for PassthroughFs {
    fn init(&mut self, _req: &Request<'_>, _config: &mut KernelConfig) -> Result<(), libc::c_int> {
        info!("mirroring {}", self.resolver.root().display());
        Ok(())
    }

    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        debug!("lookup(parent={}, name={:?})", parent, name);
        match self.do_lookup(parent, name) {
            Ok(attr) => reply.entry(&TTL, &attr, 0),
            Err(e) => reply.error(errno(&e)),
        }
    }

    fn forget(&mut self, _req: &Request<'_>, ino: u64, nlookup: u64) {
        self.do_forget(ino, nlookup);
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, fh: Option<u64>, reply: ReplyAttr) {
        debug!("getattr(ino={}, fh={:?})", ino, fh);
        match self.do_getattr(ino, fh) {
            Ok(attr) => reply.attr(&TTL, &attr),
            Err(e) => reply.error(errno(&e)),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn setattr(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        mode: Option<u32>,
        uid: Option<u32>,
        gid: Option<u32>,
        size: Option<u64>,
        atime: Option<TimeOrNow>,
        mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        debug!(
            "setattr(ino={}, mode={:?}, uid={:?}, gid={:?}, size={:?}, fh={:?})",
            ino, mode, uid, gid, size, fh
        );
        match self.do_setattr(ino, mode, uid, gid, size, atime, mtime, fh) {
            Ok(attr) => reply.attr(&TTL, &attr),
            Err(e) => reply.error(errno(&e)),
        }
    }

    fn mknod(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        umask: u32,
        rdev: u32,
        reply: ReplyEntry,
    ) {
        debug!("mknod(parent={}, name={:?}, mode={:#o})", parent, name, mode);
        match self.do_mknod(parent, name, mode, umask, rdev) {
            Ok(attr) => reply.entry(&TTL, &attr, 0),
            Err(e) => reply.error(errno(&e)),
        }
    }

    fn mkdir(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        umask: u32,
        reply: ReplyEntry,
    ) {
        debug!("mkdir(parent={}, name={:?}, mode={:#o})", parent, name, mode);
        match self.do_mkdir(parent, name, mode, umask) {
            Ok(attr) => reply.entry(&TTL, &attr, 0),
            Err(e) => reply.error(errno(&e)),
        }
    }

    fn unlink(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        debug!("unlink(parent={}, name={:?})", parent, name);
        match self.do_unlink(parent, name) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(errno(&e)),
        }
    }

    fn rmdir(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        debug!("rmdir(parent={}, name={:?})", parent, name);
        match self.do_rmdir(parent, name) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(errno(&e)),
        }
    }

    fn rename(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        newparent: u64,
        newname: &OsStr,
        _flags: u32,
        reply: ReplyEmpty,
    ) {
        debug!(
            "rename(parent={}, name={:?}, newparent={}, newname={:?})",
            parent, name, newparent, newname
        );
        match self.do_rename(parent, name, newparent, newname) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(errno(&e)),
        }
    }

    fn create(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        umask: u32,
        flags: i32,
        reply: ReplyCreate,
    ) {
        debug!(
            "create(parent={}, name={:?}, mode={:#o}, flags={:#x})",
            parent, name, mode, flags
        );
        match self.do_create(parent, name, mode, umask, flags) {
            Ok((attr, handle)) => reply.created(&TTL, &attr, 0, handle, 0),
            Err(e) => reply.error(errno(&e)),
        }
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, flags: i32, reply: ReplyOpen) {
        debug!("open(ino={}, flags={:#x})", ino, flags);
        match self.do_open(ino, flags) {
            Ok(handle) => reply.opened(handle, 0),
            Err(e) => reply.error(errno(&e)),
        }
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        debug!("read(fh={}, offset={}, size={})", fh, offset, size);
        match self.do_read(fh, offset, size) {
            Ok(data) => reply.data(&data),
            Err(e) => reply.error(errno(&e)),
        }
    }

    fn write(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        debug!("write(fh={}, offset={}, len={})", fh, offset, data.len());
        match self.do_write(fh, offset, data) {
            Ok(n) => reply.written(n as u32),
            Err(e) => reply.error(errno(&e)),
        }
    }

    fn flush(&mut self, _req: &Request<'_>, _ino: u64, fh: u64, _lock_owner: u64, reply: ReplyEmpty) {
        debug!("flush(fh={})", fh);
        // Nothing to flush; data is synced on fsync.
        reply.ok();
    }

    fn release(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        debug!("release(fh={})", fh);
        match self.do_release(fh) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(errno(&e)),
        }
    }

    fn fsync(&mut self, _req: &Request<'_>, _ino: u64, fh: u64, datasync: bool, reply: ReplyEmpty) {
        debug!("fsync(fh={}, datasync={})", fh, datasync);
        match self.do_fsync(fh, datasync) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(errno(&e)),
        }
    }

    fn opendir(&mut self, _req: &Request<'_>, ino: u64, _flags: i32, reply: ReplyOpen) {
        debug!("opendir(ino={})", ino);
        match self.do_opendir(ino) {
            Ok(handle) => reply.opened(handle, 0),
            Err(e) => reply.error(errno(&e)),
        }
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        debug!("readdir(ino={}, fh={}, offset={})", ino, fh, offset);
        let res = self.do_readdir(fh, offset, |entry| {
            reply.add(entry.ino, entry.offset, dirent_type(entry.type_), &entry.name)
        });
        match res {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(errno(&e)),
        }
    }

    fn releasedir(&mut self, _req: &Request<'_>, _ino: u64, fh: u64, _flags: i32, reply: ReplyEmpty) {
        debug!("releasedir(fh={})", fh);
        match self.do_releasedir(fh) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(errno(&e)),
        }
    }

    fn fsyncdir(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        fh: u64,
        datasync: bool,
        reply: ReplyEmpty,
    ) {
        debug!("fsyncdir(fh={}, datasync={})", fh, datasync);
        match self.do_fsyncdir(fh, datasync) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(errno(&e)),
        }
    }

    fn statfs(&mut self, _req: &Request<'_>, ino: u64, reply: ReplyStatfs) {
        debug!("statfs(ino={})", ino);
        match self.do_statfs(ino) {
            Ok(st) => reply.statfs(
                st.f_blocks as u64,
                st.f_bfree as u64,
                st.f_bavail as u64,
                st.f_files as u64,
                st.f_ffree as u64,
                st.f_bsize as u32,
                st.f_namemax as u32,
                st.f_frsize as u32,
            ),
            Err(e) => reply.error(errno(&e)),
        }
    }

    fn access(&mut self, _req: &Request<'_>, ino: u64, mask: i32, reply: ReplyEmpty) {
        debug!("access(ino={}, mask={:#o})", ino, mask);
        match self.do_access(ino, mask) {
            Ok(()) => reply.ok(),
            Err(e) => {
                error!("access(ino={}) failed: {}", ino, e);
                reply.error(errno(&e));
            }
        }
    }
}
