//! fs
//!
//! The filesystem facade (§4.7): each operation is a thin `Work` closure over `std::fs`,
//! submitted to the same threadpool as any other `Work`. This is the concrete shape of the
//! source's `promisify(op, args…) -> future<request*>` adapter — in this crate "the engine's fs
//! request" *is* a `Work`, so there is no separate request type to adapt.

use std::fs::{self, Metadata, OpenOptions};
use std::io;
use std::path::PathBuf;

use crate::error::Result;
use crate::event_loop::Loop;
use crate::futures::BoxFuture;

/// An open file. Rust's `std::fs::File` already closes on drop; `Filesystem::close` exists so
/// callers that want the close to happen on the threadpool (rather than synchronously, wherever
/// the `FsFile` happens to be dropped) have an explicit async path, matching the facade's
/// `open`/`close` pair.
pub struct FsFile(fs::File);

impl FsFile {
    pub fn metadata(&self) -> io::Result<Metadata> {
        self.0.metadata()
    }
}

/// Adapter turning blocking `std::fs` calls into futures, all routed through the same
/// threadpool as `Work` (§4.7).
#[derive(Clone)]
pub struct Filesystem {
    loop_: Loop,
}

impl Filesystem {
    pub(crate) fn new(loop_: Loop) -> Self {
        Self { loop_ }
    }

    fn work(&self) -> crate::request::Work {
        self.loop_.work()
    }

    pub fn read(&self, path: impl Into<PathBuf>) -> BoxFuture<'static, Result<Vec<u8>>> {
        let path = path.into();
        self.work().queue(move || fs::read(&path).map_err(Into::into))
    }

    pub fn write(&self, path: impl Into<PathBuf>, data: Vec<u8>) -> BoxFuture<'static, Result<()>> {
        let path = path.into();
        self.work()
            .queue(move || fs::write(&path, &data).map_err(Into::into))
    }

    pub fn open(
        &self,
        path: impl Into<PathBuf>,
        options: OpenOptions,
    ) -> BoxFuture<'static, Result<FsFile>> {
        let path = path.into();
        self.work()
            .queue(move || options.open(&path).map(FsFile).map_err(Into::into))
    }

    pub fn close(&self, file: FsFile) -> BoxFuture<'static, Result<()>> {
        self.work().queue(move || {
            drop(file);
            Ok(())
        })
    }

    pub fn stat(&self, path: impl Into<PathBuf>) -> BoxFuture<'static, Result<Metadata>> {
        let path = path.into();
        self.work().queue(move || fs::metadata(&path).map_err(Into::into))
    }

    pub fn unlink(&self, path: impl Into<PathBuf>) -> BoxFuture<'static, Result<()>> {
        let path = path.into();
        self.work()
            .queue(move || fs::remove_file(&path).map_err(Into::into))
    }

    pub fn mkdir(&self, path: impl Into<PathBuf>) -> BoxFuture<'static, Result<()>> {
        let path = path.into();
        self.work().queue(move || fs::create_dir(&path).map_err(Into::into))
    }

    pub fn rmdir(&self, path: impl Into<PathBuf>) -> BoxFuture<'static, Result<()>> {
        let path = path.into();
        self.work()
            .queue(move || fs::remove_dir(&path).map_err(Into::into))
    }

    pub fn rename(
        &self,
        from: impl Into<PathBuf>,
        to: impl Into<PathBuf>,
    ) -> BoxFuture<'static, Result<()>> {
        let from = from.into();
        let to = to.into();
        self.work().queue(move || fs::rename(&from, &to).map_err(Into::into))
    }
}

impl Loop {
    /// Convenience accessor mirroring the source's `Loop::fs()` member.
    pub fn fs(&self) -> Filesystem {
        Filesystem::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    #[test]
    fn write_then_read_round_trips() {
        let l = Loop::make();
        let fs = l.fs();
        let dir = std::env::temp_dir().join(format!("uvrt-fs-test-{}", std::process::id()));
        let write_fut = fs.write(dir.clone(), b"hello".to_vec());
        let _ = l.run(crate::event_loop::RunMode::Once);
        block_on(write_fut).unwrap();

        let read_fut = fs.read(dir.clone());
        let _ = l.run(crate::event_loop::RunMode::Once);
        assert_eq!(block_on(read_fut).unwrap(), b"hello");

        let unlink_fut = fs.unlink(dir);
        let _ = l.run(crate::event_loop::RunMode::Once);
        block_on(unlink_fut).unwrap();
    }
}
