// SPDX-License-Identifier: GPL-3.0-only

//! Directory-backed fakes so engine tests run without btrfs or root

use std::cell::RefCell;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use bread_btrfs::{BtrfsError, SnapshotStore};
use tempfile::TempDir;

use crate::error::{EngineError, Result};
use crate::kernel::BootLoader;
use crate::layout::{BootLayout, Layout};
use crate::naming::Timestamp;

pub(crate) const MACHINE_ID: &str = "0123456789abcdef";
const CONTENT_FILE: &str = "content";

/// Snapshots are recursive directory copies
#[derive(Default)]
pub(crate) struct DirStore {
    fail_delete: HashSet<String>,
    fail_snapshot: HashSet<String>,
}

impl DirStore {
    /// Deleting any path whose file name is listed fails
    pub(crate) fn failing_on<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            fail_delete: names.into_iter().map(str::to_string).collect(),
            ..Self::default()
        }
    }

    /// Snapshotting into any listed file name fails
    pub(crate) fn failing_snapshot<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            fail_snapshot: names.into_iter().map(str::to_string).collect(),
            ..Self::default()
        }
    }

    fn named_in(set: &HashSet<String>, path: &Path) -> bool {
        path.file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| set.contains(name))
    }
}

impl SnapshotStore for DirStore {
    fn snapshot(&self, source: &Path, dest: &Path, _read_only: bool) -> bread_btrfs::Result<()> {
        if Self::named_in(&self.fail_snapshot, dest) {
            return Err(BtrfsError::OperationFailed(format!(
                "refusing snapshot into {}",
                dest.display()
            )));
        }
        if dest.exists() {
            return Err(BtrfsError::OperationFailed(format!(
                "{} already exists",
                dest.display()
            )));
        }
        copy_tree(source, dest)?;
        Ok(())
    }

    fn delete(&self, path: &Path) -> bread_btrfs::Result<()> {
        if Self::named_in(&self.fail_delete, path) {
            return Err(BtrfsError::OperationFailed(format!(
                "refusing delete of {}",
                path.display()
            )));
        }
        fs::remove_dir_all(path)?;
        Ok(())
    }

    fn is_snapshot(&self, path: &Path) -> bool {
        path.is_dir()
    }
}

fn copy_tree(source: &Path, dest: &Path) -> std::io::Result<()> {
    fs::create_dir(dest)?;
    for entry in fs::read_dir(source)? {
        let entry = entry?;
        let target = dest.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_tree(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), target)?;
        }
    }
    Ok(())
}

/// Records every default-entry change
#[derive(Clone, Default)]
pub(crate) struct RecordingLoader {
    pub(crate) defaults: Rc<RefCell<Vec<PathBuf>>>,
    pub(crate) fail: bool,
}

impl BootLoader for RecordingLoader {
    fn set_default(&self, kernel_image: &Path) -> Result<()> {
        if self.fail {
            return Err(EngineError::BootLoader("grubby exited with 1".to_string()));
        }
        self.defaults.borrow_mut().push(kernel_image.to_path_buf());
        Ok(())
    }
}

/// A mounted top-level tree and a boot directory inside one temp dir
pub(crate) struct Fixture {
    _dir: TempDir,
    pub(crate) layout: Layout,
    pub(crate) boot: BootLayout,
}

impl Fixture {
    pub(crate) fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let mount = dir.path().join("mnt");
        let boot_dir = dir.path().join("boot");
        fs::create_dir_all(&mount).expect("create mount");
        fs::create_dir_all(boot_dir.join("loader").join("entries")).expect("create boot");

        Self {
            layout: Layout::new(mount),
            boot: BootLayout::new(boot_dir, MACHINE_ID),
            _dir: dir,
        }
    }

    pub(crate) fn write_live(&self, subvolume: &str, content: &str) {
        write_subvolume(&self.layout.live_path(subvolume), content);
    }

    pub(crate) fn write_snapshot(&self, subvolume: &str, stamp: &str, content: &str) {
        let ts = Timestamp::parse(stamp).expect("valid timestamp");
        write_subvolume(&self.layout.snapshot_path(subvolume, &ts), content);
    }

    pub(crate) fn write_boot_kernel(&self, version: &str, tag: &str) {
        fs::write(self.boot.kernel_image(version), format!("kernel {tag}")).expect("kernel");
        fs::write(self.boot.initramfs(version), format!("initramfs {tag}")).expect("initramfs");
        fs::write(self.boot.boot_entry(version), format!("entry {tag}")).expect("entry");
    }
}

pub(crate) fn write_subvolume(path: &Path, content: &str) {
    fs::create_dir_all(path).expect("create subvolume");
    fs::write(path.join(CONTENT_FILE), content).expect("write content");
}

pub(crate) fn read_content(path: &Path) -> String {
    fs::read_to_string(path.join(CONTENT_FILE)).expect("read content")
}
