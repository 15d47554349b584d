// SPDX-License-Identifier: GPL-3.0-only

//! Host queries: privileges, running kernel, root device

use std::process::Command;

use nix::sys::utsname::uname;

use crate::error::{EngineError, Result};

pub fn require_root() -> Result<()> {
    if unsafe { libc::geteuid() } != 0 {
        return Err(EngineError::NotRoot);
    }
    Ok(())
}

/// Release string of the running kernel, e.g. `6.8.9-300.fc40.x86_64`
pub fn running_kernel_version() -> Result<String> {
    let info = uname().map_err(std::io::Error::from)?;
    Ok(info.release().to_string_lossy().into_owned())
}

/// Flush filesystem buffers after a swap
pub fn sync_storage() {
    nix::unistd::sync();
}

/// Block device backing `/`, which must be btrfs
pub fn detect_root_device() -> Result<String> {
    let findmnt = which::which("findmnt").map_err(|e| {
        EngineError::NotBtrfsRoot(format!("findmnt not available: {}", e))
    })?;

    let output = Command::new(findmnt)
        .args(["-n", "-o", "SOURCE", "-t", "btrfs", "/"])
        .output()?;

    parse_findmnt_source(&String::from_utf8_lossy(&output.stdout)).ok_or_else(|| {
        EngineError::NotBtrfsRoot("findmnt reported no btrfs filesystem at /".to_string())
    })
}

/// First line of `findmnt -o SOURCE`, minus any `[/subvol]` suffix
fn parse_findmnt_source(stdout: &str) -> Option<String> {
    let line = stdout.lines().next()?.trim();
    let device = line.split('[').next().unwrap_or(line).trim();
    if device.is_empty() {
        None
    } else {
        Some(device.to_string())
    }
}
