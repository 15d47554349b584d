// SPDX-License-Identifier: GPL-3.0-only

use std::io::{self, BufRead, Write};
use std::path::Path;

use anyhow::{Context, Result};
use bread_btrfs::SubvolumeManager;
use bread_engine::naming::format_human;
use bread_engine::{
    BootLayout, CONFIG_FILE, Config, EngineError, Grubby, KernelTracker, Layout, RESERVED_NAMES,
    RollbackEngine, SafetyGuard, SnapshotCycle, SnapshotTable, Timestamp, UndoBuffer, build_table,
    system,
};
use bread_types::{KernelRestore, RetentionConfig, SnapshotSession};

const RECENT_SESSIONS: usize = 10;

fn load_config() -> Result<Config> {
    Ok(Config::load(Path::new(CONFIG_FILE))?)
}

/// Layout named by `config_path`, or the default one when there is no
/// readable config. Listing and purge work without `bread config`.
fn layout_from(config_path: &Path) -> Layout {
    match Config::load(config_path) {
        Ok(config) => config.layout(),
        Err(e) => {
            tracing::debug!("{e}; using the default layout");
            Layout::default()
        }
    }
}

fn kernel_tracker(layout: &Layout) -> Result<KernelTracker> {
    let boot = BootLayout::system().context("Failed to read boot layout")?;
    Ok(KernelTracker::new(layout.clone(), boot, Box::new(Grubby)))
}

fn store(layout: &Layout) -> Result<SubvolumeManager> {
    SubvolumeManager::new(layout.mount_point()).with_context(|| {
        format!(
            "{} is not a mounted btrfs top level",
            layout.mount_point().display()
        )
    })
}

/// y/N on stdin. Anything but `y`/`yes` declines.
fn confirm(prompt: &str) -> bool {
    print!("{prompt} (y/N): ");
    let _ = io::stdout().flush();
    let mut answer = String::new();
    if io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    is_yes(&answer)
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

fn ask_count(label: &str) -> Result<u32> {
    let stdin = io::stdin();
    loop {
        print!("{label}: ");
        io::stdout().flush()?;
        let mut answer = String::new();
        if stdin.lock().read_line(&mut answer)? == 0 {
            anyhow::bail!("No value for {label}");
        }
        match answer.trim().parse() {
            Ok(value) => return Ok(value),
            Err(_) => println!("Non-negative integer required."),
        }
    }
}

/// fstab gate shared by rollback and revert. `yes` makes it fatal.
fn check_boot_config(yes: bool) -> Result<()> {
    let guard = SafetyGuard::system();
    if yes {
        guard.check(None::<fn(&[String]) -> bool>)?;
        return Ok(());
    }

    guard.check(Some(|lines: &[String]| {
        println!("WARNING: {} mounts subvolumes by ID:", guard.fstab().display());
        for line in lines {
            println!("  {line}");
        }
        println!("Rollback replaces subvolumes and their IDs change; this system may not boot.");
        confirm("Continue anyway?")
    }))?;
    Ok(())
}

fn undo_targets(held: &[String]) -> Result<String> {
    if held.is_empty() {
        return Err(EngineError::NothingToRevert.into());
    }
    Ok(format!("Undo targets: {}", held.join(", ")))
}

/// Sessions to show: the last `RECENT_SESSIONS` unless `all`
fn visible(table: &SnapshotTable, all: bool) -> Vec<SnapshotSession> {
    let sessions = table.to_sessions();
    let start = if all {
        0
    } else {
        sessions.len().saturating_sub(RECENT_SESSIONS)
    };
    sessions.into_iter().skip(start).collect()
}

fn render_table(sessions: &[SnapshotSession]) -> String {
    if sessions.is_empty() {
        return "  No snapshots found.\n".to_string();
    }
    let mut out = format!("  {:>4}  {:<21}  Subvolumes\n", "#", "Timestamp");
    for session in sessions {
        out.push_str(&format!(
            "  {:>4}  {:<21}  {}\n",
            session.index,
            session.display,
            session.subvolumes.join(", ")
        ));
    }
    out
}

pub fn list(all: bool, json: bool) -> Result<()> {
    let layout = layout_from(Path::new(CONFIG_FILE));
    let table = build_table(&layout.snapshot_dir())?;
    let sessions = visible(&table, all);

    if json {
        println!("{}", serde_json::to_string(&sessions)?);
    } else {
        print!("{}", render_table(&sessions));
    }
    Ok(())
}

pub fn snapshot() -> Result<()> {
    system::require_root()?;
    let config = load_config()?;
    let layout = config.layout();
    let manager = store(&layout)?;
    let kernels = kernel_tracker(&layout)?;

    let subvolumes = manager.discover_live(RESERVED_NAMES)?;
    let kernel_version = system::running_kernel_version()?;
    let cycle = SnapshotCycle::new(&layout, &config.retention, &manager, &kernels);
    let stats = cycle.run(&subvolumes, &Timestamp::now(), &kernel_version);

    println!("{stats}");
    Ok(())
}

pub fn rollback(number: usize, subvolumes: &[String], yes: bool) -> Result<()> {
    system::require_root()?;
    let layout = load_config()?.layout();

    check_boot_config(yes)?;

    let manager = store(&layout)?;
    let kernels = kernel_tracker(&layout)?;
    let engine = RollbackEngine::new(&layout, &manager, &kernels);

    let table = engine.table()?;
    let session = table.session(number)?;
    let (timestamp, selected) = engine.plan(session.timestamp.as_str(), subvolumes)?;

    println!("Rollback plan:");
    for subvolume in &selected {
        println!("  {}  ->  {}", subvolume, timestamp.display());
    }
    if !yes && !confirm("Confirm?") {
        return Err(EngineError::Cancelled.into());
    }

    let report = engine.rollback(timestamp.as_str(), &selected)?;
    match &report.kernel {
        KernelRestore::Untracked => {
            println!("Warning: no kernel marker for this snapshot (pre-boot-backup snapshot)")
        }
        KernelRestore::Placed(version) => println!("Restored kernel {version} to /boot"),
        KernelRestore::AlreadyPresent(version) => println!("Default kernel set to {version}"),
    }
    for name in &report.stale_undo {
        println!("Warning: could not clear old/{name}");
    }
    for subvolume in &report.restored {
        println!("  {} -> {}", subvolume, format_human(&report.timestamp));
    }
    println!("Done. Previous state is in old/. Reboot to apply.");
    Ok(())
}

pub fn revert(yes: bool) -> Result<()> {
    system::require_root()?;
    let layout = load_config()?.layout();
    check_boot_config(yes)?;

    let manager = store(&layout)?;
    let kernels = kernel_tracker(&layout)?;
    let engine = RollbackEngine::new(&layout, &manager, &kernels);

    let held = UndoBuffer::new(layout.undo_dir()).held(&manager)?;
    println!("{}", undo_targets(&held)?);
    if !yes && !confirm("Swap these back into place?") {
        return Err(EngineError::Cancelled.into());
    }

    let report = engine.revert()?;
    for subvolume in &report.reverted {
        println!("  Reverted {subvolume}");
    }
    println!("Done. Reboot to apply.");
    Ok(())
}

pub fn configure(
    hourly: Option<u32>,
    daily: Option<u32>,
    weekly: Option<u32>,
    monthly: Option<u32>,
) -> Result<()> {
    system::require_root()?;
    let device = system::detect_root_device()?;
    println!("Detected boot device: {device}");

    let retention = RetentionConfig::new(
        hourly.map_or_else(|| ask_count("Hourly"), Ok)?,
        daily.map_or_else(|| ask_count("Daily"), Ok)?,
        weekly.map_or_else(|| ask_count("Weekly"), Ok)?,
        monthly.map_or_else(|| ask_count("Monthly"), Ok)?,
    );
    if retention.is_empty() {
        println!("All counts are 0: only the newest snapshot of each subvolume will be kept.");
    }

    Config::new(device, retention).save(Path::new(CONFIG_FILE))?;
    println!("Configuration saved.");
    Ok(())
}

pub fn purge(yes: bool) -> Result<()> {
    system::require_root()?;
    let layout = layout_from(Path::new(CONFIG_FILE));

    if !yes && !confirm("Delete ALL snapshots, kernel backups and configuration?") {
        return Err(EngineError::Cancelled.into());
    }

    let manager = store(&layout)?;
    let kernels = kernel_tracker(&layout)?;
    let report = bread_engine::purge(&layout, &manager, &kernels, Path::new(CONFIG_FILE));
    println!("Deleted {} | Errors {}", report.deleted, report.errors);
    Ok(())
}
