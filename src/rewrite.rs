//! In-place rewriting of wheel contents.
//!
//! The `.dist-info` directory of a wheel embeds the version
//! (`{distribution}-{version}.dist-info`) and its `METADATA` file carries a
//! `Version:` field. Both must agree with the file name or installers reject
//! the wheel, so a re-versioned file name is followed by this rewrite.
//!
//! All work happens on a copy inside a scratch directory. The destination is
//! only touched by the final atomic rename of a fully written archive.
use base64::Engine;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::env;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tempfile::{Builder, NamedTempFile};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::WheelError;
use crate::naming::WheelName;

pub const DIST_INFO_SUFFIX: &str = ".dist-info";
pub const METADATA_FILE: &str = "METADATA";
pub const RECORD_FILE: &str = "RECORD";
/// Field marker matched literally at the start of a METADATA line.
pub const VERSION_FIELD: &str = "Version:";

const SCRATCH_SOURCE: &str = "source.whl";
const SCRATCH_TREE: &str = "tree";

const FILE_TYPE_MASK: u32 = 0o170000;
const SYMLINK_TYPE: u32 = 0o120000;

/// Summary of a successful rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteReport {
    pub old_dist_info: String,
    pub new_dist_info: String,
    pub entries: usize,
}

/// Rewrite the wheel at `path` so its metadata carries `version`.
pub fn rewrite_in_place(path: &Path, version: &str) -> Result<RewriteReport, WheelError> {
    rewrite_wheel(path, path, version)
}

/// Read the wheel at `source` and atomically write a re-versioned copy to
/// `destination`.
///
/// The distribution name for the new `.dist-info` directory comes from the
/// destination file name. `source` is never modified unless it is also the
/// destination, and then only by the final rename.
pub fn rewrite_wheel(
    source: &Path,
    destination: &Path,
    version: &str,
) -> Result<RewriteReport, WheelError> {
    rewrite_wheel_in(&env::temp_dir(), source, destination, version)
}

/// [`rewrite_wheel`] with the scratch directory created under `scratch_root`.
fn rewrite_wheel_in(
    scratch_root: &Path,
    source: &Path,
    destination: &Path,
    version: &str,
) -> Result<RewriteReport, WheelError> {
    let file_name = destination
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| WheelError::InvalidName(destination.display().to_string()))?;
    let wheel_name =
        WheelName::parse(file_name).ok_or_else(|| WheelError::InvalidName(file_name.to_string()))?;

    let scratch = Builder::new().prefix("wheelstamp-").tempdir_in(scratch_root)?;
    let duplicate = scratch.path().join(SCRATCH_SOURCE);
    fs::copy(source, &duplicate)?;
    let tree = scratch.path().join(SCRATCH_TREE);
    fs::create_dir(&tree)?;
    let layout = extract_all(&duplicate, &tree)?;

    let old_dist_info = find_dist_info(&tree, source)?;
    let new_dist_info = format!("{}-{version}{DIST_INFO_SUFFIX}", wheel_name.distribution());
    if old_dist_info != new_dist_info {
        fs::rename(tree.join(&old_dist_info), tree.join(&new_dist_info))?;
    }
    let layout = layout.renamed(&old_dist_info, &new_dist_info);

    let dist_info_dir = tree.join(&new_dist_info);
    let metadata = patch_metadata(&dist_info_dir, &new_dist_info, version)?;
    refresh_record(&dist_info_dir, &old_dist_info, &new_dist_info, &metadata)?;

    let parent = destination
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut staged = Builder::new()
        .prefix(".wheelstamp-")
        .suffix(".tmp")
        .tempfile_in(parent)?;
    let entries = pack_tree(&tree, &layout, &mut staged)?;
    staged.as_file().sync_all()?;
    staged.persist(destination).map_err(|err| err.error)?;

    tracing::debug!(
        source = %source.display(),
        destination = %destination.display(),
        old_dist_info = %old_dist_info,
        new_dist_info = %new_dist_info,
        entries,
        "rewrote wheel metadata"
    );

    Ok(RewriteReport {
        old_dist_info,
        new_dist_info,
        entries,
    })
}

/// Entries of the source archive in archive order, with their stored unix
/// modes.
#[derive(Debug, Default)]
struct ArchiveLayout {
    entries: Vec<(String, Option<u32>)>,
}

impl ArchiveLayout {
    fn push(&mut self, name: String, mode: Option<u32>) {
        self.entries.push((name, mode));
    }

    fn renamed(self, old_dir: &str, new_dir: &str) -> Self {
        let old_prefix = format!("{old_dir}/");
        let entries = self
            .entries
            .into_iter()
            .map(|(name, mode)| match name.strip_prefix(&old_prefix) {
                Some(rest) => (format!("{new_dir}/{rest}"), mode),
                None => (name, mode),
            })
            .collect();
        ArchiveLayout { entries }
    }

    /// Archive position and original mode by entry name.
    fn position(&self) -> HashMap<&str, (usize, Option<u32>)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(index, (name, mode))| (name.as_str(), (index, *mode)))
            .collect()
    }
}

fn extract_all(archive_path: &Path, dest: &Path) -> Result<ArchiveLayout, WheelError> {
    let mut archive = ZipArchive::new(File::open(archive_path)?)?;
    let mut layout = ArchiveLayout::default();

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        let Some(rel_path) = entry.enclosed_name() else {
            return Err(WheelError::UnsafeEntry(entry.name().to_string()));
        };
        let mode = entry.unix_mode();
        if mode.is_some_and(|mode| mode & FILE_TYPE_MASK == SYMLINK_TYPE) {
            return Err(WheelError::SymlinkEntry(entry.name().to_string()));
        }
        let output_path = dest.join(&rel_path);

        if entry.is_dir() {
            fs::create_dir_all(&output_path)?;
            layout.push(format!("{}/", entry_name(&rel_path)), mode);
            continue;
        }

        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut outfile = File::create(&output_path)?;
        io::copy(&mut entry, &mut outfile)?;
        apply_unix_mode(&output_path, mode)?;
        layout.push(entry_name(&rel_path), mode);
    }

    Ok(layout)
}

/// The scratch copy always gets owner read/write so METADATA and RECORD stay
/// patchable; the archived mode is restored from the layout on re-pack.
#[cfg(unix)]
fn apply_unix_mode(path: &Path, mode: Option<u32>) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    match mode {
        Some(mode) => fs::set_permissions(path, fs::Permissions::from_mode((mode & 0o7777) | 0o600)),
        None => Ok(()),
    }
}

#[cfg(not(unix))]
fn apply_unix_mode(_path: &Path, _mode: Option<u32>) -> io::Result<()> {
    Ok(())
}

/// Locate the single top-level `.dist-info` directory of an extracted tree.
fn find_dist_info(tree: &Path, archive: &Path) -> Result<String, WheelError> {
    let mut candidates = Vec::new();
    for entry in fs::read_dir(tree)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            if name.ends_with(DIST_INFO_SUFFIX) {
                candidates.push(name.to_string());
            }
        }
    }
    candidates.sort();

    match candidates.len() {
        0 => Err(WheelError::MissingMetadataDir(archive.to_path_buf())),
        1 => Ok(candidates.remove(0)),
        _ => Err(WheelError::AmbiguousMetadataDir {
            archive: archive.to_path_buf(),
            candidates,
        }),
    }
}

/// Patch the `Version:` field of METADATA; returns the new file bytes.
fn patch_metadata(
    dist_info_dir: &Path,
    dist_info: &str,
    version: &str,
) -> Result<Vec<u8>, WheelError> {
    let path = dist_info_dir.join(METADATA_FILE);
    if !path.is_file() {
        return Err(WheelError::MissingMetadataFile {
            dist_info: dist_info.to_string(),
        });
    }
    let text = fs::read_to_string(&path)?;
    let (patched, replaced) = replace_version_field(&text, version);
    if replaced == 0 {
        return Err(WheelError::MissingVersionField {
            dist_info: dist_info.to_string(),
        });
    }
    fs::write(&path, patched.as_bytes())?;
    Ok(patched.into_bytes())
}

/// Replace every line starting with `Version:`; returns the text and the
/// number of replaced lines.
///
/// Line endings come out as `\n`. A trailing newline survives.
pub fn replace_version_field(text: &str, version: &str) -> (String, usize) {
    let mut replaced = 0;
    let lines: Vec<String> = text
        .lines()
        .map(|line| {
            if line.starts_with(VERSION_FIELD) {
                replaced += 1;
                format!("{VERSION_FIELD} {version}")
            } else {
                line.to_string()
            }
        })
        .collect();
    let mut patched = lines.join("\n");
    if text.ends_with('\n') {
        patched.push('\n');
    }
    (patched, replaced)
}

fn refresh_record(
    dist_info_dir: &Path,
    old_dist_info: &str,
    new_dist_info: &str,
    metadata: &[u8],
) -> Result<(), WheelError> {
    let path = dist_info_dir.join(RECORD_FILE);
    if !path.is_file() {
        return Ok(());
    }
    let text = fs::read_to_string(&path)?;
    let updated = rewrite_record(&text, old_dist_info, new_dist_info, metadata);
    fs::write(&path, updated)?;
    Ok(())
}

/// Move RECORD rows to the new `.dist-info` prefix and re-hash METADATA.
///
/// Rows are `path,hash,size`; the path may itself be quoted and contain
/// commas, so the row is split from the right.
pub fn rewrite_record(
    text: &str,
    old_dist_info: &str,
    new_dist_info: &str,
    metadata: &[u8],
) -> String {
    let old_prefix = format!("{old_dist_info}/");
    let metadata_path = format!("{new_dist_info}/{METADATA_FILE}");

    let mut rows = Vec::new();
    for line in text.lines() {
        let mut fields = line.rsplitn(3, ',');
        let (Some(size), Some(hash), Some(path)) = (fields.next(), fields.next(), fields.next())
        else {
            rows.push(line.to_string());
            continue;
        };

        let quoted = path.len() >= 2 && path.starts_with('"') && path.ends_with('"');
        let bare = if quoted { &path[1..path.len() - 1] } else { path };
        let new_path = match bare.strip_prefix(&old_prefix) {
            Some(rest) => format!("{new_dist_info}/{rest}"),
            None => bare.to_string(),
        };
        let (hash, size) = if new_path == metadata_path {
            (record_hash(metadata), metadata.len().to_string())
        } else {
            (hash.to_string(), size.to_string())
        };
        let path = if quoted {
            format!("\"{new_path}\"")
        } else {
            new_path
        };
        rows.push(format!("{path},{hash},{size}"));
    }

    let mut updated = rows.join("\n");
    if text.ends_with('\n') {
        updated.push('\n');
    }
    updated
}

/// `sha256=<urlsafe base64, no padding>` as used by wheel RECORD files.
pub fn record_hash(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    format!(
        "sha256={}",
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(digest)
    )
}

/// Zip every file under `tree` into `staged`, keeping the source archive's
/// entry order; returns the number of file entries written.
fn pack_tree(
    tree: &Path,
    layout: &ArchiveLayout,
    staged: &mut NamedTempFile,
) -> Result<usize, WheelError> {
    let mut files: BTreeMap<String, PathBuf> = BTreeMap::new();
    let mut dirs: BTreeMap<String, PathBuf> = BTreeMap::new();
    for entry in WalkDir::new(tree).follow_links(false).sort_by_file_name() {
        let entry = entry?;
        let Ok(rel_path) = entry.path().strip_prefix(tree) else {
            continue;
        };
        if rel_path.as_os_str().is_empty() {
            continue;
        }
        let name = entry_name(rel_path);
        if entry.file_type().is_dir() {
            dirs.insert(format!("{name}/"), entry.path().to_path_buf());
        } else {
            files.insert(name, entry.path().to_path_buf());
        }
    }

    // Directories are only written when the source archive listed them.
    let position = layout.position();
    let mut ordered: Vec<(&str, &Path, bool)> = dirs
        .iter()
        .filter(|(name, _)| position.contains_key(name.as_str()))
        .map(|(name, path)| (name.as_str(), path.as_path(), true))
        .chain(files.iter().map(|(name, path)| (name.as_str(), path.as_path(), false)))
        .collect();
    ordered.sort_by_key(|(name, _, _)| {
        let index = position.get(name).map_or(usize::MAX, |(index, _)| *index);
        (index, *name)
    });

    let mut writer = ZipWriter::new(staged.as_file_mut());
    let mut entries = 0;
    for (name, path, is_dir) in ordered {
        let metadata = fs::metadata(path)?;
        let stored_mode = position.get(name).and_then(|(_, mode)| *mode);
        let options = entry_options(&metadata, stored_mode);
        if is_dir {
            writer.add_directory(name, options)?;
            continue;
        }
        writer.start_file(name, options.large_file(metadata.len() >= u64::from(u32::MAX)))?;
        io::copy(&mut File::open(path)?, &mut writer)?;
        entries += 1;
    }
    writer.finish()?;
    Ok(entries)
}

/// Entries from the source archive keep their stored mode; anything else
/// takes the mode it has on disk.
fn entry_options(metadata: &fs::Metadata, stored_mode: Option<u32>) -> SimpleFileOptions {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    if let Some(mode) = stored_mode {
        return options.unix_permissions(mode & 0o7777);
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        options.unix_permissions(metadata.permissions().mode() & 0o7777)
    }
    #[cfg(not(unix))]
    {
        let _ = metadata;
        options
    }
}

/// Archive entry name for a relative path: components joined by `/`.
fn entry_name(rel_path: &Path) -> String {
    rel_path
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
