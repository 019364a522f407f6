//! Zip archives of report files

use crate::error::Result;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Suffix of an archive that is still being written
pub const PARTIAL_SUFFIX: &str = "part";

/// Write `members` into a new archive at `archive`, each under its base name
///
/// The archive only appears at `archive` once it is complete; a failed write leaves
/// nothing behind.
pub fn write_zip<P: AsRef<Path>>(archive: &Path, members: &[P]) -> Result<()> {
    let partial = partial_path(archive);

    match write_members(&partial, members) {
        Ok(()) => {
            std::fs::rename(&partial, archive)?;
            Ok(())
        },
        Err(e) => {
            if let Err(remove) = std::fs::remove_file(&partial) {
                if remove.kind() != std::io::ErrorKind::NotFound {
                    warn!("Cannot remove {}: {}", partial.display(), remove);
                }
            }
            Err(e)
        },
    }
}

fn write_members<P: AsRef<Path>>(target: &Path, members: &[P]) -> Result<()> {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut zip = ZipWriter::new(File::create(target)?);

    for member in members {
        let member = member.as_ref();
        zip.start_file(base_name(member), options)?;
        zip.write_all(&std::fs::read(member)?)?;
    }

    zip.finish()?;
    Ok(())
}

/// `x.zip.part` next to `x.zip`
pub fn partial_path(archive: &Path) -> PathBuf {
    let mut name = archive.as_os_str().to_owned();
    name.push(".");
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}

/// Final path component as a string
pub fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
