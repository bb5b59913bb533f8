//! Wheel archives
//!
//! Reads the installable files and declared entry points out of a wheel
//! (a zip archive). Entries are always visited in name order so that the
//! layer built from them is reproducible regardless of how the archive was
//! written.

use crate::error::{LaminaError, LaminaResult};
use crate::layer::{LayerEntry, DEFAULT_MODE, EXECUTABLE_MODE};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;
use zip::ZipArchive;

/// Entry point sections that produce executable scripts
const SCRIPT_SECTIONS: &[&str] = &["console_scripts", "gui_scripts"];

/// Where wheel contents land inside the image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallLayout {
    /// Library directory, relative to `/`
    pub site_packages: String,
    /// Script directory, relative to `/`
    pub bin_dir: String,
    /// Interpreter used for `#!python` script shebangs
    pub interpreter: String,
}

impl Default for InstallLayout {
    fn default() -> Self {
        Self {
            site_packages: "usr/local/lib/python3/site-packages".to_string(),
            bin_dir: "usr/local/bin".to_string(),
            interpreter: "/usr/bin/env python3".to_string(),
        }
    }
}

/// A wheel read fully into memory
#[derive(Debug)]
pub struct Wheel {
    path: PathBuf,
    files: BTreeMap<String, (Vec<u8>, Option<u32>)>,
}

impl Wheel {
    /// Open and read a wheel file
    pub fn open(path: &Path) -> LaminaResult<Self> {
        let file = File::open(path)
            .map_err(|e| LaminaError::io(format!("opening {}", path.display()), e))?;
        let mut archive = ZipArchive::new(file).map_err(|e| wheel_error(path, e))?;

        let mut files = BTreeMap::new();
        for index in 0..archive.len() {
            let mut entry = archive.by_index(index).map_err(|e| wheel_error(path, e))?;
            if entry.is_dir() {
                continue;
            }
            let name = entry.name().to_string();
            if name.starts_with('/') || name.split('/').any(|part| part == "..") {
                return Err(LaminaError::Wheel {
                    path: path.to_path_buf(),
                    reason: format!("unsafe entry path {}", name),
                });
            }
            let mode = entry.unix_mode();
            let mut data = Vec::with_capacity(entry.size() as usize);
            entry
                .read_to_end(&mut data)
                .map_err(|e| LaminaError::io(format!("reading {} from {}", name, path.display()), e))?;
            files.insert(name, (data, mode));
        }

        Ok(Self {
            path: path.to_path_buf(),
            files,
        })
    }

    /// Path the wheel was read from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Layer entries installing this wheel, sorted by archive name
    pub fn install_entries(&self, layout: &InstallLayout) -> Vec<LayerEntry> {
        let mut entries = Vec::new();

        for (name, (data, mode)) in &self.files {
            let (first, rest) = name.split_once('/').unwrap_or((name.as_str(), ""));

            if first.ends_with(".data") {
                let (scheme, inner) = rest.split_once('/').unwrap_or((rest, ""));
                if inner.is_empty() {
                    continue;
                }
                match scheme {
                    "purelib" | "platlib" => entries.push(
                        LayerEntry::file(join(&layout.site_packages, inner), data.clone())
                            .with_mode(file_mode(*mode)),
                    ),
                    "scripts" => entries.push(LayerEntry::executable(
                        join(&layout.bin_dir, inner),
                        rewrite_shebang(data, &layout.interpreter),
                    )),
                    other => debug!("Skipping {} payload {} in {}", other, inner, self.path.display()),
                }
                continue;
            }

            entries.push(
                LayerEntry::file(join(&layout.site_packages, name), data.clone())
                    .with_mode(file_mode(*mode)),
            );
        }

        entries
    }

    /// Scripts declared in `*.dist-info/entry_points.txt`, by name
    pub fn entry_points(&self) -> BTreeMap<String, String> {
        let mut scripts = BTreeMap::new();
        for (name, (data, _)) in &self.files {
            let Some((dir, file)) = name.split_once('/') else {
                continue;
            };
            if dir.ends_with(".dist-info") && file == "entry_points.txt" {
                parse_entry_points(&String::from_utf8_lossy(data), &mut scripts);
            }
        }
        scripts
    }
}

fn wheel_error(path: &Path, err: zip::result::ZipError) -> LaminaError {
    LaminaError::Wheel {
        path: path.to_path_buf(),
        reason: err.to_string(),
    }
}

fn join(dir: &str, path: &str) -> String {
    let dir = dir.trim_matches('/');
    if dir.is_empty() {
        path.to_string()
    } else {
        format!("{}/{}", dir, path)
    }
}

/// Executable files keep the executable bit; everything else is 0644
fn file_mode(mode: Option<u32>) -> u32 {
    match mode {
        Some(m) if m & 0o111 != 0 => EXECUTABLE_MODE,
        _ => DEFAULT_MODE,
    }
}

/// Replace the placeholder `#!python` shebang wheels use for scripts
fn rewrite_shebang(data: &[u8], interpreter: &str) -> Vec<u8> {
    for placeholder in [&b"#!pythonw"[..], &b"#!python"[..]] {
        if let Some(rest) = data.strip_prefix(placeholder) {
            if rest.first().is_some_and(|b| *b == b'\n' || *b == b'\r') {
                let mut out = format!("#!{}", interpreter).into_bytes();
                out.extend_from_slice(rest);
                return out;
            }
        }
    }
    data.to_vec()
}

/// Parse script sections of an `entry_points.txt` into `scripts`.
///
/// The first declaration of a name wins.
pub fn parse_entry_points(contents: &str, scripts: &mut BTreeMap<String, String>) {
    let mut in_section = false;
    for line in contents.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with('[') {
            let section = trimmed.trim_start_matches('[').trim_end_matches(']').trim();
            in_section = SCRIPT_SECTIONS
                .iter()
                .any(|s| s.eq_ignore_ascii_case(section));
            continue;
        }
        if !in_section || trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
            continue;
        }
        if let Some((name, target)) = trimmed.split_once('=') {
            let name = name.trim();
            let target = target.trim();
            if !name.is_empty() && !target.is_empty() {
                scripts
                    .entry(name.to_string())
                    .or_insert_with(|| target.to_string());
            }
        }
    }
}
