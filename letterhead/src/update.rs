//! Release feed checks.
//!
//! Looks up the latest GitHub release of the configured repository, tells
//! the caller whether a newer installer is available and downloads it.
//! Everything here is blocking: callers run it on a blocking worker. The
//! startup check is best-effort and logs failures at debug level.
//!
//! Downloads are staged as `<dest>.partial` and renamed once complete, so an
//! interrupted download never leaves a truncated installer at `dest`.

use serde::Deserialize;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::error::{LetterheadError, Result};

/// Timeout for the release lookup.
pub const CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Installer suffix looked for in release assets.
pub const INSTALLER_SUFFIX: &str = if cfg!(windows) { ".exe" } else { ".tar.gz" };

const USER_AGENT: &str = concat!("letterhead/", env!("CARGO_PKG_VERSION"));
const DOWNLOAD_CHUNK: usize = 8192;
const PARTIAL_EXTENSION: &str = "partial";

/// Repository (`owner/name`) releases are fetched from, fixed at build time.
pub fn release_repo() -> Option<&'static str> {
    option_env!("LETTERHEAD_RELEASE_REPO").filter(|repo| !repo.trim().is_empty())
}

/// A published release.
#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseInfo {
    /// Release tag, usually `vX.Y.Z`.
    pub tag_name: String,
    /// Downloadable files.
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

/// A downloadable release file.
#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseAsset {
    /// File name.
    pub name: String,
    /// Direct download URL.
    pub browser_download_url: String,
}

/// A newer release with an installer for this platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailableUpdate {
    /// Version without the leading `v`.
    pub version: String,
    /// Installer download URL.
    pub download_url: String,
    /// Installer file name, as published.
    pub asset_name: String,
}

/// Fetch the latest release of `repo`.
pub fn fetch_latest_release(repo: &str, timeout: Duration) -> Result<ReleaseInfo> {
    let url = format!("https://api.github.com/repos/{repo}/releases/latest");
    let agent = ureq::AgentBuilder::new().timeout(timeout).build();
    let response = agent
        .get(&url)
        .set("User-Agent", USER_AGENT)
        .set("Accept", "application/vnd.github+json")
        .call()
        .map_err(|e| LetterheadError::update(format!("failed to fetch release info: {e}")))?;

    let mut body = String::new();
    response
        .into_reader()
        .read_to_string(&mut body)
        .map_err(|e| LetterheadError::update(format!("failed to read release body: {e}")))?;
    serde_json::from_str(&body)
        .map_err(|e| LetterheadError::update(format!("failed to parse release info: {e}")))
}

/// Strip a leading `v` from a release tag.
pub fn normalize_version(tag: &str) -> &str {
    tag.trim().trim_start_matches('v')
}

/// Check whether `latest` is a higher version than `current`.
///
/// Versions are compared as dotted numbers; missing components count as
/// zero. Unparseable versions are never considered newer.
pub fn is_newer_version(latest: &str, current: &str) -> bool {
    match (parse_version(latest), parse_version(current)) {
        (Some(latest), Some(current)) => latest > current,
        _ => false,
    }
}

fn parse_version(version: &str) -> Option<Vec<u64>> {
    let version = normalize_version(version);
    // Pre-release and build metadata are ignored.
    let core = version.split(['-', '+']).next()?;
    let mut parts = core
        .split('.')
        .map(|part| part.parse::<u64>().ok())
        .collect::<Option<Vec<u64>>>()?;
    while parts.len() > 1 && parts.last() == Some(&0) {
        parts.pop();
    }
    Some(parts)
}

/// First asset whose name ends with `suffix`.
pub fn find_asset<'a>(release: &'a ReleaseInfo, suffix: &str) -> Option<&'a ReleaseAsset> {
    release
        .assets
        .iter()
        .find(|asset| asset.name.ends_with(suffix))
}

/// Compare a fetched release against `current`.
pub fn evaluate_release(
    release: &ReleaseInfo,
    current: &str,
    suffix: &str,
) -> Option<AvailableUpdate> {
    let latest = normalize_version(&release.tag_name);
    if !is_newer_version(latest, current) {
        debug!(latest, current, "No newer release");
        return None;
    }
    let asset = find_asset(release, suffix)?;
    Some(AvailableUpdate {
        version: latest.to_string(),
        download_url: asset.browser_download_url.clone(),
        asset_name: asset.name.clone(),
    })
}

/// Look for a release of `repo` newer than `current`.
pub fn check_for_update(repo: &str, current: &str) -> Result<Option<AvailableUpdate>> {
    let release = fetch_latest_release(repo, CHECK_TIMEOUT)?;
    Ok(evaluate_release(&release, current, INSTALLER_SUFFIX))
}

/// Stream `url` into `dest`, calling `progress(downloaded, total)` after
/// every chunk. `total` is `None` when the server sends no length.
pub fn download_asset<F>(url: &str, dest: &Path, mut progress: F) -> Result<u64>
where
    F: FnMut(u64, Option<u64>),
{
    let response = ureq::AgentBuilder::new()
        .build()
        .get(url)
        .set("User-Agent", USER_AGENT)
        .call()
        .map_err(|e| LetterheadError::update(format!("failed to download asset: {e}")))?;
    let total = response
        .header("Content-Length")
        .and_then(|value| value.parse::<u64>().ok());

    let mut reader = response.into_reader();
    save_stream(&mut reader, total, dest, &mut progress)
}

/// Folder installers are downloaded into: the user's downloads folder, or
/// the temporary directory when there is none.
pub fn download_dir() -> PathBuf {
    dirs::download_dir().unwrap_or_else(std::env::temp_dir)
}

/// Download the installer of `update` into `dir` and return its path.
///
/// # Errors
///
/// Returns [`LetterheadError::Update`] if the asset name is not a plain file
/// name or the download fails.
pub fn download_update<F>(update: &AvailableUpdate, dir: &Path, progress: F) -> Result<PathBuf>
where
    F: FnMut(u64, Option<u64>),
{
    let dest = dir.join(installer_file_name(&update.asset_name)?);
    let bytes = download_asset(&update.download_url, &dest, progress)?;
    debug!(path = %dest.display(), bytes, "Downloaded installer");
    Ok(dest)
}

fn installer_file_name(asset_name: &str) -> Result<&str> {
    let path = Path::new(asset_name);
    match path.file_name().and_then(|name| name.to_str()) {
        Some(name) if path.components().count() == 1 => Ok(name),
        _ => Err(LetterheadError::update(format!(
            "refusing to save release asset '{asset_name}'"
        ))),
    }
}

/// Stream `reader` into `<dest>.partial`, then rename it to `dest`.
///
/// The staging file is removed when the copy fails.
fn save_stream<R, F>(
    reader: &mut R,
    total: Option<u64>,
    dest: &Path,
    progress: &mut F,
) -> Result<u64>
where
    R: Read,
    F: FnMut(u64, Option<u64>),
{
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(PARTIAL_EXTENSION);
    let staging = dest.with_file_name(name);

    let copied = match write_staging(&staging, reader, total, progress) {
        Ok(copied) => copied,
        Err(e) => {
            if let Err(cleanup) = std::fs::remove_file(&staging) {
                debug!(path = %staging.display(), "Could not remove partial download: {cleanup}");
            }
            return Err(e);
        }
    };

    std::fs::rename(&staging, dest)?;
    Ok(copied)
}

fn write_staging<R, F>(
    staging: &Path,
    reader: &mut R,
    total: Option<u64>,
    progress: &mut F,
) -> Result<u64>
where
    R: Read,
    F: FnMut(u64, Option<u64>),
{
    let mut file = File::create(staging)?;
    let copied = copy_with_progress(reader, &mut file, total, progress)?;
    file.sync_all()?;
    Ok(copied)
}

fn copy_with_progress<R, W, F>(
    reader: &mut R,
    writer: &mut W,
    total: Option<u64>,
    progress: &mut F,
) -> Result<u64>
where
    R: Read,
    W: Write,
    F: FnMut(u64, Option<u64>),
{
    let mut buf = [0u8; DOWNLOAD_CHUNK];
    let mut downloaded = 0u64;
    loop {
        let read = reader.read(&mut buf)?;
        if read == 0 {
            break;
        }
        writer.write_all(&buf[..read])?;
        downloaded += read as u64;
        progress(downloaded, total);
    }
    writer.flush()?;
    Ok(downloaded)
}
