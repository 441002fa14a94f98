//! Source-build helper for native libraries.
//!
//! A [`Recipe`] names the archives, patches and configure flags of one
//! library; [`Forge`] runs the download, extract, patch, configure, compile
//! and install steps in order, skipping work whose output is already current.
//! Everything is synchronous and single-threaded; the only state between
//! runs is the files on disk and the stored digest of the configure flags.

pub mod archive;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::SystemTime;

use log::{debug, info};

#[derive(Debug, thiserror::Error)]
pub enum ForgeError {
    #[error("failed to read recipe {path}: {source}")]
    RecipeRead {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse recipe {path}: {source}")]
    RecipeParse {
        path: String,
        source: serde_json::Error,
    },
    #[error("unsupported url scheme: {0}")]
    UnsupportedScheme(String),
    #[error("failed to download {url}: {source}")]
    Download {
        url: String,
        source: reqwest::Error,
    },
    #[error("download of {url} returned status {status}")]
    DownloadStatus { url: String, status: u16 },
    #[error("checksum mismatch for {path}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        path: String,
        expected: String,
        actual: String,
    },
    #[error("failed to extract {path}: {source}")]
    Extract {
        path: String,
        source: std::io::Error,
    },
    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("{command} exited with status {status}")]
    CommandFailed { command: String, status: i32 },
    #[error("failed to run {command}: {source}")]
    CommandSpawn {
        command: String,
        source: std::io::Error,
    },
    #[error("no source tree has been extracted yet, run the extract step first")]
    MissingSourceTree,
}

fn io_error(path: &Path, source: std::io::Error) -> ForgeError {
    ForgeError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// Archive making up (part of) the source tree.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FileSource {
    /// `http(s)` or `file://` location of the archive.
    pub url: String,
    /// Expected MD5 of the archive, verified when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub md5: Option<String>,
}

/// Everything needed to build one library from source.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Recipe {
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<FileSource>,
    /// Patch files applied `-p1` against the extracted tree, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub patches: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub configure_options: Vec<String>,
    /// Cross-compilation triple, also passed as `--host`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// Configure script, run through `sh` from the source tree.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configure_command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub make_command: Option<String>,
}

impl Recipe {
    pub fn read(path: &str) -> Result<Recipe, ForgeError> {
        let content = fs::read_to_string(path).map_err(|source| ForgeError::RecipeRead {
            path: path.to_string(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ForgeError::RecipeParse {
            path: path.to_string(),
            source,
        })
    }
}

/// Environment changes that activate an installed recipe.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Activation {
    /// Variable name and its full new value, in application order.
    pub changes: Vec<(String, String)>,
}

impl Activation {
    pub fn apply(&self) {
        for (variable, value) in &self.changes {
            std::env::set_var(variable, value);
        }
    }

    /// Shell `export` lines, for eval by a calling shell.
    pub fn exports(&self) -> Vec<String> {
        self.changes
            .iter()
            .map(|(variable, value)| format!("export {}=\"{}\"", variable, value))
            .collect()
    }
}

/// Build pipeline for one recipe, rooted at a ports directory.
///
/// Layout under the root: `archives/` for downloads,
/// `tmp/<host>/<name>-<version>/` for build trees and
/// `<host>/<name>/<version>/` as the install target.
pub struct Forge {
    recipe: Recipe,
    root: PathBuf,
}

impl Forge {
    pub fn new(recipe: Recipe, root: impl Into<PathBuf>) -> Forge {
        Forge {
            recipe,
            root: root.into(),
        }
    }

    pub fn recipe(&self) -> &Recipe {
        &self.recipe
    }

    fn host(&self) -> String {
        self.recipe
            .host
            .clone()
            .unwrap_or_else(|| format!("{}-{}", std::env::consts::ARCH, std::env::consts::OS))
    }

    pub fn archives_dir(&self) -> PathBuf {
        self.root.join("archives")
    }

    pub fn work_dir(&self) -> PathBuf {
        self.root
            .join("tmp")
            .join(self.host())
            .join(format!("{}-{}", self.recipe.name, self.recipe.version))
    }

    pub fn install_dir(&self) -> PathBuf {
        self.root
            .join(self.host())
            .join(&self.recipe.name)
            .join(&self.recipe.version)
    }

    /// Directory the archive extracted to: the first directory entry of the
    /// work dir.
    pub fn source_dir(&self) -> Result<PathBuf, ForgeError> {
        let entries = fs::read_dir(self.work_dir()).map_err(|_| ForgeError::MissingSourceTree)?;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                return Ok(path);
            }
        }
        Err(ForgeError::MissingSourceTree)
    }

    /// Step 1: fetch recipe files that are not already present locally.
    pub fn download(&self) -> Result<(), ForgeError> {
        let archives = self.archives_dir();
        fs::create_dir_all(&archives).map_err(|source| io_error(&archives, source))?;
        for file in &self.recipe.files {
            let target = archives.join(archive_basename(&file.url));
            if target.exists() {
                debug!("{} already downloaded", target.display());
            } else {
                fetch(&file.url, &target)?;
            }
            if let Some(expected) = &file.md5 {
                let actual = md5_file(&target)?;
                if &actual != expected {
                    return Err(ForgeError::ChecksumMismatch {
                        path: target.display().to_string(),
                        expected: expected.clone(),
                        actual,
                    });
                }
            }
        }
        Ok(())
    }

    /// Step 2: unpack every downloaded archive into the work dir. Archive
    /// mtimes are preserved so the configure skip check sees source ages.
    pub fn extract(&self) -> Result<(), ForgeError> {
        let work = self.work_dir();
        fs::create_dir_all(&work).map_err(|source| io_error(&work, source))?;
        for file in &self.recipe.files {
            let path = self.archives_dir().join(archive_basename(&file.url));
            info!("extracting {}", path.display());
            archive::unpack_tar_gz(&path, &work)?;
        }
        Ok(())
    }

    /// Step 3: apply the recipe's patches in order.
    pub fn patch(&self) -> Result<(), ForgeError> {
        if self.recipe.patches.is_empty() {
            return Ok(());
        }
        let source = self.source_dir()?;
        for patch in &self.recipe.patches {
            let absolute =
                fs::canonicalize(patch).map_err(|source| io_error(Path::new(patch), source))?;
            info!("applying {}", patch);
            let mut command = Command::new("patch");
            command
                .arg("-p1")
                .arg("-i")
                .arg(&absolute)
                .current_dir(&source);
            run(&mut command, "patch")?;
        }
        Ok(())
    }

    fn configure_script(&self) -> String {
        self.recipe
            .configure_command
            .clone()
            .unwrap_or_else(|| "configure".to_string())
    }

    fn make_program(&self) -> String {
        self.recipe
            .make_command
            .clone()
            .or_else(|| std::env::var("MAKE").ok())
            .unwrap_or_else(|| "make".to_string())
    }

    /// Flags handed to the configure script. Their digest decides whether a
    /// re-run is needed.
    pub fn configure_flags(&self) -> Vec<String> {
        let mut flags = vec![format!("--prefix={}", self.install_dir().display())];
        if let Some(host) = &self.recipe.host {
            flags.push(format!("--host={}", host));
        }
        flags.extend(self.recipe.configure_options.iter().cloned());
        flags
    }

    fn flags_digest(&self) -> String {
        md5_str(&self.configure_flags().join(" "))
    }

    fn flags_digest_file(&self) -> PathBuf {
        self.work_dir().join("configure.md5")
    }

    /// Whether configure can be skipped: the stored flag digest matches the
    /// current flags and the generated Makefile is newer than the configure
    /// script.
    pub fn configured(&self) -> bool {
        let source = match self.source_dir() {
            Ok(source) => source,
            Err(_) => return false,
        };
        let stored = match fs::read_to_string(self.flags_digest_file()) {
            Ok(stored) => stored,
            Err(_) => return false,
        };
        if stored.trim() != self.flags_digest() {
            return false;
        }
        newer_than(&source.join("Makefile"), &source.join(self.configure_script()))
    }

    /// Step 4: run the configure script, unless its output is current.
    pub fn configure(&self) -> Result<(), ForgeError> {
        if self.configured() {
            info!("{} already configured", self.recipe.name);
            return Ok(());
        }
        let source = self.source_dir()?;
        info!("configuring {}", self.recipe.name);
        let mut command = Command::new("sh");
        command
            .arg(self.configure_script())
            .args(self.configure_flags())
            .current_dir(&source);
        run(&mut command, "configure")?;
        let digest_file = self.flags_digest_file();
        fs::write(&digest_file, self.flags_digest())
            .map_err(|source| io_error(&digest_file, source))?;
        Ok(())
    }

    /// Step 5: run make, unconditionally.
    pub fn compile(&self) -> Result<(), ForgeError> {
        let source = self.source_dir()?;
        info!("compiling {}", self.recipe.name);
        run(&mut self.make(&source, &[]), "make")
    }

    /// Whether install can be skipped: the target directory is newer than
    /// the generated Makefile.
    pub fn installed(&self) -> bool {
        let source = match self.source_dir() {
            Ok(source) => source,
            Err(_) => return false,
        };
        newer_than(&self.install_dir(), &source.join("Makefile"))
    }

    /// Step 6: run make install, unless the target is already current.
    pub fn install(&self) -> Result<(), ForgeError> {
        if self.installed() {
            info!("{} already installed", self.recipe.name);
            return Ok(());
        }
        let install = self.install_dir();
        fs::create_dir_all(&install).map_err(|source| io_error(&install, source))?;
        let source = self.source_dir()?;
        info!("installing {} to {}", self.recipe.name, install.display());
        run(&mut self.make(&source, &["install"]), "make install")
    }

    /// Steps 1 through 6, in order.
    pub fn cook(&self) -> Result<(), ForgeError> {
        self.download()?;
        self.extract()?;
        self.patch()?;
        self.configure()?;
        self.compile()?;
        self.install()?;
        Ok(())
    }

    /// Step 7: environment updates activating the installed library, given
    /// the current environment. Each path is prepended only when its
    /// directory exists and the variable does not already carry it.
    pub fn activation(&self, current: &BTreeMap<String, String>) -> Activation {
        let mut changes = Vec::new();
        let install = self.install_dir();
        path_change(&mut changes, current, "PATH", &install.join("bin"));
        path_change(&mut changes, current, "CPATH", &install.join("include"));
        path_change(&mut changes, current, "LIBRARY_PATH", &install.join("lib"));
        let lib = install.join("lib");
        if lib.is_dir() {
            flag_change(
                &mut changes,
                current,
                "LDFLAGS",
                &format!("-L{}", lib.display()),
            );
        }
        Activation { changes }
    }

    fn make(&self, dir: &Path, extra: &[&str]) -> Command {
        // The make command may carry arguments of its own ("make -j4").
        let line = self.make_program();
        let mut parts = line.split_whitespace();
        let mut command = Command::new(parts.next().unwrap_or("make"));
        command.args(parts).args(extra).current_dir(dir);
        command
    }
}

fn run(command: &mut Command, label: &str) -> Result<(), ForgeError> {
    debug!("running {:?}", command);
    let status = command.status().map_err(|source| ForgeError::CommandSpawn {
        command: label.to_string(),
        source,
    })?;
    if !status.success() {
        return Err(ForgeError::CommandFailed {
            command: label.to_string(),
            status: status.code().unwrap_or(-1),
        });
    }
    Ok(())
}

fn fetch(url: &str, target: &Path) -> Result<(), ForgeError> {
    info!("downloading {}", url);
    if let Some(path) = url.strip_prefix("file://") {
        fs::copy(path, target).map_err(|source| io_error(Path::new(path), source))?;
        return Ok(());
    }
    if url.starts_with("http://") || url.starts_with("https://") {
        let response = reqwest::blocking::get(url).map_err(|source| ForgeError::Download {
            url: url.to_string(),
            source,
        })?;
        if !response.status().is_success() {
            return Err(ForgeError::DownloadStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        let bytes = response.bytes().map_err(|source| ForgeError::Download {
            url: url.to_string(),
            source,
        })?;
        fs::write(target, &bytes).map_err(|source| io_error(target, source))?;
        return Ok(());
    }
    Err(ForgeError::UnsupportedScheme(url.to_string()))
}

/// File name an archive lands under, from the last path segment of its URL.
pub fn archive_basename(url: &str) -> String {
    let no_query = url
        .split(|c| c == '?' || c == '#')
        .next()
        .unwrap_or(url);
    no_query.rsplit('/').next().unwrap_or(no_query).to_string()
}

fn md5_file(path: &Path) -> Result<String, ForgeError> {
    use md5::{Digest, Md5};
    let mut file = fs::File::open(path).map_err(|source| io_error(path, source))?;
    let mut hasher = Md5::new();
    std::io::copy(&mut file, &mut hasher).map_err(|source| io_error(path, source))?;
    Ok(hex(hasher.finalize()))
}

fn md5_str(content: &str) -> String {
    use md5::{Digest, Md5};
    hex(Md5::digest(content.as_bytes()))
}

fn hex(bytes: impl AsRef<[u8]>) -> String {
    bytes
        .as_ref()
        .iter()
        .map(|byte| format!("{:02x}", byte))
        .collect()
}

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).ok().and_then(|meta| meta.modified().ok())
}

fn newer_than(path: &Path, other: &Path) -> bool {
    match (modified(path), modified(other)) {
        (Some(a), Some(b)) => a >= b,
        _ => false,
    }
}

fn path_change(
    changes: &mut Vec<(String, String)>,
    current: &BTreeMap<String, String>,
    variable: &str,
    dir: &Path,
) {
    if !dir.is_dir() {
        return;
    }
    let dir = dir.display().to_string();
    let existing = current.get(variable).cloned().unwrap_or_default();
    if existing.split(':').any(|part| part == dir) {
        return;
    }
    let value = if existing.is_empty() {
        dir
    } else {
        format!("{}:{}", dir, existing)
    };
    changes.push((variable.to_string(), value));
}

fn flag_change(
    changes: &mut Vec<(String, String)>,
    current: &BTreeMap<String, String>,
    variable: &str,
    flag: &str,
) {
    let existing = current.get(variable).cloned().unwrap_or_default();
    if existing.split_whitespace().any(|part| part == flag) {
        return;
    }
    let value = if existing.is_empty() {
        flag.to_string()
    } else {
        format!("{} {}", flag, existing)
    };
    changes.push((variable.to_string(), value));
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Write;

    fn recipe() -> Recipe {
        Recipe {
            name: "widget".to_string(),
            version: "1.0".to_string(),
            files: Vec::new(),
            patches: Vec::new(),
            configure_options: Vec::new(),
            host: Some("test-host".to_string()),
            configure_command: None,
            make_command: None,
        }
    }

    fn set_mtime(path: &Path, time: SystemTime) {
        let file = if path.is_dir() {
            fs::File::open(path).unwrap()
        } else {
            fs::OpenOptions::new().write(true).open(path).unwrap()
        };
        file.set_modified(time).unwrap();
    }

    fn seconds_ago(seconds: u64) -> SystemTime {
        SystemTime::now() - std::time::Duration::from_secs(seconds)
    }

    #[test]
    fn archive_basename_takes_the_last_segment() {
        assert_eq!(
            archive_basename("https://example.com/pub/widget-1.0.tar.gz"),
            "widget-1.0.tar.gz"
        );
        assert_eq!(
            archive_basename("https://example.com/dl?file=x/widget.tar.gz"),
            "dl"
        );
        assert_eq!(archive_basename("widget.tar.gz"), "widget.tar.gz");
    }

    #[test]
    fn layout_follows_host_name_and_version() {
        let forge = Forge::new(recipe(), "/ports");
        assert_eq!(
            forge.work_dir(),
            PathBuf::from("/ports/tmp/test-host/widget-1.0")
        );
        assert_eq!(
            forge.install_dir(),
            PathBuf::from("/ports/test-host/widget/1.0")
        );
    }

    #[test]
    fn download_copies_file_urls_and_skips_present_archives() {
        let dir = tempfile::tempdir().unwrap();
        let origin = dir.path().join("widget-1.0.tar.gz");
        fs::write(&origin, b"archive-bytes").unwrap();

        let mut recipe = recipe();
        recipe.files = vec![FileSource {
            url: format!("file://{}", origin.display()),
            md5: None,
        }];
        let forge = Forge::new(recipe, dir.path().join("ports"));
        forge.download().unwrap();

        let landed = forge.archives_dir().join("widget-1.0.tar.gz");
        assert_eq!(fs::read(&landed).unwrap(), b"archive-bytes");

        // A present archive is left alone even when the origin changed.
        fs::write(&origin, b"different-bytes").unwrap();
        forge.download().unwrap();
        assert_eq!(fs::read(&landed).unwrap(), b"archive-bytes");
    }

    #[test]
    fn download_verifies_the_md5_when_given() {
        let dir = tempfile::tempdir().unwrap();
        let origin = dir.path().join("widget-1.0.tar.gz");
        fs::write(&origin, b"archive-bytes").unwrap();

        let mut bad = recipe();
        bad.files = vec![FileSource {
            url: format!("file://{}", origin.display()),
            md5: Some("0".repeat(32)),
        }];
        let forge = Forge::new(bad, dir.path().join("ports"));
        match forge.download() {
            Err(ForgeError::ChecksumMismatch { expected, .. }) => {
                assert_eq!(expected, "0".repeat(32));
            }
            other => panic!("expected a checksum mismatch, got {:?}", other.err()),
        }

        let mut good = recipe();
        good.files = vec![FileSource {
            url: format!("file://{}", origin.display()),
            md5: Some(md5_str("archive-bytes")),
        }];
        let forge = Forge::new(good, dir.path().join("ports2"));
        forge.download().unwrap();
    }

    #[test]
    fn unsupported_schemes_are_rejected() {
        let mut recipe = recipe();
        recipe.files = vec![FileSource {
            url: "ftp://example.com/widget.tar.gz".to_string(),
            md5: None,
        }];
        let dir = tempfile::tempdir().unwrap();
        let forge = Forge::new(recipe, dir.path());
        match forge.download() {
            Err(ForgeError::UnsupportedScheme(url)) => {
                assert_eq!(url, "ftp://example.com/widget.tar.gz")
            }
            other => panic!("expected an unsupported scheme error, got {:?}", other.err()),
        }
    }

    fn prepare_source_tree(forge: &Forge) -> PathBuf {
        let source = forge.work_dir().join("widget-1.0");
        fs::create_dir_all(&source).unwrap();
        fs::write(source.join("configure"), "#!/bin/sh\n").unwrap();
        source
    }

    #[test]
    fn configure_skip_needs_matching_flags_and_a_fresh_makefile() {
        let dir = tempfile::tempdir().unwrap();
        let forge = Forge::new(recipe(), dir.path());
        let source = prepare_source_tree(&forge);

        // Nothing generated yet.
        assert!(!forge.configured());

        fs::write(source.join("Makefile"), "all:\n").unwrap();
        fs::write(forge.flags_digest_file(), forge.flags_digest()).unwrap();
        set_mtime(&source.join("configure"), seconds_ago(100));
        assert!(forge.configured());

        // Stored flags from some other invocation.
        fs::write(forge.flags_digest_file(), "feedfacefeedfacefeedfacefeedface").unwrap();
        assert!(!forge.configured());
        fs::write(forge.flags_digest_file(), forge.flags_digest()).unwrap();
        assert!(forge.configured());

        // A configure script newer than its Makefile forces a re-run.
        set_mtime(&source.join("configure"), SystemTime::now());
        set_mtime(&source.join("Makefile"), seconds_ago(100));
        assert!(!forge.configured());
    }

    #[test]
    fn changing_the_options_changes_the_flag_digest() {
        let dir = tempfile::tempdir().unwrap();
        let plain = Forge::new(recipe(), dir.path());
        let mut tuned = recipe();
        tuned.configure_options = vec!["--enable-shared".to_string()];
        let tuned = Forge::new(tuned, dir.path());
        assert_ne!(plain.flags_digest(), tuned.flags_digest());
        assert_eq!(
            tuned.configure_flags(),
            vec![
                format!("--prefix={}", tuned.install_dir().display()),
                "--host=test-host".to_string(),
                "--enable-shared".to_string(),
            ]
        );
    }

    #[test]
    fn install_skip_needs_a_target_newer_than_the_makefile() {
        let dir = tempfile::tempdir().unwrap();
        let forge = Forge::new(recipe(), dir.path());
        let source = prepare_source_tree(&forge);

        assert!(!forge.installed());

        fs::write(source.join("Makefile"), "all:\n").unwrap();
        fs::create_dir_all(forge.install_dir()).unwrap();
        set_mtime(&source.join("Makefile"), seconds_ago(100));
        assert!(forge.installed());

        // A regenerated Makefile invalidates the install.
        set_mtime(&source.join("Makefile"), SystemTime::now());
        set_mtime(&forge.install_dir(), seconds_ago(100));
        assert!(!forge.installed());
    }

    #[test]
    fn activation_only_names_directories_that_exist() {
        let dir = tempfile::tempdir().unwrap();
        let forge = Forge::new(recipe(), dir.path());
        fs::create_dir_all(forge.install_dir().join("bin")).unwrap();
        fs::create_dir_all(forge.install_dir().join("include")).unwrap();

        let current = BTreeMap::new();
        let activation = forge.activation(&current);
        let bin = forge.install_dir().join("bin").display().to_string();
        let include = forge.install_dir().join("include").display().to_string();
        assert_eq!(
            activation.changes,
            vec![
                ("PATH".to_string(), bin),
                ("CPATH".to_string(), include),
            ]
        );
    }

    #[test]
    fn activation_prepends_and_never_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let forge = Forge::new(recipe(), dir.path());
        fs::create_dir_all(forge.install_dir().join("bin")).unwrap();
        let bin = forge.install_dir().join("bin").display().to_string();

        let mut current = BTreeMap::new();
        current.insert("PATH".to_string(), "/usr/bin:/bin".to_string());
        let activation = forge.activation(&current);
        assert_eq!(
            activation.changes,
            vec![("PATH".to_string(), format!("{}:/usr/bin:/bin", bin))]
        );

        current.insert("PATH".to_string(), format!("{}:/usr/bin:/bin", bin));
        assert_eq!(forge.activation(&current).changes, Vec::new());
    }

    #[test]
    fn activation_adds_linker_flags_for_the_lib_dir() {
        let dir = tempfile::tempdir().unwrap();
        let forge = Forge::new(recipe(), dir.path());
        fs::create_dir_all(forge.install_dir().join("lib")).unwrap();
        let lib = forge.install_dir().join("lib").display().to_string();

        let mut current = BTreeMap::new();
        current.insert("LDFLAGS".to_string(), "-O2".to_string());
        let activation = forge.activation(&current);
        assert_eq!(
            activation.changes,
            vec![
                ("LIBRARY_PATH".to_string(), lib.clone()),
                ("LDFLAGS".to_string(), format!("-L{} -O2", lib)),
            ]
        );
    }

    #[test]
    fn exports_quote_the_values() {
        let activation = Activation {
            changes: vec![("PATH".to_string(), "/opt/bin:/usr/bin".to_string())],
        };
        assert_eq!(activation.exports(), [r#"export PATH="/opt/bin:/usr/bin""#]);
    }

    fn build_archive(path: &Path) {
        let file = fs::File::create(path).unwrap();
        let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        let mut builder = tar::Builder::new(encoder);
        let script = b"#!/bin/sh\necho 'all:' > Makefile\n".to_vec();
        let mut header = tar::Header::new_gnu();
        header.set_size(script.len() as u64);
        header.set_mode(0o755);
        header.set_mtime(1_000_000);
        header.set_cksum();
        builder
            .append_data(&mut header, "widget-1.0/configure", script.as_slice())
            .unwrap();
        builder.into_inner().unwrap().finish().unwrap();
    }

    #[test]
    fn extract_unpacks_into_the_work_dir() {
        let dir = tempfile::tempdir().unwrap();
        let origin = dir.path().join("widget-1.0.tar.gz");
        build_archive(&origin);

        let mut recipe = recipe();
        recipe.files = vec![FileSource {
            url: format!("file://{}", origin.display()),
            md5: None,
        }];
        let forge = Forge::new(recipe, dir.path().join("ports"));
        forge.download().unwrap();
        forge.extract().unwrap();

        let source = forge.source_dir().unwrap();
        assert!(source.ends_with("widget-1.0"));
        assert!(source.join("configure").is_file());
    }

    #[cfg(unix)]
    #[test]
    fn cook_runs_the_whole_pipeline_and_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let origin = dir.path().join("widget-1.0.tar.gz");
        build_archive(&origin);

        let mut recipe = recipe();
        recipe.files = vec![FileSource {
            url: format!("file://{}", origin.display()),
            md5: None,
        }];
        recipe.make_command = Some("true".to_string());
        let forge = Forge::new(recipe, dir.path().join("ports"));

        forge.cook().unwrap();
        let source = forge.source_dir().unwrap();
        assert!(source.join("Makefile").is_file());
        assert!(forge.configured());
        assert!(forge.install_dir().is_dir());
        assert!(forge.installed());

        // A second cook re-extracts pristine sources and skips the rest.
        forge.cook().unwrap();
        assert!(forge.configured());
    }

    #[test]
    fn source_dir_before_extract_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let forge = Forge::new(recipe(), dir.path());
        match forge.source_dir() {
            Err(ForgeError::MissingSourceTree) => {}
            other => panic!("expected a missing source tree error, got {:?}", other.ok()),
        }
    }

    #[test]
    fn recipe_files_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("widget.json");
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(
            br#"{
                "name": "widget",
                "version": "1.0",
                "files": [{"url": "https://example.com/widget-1.0.tar.gz"}],
                "configure_options": ["--enable-shared"]
            }"#,
        )
        .unwrap();
        let recipe = Recipe::read(path.to_str().unwrap()).unwrap();
        assert_eq!(recipe.name, "widget");
        assert_eq!(recipe.configure_options, ["--enable-shared"]);
        assert!(recipe.host.is_none());
    }
}
