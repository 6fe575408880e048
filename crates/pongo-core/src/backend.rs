//! USB backend resolution.
//!
//! Resolution runs an ordered chain of strategies and takes the first one
//! that succeeds. The default chain prefers the platform's own USB access
//! (what nusb talks to) and falls back to scanning well-known library
//! prefixes for a libusb-1.0 build, which is where end-user machines with
//! Homebrew or Procursus installs keep it.
//!
//! Transfers always go through nusb. A `Backend::Library` result is a
//! diagnostic only: it tells the user a libusb build exists, nothing loads it.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::error::{Error, Result};

/// Prefixes searched for a libusb build, in order.
pub const DEFAULT_SEARCH_PREFIXES: &[&str] = &[
    "/usr/local/lib",
    "/usr/lib",
    "/opt/homebrew/lib",
    "/opt/procursus/lib",
];

/// Substring identifying a libusb 1.0 library file.
pub const LIBRARY_NAME_PATTERN: &str = "libusb-1.0";

/// Shared-library extensions accepted by the scan.
pub const LIBRARY_EXTENSIONS: &[&str] = &["so", "dylib"];

/// A usable USB access backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    /// OS-level USB access (usbfs, IOKit, WinUSB).
    Native,
    /// A libusb shared library found on disk. Reported, never loaded.
    Library(PathBuf),
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Native => write!(f, "native"),
            Backend::Library(path) => write!(f, "library {}", path.display()),
        }
    }
}

/// Which strategies `ResolverChain::for_preference` builds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendPreference {
    /// Native first, library scan as fallback.
    #[default]
    Auto,
    /// Native only.
    Native,
    /// Library scan only.
    LibraryScan,
}

/// One way of finding a backend.
pub trait BackendResolver {
    fn name(&self) -> &'static str;

    fn resolve(&self) -> Option<Backend>;

    /// Locations this resolver looks at, reported when the whole chain fails.
    fn searched(&self) -> Vec<PathBuf> {
        Vec::new()
    }
}

/// Succeeds wherever nusb has direct OS access.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeResolver;

impl BackendResolver for NativeResolver {
    fn name(&self) -> &'static str {
        "native"
    }

    fn resolve(&self) -> Option<Backend> {
        if cfg!(any(
            target_os = "linux",
            target_os = "android",
            target_os = "macos",
            target_os = "windows"
        )) {
            Some(Backend::Native)
        } else {
            None
        }
    }
}

/// Recursive scan of library prefixes for a libusb file.
///
/// Only reached when the native resolver fails (or is configured away), so
/// on Linux, Android, macOS and Windows the `Auto` chain never consults it.
#[derive(Debug, Clone)]
pub struct LibraryScan {
    prefixes: Vec<PathBuf>,
}

impl LibraryScan {
    pub fn new<I, P>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            prefixes: prefixes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn prefixes(&self) -> &[PathBuf] {
        &self.prefixes
    }

    /// First matching file under the first prefix that has one.
    ///
    /// Later prefixes are not read once a match is found. Missing or
    /// unreadable prefixes are skipped.
    pub fn locate(&self) -> Option<PathBuf> {
        self.prefixes.iter().find_map(|prefix| {
            debug!(prefix = %prefix.display(), "Scanning for libusb");
            scan_dir(prefix)
        })
    }
}

impl Default for LibraryScan {
    fn default() -> Self {
        Self::new(DEFAULT_SEARCH_PREFIXES.iter().copied())
    }
}

impl BackendResolver for LibraryScan {
    fn name(&self) -> &'static str {
        "library-scan"
    }

    fn resolve(&self) -> Option<Backend> {
        self.locate().map(Backend::Library)
    }

    fn searched(&self) -> Vec<PathBuf> {
        self.prefixes.clone()
    }
}

fn is_library(path: &Path) -> bool {
    let name_matches = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.contains(LIBRARY_NAME_PATTERN));
    let ext_matches = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| LIBRARY_EXTENSIONS.contains(&e));
    name_matches && ext_matches && path.is_file()
}

fn scan_dir(dir: &Path) -> Option<PathBuf> {
    let mut entries: Vec<_> = fs::read_dir(dir).ok()?.filter_map(|e| e.ok()).collect();
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let path = entry.path();
        // file_type() does not follow symlinks, so linked directories are not re-entered.
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        if is_dir {
            if let Some(found) = scan_dir(&path) {
                return Some(found);
            }
        } else if is_library(&path) {
            return Some(path);
        }
    }
    None
}

/// Ordered list of resolvers; first success wins.
pub struct ResolverChain {
    resolvers: Vec<Box<dyn BackendResolver>>,
}

impl ResolverChain {
    pub fn new(resolvers: Vec<Box<dyn BackendResolver>>) -> Self {
        Self { resolvers }
    }

    /// Build the chain for a preference, scanning `prefixes`.
    pub fn for_preference(preference: BackendPreference, prefixes: &[PathBuf]) -> Self {
        let scan = || -> Box<dyn BackendResolver> {
            Box::new(LibraryScan::new(prefixes.iter().cloned()))
        };
        let resolvers: Vec<Box<dyn BackendResolver>> = match preference {
            BackendPreference::Auto => vec![Box::new(NativeResolver), scan()],
            BackendPreference::Native => vec![Box::new(NativeResolver)],
            BackendPreference::LibraryScan => vec![scan()],
        };
        Self::new(resolvers)
    }

    #[instrument(level = "debug", skip(self))]
    pub fn resolve(&self) -> Result<Backend> {
        for resolver in &self.resolvers {
            if let Some(backend) = resolver.resolve() {
                info!(resolver = resolver.name(), backend = %backend, "USB backend resolved");
                return Ok(backend);
            }
            debug!(resolver = resolver.name(), "Resolver found nothing");
        }

        Err(Error::NoBackendAvailable {
            searched: self.resolvers.iter().flat_map(|r| r.searched()).collect(),
        })
    }
}

impl Default for ResolverChain {
    fn default() -> Self {
        Self::new(vec![Box::new(NativeResolver), Box::new(LibraryScan::default())])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct Unavailable;

    impl BackendResolver for Unavailable {
        fn name(&self) -> &'static str {
            "unavailable"
        }

        fn resolve(&self) -> Option<Backend> {
            None
        }
    }

    fn prefixes(root: &TempDir) -> Vec<PathBuf> {
        ["local", "usr", "homebrew", "procursus"]
            .iter()
            .map(|p| {
                let dir = root.path().join(p);
                fs::create_dir_all(&dir).unwrap();
                dir
            })
            .collect()
    }

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn test_default_prefix_order() {
        let scan = LibraryScan::default();
        let expected: Vec<PathBuf> = [
            "/usr/local/lib",
            "/usr/lib",
            "/opt/homebrew/lib",
            "/opt/procursus/lib",
        ]
        .iter()
        .map(PathBuf::from)
        .collect();
        assert_eq!(scan.prefixes(), expected.as_slice());
    }

    #[test]
    fn test_third_prefix_wins_over_fourth() {
        let root = TempDir::new().unwrap();
        let dirs = prefixes(&root);
        let third = dirs[2].join("libusb-1.0.dylib");
        touch(&third);
        touch(&dirs[3].join("libusb-1.0.dylib"));

        let scan = LibraryScan::new(dirs);
        assert_eq!(scan.locate(), Some(third.clone()));
        assert_eq!(scan.resolve(), Some(Backend::Library(third)));
    }

    #[test]
    fn test_scan_is_recursive() {
        let root = TempDir::new().unwrap();
        let dirs = prefixes(&root);
        let nested = dirs[1].join("x86_64-linux-gnu").join("libusb-1.0.so");
        touch(&nested);

        assert_eq!(LibraryScan::new(dirs).locate(), Some(nested));
    }

    #[test]
    fn test_versioned_names_and_directories_rejected() {
        let root = TempDir::new().unwrap();
        let dirs = prefixes(&root);
        touch(&dirs[0].join("libusb-1.0.so.0"));
        touch(&dirs[0].join("libusb-1.0.a"));
        touch(&dirs[0].join("libftdi.so"));
        fs::create_dir_all(dirs[1].join("libusb-1.0.so")).unwrap();

        assert_eq!(LibraryScan::new(dirs).locate(), None);
    }

    #[test]
    fn test_missing_prefixes_are_skipped() {
        let root = TempDir::new().unwrap();
        let present = root.path().join("present");
        let lib = present.join("libusb-1.0.so");
        touch(&lib);

        let scan = LibraryScan::new([root.path().join("absent"), present]);
        assert_eq!(scan.locate(), Some(lib));
    }

    #[test]
    fn test_chain_falls_back_to_scan() {
        let root = TempDir::new().unwrap();
        let dirs = prefixes(&root);
        let lib = dirs[2].join("libusb-1.0.so");
        touch(&lib);

        let chain = ResolverChain::new(vec![
            Box::new(Unavailable),
            Box::new(LibraryScan::new(dirs)),
        ]);
        assert_eq!(chain.resolve().unwrap(), Backend::Library(lib));
    }

    #[test]
    fn test_chain_exhausted_reports_searched() {
        let root = TempDir::new().unwrap();
        let dirs = prefixes(&root);

        let chain = ResolverChain::new(vec![
            Box::new(Unavailable),
            Box::new(LibraryScan::new(dirs.clone())),
        ]);
        match chain.resolve() {
            Err(Error::NoBackendAvailable { searched }) => assert_eq!(searched, dirs),
            other => panic!("expected NoBackendAvailable, got {:?}", other),
        }
    }

    #[cfg(any(
        target_os = "linux",
        target_os = "android",
        target_os = "macos",
        target_os = "windows"
    ))]
    #[test]
    fn test_auto_prefers_native_over_installed_library() {
        let root = TempDir::new().unwrap();
        let dirs = prefixes(&root);
        touch(&dirs[0].join("libusb-1.0.so"));

        let chain = ResolverChain::for_preference(BackendPreference::Auto, &dirs);
        assert_eq!(chain.resolve().unwrap(), Backend::Native);
    }

    #[test]
    fn test_preference_deserializes_kebab_case() {
        #[derive(Deserialize)]
        struct Wrapper {
            backend: BackendPreference,
        }
        let w: Wrapper = toml::from_str("backend = \"library-scan\"").unwrap();
        assert_eq!(w.backend, BackendPreference::LibraryScan);
    }
}
