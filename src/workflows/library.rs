use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::domain::models::{EpisodeIdentity, EpisodeRecord};
use crate::domain::title::normalize;
use crate::error::{Error, Result};
use crate::infra::fs::FileSystem;

/// What `catalog` did with the source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogAction {
    Moved { to: PathBuf },
    RemovedDuplicate { existing: PathBuf },
    SkippedExisting { existing: PathBuf },
}

impl fmt::Display for CatalogAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogAction::Moved { to } => write!(f, "moved to {}", to.display()),
            CatalogAction::RemovedDuplicate { existing } => {
                write!(f, "removed duplicate of {}", existing.display())
            }
            CatalogAction::SkippedExisting { existing } => {
                write!(f, "file exists, nothing done: {}", existing.display())
            }
        }
    }
}

/// Knows the canonical library layout and moves files into it:
///
/// `<library>/<Series>/Season 01/<Series> S01E02.mkv`
pub struct LibraryCataloger<'a> {
    settings: &'a Settings,
    fs: &'a dyn FileSystem,
}

impl<'a> LibraryCataloger<'a> {
    pub fn new(settings: &'a Settings, fs: &'a dyn FileSystem) -> Self {
        Self { settings, fs }
    }

    pub fn season_dir(&self, identity: &EpisodeIdentity) -> PathBuf {
        self.settings
            .library_path
            .join(normalize(&identity.series_name))
            .join(format!("Season {:02}", identity.season))
    }

    /// File name without extension, e.g. `Show Name S01E02`.
    pub fn file_stem(identity: &EpisodeIdentity) -> String {
        format!("{} {}", normalize(&identity.series_name), identity.code())
    }

    /// Canonical location for `record`. Without a known extension this ends in
    /// the `.*` wildcard and is only good for probing.
    pub fn canonical_path(&self, record: &EpisodeRecord) -> PathBuf {
        let extension = record.file_extension().unwrap_or_else(|| ".*".to_string());
        self.season_dir(&record.identity)
            .join(format!("{}{}", Self::file_stem(&record.identity), extension))
    }

    /// Files in the library matching the canonical path with any extension.
    pub fn existing_files(&self, identity: &EpisodeIdentity) -> Result<Vec<PathBuf>> {
        let stem = Self::file_stem(identity);
        let files = self.fs.list_dir(&self.season_dir(identity))?;
        Ok(files
            .into_iter()
            .filter(|path| {
                path.file_stem().and_then(|s| s.to_str()) == Some(stem.as_str())
                    && path.extension().is_some()
            })
            .collect())
    }

    pub fn exists(&self, identity: &EpisodeIdentity) -> Result<bool> {
        Ok(!self.existing_files(identity)?.is_empty())
    }

    /// The cataloged file for `identity`, if any.
    pub fn existing_path(&self, identity: &EpisodeIdentity) -> Result<Option<PathBuf>> {
        Ok(self.existing_files(identity)?.into_iter().next())
    }

    /// Move `record.path` into the library, honouring the duplicate policy.
    pub fn catalog(&self, record: &EpisodeRecord) -> Result<CatalogAction> {
        if record.path.is_empty() || record.path.starts_with("magnet:") {
            return Err(Error::InvalidEpisode(format!(
                "{} has no local file to catalog",
                record.identity
            )));
        }
        if record.file_extension().is_none() {
            return Err(Error::InvalidEpisode(format!(
                "cannot determine file type of {}",
                record.path
            )));
        }

        let source = Path::new(&record.path);
        let destination = self.canonical_path(record);
        let directory = self.season_dir(&record.identity);

        // Already in place, e.g. when the library lives under the download root.
        if source == destination.as_path() {
            debug!(episode = %record.identity, path = %source.display(), "Already cataloged");
            return Ok(CatalogAction::SkippedExisting {
                existing: destination,
            });
        }

        if !self.fs.exists(&directory) {
            self.fs.create_dir_all(&directory)?;
        }

        if !self.fs.exists(&destination) || self.settings.overwrite_duplicates() {
            self.fs.move_file(source, &destination)?;
            info!(
                episode = %record.identity,
                from = %source.display(),
                to = %destination.display(),
                "Cataloged"
            );
            return Ok(CatalogAction::Moved { to: destination });
        }

        if self.settings.delete_duplicate_downloads() {
            self.fs.remove_file(source)?;
            info!(
                episode = %record.identity,
                path = %source.display(),
                "Removed duplicate download"
            );
            return Ok(CatalogAction::RemovedDuplicate {
                existing: destination,
            });
        }

        if self.settings.verbose {
            warn!("file exists. doing nothing: {}", destination.display());
        }
        Ok(CatalogAction::SkippedExisting {
            existing: destination,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::SeriesRef;
    use crate::infra::fs::LocalFileSystem;
    use std::fs;
    use tempfile::TempDir;

    struct Fixture {
        _temp_dir: TempDir,
        settings: Settings,
        downloads: PathBuf,
    }

    fn fixture(configure: impl FnOnce(Settings) -> Settings) -> Fixture {
        let temp_dir = TempDir::new().unwrap();
        let downloads = temp_dir.path().join("downloads");
        fs::create_dir_all(&downloads).unwrap();
        let mut settings = Settings::default();
        settings.library_path = temp_dir.path().join("library");
        settings.download_path = downloads.clone();
        let settings = configure(settings);
        Fixture {
            _temp_dir: temp_dir,
            settings,
            downloads,
        }
    }

    fn show() -> SeriesRef {
        SeriesRef {
            id: "1".into(),
            name: "Show: Name!".into(),
        }
    }

    fn download(fixture: &Fixture, name: &str, content: &str) -> EpisodeRecord {
        let path = fixture.downloads.join(name);
        fs::write(&path, content).unwrap();
        EpisodeRecord::from_file(EpisodeIdentity::new(&show(), 1, 2), &path)
    }

    fn expected_destination(fixture: &Fixture) -> PathBuf {
        fixture
            .settings
            .library_path
            .join("Show Name/Season 01/Show Name S01E02.mkv")
    }

    #[test]
    fn test_canonical_path_layout() {
        let fixture = fixture(|s| s);
        let disk = LocalFileSystem::default();
        let library = LibraryCataloger::new(&fixture.settings, &disk);

        let mut record = EpisodeRecord::from_file(
            EpisodeIdentity::new(&show(), 3, 14),
            Path::new("/dl/whatever.mp4"),
        );
        assert_eq!(
            library.canonical_path(&record),
            fixture
                .settings
                .library_path
                .join("Show Name/Season 03/Show Name S03E14.mp4")
        );

        record.path = String::new();
        assert_eq!(
            library.canonical_path(&record),
            fixture
                .settings
                .library_path
                .join("Show Name/Season 03/Show Name S03E14.*")
        );
    }

    #[test]
    fn test_catalog_moves_and_is_idempotent() {
        let fixture = fixture(|s| s);
        let disk = LocalFileSystem::default();
        let library = LibraryCataloger::new(&fixture.settings, &disk);
        let record = download(&fixture, "Show.Name.S01E02.mkv", "video");

        let first = library.catalog(&record).unwrap();
        let destination = expected_destination(&fixture);
        assert_eq!(first, CatalogAction::Moved { to: destination.clone() });
        assert!(destination.exists());
        assert!(!Path::new(&record.path).exists());
        assert!(library.exists(&record.identity).unwrap());

        // Second run: the source is gone and the destination stays put.
        let second = library.catalog(&record).unwrap();
        assert_eq!(
            second,
            CatalogAction::SkippedExisting {
                existing: destination.clone()
            }
        );
        assert_eq!(fs::read_to_string(&destination).unwrap(), "video");
    }

    #[test]
    fn test_duplicate_kept_by_default() {
        let fixture = fixture(|s| s);
        let disk = LocalFileSystem::default();
        let library = LibraryCataloger::new(&fixture.settings, &disk);
        library.catalog(&download(&fixture, "a.S01E02.mkv", "first")).unwrap();

        let duplicate = download(&fixture, "b.S01E02.mkv", "second");
        let action = library.catalog(&duplicate).unwrap();
        assert!(matches!(action, CatalogAction::SkippedExisting { .. }));
        assert!(Path::new(&duplicate.path).exists());
        assert_eq!(
            fs::read_to_string(expected_destination(&fixture)).unwrap(),
            "first"
        );
    }

    #[test]
    fn test_duplicate_removed_when_configured() {
        let fixture = fixture(|s| {
            s.with_value("delete_duplicate_downloads", "true").unwrap()
        });
        let disk = LocalFileSystem::default();
        let library = LibraryCataloger::new(&fixture.settings, &disk);
        library.catalog(&download(&fixture, "a.S01E02.mkv", "first")).unwrap();

        let duplicate = download(&fixture, "b.S01E02.mkv", "second");
        let action = library.catalog(&duplicate).unwrap();
        assert_eq!(
            action,
            CatalogAction::RemovedDuplicate {
                existing: expected_destination(&fixture)
            }
        );
        assert!(action.to_string().starts_with("removed duplicate"));
        assert!(!Path::new(&duplicate.path).exists());
        assert_eq!(
            fs::read_to_string(expected_destination(&fixture)).unwrap(),
            "first"
        );
    }

    #[test]
    fn test_duplicate_overwritten_when_configured() {
        let fixture = fixture(|s| s.with_value("overwrite_duplicates", "true").unwrap());
        let disk = LocalFileSystem::default();
        let library = LibraryCataloger::new(&fixture.settings, &disk);
        library.catalog(&download(&fixture, "a.S01E02.mkv", "first")).unwrap();

        let duplicate = download(&fixture, "b.S01E02.mkv", "second");
        let action = library.catalog(&duplicate).unwrap();
        assert!(matches!(action, CatalogAction::Moved { .. }));
        assert!(!Path::new(&duplicate.path).exists());
        assert_eq!(
            fs::read_to_string(expected_destination(&fixture)).unwrap(),
            "second"
        );
    }

    #[test]
    fn test_file_already_in_place_is_kept() {
        let fixture = fixture(|s| {
            s.with_value("delete_duplicate_downloads", "true").unwrap()
        });
        let disk = LocalFileSystem::default();
        let library = LibraryCataloger::new(&fixture.settings, &disk);
        let destination = expected_destination(&fixture);
        fs::create_dir_all(destination.parent().unwrap()).unwrap();
        fs::write(&destination, "only copy").unwrap();

        let record = EpisodeRecord::from_file(EpisodeIdentity::new(&show(), 1, 2), &destination);
        let action = library.catalog(&record).unwrap();
        assert_eq!(
            action,
            CatalogAction::SkippedExisting {
                existing: destination.clone()
            }
        );
        assert_eq!(fs::read_to_string(&destination).unwrap(), "only copy");
    }

    #[test]
    fn test_dry_run_touches_nothing() {
        let fixture = fixture(|mut s| {
            s.dry_run = true;
            s
        });
        let disk = LocalFileSystem::new(true, false);
        let library = LibraryCataloger::new(&fixture.settings, &disk);
        let record = download(&fixture, "Show.Name.S01E02.mkv", "video");

        let action = library.catalog(&record).unwrap();
        assert!(matches!(action, CatalogAction::Moved { .. }));
        assert!(Path::new(&record.path).exists());
        assert!(!fixture.settings.library_path.exists());
    }

    #[test]
    fn test_catalog_requires_path_and_type() {
        let fixture = fixture(|s| s);
        let disk = LocalFileSystem::default();
        let library = LibraryCataloger::new(&fixture.settings, &disk);
        let identity = EpisodeIdentity::new(&show(), 1, 2);

        let mut record = EpisodeRecord::from_file(identity.clone(), Path::new(""));
        assert!(matches!(library.catalog(&record), Err(Error::InvalidEpisode(_))));

        record.path = "magnet:?xt=urn:btih:abc".into();
        assert!(matches!(library.catalog(&record), Err(Error::InvalidEpisode(_))));

        let no_ext = EpisodeRecord::from_file(identity, &fixture.downloads.join("Show S01E02"));
        assert!(matches!(library.catalog(&no_ext), Err(Error::InvalidEpisode(_))));
        assert!(!fixture.settings.library_path.exists());
    }

    #[test]
    fn test_missing_source_is_fs_error() {
        let fixture = fixture(|s| s);
        let disk = LocalFileSystem::default();
        let library = LibraryCataloger::new(&fixture.settings, &disk);
        let record = EpisodeRecord::from_file(
            EpisodeIdentity::new(&show(), 1, 2),
            &fixture.downloads.join("ghost.S01E02.mkv"),
        );
        assert!(matches!(
            library.catalog(&record),
            Err(Error::FileSystem { .. })
        ));
    }

    #[test]
    fn test_existing_files_any_extension() {
        let fixture = fixture(|s| s);
        let disk = LocalFileSystem::default();
        let library = LibraryCataloger::new(&fixture.settings, &disk);
        let identity = EpisodeIdentity::new(&show(), 1, 2);
        assert!(!library.exists(&identity).unwrap());

        let season = library.season_dir(&identity);
        fs::create_dir_all(&season).unwrap();
        fs::write(season.join("Show Name S01E02.avi"), "").unwrap();
        fs::write(season.join("Show Name S01E03.avi"), "").unwrap();

        assert_eq!(
            library.existing_path(&identity).unwrap(),
            Some(season.join("Show Name S01E02.avi"))
        );
    }
}
