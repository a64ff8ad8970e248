//! Filesystem-backed version store
//!
//! Snapshots live at `<root>/<project>/<version>/`. A rebuild copies the
//! snapshot into a staging directory next to the destination and then
//! swaps it into place, restoring the old tree if the swap fails, so a
//! failed rebuild never touches the destination.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use shared::{component_debug, component_info, component_warn, Component, ProjectId, Version};
use tokio::fs;

use crate::error::{ControllerError, ControllerResult};
use crate::traits::{Rebuilt, VersionStore};

pub struct DirectoryVersionStore {
    root: PathBuf,
}

impl DirectoryVersionStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn project_dir(&self, project: ProjectId) -> PathBuf {
        self.root.join(project.to_string())
    }

    /// Resolve `target` to a concrete version present in the store
    pub async fn resolve(&self, project: ProjectId, target: Option<Version>) -> ControllerResult<Version> {
        let project_dir = self.project_dir(project);

        if let Some(version) = target {
            let snapshot = project_dir.join(version.to_string());
            return match fs::metadata(&snapshot).await {
                Ok(meta) if meta.is_dir() => Ok(version),
                _ => Err(ControllerError::VersionNotFound { version }),
            };
        }

        let listing_failed =
            |e: std::io::Error| ControllerError::rebuild(None, format!("cannot list {}: {e}", project_dir.display()));

        let mut entries = fs::read_dir(&project_dir).await.map_err(listing_failed)?;
        let mut latest: Option<Version> = None;
        while let Some(entry) = entries.next_entry().await.map_err(listing_failed)? {
            if !entry.file_type().await.map_err(listing_failed)?.is_dir() {
                continue;
            }
            let Some(version) = entry.file_name().to_str().and_then(|name| name.parse::<Version>().ok()) else {
                continue;
            };
            latest = Some(latest.map_or(version, |best| best.max(version)));
        }

        latest.ok_or_else(|| ControllerError::rebuild(None, format!("project {project} has no versions")))
    }

    fn sibling_dir(dest: &Path, tag: &str, version: Version) -> PathBuf {
        let name = dest
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "workdir".to_string());
        dest.with_file_name(format!(".{name}.{tag}-{version}"))
    }
}

/// Copy a directory tree, returning the number of files copied
async fn copy_tree(src: &Path, dest: &Path) -> std::io::Result<usize> {
    let mut files = 0;
    let mut pending = vec![(src.to_path_buf(), dest.to_path_buf())];

    while let Some((from, to)) = pending.pop() {
        fs::create_dir_all(&to).await?;
        let mut entries = fs::read_dir(&from).await?;
        while let Some(entry) = entries.next_entry().await? {
            let target = to.join(entry.file_name());
            if entry.file_type().await?.is_dir() {
                pending.push((entry.path(), target));
            } else {
                fs::copy(entry.path(), &target).await?;
                files += 1;
            }
        }
    }

    Ok(files)
}

async fn remove_if_exists(path: &Path) -> std::io::Result<()> {
    match fs::remove_dir_all(path).await {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Move `staging` into `dest`, keeping the previous `dest` until the swap
/// has succeeded
///
/// On failure the previous tree is moved back and `staging` is discarded.
pub(crate) async fn swap_into_place(staging: &Path, dest: &Path, previous: &Path) -> std::io::Result<()> {
    remove_if_exists(previous).await?;
    let had_previous = match fs::rename(dest, previous).await {
        Ok(()) => true,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(e) => return Err(e),
    };

    if let Err(e) = fs::rename(staging, dest).await {
        if had_previous {
            fs::rename(previous, dest).await?;
        }
        let _ = remove_if_exists(staging).await;
        return Err(e);
    }

    if had_previous {
        if let Err(e) = remove_if_exists(previous).await {
            component_warn!(Component::Store, "Could not remove {}: {}", previous.display(), e);
        }
    }
    Ok(())
}

#[async_trait]
impl VersionStore for DirectoryVersionStore {
    async fn rebuild(
        &self,
        project: ProjectId,
        target: Option<Version>,
        dest: &Path,
    ) -> ControllerResult<Rebuilt> {
        let version = self.resolve(project, target).await?;
        let snapshot = self.project_dir(project).join(version.to_string());
        let staging = Self::sibling_dir(dest, "staging", version);

        let staged = async {
            remove_if_exists(&staging).await?;
            copy_tree(&snapshot, &staging).await
        }
        .await;

        let files = match staged {
            Ok(files) => files,
            Err(e) => {
                let _ = remove_if_exists(&staging).await;
                return Err(ControllerError::rebuild(Some(version), e.to_string()));
            }
        };

        let previous = Self::sibling_dir(dest, "previous", version);
        swap_into_place(&staging, dest, &previous)
            .await
            .map_err(|e| ControllerError::rebuild(Some(version), e.to_string()))?;

        component_debug!(
            Component::Store,
            "Copied {} files from {} into {}",
            files,
            snapshot.display(),
            dest.display()
        );
        component_info!(Component::Store, "📦 Rebuilt project {} at version {}", project, version);

        Ok(Rebuilt { version, files })
    }
}
