//! Directory scan: product and manifest discovery.
//!
//! Walks the configured root, applies exclude globs, and splits files into
//! products and manifests by extension. Both lists are sorted by path; that
//! order is what later decides membership ties, so it is preserved all the
//! way through enrichment.

use anyhow::{bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use jwst_catalog_core::models::{ManifestFile, ProductFile};

use crate::config::ScanConfig;
use crate::fits_header;

/// Files found under a scan root.
#[derive(Debug, Clone, Default)]
pub struct FoundFiles {
    pub root: PathBuf,
    pub products: Vec<PathBuf>,
    pub manifests: Vec<PathBuf>,
}

/// Walk `root` and collect product and manifest paths.
///
/// A missing root is fatal; nothing else here is.
pub fn find_files(root: &Path, scan: &ScanConfig) -> Result<FoundFiles> {
    if !root.is_dir() {
        bail!("Scan directory does not exist: {}", root.display());
    }
    let root = std::fs::canonicalize(root)
        .with_context(|| format!("Failed to resolve scan directory: {}", root.display()))?;

    let mut default_excludes = vec!["**/.git/**".to_string(), "**/target/**".to_string()];
    default_excludes.extend(scan.exclude_globs.clone());
    let exclude_set = build_globset(&default_excludes)?;

    let product_suffix = format!(".{}", scan.product_extension);
    let manifest_suffix = format!(".{}", scan.manifest_extension);

    let mut found = FoundFiles {
        root: root.clone(),
        ..Default::default()
    };

    let walker = WalkDir::new(&root).follow_links(scan.follow_symlinks);
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable directory entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(&root).unwrap_or(path);
        if exclude_set.is_match(relative) {
            continue;
        }

        let name = entry.file_name().to_string_lossy();
        if name.ends_with(&product_suffix) {
            found.products.push(path.to_path_buf());
        } else if name.ends_with(&manifest_suffix) {
            found.manifests.push(path.to_path_buf());
        }
    }

    // Sort for deterministic ordering
    found.products.sort();
    found.manifests.sort();

    tracing::info!(
        root = %root.display(),
        products = found.products.len(),
        manifests = found.manifests.len(),
        "scan complete"
    );
    Ok(found)
}

/// Read each manifest body. An unreadable body is passed on as `None`.
pub fn load_manifests(paths: &[PathBuf]) -> Vec<ManifestFile> {
    paths
        .iter()
        .map(|path| {
            let body = match std::fs::read_to_string(path) {
                Ok(body) => Some(body),
                Err(e) => {
                    tracing::debug!(path = %path.display(), error = %e, "manifest unreadable");
                    None
                }
            };
            ManifestFile::new(file_name(path), body)
        })
        .collect()
}

/// Wrap each product path, reading its primary header when asked to.
pub fn load_products(paths: &[PathBuf], read_headers: bool) -> Vec<ProductFile> {
    paths
        .iter()
        .map(|path| {
            let product = ProductFile::new(file_name(path));
            if !read_headers {
                return product;
            }
            match fits_header::read_exposure_header(path) {
                Ok(header) => product.with_header(header),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "primary header unavailable");
                    product
                }
            }
        })
        .collect()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
