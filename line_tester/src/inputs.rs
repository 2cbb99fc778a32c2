// Expands the command-line inputs into a flat, ordered list of image files.
// Directories contribute every file whose extension `image` can decode, sorted
// by name; plain files are taken as given.

use anyhow::{Context, Result, bail};
use std::fs;
use std::path::{Path, PathBuf};

fn is_image(path: &Path) -> bool {
    path.is_file() && image::ImageFormat::from_path(path).is_ok()
}

pub fn collect_images(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut images = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut found: Vec<PathBuf> = fs::read_dir(input)
                .with_context(|| format!("failed to list {}", input.display()))?
                .filter_map(|entry| entry.ok().map(|entry| entry.path()))
                .filter(|path| is_image(path))
                .collect();
            found.sort();
            if found.is_empty() {
                log::warn!("no images found in {}", input.display());
            }
            images.extend(found);
        } else if input.is_file() {
            images.push(input.clone());
        } else {
            bail!("input {} does not exist", input.display());
        }
    }

    if images.is_empty() {
        bail!("no images to measure");
    }
    Ok(images)
}
