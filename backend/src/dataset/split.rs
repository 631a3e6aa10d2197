//! Train/validation split of the labeled image + mask library.
//!
//! Source layout: `<images>/<Class>/<file>` with a same-named mask in
//! `<masks>/<Class>/<file>`. Output layout:
//! `<dest>/{train,validation}/<Class>/{images,masks}/<file>`.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::files::{IMAGE_EXTENSIONS, has_extension};

pub const CLASS_FOLDERS: [&str; 4] = ["COVID", "Normal", "Lung_Opacity", "Viral Pneumonia"];
pub const VALIDATION_FRACTION: f64 = 0.20;
pub const SPLIT_SEED: u64 = 42;

#[derive(Debug, thiserror::Error)]
pub enum SplitError {
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("no labeled images with masks were found under {0}")]
    NoFiles(PathBuf),
}

fn io_at(path: &Path) -> impl FnOnce(std::io::Error) -> SplitError + '_ {
    move |source| SplitError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledFile {
    pub file_name: String,
    pub class_folder: String,
}

#[derive(Debug, Default)]
pub struct SplitPlan {
    pub train: Vec<LabeledFile>,
    pub validation: Vec<LabeledFile>,
}

#[derive(Debug, Default, Serialize)]
pub struct ClassSplit {
    pub train: usize,
    pub validation: usize,
}

#[derive(Debug, Default, Serialize)]
pub struct SplitReport {
    pub train: usize,
    pub validation: usize,
    pub skipped_without_mask: usize,
    pub missing_classes: Vec<String>,
    pub per_class: BTreeMap<String, ClassSplit>,
}

/// Image files that have a matching mask, grouped by class folder.
pub fn collect_labeled(
    images_root: &Path,
    masks_root: &Path,
    report: &mut SplitReport,
) -> Result<Vec<LabeledFile>, SplitError> {
    let mut files = Vec::new();
    for class in CLASS_FOLDERS {
        let image_dir = images_root.join(class);
        if !image_dir.is_dir() {
            log::warn!("Image folder not found: {}. Skipping class.", image_dir.display());
            report.missing_classes.push(class.to_string());
            continue;
        }

        let mut names: Vec<String> = std::fs::read_dir(&image_dir)
            .map_err(io_at(&image_dir))?
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .filter_map(|entry| entry.file_name().to_str().map(str::to_owned))
            .filter(|name| has_extension(name, IMAGE_EXTENSIONS))
            .collect();
        names.sort();

        for name in names {
            if !masks_root.join(class).join(&name).is_file() {
                log::warn!("Mask for {} (class {}) not found. Skipping file.", name, class);
                report.skipped_without_mask += 1;
                continue;
            }
            files.push(LabeledFile {
                file_name: name,
                class_folder: class.to_string(),
            });
        }
    }
    Ok(files)
}

/// Shuffles each class independently and sends `round(n * fraction)` of
/// its files to validation.
pub fn stratified_split(files: Vec<LabeledFile>, fraction: f64, rng: &mut StdRng) -> SplitPlan {
    let mut by_class: BTreeMap<String, Vec<LabeledFile>> = BTreeMap::new();
    for file in files {
        by_class.entry(file.class_folder.clone()).or_default().push(file);
    }

    let mut plan = SplitPlan::default();
    for (_, mut group) in by_class {
        group.shuffle(rng);
        let validation_len = ((group.len() as f64) * fraction).round() as usize;
        let train = group.split_off(validation_len.min(group.len()));
        plan.validation.extend(group);
        plan.train.extend(train);
    }
    plan
}

fn copy_pair(
    file: &LabeledFile,
    split: &str,
    images_root: &Path,
    masks_root: &Path,
    dest: &Path,
) -> Result<(), SplitError> {
    let class_dir = dest.join(split).join(&file.class_folder);
    for (source_root, kind) in [(images_root, "images"), (masks_root, "masks")] {
        let target_dir = class_dir.join(kind);
        std::fs::create_dir_all(&target_dir).map_err(io_at(&target_dir))?;
        let source = source_root.join(&file.class_folder).join(&file.file_name);
        std::fs::copy(&source, target_dir.join(&file.file_name)).map_err(io_at(&source))?;
    }
    Ok(())
}

/// Rebuilds `dest` from scratch with a seeded stratified split.
pub fn prepare_dataset(
    images_root: &Path,
    masks_root: &Path,
    dest: &Path,
    seed: u64,
) -> Result<SplitReport, SplitError> {
    let mut report = SplitReport::default();
    let files = collect_labeled(images_root, masks_root, &mut report)?;
    if files.is_empty() {
        return Err(SplitError::NoFiles(images_root.to_path_buf()));
    }
    log::info!("Labeled images with masks: {}", files.len());

    let mut rng = StdRng::seed_from_u64(seed);
    let plan = stratified_split(files, VALIDATION_FRACTION, &mut rng);

    if dest.exists() {
        std::fs::remove_dir_all(dest).map_err(io_at(dest))?;
        log::info!("Cleared {}", dest.display());
    }
    std::fs::create_dir_all(dest).map_err(io_at(dest))?;

    for (split, subset) in [("train", &plan.train), ("validation", &plan.validation)] {
        for file in subset {
            copy_pair(file, split, images_root, masks_root, dest)?;
            let counts = report.per_class.entry(file.class_folder.clone()).or_default();
            if split == "train" {
                counts.train += 1;
            } else {
                counts.validation += 1;
            }
        }
    }
    report.train = plan.train.len();
    report.validation = plan.validation.len();
    Ok(report)
}
