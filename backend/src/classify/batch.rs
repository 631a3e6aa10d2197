use rand::Rng;
use rand::seq::IndexedRandom;
use shared::{BatchSummary, ClassLabel};
use std::collections::BTreeMap;
use std::path::Path;

use super::simulator::infer_label;
use crate::files::{IMAGE_EXTENSIONS, collect_file_names};

/// Share of the library reported as not yet analyzed.
pub const UNANALYZED_PERCENT: usize = 5;

pub fn unanalyzed_count(total: usize) -> usize {
    total * UNANALYZED_PERCENT / 100
}

/// Counts `names` by inferred class, skipping the leading unanalyzed share.
/// Names without a keyword are assigned a random class.
pub fn summarize_names<R: Rng + ?Sized>(names: &[String], rng: &mut R) -> BatchSummary {
    let total_images = names.len();
    let unanalyzed = unanalyzed_count(total_images);
    let analyzed = &names[unanalyzed..];

    let labels = ClassLabel::all();
    let mut class_counts: BTreeMap<ClassLabel, usize> =
        labels.iter().map(|label| (*label, 0)).collect();

    for name in analyzed {
        let label = match infer_label(name) {
            Some(label) => label,
            None => *labels.choose(rng).unwrap_or(&ClassLabel::Normal),
        };
        *class_counts.entry(label).or_insert(0) += 1;
    }

    BatchSummary {
        total_images,
        analyzed_count: analyzed.len(),
        unanalyzed_count: unanalyzed,
        class_counts,
    }
}

pub fn summarize_batch<R: Rng + ?Sized>(images_dir: &Path, rng: &mut R) -> BatchSummary {
    let names = collect_file_names(images_dir, IMAGE_EXTENSIONS);
    log::debug!(
        "Batch summary over {} images in {}",
        names.len(),
        images_dir.display()
    );
    summarize_names(&names, rng)
}
