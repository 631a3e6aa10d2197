//! Builds the train/validation tree from the labeled radiograph library.

use std::process::ExitCode;
use xray_backend::config::AppConfig;
use xray_backend::dataset::split::{SPLIT_SEED, prepare_dataset};

fn main() -> ExitCode {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let images = config.images_dir();
    let masks = config.masks_dir();
    log::info!(
        "Splitting {} (masks in {}) into {}",
        images.display(),
        masks.display(),
        config.training_dir.display()
    );

    match prepare_dataset(&images, &masks, &config.training_dir, SPLIT_SEED) {
        Ok(report) => {
            println!("Training images: {}", report.train);
            println!("Validation images: {}", report.validation);
            for (class, counts) in &report.per_class {
                println!("  {:<16} train {:>5}  validation {:>5}", class, counts.train, counts.validation);
            }
            if report.skipped_without_mask > 0 {
                println!("Skipped without mask: {}", report.skipped_without_mask);
            }
            if !report.missing_classes.is_empty() {
                println!("Missing class folders: {}", report.missing_classes.join(", "));
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("Dataset preparation failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
