mod cli;

use cli::CliConfig;
use portra_core::{Curator, CuratorConfig, SeetaDetector};

fn main() {
    let config = CliConfig::from_env().unwrap_or_else(|err| match err {
        cli::CliError::Help | cli::CliError::Version => {
            println!("{}", err);
            std::process::exit(0);
        }
        _ => {
            eprintln!("{}", err);
            std::process::exit(1);
        }
    });

    let detector = match SeetaDetector::from_model(&config.face_model) {
        Ok(detector) => detector,
        Err(error) => {
            eprintln!("{}", error);
            std::process::exit(1);
        }
    };

    let mut curator = match Curator::new(
        CuratorConfig {
            subject: config.target.clone(),
            output_dir: config.output_dir.clone(),
            cache_dir: config.cache_dir,
            max_images: config.max_images,
            api_url: None,
        },
        Box::new(detector),
    ) {
        Ok(curator) => curator,
        Err(error) => {
            eprintln!("{}", error);
            std::process::exit(1);
        }
    };

    println!("Curating images of {}", config.target);
    match curator.run(&config.negative_subjects) {
        Ok(report) => {
            let stats = report.stats;
            println!(
                "Downloaded {} candidates: {} approved, {} duplicates, {} without faces, {} non-portraits filtered",
                stats.downloaded, stats.passed, stats.duplicate, stats.no_face, stats.non_portrait
            );
            println!(
                "Wrote {} variants and {} negative examples to {}",
                report.variants,
                report.negatives,
                config.output_dir.display()
            );
        }
        Err(error) => {
            eprintln!("Error writing reports: {}", error);
            std::process::exit(1);
        }
    }
}
