use std::process;

use clap::Parser;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use clustermodel::cli::{build_report, format_report, Args, ReportError};
use clustermodel::config::{load_manifest_file, FeatureFlags};

fn main() {
    let args = Args::parse();

    // Initialize logging
    let filter = match args.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    // Load and validate manifest
    let manifest = match load_manifest_file(&args.manifest) {
        Ok(manifest) => manifest,
        Err(e) => {
            error!(
                "Failed to load manifest {}: {}",
                args.manifest.display(),
                e
            );
            process::exit(1);
        }
    };

    let features = FeatureFlags::parse(&args.features);
    for flag in features.iter() {
        debug!("Feature flag enabled: {}", flag);
    }

    info!(
        "Loaded cluster {} with {} instance groups",
        manifest.cluster.name(),
        manifest.instance_groups.len()
    );

    let model = manifest.into_model(features);

    let report = match build_report(&model, args.instance_group.as_deref()) {
        Ok(report) => report,
        Err(ReportError::Model(e)) if e.is_fatal() => {
            error!("Cannot model cluster {}: {}", model.cluster_name(), e);
            process::exit(1);
        }
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        }
    };

    if args.json {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                error!("Failed to serialize report: {}", e);
                process::exit(1);
            }
        }
    } else {
        print!("{}", format_report(&report));
    }
}
