use partopt_core::config::load_config;
use partopt_core::io::image::{load_grayscale, save_labels, segmentation_energy, write_json_file};
use partopt_core::{EnergyError, Orchestrator};
use std::env;
use std::path::Path;
use std::time::Instant;

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), EnergyError> {
    let config_path = env::args().nth(1).ok_or_else(usage)?;
    let config = load_config(Path::new(&config_path))?;

    let raster = load_grayscale(&config.input)?;
    let model = segmentation_energy(&raster, &config.segmentation)?;

    let start = Instant::now();
    let outcome = Orchestrator::new(config.solver.clone())?.run(&model)?;
    let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

    save_labels(
        &outcome.labeling,
        raster.width,
        raster.height,
        config.segmentation.num_labels,
        &config.output.labels_image,
    )?;
    if let Some(path) = &config.output.outcome_json {
        write_json_file(path, &outcome)?;
    }

    println!(
        "Certified {}/{} pixels in {:.1} ms; labels -> {}",
        outcome.certified_count(),
        outcome.labeling.len(),
        elapsed_ms,
        config.output.labels_image.display()
    );
    if let Some(energy) = outcome.energy {
        println!("Energy: {energy:.3}");
    }
    Ok(())
}

fn usage() -> EnergyError {
    EnergyError::Config("Usage: partopt-segment <config.json>".to_string())
}
