//! Grayscale segmentation energies from raster images
//!
//! A pixel's cost for label `k` is `|I - μ_k|`; neighbouring pixels pay a
//! constant Potts weight when their labels differ.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use std::fs;
use std::path::Path;

use ::image::{GrayImage, Luma};
use log::debug;
use serde::Serialize;

use crate::algorithm::traits::{Cost, EnergyError};
use crate::config::SegmentationConfig;
use crate::data_structures::energy::EnergyModel;
use crate::data_structures::graph::GridGraph;
use crate::data_structures::labeling::Labeling;

/// Owned 8-bit grayscale raster, row-major
#[derive(Debug, Clone, PartialEq)]
pub struct GrayRaster {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

/// Load an image from disk and convert to 8-bit grayscale.
pub fn load_grayscale(path: &Path) -> Result<GrayRaster, EnergyError> {
    let img = ::image::open(path)
        .map_err(|e| EnergyError::Io(format!("Failed to open {}: {e}", path.display())))?
        .into_luma8();
    Ok(GrayRaster {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.into_raw(),
    })
}

/// `num_labels` intensities evenly spread over [0, 255]
pub fn spread_intensities(num_labels: usize) -> Vec<Cost> {
    if num_labels <= 1 {
        return vec![127.5; num_labels];
    }
    let step = 255.0 / (num_labels - 1) as Cost;
    (0..num_labels).map(|k| k as Cost * step).collect()
}

/// Builds the segmentation energy of `raster`
pub fn segmentation_energy(
    raster: &GrayRaster,
    config: &SegmentationConfig,
) -> Result<EnergyModel, EnergyError> {
    config.validate()?;
    if raster.data.len() != raster.width * raster.height {
        return Err(EnergyError::InvalidModel(format!(
            "raster holds {} pixels, expected {}x{}",
            raster.data.len(),
            raster.width,
            raster.height
        )));
    }
    let grid = GridGraph::new(raster.width, raster.height, config.connectivity)?;
    let means = config
        .intensities
        .clone()
        .unwrap_or_else(|| spread_intensities(config.num_labels));

    let unary: Vec<Cost> = raster
        .data
        .iter()
        .flat_map(|&pixel| means.iter().map(move |&mu| (pixel as Cost - mu).abs()))
        .collect();
    let smoothness = config.smoothness;
    let edges = grid.edges_with(|_, _| smoothness);

    debug!(
        "Segmentation energy: {}x{} pixels, {} labels, {} edges",
        raster.width,
        raster.height,
        config.num_labels,
        edges.len()
    );
    EnergyModel::new(grid.num_nodes(), config.num_labels, unary, edges)
}

/// Renders labels spread over [0, 255]; unresolved pixels are black
pub fn render_labels(
    labeling: &Labeling,
    width: usize,
    height: usize,
    num_labels: usize,
) -> Result<GrayImage, EnergyError> {
    if labeling.len() != width * height {
        return Err(EnergyError::InvalidModel(format!(
            "labeling covers {} nodes, image has {}x{}",
            labeling.len(),
            width,
            height
        )));
    }
    let step = if num_labels > 1 { 255 / (num_labels - 1) } else { 255 };
    let mut out = GrayImage::new(width as u32, height as u32);
    for y in 0..height {
        for x in 0..width {
            let value = labeling
                .label(y * width + x)
                .map_or(0, |label| (label * step).min(255) as u8);
            out.put_pixel(x as u32, y as u32, Luma([value]));
        }
    }
    Ok(out)
}

/// Writes the label image to `path`, creating parent directories.
pub fn save_labels(
    labeling: &Labeling,
    width: usize,
    height: usize,
    num_labels: usize,
    path: &Path,
) -> Result<(), EnergyError> {
    ensure_parent_dir(path)?;
    render_labels(labeling, width, height, num_labels)?
        .save(path)
        .map_err(|e| EnergyError::Io(format!("Failed to save {}: {e}", path.display())))
}

/// Serialize a value as pretty JSON to `path`, creating parent directories.
pub fn write_json_file<T: Serialize>(path: &Path, value: &T) -> Result<(), EnergyError> {
    ensure_parent_dir(path)?;
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| EnergyError::Io(format!("Failed to encode {}: {e}", path.display())))?;
    fs::write(path, json)
        .map_err(|e| EnergyError::Io(format!("Failed to write {}: {e}", path.display())))
}

fn ensure_parent_dir(path: &Path) -> Result<(), EnergyError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| {
                EnergyError::Io(format!("Failed to create {}: {e}", parent.display()))
            })?;
        }
    }
    Ok(())
}
