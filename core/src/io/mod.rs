//! Problem import and result export
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

pub mod host;
pub mod image;

pub use self::host::{host_labels, HostProblem};
pub use self::image::{
    load_grayscale, save_labels, segmentation_energy, write_json_file, GrayRaster,
};
