//! 读取掩膜目录, 重采样并平滑分割体, 再写出 `totalseg.mrc` 与新的掩膜目录.
//!
//! 流程: 读取 -> 重采样 -> 形态学平滑 -> Gaussian 平滑 -> 写出.

mod result;
mod runner;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use et_segtools::prelude::*;
use log::LevelFilter;
use simple_logger::SimpleLogger;

use crate::runner::Config;

/// Rescale and smooth a folder of per-label masks.
#[derive(Parser, Debug)]
#[command(name = "rescale-folder")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Folder holding one mask (file or slice folder) per label
    #[arg(long)]
    input_folder: PathBuf,

    /// Voxel size of the input masks
    #[arg(long)]
    orig_pixel_size: f64,

    /// Folder to write the rescaled masks and `totalseg.mrc` into
    #[arg(long)]
    output_folder: PathBuf,

    /// Voxel size to rescale to
    #[arg(long)]
    output_pixel_size: f64,

    /// Comma separated label names, in ID order (default: discovered from the input folder)
    #[arg(long, value_delimiter = ',')]
    labels: Option<Vec<String>>,

    /// Occupancy threshold after rescaling
    #[arg(long, default_value_t = 0.3)]
    rescale_thresh: f64,

    /// Grow/shrink rounds of the morphological smoothing
    #[arg(long, default_value_t = 2)]
    morph_iter: u32,

    /// Gaussian sigma, in output voxels
    #[arg(long, default_value_t = 2.5)]
    sigma: f64,

    /// Occupancy threshold after Gaussian smoothing
    #[arg(long, default_value_t = 0.5)]
    gauss_thresh: f64,

    /// Layout of the written masks
    #[arg(long, value_enum, default_value_t = Layout::Volume)]
    layout: Layout,

    /// Enable debug output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Layout {
    /// One multi-page TIFF per label
    Volume,
    /// One folder of 2D TIFF slices per label
    Slices,
}

impl From<Layout> for MaskLayout {
    fn from(value: Layout) -> Self {
        match value {
            Layout::Volume => MaskLayout::Volume,
            Layout::Slices => MaskLayout::Slices,
        }
    }
}

impl Cli {
    /// 校验参数并生成运行配置. 在读取任何数据之前调用.
    fn into_config(self) -> SegResult<Config> {
        Ok(Config {
            input_folder: self.input_folder,
            output_folder: self.output_folder,
            labels: self.labels,
            orig_voxel_size: self.orig_pixel_size,
            rescale: RescaleParams::new(self.output_pixel_size, self.rescale_thresh)?,
            morph_iter: self.morph_iter,
            gaussian: GaussianParams::new(self.sigma, self.gauss_thresh)?,
            layout: self.layout.into(),
        })
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    if let Err(e) = SimpleLogger::new().with_level(level).init() {
        eprintln!("logger already initialized: {e}");
    }

    match cli.into_config().and_then(|cfg| runner::run(&cfg)) {
        Ok(report) => {
            report.analyze();
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
