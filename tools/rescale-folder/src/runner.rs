//! 程序运行函数.

use std::fs;
use std::path::PathBuf;

use et_segtools::prelude::*;

use crate::result::PipelineReport;

/// 写出的合并量化文件名.
pub const TOTALSEG_MRC: &str = "totalseg.mrc";

/// 经过校验的运行配置.
#[derive(Debug)]
pub struct Config {
    pub input_folder: PathBuf,
    pub output_folder: PathBuf,
    /// 为 `None` 时从输入目录推断.
    pub labels: Option<Vec<String>>,
    pub orig_voxel_size: f64,
    pub rescale: RescaleParams,
    pub morph_iter: u32,
    pub gaussian: GaussianParams,
    pub layout: MaskLayout,
}

/// 实际运行.
pub fn run(cfg: &Config) -> SegResult<PipelineReport> {
    let labels = match &cfg.labels {
        Some(labels) => labels.clone(),
        None => {
            let found = discover_labels(&cfg.input_folder)?;
            log::info!("labels discovered in input folder: {found:?}");
            found
        }
    };

    let mut report = PipelineReport::default();
    let mut seg = read_mask_folder(&cfg.input_folder, &labels, cfg.orig_voxel_size)?;
    report.record("input", &seg);

    cfg.rescale.apply(&mut seg)?;
    report.record("rescaled", &seg);

    seg.morphological_smooth(cfg.morph_iter);
    report.record("morphological", &seg);

    cfg.gaussian.apply(&mut seg)?;
    report.record("gaussian", &seg);

    fs::create_dir_all(&cfg.output_folder).map_err(|source| SegError::Io {
        path: cfg.output_folder.clone(),
        source,
    })?;
    write_mrc(&seg, cfg.output_folder.join(TOTALSEG_MRC))?;
    write_mask_folder(&seg, &cfg.output_folder, cfg.layout, false)?;

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::{run, Config, TOTALSEG_MRC};
    use et_segtools::prelude::*;
    use ndarray::{s, Array3};
    use tempfile::tempdir;

    fn config(input: &std::path::Path, output: &std::path::Path) -> Config {
        Config {
            input_folder: input.to_path_buf(),
            output_folder: output.to_path_buf(),
            labels: None,
            orig_voxel_size: 2.0,
            rescale: RescaleParams::new(1.0, 0.3).unwrap(),
            morph_iter: 1,
            gaussian: GaussianParams::new(1.0, 0.5).unwrap(),
            layout: MaskLayout::Slices,
        }
    }

    #[test]
    fn test_pipeline() {
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();

        let mut a = Array3::from_elem((6, 8, 8), false);
        let mut b = Array3::from_elem((6, 8, 8), false);
        a.slice_mut(s![1..5, 1..4, 1..7]).fill(true);
        b.slice_mut(s![1..5, 4..7, 1..7]).fill(true);
        let seg = Segmentation::from_masks(&[a.view(), b.view()], &["a", "b"], 2.0).unwrap();
        write_mask_folder(&seg, input.path(), MaskLayout::Volume, false).unwrap();

        let report = run(&config(input.path(), output.path())).unwrap();
        assert_eq!(report.stages().len(), 4);

        let out = read_mrc::<_, &str>(output.path().join(TOTALSEG_MRC), None).unwrap();
        assert_eq!(out.label_names(), ["a", "b"]);
        assert_eq!(out.voxel_size(), 1.0);
        assert_eq!(out.shape(), (12, 16, 16));
        assert!(out.count(1) > 0 && out.count(2) > 0);

        let back = read_mask_folder(output.path(), &["a", "b"], 1.0).unwrap();
        assert_eq!(back.volume(), out.volume());
    }

    #[test]
    fn test_missing_input() {
        let output = tempdir().unwrap();
        let e = run(&config(&output.path().join("nope"), output.path())).unwrap_err();
        assert!(e.is_io_failure());
    }
}
