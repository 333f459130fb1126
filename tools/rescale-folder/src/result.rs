//! 运行结果.

use std::io::{self, Write};

use et_segtools::prelude::*;

/// 某一步处理之后的分割体概况.
#[derive(Debug, Clone)]
pub struct Stage {
    name: &'static str,
    shape: Idx3d,
    voxel_size: f64,
    counts: Vec<(String, usize)>,
}

/// 将 `stage` 的结果写进 `w` 中.
fn describe_into<W: Write>(stage: &Stage, w: &mut W) -> io::Result<()> {
    const S4: &str = "    ";

    writeln!(w, "Stage `{}`:", stage.name)?;
    writeln!(w, "{S4}Shape (z, h, w): {:?}", stage.shape)?;
    writeln!(w, "{S4}Voxel size: {:.4}", stage.voxel_size)?;
    for (label, n) in &stage.counts {
        writeln!(w, "{S4}{label}: {n} voxels")?;
    }
    Ok(())
}

/// 各处理步骤的结果.
#[derive(Debug, Default)]
pub struct PipelineReport {
    stages: Vec<Stage>,
}

impl PipelineReport {
    /// 记录 `seg` 当前的形状, 体素尺寸与各标签体素数.
    pub fn record(&mut self, name: &'static str, seg: &Segmentation) {
        let stage = Stage {
            name,
            shape: seg.shape(),
            voxel_size: seg.voxel_size(),
            counts: seg.label_counts(),
        };
        log::debug!("{name}: {:?}, voxel size {}", stage.shape, stage.voxel_size);
        self.stages.push(stage);
    }

    /// 已记录的步骤.
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// 把全部步骤写进 `w` 中.
    pub fn describe<W: Write>(&self, w: &mut W) -> io::Result<()> {
        self.stages.iter().try_for_each(|s| describe_into(s, w))
    }

    /// 分析运行结果, 并以 `info` 级别输出.
    pub fn analyze(&self) {
        let mut buf = Vec::new();
        if self.describe(&mut buf).is_ok() {
            String::from_utf8_lossy(&buf)
                .lines()
                .for_each(|line| log::info!("{line}"));
        }
        if let (Some(first), Some(last)) = (self.stages.first(), self.stages.last()) {
            for ((label, before), (_, after)) in first.counts.iter().zip(&last.counts) {
                if *before > 0 && *after == 0 {
                    log::warn!("label `{label}` vanished during processing");
                }
            }
        }
    }
}
