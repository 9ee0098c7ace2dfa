//! Conversion driver and per-level tile scheduler.
//!
//! One worker pool runs both task families: `slice` (read, resample,
//! encode one tile) and `write` (assemble and save one instance). Within a
//! level, tiles are submitted in row-major order and batches are cut as
//! soon as enough frames are queued; the level barrier is the scope join,
//! so level ℓ+1 only starts after every slice and write of level ℓ has
//! finished. The first fatal error stops new submissions, lets in-flight
//! tasks drain, and aborts the job; files already on disk stay there.

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use rayon::ThreadPool;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::dicom::{generate_uid, parse_json_tags, DataSet};
use crate::error::ConvertError;
use crate::frame::{Frame, PixelSupply, Resampler};
use crate::source::{open_source, PyramidSource};

use super::builder::{InstanceBuilder, InstanceParams};
use super::plan::{plan_levels, LevelPlan};
use super::region::RegionReader;

/// What one level produced.
#[derive(Debug, Clone)]
pub struct LevelReport {
    pub level: u32,
    pub frames: u32,
    pub files: Vec<PathBuf>,
}

/// What a whole conversion produced.
#[derive(Debug, Clone, Default)]
pub struct ConversionReport {
    pub levels: Vec<LevelReport>,
}

/// First-error cell shared by every task of a job.
struct JobState {
    error: Mutex<Option<ConvertError>>,
}

impl JobState {
    fn new() -> Self {
        Self {
            error: Mutex::new(None),
        }
    }

    fn record(&self, err: ConvertError) {
        let mut slot = self.error.lock();
        if slot.is_none() {
            *slot = Some(err);
        }
    }

    fn failed(&self) -> bool {
        self.error.lock().is_some()
    }

    fn into_result(self) -> Result<(), ConvertError> {
        match self.error.into_inner() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Run a complete conversion.
pub fn convert(config: &Config) -> Result<ConversionReport, ConvertError> {
    config.validate()?;
    if config.batch_limit().is_none() {
        warn!("batch parameter is not set, batch is unlimited");
    }
    if config.threads < 1 {
        warn!("threads parameter is less than 1, consuming all available threads");
    }
    info!("dicomization is started");

    let source = open_source(&config.input, config.image_height_mm)?;

    let study_uid = if config.study_id.is_empty() {
        warn!("StudyInstanceUID is going to be generated");
        generate_uid()
    } else {
        config.study_id.clone()
    };
    let series_uid = if config.series_id.is_empty() {
        warn!("SeriesInstanceUID is going to be generated");
        generate_uid()
    } else {
        config.series_id.clone()
    };

    let extra_tags = Arc::new(load_extra_tags(config));

    let resampler = select_resampler(config);
    let plans = plan_levels(source.as_ref(), config);
    let physical_mm = source.physical_size_mm().unwrap_or((0.0, 0.0));

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.worker_threads())
        .build()
        .map_err(|e| ConvertError::Io(e.to_string()))?;

    let mut report = ConversionReport::default();
    let mut previous: Vec<Arc<InstanceBuilder>> = Vec::new();
    for plan in &plans {
        let (instances, level_report) = run_level(
            &pool,
            source.as_ref(),
            plan,
            config,
            resampler,
            &study_uid,
            &series_uid,
            physical_mm,
            &extra_tags,
            &previous,
        )?;
        previous = instances;
        report.levels.push(level_report);
    }

    info!("dicomization is done");
    Ok(report)
}

/// Parse the additional-tags JSON file, if configured.
///
/// An unreadable or malformed file is reported once and ignored.
fn load_extra_tags(config: &Config) -> DataSet {
    let Some(ref path) = config.json_file else {
        return DataSet::new();
    };
    match std::fs::read_to_string(path) {
        Ok(text) => match parse_json_tags(&text) {
            Ok(tags) => tags,
            Err(err) => {
                warn!("can't read DCM tags from JSON: {err}");
                DataSet::new()
            }
        },
        Err(err) => {
            warn!("can't read {}: {err}", path.display());
            DataSet::new()
        }
    }
}

fn select_resampler(config: &Config) -> Resampler {
    if let Some(ref name) = config.opencv_downsampling {
        if let Some(kernel) = crate::frame::FilterKernel::from_name(name) {
            return Resampler::Filtered(kernel);
        }
    }
    if config.bilinear_downsampling {
        Resampler::Bilinear
    } else {
        Resampler::Nearest
    }
}

/// Produce every frame and instance of one level.
///
/// Returns the level's instance builders (kept for the next level's region
/// reader) and its report.
#[allow(clippy::too_many_arguments)]
fn run_level(
    pool: &ThreadPool,
    source: &dyn PyramidSource,
    plan: &LevelPlan,
    config: &Config,
    resampler: Resampler,
    study_uid: &str,
    series_uid: &str,
    physical_mm: (f64, f64),
    extra_tags: &Arc<DataSet>,
    previous: &[Arc<InstanceBuilder>],
) -> Result<(Vec<Arc<InstanceBuilder>>, LevelReport), ConvertError> {
    let region_reader = if plan.read_from_previous {
        Some(RegionReader::new(previous)?)
    } else {
        None
    };
    let supply = match &region_reader {
        Some(reader) => PixelSupply::Previous(reader),
        None => PixelSupply::Source {
            source,
            level: plan.source_level,
        },
    };
    // Scanner edge-artifact workaround: skip the first source row/column.
    let read_offset = if config.drop_first_row_and_column && region_reader.is_none() {
        1
    } else {
        0
    };

    let tiles_per_row = plan.tiles_per_row();
    let total_frames = plan.tile_count() as u32;
    let batch_limit = config.batch_limit().unwrap_or(total_frames).max(1);
    debug!(
        level = plan.level,
        total_frames, batch_limit, "level execution starting"
    );

    let job = JobState::new();
    let builders: Mutex<Vec<Arc<InstanceBuilder>>> = Mutex::new(Vec::new());
    let written: Mutex<Vec<(u32, PathBuf)>> = Mutex::new(Vec::new());

    pool.scope_fifo(|scope| {
        let mut pending: Vec<Arc<Frame>> = Vec::new();
        let mut emitted: u32 = 0;
        let mut batch_ordinal: u32 = 0;

        let mut cut_batch = |pending: &mut Vec<Arc<Frame>>,
                             emitted: &mut u32,
                             batch_ordinal: &mut u32| {
            if pending.is_empty() {
                return;
            }
            let batch = std::mem::take(pending);
            let first_index = *emitted;
            let this_ordinal = *batch_ordinal;
            *emitted += batch.len() as u32;
            let params = InstanceParams {
                level: plan.level,
                batch_ordinal: this_ordinal,
                frames_before: first_index,
                total_frames_in_level: total_frames,
                start_row: first_index / tiles_per_row as u32 + 1,
                start_column: first_index % tiles_per_row as u32 + 1,
                image_width: plan.width,
                image_height: plan.height,
                tile_width: plan.tile_width,
                tile_height: plan.tile_height,
                tiled: !config.sparse,
                codec: config.codec(),
                study_uid: study_uid.to_string(),
                series_uid: series_uid.to_string(),
                image_name: config.series_description.clone(),
                physical_width_mm: physical_mm.0,
                physical_height_mm: physical_mm.1,
                out_folder: config.out_folder.clone(),
            };
            *batch_ordinal += 1;

            let builder = Arc::new(InstanceBuilder::new(batch, params, Arc::clone(extra_tags)));
            builders.lock().push(Arc::clone(&builder));

            let job = &job;
            let written = &written;
            scope.spawn_fifo(move |_| match builder.write() {
                Ok(path) => written.lock().push((this_ordinal, path)),
                Err(err) => job.record(err),
            });
        };

        'tiles: for tile_y in 0..plan.tiles_per_column() {
            for tile_x in 0..tiles_per_row {
                if job.failed() {
                    break 'tiles;
                }
                let frame = Arc::new(Frame::new(
                    tile_x * plan.read_width + read_offset,
                    tile_y * plan.read_height + read_offset,
                    plan.read_width,
                    plan.read_height,
                    plan.tile_width as u32,
                    plan.tile_height as u32,
                    plan.width,
                    plan.height,
                    resampler,
                    config.codec(),
                    config.quality,
                    plan.store_raw,
                    source.photometric(),
                ));
                if let Some(reader) = &region_reader {
                    reader.plan_reads(
                        frame.location_x(),
                        frame.location_y(),
                        frame.read_width(),
                        frame.read_height(),
                    );
                }

                let task_frame = Arc::clone(&frame);
                let job = &job;
                scope.spawn_fifo(move |_| {
                    if let Err(err) = task_frame.slice(&supply) {
                        job.record(err);
                    }
                });

                pending.push(frame);
                if pending.len() as u32 >= batch_limit {
                    cut_batch(&mut pending, &mut emitted, &mut batch_ordinal);
                }
            }
        }
        cut_batch(&mut pending, &mut emitted, &mut batch_ordinal);
    });

    job.into_result()?;

    let mut written = written.into_inner();
    written.sort_by_key(|(ordinal, _)| *ordinal);
    let report = LevelReport {
        level: plan.level,
        frames: total_frames,
        files: written.into_iter().map(|(_, path)| path).collect(),
    };
    Ok((builders.into_inner(), report))
}

// =============================================================================
// Tests
// =============================================================================
