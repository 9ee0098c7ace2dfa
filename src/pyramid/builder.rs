//! DICOM instance assembly.
//!
//! An instance builder owns one batch of frames in tile-grid row-major
//! order. `write()` waits for every owned frame to finish encoding, builds
//! the pixel-data element (encapsulated for JPEG / JPEG 2000, concatenated
//! native bytes for raw), attaches the complete WSI tag set, and emits the
//! part-10 file. Caller-supplied tags merge last and override core tags.

use std::path::PathBuf;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use chrono::Utc;
use tracing::debug;

use crate::codec::Codec;
use crate::dicom::{
    self, generate_uid, tags, write_file, DataSet, FileMeta, Value, Vr, SOP_CLASS_WSI,
};
use crate::error::ConvertError;
use crate::frame::Frame;
use crate::geometry::tiles_per_row;

/// Everything an instance needs besides its frames.
#[derive(Debug, Clone)]
pub struct InstanceParams {
    /// Output level index (drives InstanceNumber and the level UIDs).
    pub level: u32,

    /// 0-based batch ordinal within the level.
    pub batch_ordinal: u32,

    /// Frames written for this level before this batch.
    pub frames_before: u32,

    /// Total frames the level will hold across all batches.
    pub total_frames_in_level: u32,

    /// 1-based tile-grid position of this batch's first frame.
    pub start_row: u32,
    pub start_column: u32,

    /// Level dimensions in pixels.
    pub image_width: i64,
    pub image_height: i64,

    /// Frame dimensions in pixels.
    pub tile_width: i64,
    pub tile_height: i64,

    /// TILED_FULL when true, TILED_SPARSE (with per-frame positions) when
    /// false.
    pub tiled: bool,

    pub codec: Codec,

    pub study_uid: String,
    pub series_uid: String,
    pub image_name: String,

    /// Physical size of the imaged volume; non-positive means unknown.
    pub physical_width_mm: f64,
    pub physical_height_mm: f64,

    pub out_folder: PathBuf,
}

pub struct InstanceBuilder {
    frames: Vec<Arc<Frame>>,
    params: InstanceParams,
    extra_tags: Arc<DataSet>,
}

impl InstanceBuilder {
    pub fn new(frames: Vec<Arc<Frame>>, params: InstanceParams, extra_tags: Arc<DataSet>) -> Self {
        Self {
            frames,
            params,
            extra_tags,
        }
    }

    pub fn frames(&self) -> &[Arc<Frame>] {
        &self.frames
    }

    pub fn frame_count(&self) -> u32 {
        self.frames.len() as u32
    }

    pub fn tile_width(&self) -> i64 {
        self.params.tile_width
    }

    pub fn tile_height(&self) -> i64 {
        self.params.tile_height
    }

    pub fn image_width(&self) -> i64 {
        self.params.image_width
    }

    pub fn image_height(&self) -> i64 {
        self.params.image_height
    }

    pub fn level(&self) -> u32 {
        self.params.level
    }

    /// Output file name: `level-<ℓ>-frames-<first>-<last>.dcm`.
    pub fn file_name(&self) -> String {
        format!(
            "level-{}-frames-{}-{}.dcm",
            self.params.level,
            self.params.frames_before,
            self.params.frames_before + self.frame_count()
        )
    }

    /// Wait for the owned frames, assemble the dataset, write the file.
    ///
    /// A failure in any frame or tag surfaces here and no partial file is
    /// written.
    pub fn write(&self) -> Result<PathBuf, ConvertError> {
        for frame in &self.frames {
            frame.wait_encoded()?;
        }

        let mut dataset = DataSet::new();
        self.insert_pixel_data(&mut dataset)?;
        self.insert_pixel_metadata(&mut dataset);
        self.insert_date_tags(&mut dataset);
        let sop_instance_uid = self.insert_ids(&mut dataset);
        self.insert_base_image_tags(&mut dataset);
        self.insert_multi_frame_tags(&mut dataset);
        self.insert_static_tags(&mut dataset);
        self.insert_shared_functional_groups(&mut dataset);
        self.insert_dimension_index_sequence(&mut dataset);
        dataset.merge(&self.extra_tags);

        let meta = FileMeta {
            sop_class_uid: SOP_CLASS_WSI.to_string(),
            sop_instance_uid,
            transfer_syntax: self.params.codec.transfer_syntax().to_string(),
        };
        let path = self.params.out_folder.join(self.file_name());
        write_file(&path, &meta, &dataset)?;
        debug!(file = %path.display(), frames = self.frame_count(), "instance written");
        Ok(path)
    }

    /// Build the pixel-data element, draining every frame's payload.
    fn insert_pixel_data(&self, dataset: &mut DataSet) -> Result<(), ConvertError> {
        if self.params.codec.is_encapsulated() {
            let mut fragments = Vec::with_capacity(self.frames.len());
            for frame in &self.frames {
                fragments.push(frame.take_encoded()?);
            }
            dataset.put_fragments(tags::PIXEL_DATA, fragments);
        } else {
            let mut pixels = BytesMut::new();
            for frame in &self.frames {
                pixels.extend_from_slice(&frame.take_encoded()?);
            }
            dataset.put_bytes(tags::PIXEL_DATA, Vr::Ob, pixels.freeze());
        }
        Ok(())
    }

    fn insert_pixel_metadata(&self, dataset: &mut DataSet) {
        dataset.put_u16(tags::SAMPLES_PER_PIXEL, 3);
        dataset.put_str(tags::PHOTOMETRIC_INTERPRETATION, Vr::Cs, "RGB");
        dataset.put_u16(tags::PLANAR_CONFIGURATION, 0);
        dataset.put_u16(tags::ROWS, self.params.tile_height as u16);
        dataset.put_u16(tags::COLUMNS, self.params.tile_width as u16);
        dataset.put_u16(tags::BITS_ALLOCATED, 8);
        dataset.put_u16(tags::BITS_STORED, 8);
        dataset.put_u16(tags::HIGH_BIT, 7);
        dataset.put_u16(tags::PIXEL_REPRESENTATION, 0);
        dataset.put_str(
            tags::NUMBER_OF_FRAMES,
            Vr::Is,
            self.frame_count().to_string(),
        );
        dataset.put(tags::FRAME_INCREMENT_POINTER, Vr::At, Value::Bytes(Bytes::new()));
        dataset.put_str(
            tags::LOSSY_IMAGE_COMPRESSION,
            Vr::Cs,
            self.params.codec.lossy_flag(),
        );
    }

    fn insert_date_tags(&self, dataset: &mut DataSet) {
        let now = Utc::now();
        dataset.put_str(tags::CONTENT_DATE, Vr::Da, now.format("%Y%m%d").to_string());
        dataset.put_str(tags::CONTENT_TIME, Vr::Tm, now.format("%H%M%S").to_string());
    }

    /// Insert identity UIDs; returns the fresh SOP instance UID.
    fn insert_ids(&self, dataset: &mut DataSet) -> String {
        let sop_instance_uid = generate_uid();
        dataset.put_str(tags::SOP_INSTANCE_UID, Vr::Ui, &sop_instance_uid);
        dataset.put_str(tags::STUDY_INSTANCE_UID, Vr::Ui, &self.params.study_uid);
        dataset.put_str(tags::SERIES_INSTANCE_UID, Vr::Ui, &self.params.series_uid);
        sop_instance_uid
    }

    fn insert_base_image_tags(&self, dataset: &mut DataSet) {
        dataset.put_str(tags::SERIES_DESCRIPTION, Vr::Lo, &self.params.image_name);
        dataset.put_u32(
            tags::TOTAL_PIXEL_MATRIX_COLUMNS,
            self.params.image_width as u32,
        );
        dataset.put_u32(
            tags::TOTAL_PIXEL_MATRIX_ROWS,
            self.params.image_height as u32,
        );
        if self.params.physical_width_mm > 0.0 && self.params.physical_height_mm > 0.0 {
            dataset.put_f32(
                tags::IMAGED_VOLUME_WIDTH,
                self.params.physical_width_mm as f32,
            );
            dataset.put_f32(
                tags::IMAGED_VOLUME_HEIGHT,
                self.params.physical_height_mm as f32,
            );
        }
    }

    /// Frames per grid row of the level.
    fn row_size(&self) -> u32 {
        tiles_per_row(self.params.image_width, self.params.tile_width) as u32
    }

    /// How many instances the level splits into.
    fn concatenation_total(&self) -> u32 {
        let params = &self.params;
        if params.total_frames_in_level - params.frames_before == self.frame_count() {
            // Last batch: the running ordinal is exact.
            params.batch_ordinal + 1
        } else {
            (params.total_frames_in_level as f64 / self.frame_count() as f64).ceil() as u32
        }
    }

    fn insert_multi_frame_tags(&self, dataset: &mut DataSet) {
        let params = &self.params;
        dataset.put_str(
            tags::INSTANCE_NUMBER,
            Vr::Is,
            (params.level + 1).to_string(),
        );

        let level_uid = dicom::derive_uid(&params.series_uid, params.level + 1);
        if self.concatenation_total() > 1 {
            dataset.put_u32(
                tags::CONCATENATION_FRAME_OFFSET_NUMBER,
                params.frames_before,
            );
            dataset.put_u16(
                tags::IN_CONCATENATION_NUMBER,
                (params.batch_ordinal + 1) as u16,
            );
            dataset.put_u16(
                tags::IN_CONCATENATION_TOTAL_NUMBER,
                self.concatenation_total() as u16,
            );
            dataset.put_str(tags::CONCATENATION_UID, Vr::Ui, &level_uid);
        }
        dataset.put_str(tags::FRAME_OF_REFERENCE_UID, Vr::Ui, level_uid);

        if params.tiled {
            dataset.put_str(tags::DIMENSION_ORGANIZATION_TYPE, Vr::Cs, "TILED_FULL");
        } else {
            dataset.put_str(tags::DIMENSION_ORGANIZATION_TYPE, Vr::Cs, "TILED_SPARSE");
            self.insert_frame_positions(dataset);
        }
    }

    /// Per-frame functional groups with explicit grid positions (SPARSE).
    ///
    /// Positions are 1-based pixel coordinates; the walking column wraps to
    /// the next row after exceeding the row size.
    fn insert_frame_positions(&self, dataset: &mut DataSet) {
        let row_size = self.row_size();
        let mut row = self.params.start_row;
        let mut column = self.params.start_column;

        let mut items = Vec::with_capacity(self.frames.len());
        for _ in &self.frames {
            if column > row_size {
                column = 1;
                row += 1;
            }

            let mut content = DataSet::new();
            content.put_u32_list(tags::DIMENSION_INDEX_VALUES, vec![column, row]);

            let mut position = DataSet::new();
            position.put_i32(
                tags::COLUMN_POSITION_IN_TOTAL_IMAGE_PIXEL_MATRIX,
                ((column - 1) as i64 * self.params.tile_width + 1) as i32,
            );
            position.put_i32(
                tags::ROW_POSITION_IN_TOTAL_IMAGE_PIXEL_MATRIX,
                ((row - 1) as i64 * self.params.tile_height + 1) as i32,
            );

            let mut item = DataSet::new();
            item.put_sequence(tags::FRAME_CONTENT_SEQUENCE, vec![content]);
            item.put_sequence(tags::PLANE_POSITION_SLIDE_SEQUENCE, vec![position]);
            items.push(item);

            column += 1;
        }
        dataset.put_sequence(tags::PER_FRAME_FUNCTIONAL_GROUPS_SEQUENCE, items);
    }

    fn insert_static_tags(&self, dataset: &mut DataSet) {
        dataset.put_str(tags::SOP_CLASS_UID, Vr::Ui, SOP_CLASS_WSI);
        dataset.put_str(tags::MODALITY, Vr::Cs, "SM");
        let image_type = if self.params.level == 0 {
            "DERIVED\\PRIMARY\\VOLUME\\NONE"
        } else {
            "DERIVED\\PRIMARY\\VOLUME\\RESAMPLED"
        };
        dataset.put_str(tags::IMAGE_TYPE, Vr::Cs, image_type);
        dataset.put_str(tags::IMAGE_ORIENTATION_SLIDE, Vr::Ds, "0\\-1\\0\\-1\\0\\0");
        dataset.put_u16(tags::REPRESENTATIVE_FRAME_NUMBER, 1);
    }

    fn insert_shared_functional_groups(&self, dataset: &mut DataSet) {
        let mut spacing = self.params.physical_height_mm / self.params.image_height as f64;
        if spacing <= 0.0 {
            spacing = 0.1;
        }
        let spacing = format!("{spacing:.6}");

        let mut measures = DataSet::new();
        measures.put_str(tags::PIXEL_SPACING, Vr::Ds, format!("{spacing}\\{spacing}"));
        let mut shared = DataSet::new();
        shared.put_sequence(tags::PIXEL_MEASURES_SEQUENCE, vec![measures]);
        dataset.put_sequence(tags::SHARED_FUNCTIONAL_GROUPS_SEQUENCE, vec![shared]);
    }

    /// Two identical dimension pointers at the plane-position column index.
    fn insert_dimension_index_sequence(&self, dataset: &mut DataSet) {
        let organization_uid = generate_uid();

        let mut organization = DataSet::new();
        organization.put_str(tags::DIMENSION_ORGANIZATION_UID, Vr::Ui, &organization_uid);
        dataset.put_sequence(tags::DIMENSION_ORGANIZATION_SEQUENCE, vec![organization]);

        let pointer_item = || {
            let mut item = DataSet::new();
            item.put_str(tags::DIMENSION_ORGANIZATION_UID, Vr::Ui, &organization_uid);
            item.put_tag_ref(
                tags::FUNCTIONAL_GROUP_POINTER,
                tags::PLANE_POSITION_SLIDE_SEQUENCE,
            );
            item.put_tag_ref(
                tags::DIMENSION_INDEX_POINTER,
                tags::COLUMN_POSITION_IN_TOTAL_IMAGE_PIXEL_MATRIX,
            );
            item
        };
        dataset.put_sequence(
            tags::DIMENSION_INDEX_SEQUENCE,
            vec![pointer_item(), pointer_item()],
        );
    }
}

// =============================================================================
// Tests
// =============================================================================
