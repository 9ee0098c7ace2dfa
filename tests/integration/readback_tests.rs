//! Reading the converter's own output back as a pyramid source.

use wsi_dicomizer::dicom::tags;
use wsi_dicomizer::{convert, DicomSlideSource, PyramidSource};

use super::test_utils::{config_for, quadrant_png, read_instance};

#[test]
fn test_raw_output_reads_back() {
    let dir = tempfile::tempdir().unwrap();
    let input = quadrant_png(dir.path(), 64);
    let mut config = config_for(dir.path(), input, 32);
    config.compression = "raw".to_string();

    let report = convert(&config).unwrap();
    let source = DicomSlideSource::open(&report.levels[0].files[0]).unwrap();

    assert_eq!(source.level_count(), 1);
    assert_eq!(source.level_dimensions(0), Some((64, 64)));
    assert_eq!(source.photometric(), "RGB");

    // Each quadrant's pixels survive the round trip exactly.
    let region = source.read_region(0, 0, 0, 64, 64).unwrap();
    assert_eq!(region.get(0, 0)[0], 10);
    assert_eq!(region.get(63, 0)[0], 20);
    assert_eq!(region.get(0, 63)[0], 30);
    assert_eq!(region.get(63, 63)[0], 40);
}

#[test]
fn test_jpeg_output_reads_back() {
    let dir = tempfile::tempdir().unwrap();
    let input = quadrant_png(dir.path(), 64);
    let mut config = config_for(dir.path(), input, 32);
    config.quality = 95;

    let report = convert(&config).unwrap();
    let source = DicomSlideSource::open(&report.levels[0].files[0]).unwrap();

    // JPEG is lossy: verify within a small error band, across a read that
    // spans all four frames.
    let region = source.read_region(0, 16, 16, 32, 32).unwrap();
    assert!((region.get(0, 0)[0] as i32 - 10).abs() < 8);
    assert!((region.get(31, 0)[0] as i32 - 20).abs() < 8);
    assert!((region.get(0, 31)[0] as i32 - 30).abs() < 8);
    assert!((region.get(31, 31)[0] as i32 - 40).abs() < 8);
}

#[test]
fn test_dicom_source_feeds_new_conversion() {
    let dir = tempfile::tempdir().unwrap();
    let input = quadrant_png(dir.path(), 64);
    let mut config = config_for(dir.path(), input, 32);
    config.compression = "raw".to_string();

    let first = convert(&config).unwrap();

    // Convert the DICOM output again, downsampling it into one tile.
    let out2 = dir.path().join("second");
    std::fs::create_dir_all(&out2).unwrap();
    let mut config2 = config_for(dir.path(), first.levels[0].files[0].clone(), 32);
    config2.out_folder = out2;
    config2.compression = "raw".to_string();
    config2.levels = 2;

    let second = convert(&config2).unwrap();
    assert_eq!(second.levels.len(), 2);
    assert_eq!(second.levels[1].frames, 1);

    let parsed = read_instance(&second.levels[1].files[0]);
    assert_eq!(parsed.dataset.int_value(tags::TOTAL_PIXEL_MATRIX_COLUMNS), Some(32));
    assert_eq!(
        parsed.dataset.str_value(tags::IMAGE_TYPE),
        Some("DERIVED\\PRIMARY\\VOLUME\\RESAMPLED")
    );
}

#[test]
fn test_physical_size_survives_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let input = quadrant_png(dir.path(), 64);
    let mut config = config_for(dir.path(), input, 32);
    config.compression = "raw".to_string();
    config.image_height_mm = Some(8.0);

    let report = convert(&config).unwrap();
    let source = DicomSlideSource::open(&report.levels[0].files[0]).unwrap();
    let (w_mm, h_mm) = source.physical_size_mm().unwrap();
    assert!((w_mm - 8.0).abs() < 1e-4);
    assert!((h_mm - 8.0).abs() < 1e-4);

    // And the pixel spacing tag reflects it: 8mm / 64px = 0.125.
    let bytes = std::fs::read(&report.levels[0].files[0]).unwrap();
    let spacing: &[u8] = b"0.125000\\0.125000";
    assert!(bytes.windows(spacing.len()).any(|w| w == spacing));
}
