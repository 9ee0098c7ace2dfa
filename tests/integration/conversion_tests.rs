//! End-to-end conversion scenarios.

use wsi_dicomizer::dicom::tags;
use wsi_dicomizer::{convert, Codec};

use super::test_utils::{config_for, frame_count, quadrant_png, raw_frames, read_instance, striped_png};

// =============================================================================
// Basic conversions per codec
// =============================================================================

#[test]
fn test_jpeg_single_level() {
    let dir = tempfile::tempdir().unwrap();
    let input = striped_png(dir.path(), 96, 96, 16);
    let config = config_for(dir.path(), input, 32);

    let report = convert(&config).unwrap();
    assert_eq!(report.levels.len(), 1);
    assert_eq!(report.levels[0].frames, 9);

    let files = &report.levels[0].files;
    assert_eq!(files.len(), 1);
    assert!(files[0].ends_with("level-0-frames-0-9.dcm"));

    let parsed = read_instance(&files[0]);
    assert_eq!(parsed.transfer_syntax, Codec::Jpeg.transfer_syntax());
    assert_eq!(frame_count(&parsed.dataset), 9);
    assert_eq!(
        parsed.dataset.str_value(tags::LOSSY_IMAGE_COMPRESSION),
        Some("01")
    );
    // One encapsulated fragment per frame.
    assert_eq!(parsed.pixel_data.fragments.len(), 9);
    // DENSE layout carries no per-frame positions.
    assert!(!parsed
        .dataset
        .contains(tags::PER_FRAME_FUNCTIONAL_GROUPS_SEQUENCE));
}

#[test]
fn test_raw_single_frame_level() {
    let dir = tempfile::tempdir().unwrap();
    let input = quadrant_png(dir.path(), 32);
    let mut config = config_for(dir.path(), input, 32);
    config.compression = "raw".to_string();

    let report = convert(&config).unwrap();
    let files = &report.levels[0].files;
    assert!(files[0].ends_with("level-0-frames-0-1.dcm"));

    let parsed = read_instance(&files[0]);
    assert_eq!(parsed.transfer_syntax, "1.2.840.10008.1.2.1");
    assert_eq!(
        parsed.dataset.str_value(tags::LOSSY_IMAGE_COMPRESSION),
        Some("00")
    );

    // Raw frames round-trip pixel values exactly.
    let pixels = raw_frames(&files[0]);
    assert_eq!(pixels.len(), 32 * 32 * 3);
    assert_eq!(pixels[0], 10);
    let last = pixels.len() - 1;
    assert_eq!(pixels[last], 40);
}

#[test]
fn test_jpeg2000_conversion() {
    let dir = tempfile::tempdir().unwrap();
    let input = quadrant_png(dir.path(), 32);
    let mut config = config_for(dir.path(), input, 16);
    config.compression = "jpeg2000".to_string();

    let report = convert(&config).unwrap();
    let parsed = read_instance(&report.levels[0].files[0]);
    assert_eq!(parsed.transfer_syntax, "1.2.840.10008.1.2.4.90");
    assert_eq!(
        parsed.dataset.str_value(tags::LOSSY_IMAGE_COMPRESSION),
        Some("00")
    );
    assert_eq!(parsed.pixel_data.fragments.len(), 4);
}

// =============================================================================
// Batching and concatenation
// =============================================================================

#[test]
fn test_batched_concatenation_tags() {
    let dir = tempfile::tempdir().unwrap();
    let input = striped_png(dir.path(), 96, 96, 16);
    let mut config = config_for(dir.path(), input, 32);
    config.batch = 3;

    let report = convert(&config).unwrap();
    let files = &report.levels[0].files;
    // 9 frames in batches of 3.
    let names: Vec<String> = files
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(
        names,
        vec![
            "level-0-frames-0-3.dcm",
            "level-0-frames-3-6.dcm",
            "level-0-frames-6-9.dcm"
        ]
    );

    let mut seen_frames = 0i64;
    for (index, file) in files.iter().enumerate() {
        let parsed = read_instance(file);
        assert_eq!(
            parsed.dataset.int_value(tags::IN_CONCATENATION_NUMBER),
            Some(index as i64 + 1)
        );
        assert_eq!(
            parsed.dataset.int_value(tags::IN_CONCATENATION_TOTAL_NUMBER),
            Some(3)
        );
        assert_eq!(
            parsed
                .dataset
                .int_value(tags::CONCATENATION_FRAME_OFFSET_NUMBER),
            Some(seen_frames)
        );
        seen_frames += frame_count(&parsed.dataset);

        // All batches of a level share one concatenation and frame of
        // reference UID.
        let first = read_instance(&files[0]);
        assert_eq!(
            parsed.dataset.str_value(tags::CONCATENATION_UID),
            first.dataset.str_value(tags::CONCATENATION_UID)
        );
        assert_eq!(
            parsed.dataset.str_value(tags::FRAME_OF_REFERENCE_UID),
            first.dataset.str_value(tags::FRAME_OF_REFERENCE_UID)
        );
    }
    // Frames across instances sum to the level's tile count.
    assert_eq!(seen_frames, 9);
}

#[test]
fn test_instance_numbers_follow_levels() {
    let dir = tempfile::tempdir().unwrap();
    let input = striped_png(dir.path(), 64, 64, 16);
    let mut config = config_for(dir.path(), input, 16);
    config.levels = 2;
    config.series_id = "2.25.900".to_string();

    let report = convert(&config).unwrap();
    assert_eq!(report.levels.len(), 2);

    let level0 = read_instance(&report.levels[0].files[0]);
    assert_eq!(level0.dataset.str_value(tags::INSTANCE_NUMBER), Some("1"));
    assert_eq!(
        level0.dataset.str_value(tags::FRAME_OF_REFERENCE_UID),
        Some("2.25.900.1")
    );
    assert_eq!(
        level0.dataset.str_value(tags::IMAGE_TYPE),
        Some("DERIVED\\PRIMARY\\VOLUME\\NONE")
    );

    let level1 = read_instance(&report.levels[1].files[0]);
    assert_eq!(level1.dataset.str_value(tags::INSTANCE_NUMBER), Some("2"));
    assert_eq!(
        level1.dataset.str_value(tags::FRAME_OF_REFERENCE_UID),
        Some("2.25.900.2")
    );
    assert_eq!(
        level1.dataset.str_value(tags::IMAGE_TYPE),
        Some("DERIVED\\PRIMARY\\VOLUME\\RESAMPLED")
    );
    assert_eq!(
        level0.dataset.str_value(tags::SERIES_INSTANCE_UID),
        level1.dataset.str_value(tags::SERIES_INSTANCE_UID)
    );
}

// =============================================================================
// Frame organization
// =============================================================================

#[test]
fn test_sparse_layout_positions() {
    let dir = tempfile::tempdir().unwrap();
    let input = quadrant_png(dir.path(), 64);
    let mut config = config_for(dir.path(), input, 32);
    config.sparse = true;
    config.compression = "raw".to_string();

    let report = convert(&config).unwrap();
    let path = &report.levels[0].files[0];
    let bytes = std::fs::read(path).unwrap();

    // The parsed top level skips sequences, so check the stream directly:
    // TILED_SPARSE organization and the wrapped third frame's position
    // (row 2, column 1 of a 2x2 grid of 32px tiles).
    let parsed = read_instance(path);
    assert_eq!(
        parsed.dataset.str_value(tags::DIMENSION_ORGANIZATION_TYPE),
        Some("TILED_SPARSE")
    );

    let column_one: &[u8] = &[0x48, 0x00, 0x1E, 0x02, b'S', b'L', 4, 0, 1, 0, 0, 0];
    let row_thirty_three: &[u8] = &[0x48, 0x00, 0x1F, 0x02, b'S', b'L', 4, 0, 33, 0, 0, 0];
    assert!(bytes.windows(column_one.len()).any(|w| w == column_one));
    assert!(bytes
        .windows(row_thirty_three.len())
        .any(|w| w == row_thirty_three));
}

#[test]
fn test_dense_layout_has_no_positions() {
    let dir = tempfile::tempdir().unwrap();
    let input = quadrant_png(dir.path(), 64);
    let mut config = config_for(dir.path(), input, 32);
    config.compression = "raw".to_string();

    let report = convert(&config).unwrap();
    let parsed = read_instance(&report.levels[0].files[0]);
    assert_eq!(
        parsed.dataset.str_value(tags::DIMENSION_ORGANIZATION_TYPE),
        Some("TILED_FULL")
    );
    let bytes = std::fs::read(&report.levels[0].files[0]).unwrap();
    // No per-frame functional groups sequence tag anywhere in the stream.
    let tag: &[u8] = &[0x00, 0x52, 0x30, 0x92];
    assert!(!bytes.windows(tag.len()).any(|w| w == tag));
}

// =============================================================================
// Progressive downsampling
// =============================================================================

#[test]
fn test_progressive_averages_quadrants() {
    let dir = tempfile::tempdir().unwrap();
    // 4x4 image of four 2x2 quadrants, level 0 in 2px tiles, level 1 a
    // single 2x2 tile at downsample 2 built from level 0 frames.
    let input = quadrant_png(dir.path(), 4);
    let mut config = config_for(dir.path(), input, 2);
    config.levels = 2;
    config.compression = "raw".to_string();
    config.progressive_downsample = true;

    let report = convert(&config).unwrap();
    assert_eq!(report.levels[1].frames, 1);

    let pixels = raw_frames(&report.levels[1].files[0]);
    // Nearest 2:1 sampling of constant quadrants reproduces each
    // quadrant's value exactly.
    assert_eq!(pixels.len(), 2 * 2 * 3);
    assert_eq!(pixels[0], 10);
    assert_eq!(pixels[3], 20);
    assert_eq!(pixels[6], 30);
    assert_eq!(pixels[9], 40);
}

#[test]
fn test_progressive_equals_direct() {
    let dir = tempfile::tempdir().unwrap();
    let input = quadrant_png(dir.path(), 64);

    let run = |progressive: bool, out_name: &str| {
        let out = dir.path().join(out_name);
        std::fs::create_dir_all(&out).unwrap();
        let mut config = config_for(dir.path(), input.clone(), 16);
        config.out_folder = out;
        config.levels = 2;
        config.compression = "raw".to_string();
        config.progressive_downsample = progressive;
        convert(&config).unwrap()
    };

    let direct = run(false, "direct");
    let progressive = run(true, "progressive");

    // Both paths emit identical level-1 pixels: nearest sampling of a
    // quadrant image is the same whether it reads the source or the
    // level-0 frames.
    assert_eq!(
        raw_frames(&direct.levels[1].files[0]),
        raw_frames(&progressive.levels[1].files[0])
    );
}

// =============================================================================
// Additional tags
// =============================================================================

#[test]
fn test_json_tag_merge() {
    let dir = tempfile::tempdir().unwrap();
    let input = quadrant_png(dir.path(), 32);
    let json_path = dir.path().join("tags.json");
    std::fs::write(
        &json_path,
        r#"{
            "00080020": {"vr": "DA", "Value": ["20190327"]},
            "00080021": {"vr": "DA", "Value": ["20190327"]}
        }"#,
    )
    .unwrap();

    let mut config = config_for(dir.path(), input, 32);
    config.compression = "raw".to_string();
    config.json_file = Some(json_path);

    let report = convert(&config).unwrap();
    let parsed = read_instance(&report.levels[0].files[0]);
    use wsi_dicomizer::dicom::Tag;
    assert_eq!(
        parsed.dataset.str_value(Tag(0x0008, 0x0020)),
        Some("20190327")
    );
    assert_eq!(
        parsed.dataset.str_value(Tag(0x0008, 0x0021)),
        Some("20190327")
    );
}

#[test]
fn test_malformed_json_is_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let input = quadrant_png(dir.path(), 32);
    let json_path = dir.path().join("tags.json");
    std::fs::write(&json_path, "{ not json").unwrap();

    let mut config = config_for(dir.path(), input, 32);
    config.json_file = Some(json_path);
    assert!(convert(&config).is_ok());
}

// =============================================================================
// Option coverage
// =============================================================================

#[test]
fn test_stop_downsampling_at_single_frame() {
    let dir = tempfile::tempdir().unwrap();
    let input = striped_png(dir.path(), 128, 128, 16);
    let mut config = config_for(dir.path(), input, 32);
    config.levels = 6;
    config.stop_downsampling_at_single_frame = true;

    let report = convert(&config).unwrap();
    // 128 -> 64 -> 32: the third level fits one 32px tile and ends the plan.
    assert_eq!(report.levels.len(), 3);
    assert_eq!(report.levels[2].frames, 1);
}

#[test]
fn test_bilinear_and_filtered_kernels_run() {
    let dir = tempfile::tempdir().unwrap();
    let input = quadrant_png(dir.path(), 64);

    for (bilinear, kernel) in [(true, None), (false, Some("lanczos"))] {
        let out = dir
            .path()
            .join(format!("out-{}", kernel.unwrap_or("bilinear")));
        std::fs::create_dir_all(&out).unwrap();
        let mut config = config_for(dir.path(), input.clone(), 16);
        config.out_folder = out;
        config.levels = 2;
        config.bilinear_downsampling = bilinear;
        config.opencv_downsampling = kernel.map(str::to_string);

        let report = convert(&config).unwrap();
        assert_eq!(report.levels.len(), 2);
        assert!(report.levels[1].files[0].exists());
    }
}

#[test]
fn test_uniform_pixel_spacing_crops_level() {
    let dir = tempfile::tempdir().unwrap();
    // 80x48 image with 32px tiles crops to 64x32.
    let input = striped_png(dir.path(), 80, 48, 8);
    let mut config = config_for(dir.path(), input, 32);
    config.uniform_pixel_spacing = true;
    config.compression = "raw".to_string();

    let report = convert(&config).unwrap();
    assert_eq!(report.levels[0].frames, 2);
    let parsed = read_instance(&report.levels[0].files[0]);
    assert_eq!(
        parsed.dataset.int_value(tags::TOTAL_PIXEL_MATRIX_COLUMNS),
        Some(64)
    );
    assert_eq!(
        parsed.dataset.int_value(tags::TOTAL_PIXEL_MATRIX_ROWS),
        Some(32)
    );
}
