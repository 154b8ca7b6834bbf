use image::Luma;

use super::*;

fn gradient(width: u32, height: u32) -> GrayImage {
    GrayImage::from_fn(width, height, |x, y| Luma([((x * 37 + y * 11) % 256) as u8]))
}

fn size(width: u32, height: u32) -> FrameSize {
    FrameSize::new(width, height).unwrap()
}

#[test]
fn binarize_uses_hard_threshold_at_127() {
    let mut img = GrayImage::from_raw(4, 1, vec![0, 126, 127, 255]).unwrap();
    binarize(&mut img);
    assert_eq!(img.as_raw(), &[0, 0, 255, 255]);
}

#[test]
fn upscaled_image_lands_on_canonical_shape_with_binary_values() {
    let source = GrayImage::from_fn(384, 128, |x, _| Luma([if x < 192 { 200 } else { 10 }]));
    let canon = canonicalize_image(&source, FrameSize::CANONICAL).unwrap();

    assert_eq!(canon.size(), FrameSize::CANONICAL);
    assert!(canon.as_raw().iter().all(|&v| v == 0 || v == 255));
    let on = canon.on_count();
    let total = FrameSize::CANONICAL.pixel_count();
    assert!(on > total * 2 / 5 && on < total * 3 / 5, "on = {on}");
}

#[test]
fn short_image_is_centered_with_zero_rows() {
    let source = GrayImage::from_pixel(20, 4, Luma([255]));
    let canon = canonicalize_image(&source, size(20, 11)).unwrap();

    // pad_top = (11 - 4) / 2 = 3, remainder at the bottom
    for y in 0..11 {
        let expect_on = (3..7).contains(&y);
        assert_eq!(canon.is_on(0, y), expect_on, "row {y}");
        assert_eq!(canon.is_on(19, y), expect_on, "row {y}");
    }
    assert_eq!(canon.on_count(), 20 * 4);
}

#[test]
fn tall_image_is_center_cropped() {
    let source = GrayImage::from_fn(10, 30, |_, y| {
        Luma([if (10..20).contains(&y) { 255 } else { 0 }])
    });
    let canon = canonicalize_image(&source, size(10, 10)).unwrap();
    assert_eq!(canon.on_count(), 100);
}

#[test]
fn odd_crop_rounds_top_offset_down() {
    // new_h = 13, crop_top = (13 - 10) / 2 = 1
    let source = GrayImage::from_fn(4, 13, |_, y| {
        Luma([if y == 0 || y == 10 { 255 } else { 0 }])
    });
    let canon = canonicalize_image(&source, size(4, 10)).unwrap();
    assert!(!canon.is_on(0, 0));
    assert!(canon.is_on(0, 9));
    assert_eq!(canon.on_count(), 4);
}

#[test]
fn scaled_height_is_rounded() {
    assert_eq!(scaled_height(3, 2, 4), 3);
    assert_eq!(scaled_height(3840, 1280, 3840), 1280);
    assert_eq!(scaled_height(1920, 641, 3840), 1282);
    assert_eq!(scaled_height(100_000, 1, 10), 1);
}

#[test]
fn canonicalization_is_idempotent() {
    for (w, h) in [(96, 40), (40, 40), (200, 20), (48, 16)] {
        let first = canonicalize_image(&gradient(w, h), size(48, 16)).unwrap();
        let second = canonicalize_image(first.as_gray(), size(48, 16)).unwrap();
        assert_eq!(first, second, "source {w}x{h}");
    }
}

#[test]
fn canonicalized_values_are_binary_for_any_source() {
    let canon = canonicalize_image(&gradient(123, 77), size(64, 24)).unwrap();
    assert_eq!(canon.size(), size(64, 24));
    assert!(canon.as_raw().iter().all(|&v| v == MASK_ON || v == MASK_OFF));
}

#[test]
fn empty_source_is_invalid() {
    let err = canonicalize_image(&GrayImage::new(0, 0), size(4, 4)).unwrap_err();
    assert!(matches!(err, MaskError::AssetInvalid(_)));
}

#[test]
fn canonicalize_reads_png_and_bmp_files() {
    let dir = tempfile::tempdir().unwrap();
    let source = GrayImage::from_fn(8, 4, |x, _| Luma([if x < 4 { 255 } else { 0 }]));
    for ext in ["png", "bmp"] {
        let path = dir.path().join(format!("mask.{ext}"));
        source.save(&path).unwrap();
        let canon = canonicalize(&path, size(8, 4)).unwrap();
        assert_eq!(canon.on_count(), 16, "{ext}");
        assert!(canon.is_on(3, 2));
        assert!(!canon.is_on(4, 2));
    }
}

#[test]
fn canonicalize_reports_missing_and_undecodable_files() {
    let dir = tempfile::tempdir().unwrap();

    let missing = canonicalize(&dir.path().join("nope.png"), size(4, 4)).unwrap_err();
    assert!(matches!(missing, MaskError::AssetMissing(_)), "{missing}");

    let garbage = dir.path().join("garbage.png");
    std::fs::write(&garbage, b"not an image").unwrap();
    let invalid = canonicalize(&garbage, size(4, 4)).unwrap_err();
    assert!(matches!(invalid, MaskError::AssetInvalid(_)), "{invalid}");
    assert!(invalid.to_string().contains("garbage.png"));
}

#[test]
fn narrow_tall_source_is_cropped_without_scaling_it_whole() {
    // 1x2000 scales to 3840x7_680_000 before the crop
    let solid = GrayImage::from_pixel(1, 2000, Luma([255]));
    let canon = canonicalize_image(&solid, FrameSize::CANONICAL).unwrap();
    assert_eq!(canon.size(), FrameSize::CANONICAL);
    assert_eq!(canon.on_count(), FrameSize::CANONICAL.pixel_count());

    // only the middle of the source survives: its upper half above row 640, lower half below
    let split = GrayImage::from_fn(1, 2000, |_, y| Luma([if y < 1000 { 255 } else { 0 }]));
    let canon = canonicalize_image(&split, FrameSize::CANONICAL).unwrap();
    assert!(canon.is_on(0, 639));
    assert!(canon.is_on(3839, 0));
    assert!(!canon.is_on(0, 640));
    assert_eq!(canon.on_count(), 3840 * 640);
}

#[test]
fn downscaled_rows_sample_pixel_centers() {
    // 16 columns to 8: each output column reads the right pixel of its source pair
    let source = GrayImage::from_fn(16, 8, |x, _| Luma([if x % 2 == 1 { 255 } else { 0 }]));
    let canon = canonicalize_image(&source, size(8, 4)).unwrap();
    assert_eq!(canon.on_count(), 32);
}
