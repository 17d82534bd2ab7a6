use image::{GrayImage, Luma};
use twombli::app::run_single;
use twombli::density::DensityParams;
use twombli::{
    density_map_image, fuse_multiscale, fuse_multiscale_image, BinaryMask, FusionParams,
    GapSummary, GapSummaryRow, OperationError, RidgeDetector, RidgeRequest, TwombliParams,
};

/// Marks pixels at least as bright as `255 - 20 * line_width`, so wider
/// scales accept dimmer pixels.
struct WidthThreshold;

impl RidgeDetector for WidthThreshold {
    fn detect(
        &self,
        img: &[u8],
        w: usize,
        h: usize,
        request: &RidgeRequest,
    ) -> Result<BinaryMask, OperationError> {
        let cut = 255u32.saturating_sub(20 * request.scale.line_width);
        Ok(BinaryMask::from_fn(w, h, |x, y| img[y * w + x] as u32 >= cut))
    }
}

fn ramp(w: u32, h: u32) -> GrayImage {
    GrayImage::from_fn(w, h, |x, _| Luma([(x * 255 / (w - 1)) as u8]))
}

#[test]
fn image_helper_matches_core_fusion() {
    let img = ramp(40, 6);
    let params = FusionParams {
        minimum_line_width: 1,
        maximum_line_width: 4,
        ..FusionParams::default()
    };

    let helper = fuse_multiscale_image(&img, &params, &WidthThreshold).unwrap();
    let core = fuse_multiscale(img.as_raw(), 40, 6, &params, &WidthThreshold).unwrap();
    assert_eq!(helper, core);

    // the widest scale alone decides the union for this detector
    let widest = BinaryMask::from_fn(40, 6, |x, _| x * 255 / 39 >= 175);
    assert_eq!(helper, widest);
}

#[test]
fn density_helper_keeps_dimensions() {
    let img = ramp(32, 3);
    let heat = density_map_image(&img, &DensityParams::default());
    assert_eq!(heat.dimensions(), (32, 3));
    assert_eq!(
        heat.as_raw(),
        &twombli::density::density_map(img.as_raw(), &DensityParams::default())
    );
}

#[test]
fn gap_row_text_round_trips() {
    let summary = GapSummary::from_areas(&[4.0, 1.0, 9.0, 16.0]).unwrap();
    let row = GapSummaryRow::new("slide 3 region", summary);
    let text = row.to_string();
    assert!(text.starts_with("slide 3 region "));
    assert_eq!(GapSummaryRow::parse(&text).unwrap(), row);
}

#[test]
fn single_image_run_writes_artifacts() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let path = input.path().join("fibres.png");
    GrayImage::from_fn(40, 40, |x, y| {
        Luma([if (x + y) % 10 < 3 { 210 } else { 25 }])
    })
    .save(&path)
    .unwrap();

    let params = TwombliParams {
        minimum_line_width: 2,
        maximum_line_width: 3,
        ..TwombliParams::default()
    };
    let result = run_single(&path, output.path(), &params).unwrap();

    assert_eq!(result.file_prefix, "fibres");
    assert_eq!(result.dimension, 1600);
    assert!((0.0..=100.0).contains(&result.alignment));
    let hdm: f64 = result.hdm_value.parse().unwrap();
    assert!((0.0..=1.0).contains(&hdm));
    assert!(result.morphometric_row.starts_with("fibres,40,"));
    assert!(output.path().join("masks/fibres_masks.png").is_file());
    assert!(output.path().join("hdm_csvs/fibres_ResultsHDM.csv").is_file());
    assert!(!output.path().join("twombli_summary.csv").exists());
}
