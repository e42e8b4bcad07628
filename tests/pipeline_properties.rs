//! End-to-end properties of the classification pipeline
//!
//! Runs real decoding and normalization against an in-memory backend and
//! checks the invariants every prediction must satisfy.

mod common;

use common::{
    classifier, gradient, solid_rgb, solid_rgba, CountingFactory, FOUR_CLASS_LABELS,
    TWO_CLASS_LABELS,
};
use image::ImageFormat;
use mri_classify::{
    utils::preprocessing::{IMAGENET_MEAN, IMAGENET_STD},
    ClassLabelMap, ClassifierError, ErrorKind, ImageCrateDecoder, ImagePreprocessor, Prediction,
};

fn assert_probability_invariants(prediction: &Prediction) {
    let probabilities = prediction.probabilities();
    assert!(!probabilities.is_empty());

    let sum: f64 = probabilities.values().sum();
    assert!((sum - 1.0).abs() < 1e-4, "probabilities sum to {}", sum);
    assert!(probabilities.values().all(|p| (0.0..=1.0).contains(p)));

    assert_eq!(probabilities[prediction.label()], prediction.confidence());
    let max = probabilities.values().copied().fold(f64::NEG_INFINITY, f64::max);
    assert_eq!(prediction.confidence(), max);
}

#[tokio::test]
async fn test_determinism_for_identical_bytes() {
    let factory = CountingFactory::new(4);
    let classifier = classifier(FOUR_CLASS_LABELS, &factory);
    let bytes = gradient(640, 480);

    let first = classifier.analyze(&bytes).await.unwrap();
    let second = classifier.analyze(&bytes).await.unwrap();

    assert_eq!(first.label(), second.label());
    assert!((first.confidence() - second.confidence()).abs() < 1e-6);
    assert_eq!(first, second);
    assert_eq!(factory.runs(), 2);
}

#[tokio::test]
async fn test_probability_and_argmax_invariants() {
    let factory = CountingFactory::new(4);
    let classifier = classifier(FOUR_CLASS_LABELS, &factory);

    for bytes in [
        gradient(300, 700),
        solid_rgb(256, 256, [255, 255, 255], ImageFormat::Png),
        solid_rgb(17, 900, [0, 0, 0], ImageFormat::Bmp),
        solid_rgba(512, 128, [200, 40, 90, 10]),
    ] {
        let prediction = classifier.analyze(&bytes).await.unwrap();
        assert_probability_invariants(&prediction);
    }
}

#[tokio::test]
async fn test_solid_gray_end_to_end() {
    let factory = CountingFactory::new(4);
    let classifier = classifier(FOUR_CLASS_LABELS, &factory);
    let labels = ClassLabelMap::from_json_slice(FOUR_CLASS_LABELS.as_bytes()).unwrap();

    let prediction = classifier
        .analyze(&solid_rgb(256, 256, [128, 128, 128], ImageFormat::Png))
        .await
        .unwrap();

    assert!(labels.contains(prediction.label()));
    assert!(prediction.confidence() > 0.0);

    let keys: Vec<&str> = prediction.probabilities().keys().map(String::as_str).collect();
    let mut expected: Vec<&str> = labels.iter().collect();
    expected.sort_unstable();
    assert_eq!(keys, expected);
}

#[test]
fn test_layout_invariant_across_formats_and_sizes() {
    let decoder = ImageCrateDecoder::default();
    let inputs = [
        solid_rgb(1024, 64, [255, 0, 0], ImageFormat::Png),
        solid_rgb(31, 47, [255, 0, 0], ImageFormat::Bmp),
        solid_rgb(256, 256, [255, 0, 0], ImageFormat::Tiff),
        solid_rgba(90, 300, [255, 0, 0, 255]),
    ];

    let red_r = (1.0 - IMAGENET_MEAN[0]) / IMAGENET_STD[0];
    let red_g = (0.0 - IMAGENET_MEAN[1]) / IMAGENET_STD[1];
    let red_b = (0.0 - IMAGENET_MEAN[2]) / IMAGENET_STD[2];

    for bytes in inputs {
        let tensor = ImagePreprocessor::preprocess(&decoder, &bytes).unwrap();
        assert_eq!(tensor.len(), 196_608);
        assert_eq!(tensor.shape(), (1, 3, 256, 256));

        let flat = tensor.as_slice();
        // channel blocks in R, G, B order
        assert!((flat[0] - red_r).abs() < 1e-5);
        assert!((flat[65_536] - red_g).abs() < 1e-5);
        assert!((flat[131_072 + 255 * 256 + 255] - red_b).abs() < 1e-5);
    }
}

#[test]
fn test_jpeg_input_decodes() {
    let decoder = ImageCrateDecoder::default();
    let bytes = solid_rgb(400, 300, [90, 90, 90], ImageFormat::Jpeg);
    let tensor = ImagePreprocessor::preprocess(&decoder, &bytes).unwrap();
    assert_eq!(tensor.len(), 196_608);
}

#[tokio::test]
async fn test_empty_buffer_is_preprocessing_error() {
    let factory = CountingFactory::new(2);
    let err = classifier(TWO_CLASS_LABELS, &factory)
        .analyze(&[])
        .await
        .unwrap_err();

    assert!(matches!(err, ClassifierError::Preprocessing(_)));
    assert_eq!(err.kind(), ErrorKind::Preprocessing);
    assert!(err.is_client_error());
}

#[tokio::test]
async fn test_corrupt_bytes_are_preprocessing_error() {
    let factory = CountingFactory::new(2);
    let classifier = classifier(TWO_CLASS_LABELS, &factory);

    let random: Vec<u8> = (0..4096u32)
        .map(|i| (i.wrapping_mul(2_654_435_761) >> 13) as u8)
        .collect();
    for bytes in [random.as_slice(), b"DICM not a raster image".as_slice()] {
        let err = classifier.analyze(bytes).await.unwrap_err();
        assert!(matches!(err, ClassifierError::Preprocessing(_)), "got {:?}", err);
    }
    assert_eq!(factory.runs(), 0);
}

#[tokio::test]
async fn test_tumor_label_gets_tumor_template() {
    let factory = CountingFactory::new(2);
    let classifier = classifier(r#"{"classes": ["clear", "Brain Cancer"]}"#, &factory);

    // bright image: channel means are positive, so index 1 (mean * 2) wins
    let prediction = classifier
        .analyze(&solid_rgb(64, 64, [250, 250, 250], ImageFormat::Png))
        .await
        .unwrap();

    assert_eq!(prediction.label(), "Brain Cancer");
    assert_eq!(prediction.overlay_url(), Some("/cases/case-glioma.svg"));
    assert_eq!(prediction.recommendations().len(), 2);
}
