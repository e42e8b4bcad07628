//! Model store sharing and load-failure policies under concurrency

mod common;

use common::{memory_config, solid_rgb, CountingFactory, TWO_CLASS_LABELS};
use image::ImageFormat;
use mri_classify::{
    ArtifactSource, ClassifierConfig, ClassifierError, ImageClassifier, LoadFailurePolicy,
    ModelSpec, ModelStore,
};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn store(factory: &CountingFactory, policy: LoadFailurePolicy) -> Arc<ModelStore> {
    Arc::new(
        ModelStore::new(memory_config(TWO_CLASS_LABELS, policy), Arc::new(factory.clone()))
            .unwrap(),
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_first_calls_share_one_load() {
    let factory = CountingFactory::new(2).with_delay(Duration::from_millis(150));
    let store = store(&factory, LoadFailurePolicy::Retry);

    let (a, b) = tokio::join!(store.get_session(), store.get_session());
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(factory.creations(), 1);
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(store.stats().model_load_attempts, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_spawned_analyses_share_one_load() {
    let factory = CountingFactory::new(2).with_delay(Duration::from_millis(100));
    let classifier = ImageClassifier::with_factory(
        memory_config(TWO_CLASS_LABELS, LoadFailurePolicy::Retry),
        Arc::new(factory.clone()),
    )
    .unwrap();
    let bytes = Arc::new(solid_rgb(128, 128, [60, 60, 60], ImageFormat::Png));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let classifier = classifier.clone();
            let bytes = Arc::clone(&bytes);
            tokio::spawn(async move { classifier.analyze(&bytes).await })
        })
        .collect();

    let mut labels = Vec::new();
    for handle in handles {
        labels.push(handle.await.unwrap().unwrap().label().to_string());
    }

    assert_eq!(factory.creations(), 1);
    assert_eq!(factory.runs(), 8);
    assert!(labels.windows(2).all(|pair| pair[0] == pair[1]));
    assert_eq!(classifier.store().stats().label_load_attempts, 1);
}

#[tokio::test]
async fn test_sequential_calls_reuse_cached_labels() {
    let factory = CountingFactory::new(2);
    let store = store(&factory, LoadFailurePolicy::Retry);

    let first = store.get_class_names().await.unwrap();
    let second = store.get_class_names().await.unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(store.stats().label_load_attempts, 1);
    assert_eq!(factory.creations(), 0);
}

#[tokio::test]
async fn test_retry_policy_recovers_after_failure() {
    let factory = CountingFactory::new(2).failing_first(1);
    let store = store(&factory, LoadFailurePolicy::Retry);

    let err = store.get_session().await.unwrap_err();
    assert!(matches!(err, ClassifierError::Load(_)));

    assert!(store.get_session().await.is_ok());
    assert_eq!(factory.creations(), 2);
}

#[tokio::test]
async fn test_sticky_policy_repeats_first_failure() {
    let factory = CountingFactory::new(2).failing_first(1);
    let store = store(&factory, LoadFailurePolicy::Sticky);

    let first = store.get_session().await.unwrap_err();
    let second = store.get_session().await.unwrap_err();

    assert!(matches!(second, ClassifierError::Load(_)));
    assert_eq!(first.to_string(), second.to_string());
    assert_eq!(factory.creations(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_sticky_failure_shared_by_concurrent_waiters() {
    let factory = CountingFactory::new(2)
        .failing_first(usize::MAX)
        .with_delay(Duration::from_millis(100));
    let store = store(&factory, LoadFailurePolicy::Sticky);

    let (a, b, c) = tokio::join!(store.get_session(), store.get_session(), store.get_session());
    for result in [a, b, c] {
        assert!(matches!(result, Err(ClassifierError::Load(_))));
    }
    assert_eq!(factory.creations(), 1);
}

#[tokio::test]
async fn test_missing_file_is_load_error_and_retried_after_fix() {
    let dir = TempDir::new().unwrap();
    let model_path = dir.path().join("brain_tumor.onnx");
    let labels_path = dir.path().join("class_map.json");
    std::fs::write(&labels_path, TWO_CLASS_LABELS).unwrap();

    let config = ClassifierConfig::builder()
        .model_dir(ArtifactSource::Path(dir.path().to_path_buf()))
        .build()
        .unwrap();
    assert_eq!(
        config.model_spec,
        ModelSpec::from_paths(&model_path, &labels_path)
    );

    let factory = CountingFactory::new(2);
    let store = ModelStore::new(config, Arc::new(factory.clone())).unwrap();

    let err = store.get_session().await.unwrap_err();
    assert!(matches!(err, ClassifierError::Load(_)));
    assert!(err.to_string().contains("brain_tumor.onnx"));
    assert_eq!(factory.creations(), 0);

    std::fs::write(&model_path, b"graph").unwrap();
    let session = store.get_session().await.unwrap();
    assert_eq!(session.name(), "channel-mean");

    let info = store.model_info().unwrap();
    assert_eq!(info.name, "brain_tumor.onnx");
    assert_eq!(info.size_bytes, 5);
    assert_eq!(info.sha256.len(), 64);
}
