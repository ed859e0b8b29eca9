//! Scoped subscriber tests for the panel feed and file output

use std::fs;

use blockcanvas_logging::{
    CanvasSubscriberBuilder, CollectionContextGuard, FileConfig, LogConfig, PanelLevel,
    RotationStrategy,
};
use tracing::{error, info, warn};
use tracing_subscriber::Registry;
use tracing_subscriber::layer::SubscriberExt;

fn quiet_builder() -> CanvasSubscriberBuilder {
    CanvasSubscriberBuilder::new()
        .with_config(LogConfig::default())
        .with_console(false)
}

#[test]
fn test_panel_receives_only_panel_target() {
    let (layers, handle) = quiet_builder().build().unwrap();
    let subscriber = Registry::default().with(layers);

    tracing::subscriber::with_default(subscriber, || {
        info!(target: "panel", count = 3, "Restored {} items from cache", 3);
        info!("Internal detail");
        error!(target: "panel", "No collection found for \"{}\"", "nowhere");
    });

    let panel = handle.panel().unwrap();
    let entries = panel.entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].message, "Restored 3 items from cache");
    assert_eq!(entries[0].level, PanelLevel::Info);
    assert_eq!(entries[1].message, "No collection found for \"nowhere\"");
    assert_eq!(entries[1].level, PanelLevel::Error);

    panel.clear();
    assert!(panel.is_empty());
}

#[test]
fn test_panel_entries_carry_collection() {
    let (layers, handle) = quiet_builder().build().unwrap();
    let subscriber = Registry::default().with(layers);

    tracing::subscriber::with_default(subscriber, || {
        warn!(target: "panel", "Before any collection");
        let _guard = CollectionContextGuard::new("arena");
        let span = tracing::info_span!("navigate");
        drop(_guard);
        span.in_scope(|| info!(target: "panel", "Inside the span"));
    });

    let entries = handle.panel().unwrap().entries();
    assert_eq!(entries[0].collection, None);
    assert_eq!(entries[0].level, PanelLevel::Warn);
    // The span kept the collection it was opened under
    assert_eq!(entries[1].collection.as_deref(), Some("arena"));
}

#[test]
fn test_panel_capacity_from_config() {
    let mut config = LogConfig::default();
    config.console.enabled = false;
    config.panel.capacity = 2;
    let (layers, handle) = CanvasSubscriberBuilder::new()
        .with_config(config)
        .build()
        .unwrap();

    tracing::subscriber::with_default(Registry::default().with(layers), || {
        for n in 0..5 {
            info!(target: "panel", "Batch {}", n);
        }
    });

    let messages: Vec<String> = handle
        .panel()
        .unwrap()
        .entries()
        .into_iter()
        .map(|entry| entry.message)
        .collect();
    assert_eq!(messages, vec!["Batch 3", "Batch 4"]);
}

#[test]
fn test_file_output_writes_json_lines() {
    let dir = tempfile::tempdir().unwrap();
    let file = FileConfig {
        directory: dir.path().to_path_buf(),
        prefix: "canvas".to_string(),
        rotation: RotationStrategy::Never,
        max_files: None,
    };
    let (layers, handle) = quiet_builder()
        .with_level("info")
        .with_file_output(file)
        .build()
        .unwrap();

    tracing::subscriber::with_default(Registry::default().with(layers), || {
        warn!(collection = "arena", "Cache read failed");
    });
    // Flushes the non-blocking writer
    drop(handle);

    let contents = fs::read_to_string(dir.path().join("canvas.log")).unwrap();
    let line = contents.lines().find(|line| line.contains("Cache read failed"));
    let line = line.expect("event written to file");
    assert!(line.starts_with('{'));
    assert!(line.contains("\"collection\":\"arena\""));
}
