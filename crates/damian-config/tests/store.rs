use std::sync::Arc;

use damian_config::{
    AudioSettings, BACKUP_KEY, CONFIG_KEY, ConfigError, ConfigEvent, ConfigStore, LoadOutcome,
    VERSION_KEY, default_document,
};
use damian_telemetry::Metrics;
use damian_test_support::{EventRecorder, ScriptedBlobStore, seeded_storage};
use serde_json::json;
use tokio_stream::StreamExt;

fn store_over(storage: &ScriptedBlobStore) -> ConfigStore {
    ConfigStore::new(Arc::new(storage.clone()))
}

async fn loaded_store() -> (ConfigStore, ScriptedBlobStore) {
    let storage = ScriptedBlobStore::new();
    let store = store_over(&storage);
    store.initialize().await;
    storage.clear_log();
    (store, storage)
}

#[tokio::test(start_paused = true)]
async fn fresh_store_serves_defaults() {
    let storage = ScriptedBlobStore::new();
    let store = store_over(&storage);
    let recorder = EventRecorder::attach(&store);

    let outcome = store.initialize().await;

    assert_eq!(outcome, LoadOutcome::Defaults);
    assert!(store.is_loaded());
    assert_eq!(store.get_or("audio.volume", 0.8), json!(0.8));
    assert_eq!(store.config(), default_document());
    assert_eq!(recorder.kinds().last(), Some(&"initialize"));
}

#[tokio::test(start_paused = true)]
async fn saved_snapshot_keeps_defaults_for_missing_keys() -> anyhow::Result<()> {
    let storage = seeded_storage(
        &json!({"audio": {"volume": 0.3}, "features": {"beta": true}}),
        Some("1.0.0"),
    )?;
    let store = store_over(&storage);

    assert_eq!(store.initialize().await, LoadOutcome::Restored);

    assert_eq!(store.get("audio.volume"), Some(json!(0.3)));
    assert_eq!(store.get("audio.enabled"), Some(json!(true)));
    assert_eq!(store.get("audio.sound_theme"), Some(json!("soft")));
    assert_eq!(store.get("ui.theme"), Some(json!("auto")));
    assert_eq!(store.get("features.beta"), Some(json!(true)));
    assert!(storage.writes_to(CONFIG_KEY).is_empty());

    let audio: AudioSettings = store.get_as("audio").expect("audio section");
    assert!((audio.volume - 0.3).abs() < f64::EPSILON);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn unusable_snapshots_fall_back_to_defaults() -> anyhow::Result<()> {
    let unparsable = ScriptedBlobStore::new();
    unparsable.seed(CONFIG_KEY, "{not json");
    unparsable.seed(VERSION_KEY, "1.0.0");

    let broken_section = seeded_storage(&json!({"audio": 5}), Some("1.0.0"))?;
    let not_object = seeded_storage(&json!([1, 2, 3]), Some("1.0.0"))?;

    let unreadable = seeded_storage(&json!({"audio": {"volume": 0.1}}), Some("1.0.0"))?;
    unreadable.fail_reads(true);

    for storage in [unparsable, broken_section, not_object, unreadable] {
        let store = store_over(&storage);
        assert_eq!(store.initialize().await, LoadOutcome::Defaults);
        assert_eq!(store.config(), default_document());
        assert!(store.is_loaded());
    }
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn read_failure_leaves_the_stored_snapshot_alone() -> anyhow::Result<()> {
    let saved = json!({"audio": {"volume": 0.1}});
    let storage = seeded_storage(&saved, Some("1.0.0"))?;
    let stored_before = storage.item(CONFIG_KEY);
    storage.fail_reads(true);
    let store = store_over(&storage);
    let recorder = EventRecorder::attach(&store);

    assert_eq!(store.initialize().await, LoadOutcome::Defaults);
    assert_eq!(store.config(), default_document());
    assert_eq!(recorder.kinds(), vec!["error", "initialize"]);

    storage.fail_reads(false);
    assert_eq!(storage.item(CONFIG_KEY), stored_before);
    assert_eq!(storage.item(VERSION_KEY).as_deref(), Some("1.0.0"));
    assert!(storage.item(BACKUP_KEY).is_none());
    assert!(storage.writes_to(CONFIG_KEY).is_empty());

    let reopened = store_over(&storage);
    assert_eq!(reopened.initialize().await, LoadOutcome::Restored);
    assert_eq!(reopened.get("audio.volume"), Some(json!(0.1)));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn set_emits_change_and_validators_gate_writes() -> anyhow::Result<()> {
    let (store, _storage) = loaded_store().await;
    let recorder = EventRecorder::attach(&store);

    store.set("audio.enabled", false)?;
    assert_eq!(store.get("audio.enabled"), Some(json!(false)));
    assert_eq!(
        recorder.events(),
        vec![ConfigEvent::Change {
            path: "audio.enabled".into(),
            value: json!(false),
            old_value: Some(json!(true)),
        }]
    );

    recorder.clear();
    let err = store.set("audio.enabled", "not-a-boolean").unwrap_err();
    assert!(matches!(err, ConfigError::ValidationFailed { ref path, .. } if path == "audio.enabled"));
    assert_eq!(store.get("audio.enabled"), Some(json!(false)));
    assert!(recorder.events().is_empty());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn object_values_cannot_bypass_leaf_validators() -> anyhow::Result<()> {
    let (store, _storage) = loaded_store().await;
    let recorder = EventRecorder::attach(&store);
    let before = store.config();

    assert!(store.update(&json!({"audio": {"volume": 5.0}})).is_err());
    let err = store.set("audio", json!({"volume": 5.0})).unwrap_err();
    assert!(matches!(err, ConfigError::ValidationFailed { ref path, .. } if path == "audio.volume"));

    assert_eq!(store.config(), before);
    assert_eq!(store.get("audio.enabled"), Some(json!(true)));
    assert!(recorder.events().is_empty());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn validators_accept_exactly_what_they_allow() -> anyhow::Result<()> {
    let (store, _storage) = loaded_store().await;
    let cases = [
        ("audio.volume", json!(0.0), true),
        ("audio.volume", json!(1.5), false),
        ("ui.theme", json!("dark"), true),
        ("ui.theme", json!("neon"), false),
        ("ui.colors.primary", json!("#112233"), true),
        ("ui.colors.accent", json!("orange"), false),
        ("haptics.enabled", json!(false), true),
        ("haptics.enabled", json!(0), false),
        ("switches.columns", json!(6), true),
        ("switches.columns", json!(7), false),
        ("performance.target_fps", json!(120), true),
        ("performance.target_fps", json!(90), false),
        ("timer.quick_presets_secs", json!([30, 90]), true),
        ("timer.quick_presets_secs", json!([0]), false),
        ("features.anything", json!({"free": "form"}), true),
    ];

    for (path, value, accepted) in cases {
        let before = store.get(path);
        let result = store.set(path, value.clone());
        assert_eq!(result.is_ok(), accepted, "{path} <- {value}");
        if accepted {
            assert_eq!(store.get(path), Some(value));
        } else {
            assert_eq!(store.get(path), before);
        }
    }
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn update_merges_partial_documents() -> anyhow::Result<()> {
    let (store, _storage) = loaded_store().await;
    let recorder = EventRecorder::attach(&store);
    let before = store.config();

    store.update(&json!({"audio": {"volume": 0.3}, "ui": {"theme": "light"}}))?;

    assert_eq!(store.get("audio.volume"), Some(json!(0.3)));
    assert_eq!(store.get("ui.theme"), Some(json!("light")));
    assert_eq!(store.get("app.version"), Some(json!("1.0.0")));
    assert_eq!(store.get("audio.enabled"), Some(json!(true)));

    let events = recorder.events();
    let [ConfigEvent::Update { config, old_config }] = events.as_slice() else {
        panic!("expected a single update event, got {events:?}");
    };
    assert_eq!(old_config, &before);
    assert_eq!(config, &store.config());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn update_never_breaks_required_sections() -> anyhow::Result<()> {
    let (store, _storage) = loaded_store().await;
    let recorder = EventRecorder::attach(&store);
    let before = store.config();

    for patch in [
        json!({"audio": null}),
        json!({"ui": 5}),
        json!({"timer": [1, 2]}),
        json!({"debug": "verbose", "audio": {"volume": 0.5}}),
    ] {
        let err = store.update(&patch).unwrap_err();
        assert!(
            matches!(err, ConfigError::SectionNotObject { .. }),
            "{patch} should be rejected, got {err:?}"
        );
    }

    assert_eq!(store.config(), before);
    assert!(recorder.events().is_empty());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn presets_merge_through_update() -> anyhow::Result<()> {
    let (store, _storage) = loaded_store().await;
    let recorder = EventRecorder::attach(&store);

    store.apply_preset("silent")?;
    assert_eq!(store.get("audio.enabled"), Some(json!(false)));
    assert_eq!(store.get("haptics.enabled"), Some(json!(false)));
    assert_eq!(recorder.kinds(), vec!["update"]);

    store.apply_preset("low-power")?;
    assert_eq!(store.get("performance.target_fps"), Some(json!(30)));
    assert_eq!(store.get("audio.enabled"), Some(json!(false)));

    assert!(matches!(
        store.apply_preset("disco"),
        Err(ConfigError::UnknownPreset { .. })
    ));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn panicking_subscriber_does_not_starve_later_ones() -> anyhow::Result<()> {
    let storage = ScriptedBlobStore::new();
    let metrics = Metrics::new()?;
    let store = ConfigStore::builder(Arc::new(storage.clone()))
        .metrics(metrics.clone())
        .build();
    store.initialize().await;

    let _faulty = store.subscribe(|_| panic!("subscriber exploded"));
    let recorder = EventRecorder::attach(&store);

    store.set("ui.theme", "dark")?;

    assert_eq!(recorder.kinds(), vec!["change"]);
    assert_eq!(store.subscriber_count(), 2);
    assert_eq!(metrics.snapshot().subscriber_panics, 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn export_then_import_reproduces_the_document() -> anyhow::Result<()> {
    let (source, _source_storage) = loaded_store().await;
    source.set("audio.volume", 0.25)?;
    source.set("features.beta.enabled", true)?;
    source.update(&json!({"ui": {"theme": "dark", "colors": {"primary": "#000000"}}}))?;
    source.apply_preset("autism-friendly")?;
    let exported = source.export_json()?;

    let (target, _target_storage) = loaded_store().await;
    let recorder = EventRecorder::attach(&target);
    target.import_json(&exported)?;

    assert_eq!(target.config(), source.config());
    assert_eq!(recorder.kinds(), vec!["update"]);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn rejected_import_changes_nothing() -> anyhow::Result<()> {
    let (store, _storage) = loaded_store().await;
    let before = store.config();

    let bad = json!({
        "version": "1.0.0",
        "timestamp": "2026-01-01T00:00:00Z",
        "config": {"audio": {"volume": 0.2, "sound_theme": "dubstep"}}
    });
    assert!(store.import_config(&bad).is_err());
    assert_eq!(store.config(), before);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn watchers_receive_enveloped_events() -> anyhow::Result<()> {
    let (store, _storage) = loaded_store().await;
    let mut stream = store.watch();

    store.set("ui.theme", "light")?;
    store.apply_preset("silent")?;

    let first = stream.next().await.expect("first event")?;
    let second = stream.next().await.expect("second event")?;
    assert_eq!(first.event.kind(), "change");
    assert_eq!(second.event.kind(), "update");
    assert!(second.id > first.id);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn metrics_track_rejections_and_saves() -> anyhow::Result<()> {
    let storage = ScriptedBlobStore::new();
    let metrics = Metrics::new()?;
    let store = ConfigStore::builder(Arc::new(storage))
        .metrics(metrics.clone())
        .build();
    store.initialize().await;

    assert!(store.set("audio.volume", 3).is_err());
    assert!(store.update(&json!({"audio": null})).is_err());
    store.flush().await;

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.validation_rejections, 2);
    assert_eq!(snapshot.saves_succeeded, 2);
    assert_eq!(snapshot.saves_failed, 0);
    assert!(metrics.render()?.contains("config_events_total"));

    let diagnostics = store.metrics();
    assert!(diagnostics.loaded);
    assert!(diagnostics.last_saved_at.is_some());
    assert_eq!(
        diagnostics.serialized_bytes,
        serde_json::to_vec(&store.config())?.len()
    );
    Ok(())
}
