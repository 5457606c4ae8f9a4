//! Tests for the animation registry
//!
//! Covers ownership arbitration, restore semantics, dynamic membership and
//! the tick loop, all against in-memory lights on a paused clock.

use std::sync::Arc;
use std::time::Duration;

use super::*;
use crate::color::ColorValue;
use crate::controller::ControllerState;
use crate::light::{LightCall, MemoryLights};
use crate::scene::{ChangeAmount, ColorGroup, Span};
use crate::store::RESTORE_TRANSITION_SECS;

const TICK_TRANSITION: f64 = 0.2;

fn warm() -> LightSnapshot {
    LightSnapshot::on_with(ColorValue::ColorTemp(2700), 120)
}

fn ids(lights: &[&str]) -> Vec<String> {
    lights.iter().map(|s| s.to_string()).collect()
}

/// Lights in `on` start warm white, lights in `off` start off
fn house(on: &[&str], off: &[&str]) -> Arc<MemoryLights> {
    let lights = MemoryLights::new().with_log();
    for light in on {
        lights.insert(*light, warm());
    }
    for light in off {
        lights.insert(*light, LightSnapshot::off());
    }
    Arc::new(lights)
}

fn spec(name: &str, lights: &[&str], priority: i32) -> AnimationSpec {
    AnimationSpec {
        name: name.to_string(),
        priority,
        lights: ids(lights),
        colors: vec![ColorGroup {
            value: ColorValue::Rgb([255, 0, 0]),
            brightness: None,
            weight: 10,
            nearby: 0,
            one_change_per_tick: false,
        }],
        brightness: None,
        transition: Span::Fixed(TICK_TRANSITION),
        change_frequency: Some(Span::Fixed(1.0)),
        change_amount: ChangeAmount::All,
        change_sequence: false,
        animate_brightness: true,
        animate_color: true,
        ignore_off: true,
        restore: true,
        restore_power: false,
    }
}

/// Transition of every `Set` call, in order
fn transitions(calls: &[LightCall]) -> Vec<f64> {
    calls
        .iter()
        .filter_map(|call| match call {
            LightCall::Set { command, .. } => Some(command.transition),
            _ => None,
        })
        .collect()
}

fn drain_events(rx: &mut broadcast::Receiver<AnimationEvent>) -> Vec<(String, AnimationEventKind)> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push((event.name, event.kind));
    }
    events
}

// ─────────────────────────────────────────────────────────────────────────────
// Ownership
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn higher_priority_takes_overlapping_light() {
    let lights = house(&["light.a", "light.b"], &[]);
    let registry = AnimationRegistry::new(Arc::clone(&lights));
    let mut events = registry.subscribe();

    registry.start(spec("Low", &["light.a", "light.b"], 5)).await.unwrap();
    registry.start(spec("High", &["light.b"], 10)).await.unwrap();

    assert_eq!(registry.owner_of("light.b").await.as_deref(), Some("High"));
    let low = registry.get("Low").await.unwrap();
    assert_eq!(low.lights(), ids(&["light.a"]));

    // Losing the last light stops the loser
    registry.start(spec("Higher", &["light.a"], 10)).await.unwrap();
    assert_eq!(registry.list_active().await, ids(&["High", "Higher"]));
    assert_eq!(low.state(), ControllerState::Stopped);

    let stopped: Vec<_> = drain_events(&mut events)
        .into_iter()
        .filter(|(_, kind)| *kind == AnimationEventKind::Stopped)
        .collect();
    assert_eq!(stopped, vec![("Low".to_string(), AnimationEventKind::Stopped)]);
}

#[tokio::test(start_paused = true)]
async fn lower_priority_cannot_take_owned_light() {
    let lights = house(&["light.a"], &[]);
    let registry = AnimationRegistry::new(Arc::clone(&lights));

    registry.start(spec("High", &["light.a"], 10)).await.unwrap();
    let err = registry.start(spec("Low", &["light.a"], 5)).await.unwrap_err();

    assert!(matches!(err, SceneError::NoLights(ref name) if name == "Low"));
    assert_eq!(registry.list_active().await, ids(&["High"]));
    assert_eq!(registry.owner_of("light.a").await.as_deref(), Some("High"));
}

#[tokio::test(start_paused = true)]
async fn equal_priority_goes_to_newest_claim() {
    let lights = house(&["light.a", "light.b"], &[]);
    let registry = AnimationRegistry::new(Arc::clone(&lights));

    registry.start(spec("First", &["light.a", "light.b"], 0)).await.unwrap();
    registry.start(spec("Second", &["light.b"], 0)).await.unwrap();

    assert_eq!(registry.owner_of("light.b").await.as_deref(), Some("Second"));
    assert_eq!(registry.owner_of("light.a").await.as_deref(), Some("First"));
}

#[tokio::test(start_paused = true)]
async fn transfer_keeps_original_snapshot() {
    let lights = house(&["light.a"], &[]);
    let registry = AnimationRegistry::new(Arc::clone(&lights));

    registry.start(spec("Red", &["light.a"], 0)).await.unwrap();
    let mut green = spec("Green", &["light.a"], 10);
    green.colors[0].value = ColorValue::Rgb([0, 255, 0]);
    registry.start(green).await.unwrap();

    // Red lost its only light without restoring it
    assert_eq!(registry.list_active().await, ids(&["Green"]));
    assert_eq!(
        transitions(&lights.calls_for("light.a")),
        vec![TICK_TRANSITION, TICK_TRANSITION]
    );

    assert!(registry.stop("Green").await);
    assert_eq!(lights.state("light.a"), Some(warm()));
    assert!(registry.captured().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn duplicate_name_stops_old_session_first() {
    let lights = house(&["light.a", "light.b"], &[]);
    let registry = AnimationRegistry::new(Arc::clone(&lights));
    let mut events = registry.subscribe();

    let old = registry.start(spec("Fire", &["light.a"], 0)).await.unwrap();
    registry
        .start(spec("Fire", &["light.a", "light.b"], 0))
        .await
        .unwrap();

    assert_eq!(old.state(), ControllerState::Stopped);
    assert_eq!(registry.list_active().await, ids(&["Fire"]));
    assert_eq!(
        registry.get("Fire").await.unwrap().lights(),
        ids(&["light.a", "light.b"])
    );
    // Initial, restore by the old session, initial by the new one
    assert_eq!(
        transitions(&lights.calls_for("light.a")),
        vec![TICK_TRANSITION, RESTORE_TRANSITION_SECS, TICK_TRANSITION]
    );
    assert_eq!(
        drain_events(&mut events),
        vec![
            ("Fire".to_string(), AnimationEventKind::Started),
            ("Fire".to_string(), AnimationEventKind::Stopped),
            ("Fire".to_string(), AnimationEventKind::Started),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn concurrent_starts_never_double_own() {
    let lights = house(&["light.a", "light.b", "light.c", "light.d"], &[]);
    let registry = Arc::new(AnimationRegistry::new(Arc::clone(&lights)));

    let scenes = [
        spec("One", &["light.a", "light.b"], 1),
        spec("Two", &["light.b", "light.c"], 2),
        spec("Three", &["light.c", "light.d"], 1),
        spec("Four", &["light.d", "light.a"], 2),
    ];
    let mut tasks = Vec::new();
    for scene in scenes {
        let registry = Arc::clone(&registry);
        tasks.push(tokio::spawn(async move { registry.start(scene).await }));
    }
    for task in tasks {
        let _ = task.await.unwrap();
    }

    let activity = registry.activity().await;
    let mut owned: Vec<String> = activity
        .animations
        .iter()
        .flat_map(|a| a.lights.clone())
        .collect();
    let total = owned.len();
    owned.sort();
    owned.dedup();
    assert_eq!(owned.len(), total, "a light is owned twice");
    assert_eq!(owned, registry.active_lights().await);
    assert_eq!(registry.captured().await, registry.active_lights().await);
}

// ─────────────────────────────────────────────────────────────────────────────
// Stop and restore
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn stop_restores_captured_state() {
    let lights = house(&["light.a", "light.b"], &[]);
    let registry = AnimationRegistry::new(Arc::clone(&lights));

    registry.start(spec("Fire", &["light.a", "light.b"], 0)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(3500)).await;
    assert_ne!(lights.state("light.a"), Some(warm()));

    assert!(registry.stop("Fire").await);
    assert!(!registry.stop("Fire").await);

    assert_eq!(lights.state("light.a"), Some(warm()));
    assert_eq!(lights.state("light.b"), Some(warm()));
    assert!(registry.active_lights().await.is_empty());
    assert!(registry.captured().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn restore_disabled_releases_only() {
    let lights = house(&["light.a"], &[]);
    let registry = AnimationRegistry::new(Arc::clone(&lights));

    let mut scene = spec("Fire", &["light.a"], 0);
    scene.restore = false;
    registry.start(scene).await.unwrap();
    registry.stop("Fire").await;

    assert_eq!(transitions(&lights.calls()), vec![TICK_TRANSITION]);
    assert!(registry.captured().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn stop_waits_for_in_flight_tick() {
    let lights = MemoryLights::new()
        .with_log()
        .with_latency(Duration::from_millis(500))
        .with_light("light.a", warm());
    let lights = Arc::new(lights);
    let registry = AnimationRegistry::new(Arc::clone(&lights));

    // Initial assignment settles at 0.5s, the first tick is in flight 1.5s..2.0s
    registry.start(spec("Fire", &["light.a"], 0)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(1200)).await;
    registry.stop("Fire").await;

    assert_eq!(
        transitions(&lights.calls_for("light.a")),
        vec![TICK_TRANSITION, TICK_TRANSITION, RESTORE_TRANSITION_SECS]
    );
    assert_eq!(lights.state("light.a"), Some(warm()));
}

#[tokio::test(start_paused = true)]
async fn tick_updates_lights_concurrently() {
    let lights = MemoryLights::new()
        .with_log()
        .with_latency(Duration::from_millis(500))
        .with_light("light.a", warm())
        .with_light("light.b", warm())
        .with_light("light.c", warm());
    let lights = Arc::new(lights);
    let registry = AnimationRegistry::new(Arc::clone(&lights));
    let began = tokio::time::Instant::now();

    // Initial assignment settles at 0.5s, the first tick lands at 2.0s.
    // One light at a time would only finish at 3.0s.
    registry
        .start(spec("Fire", &["light.a", "light.b", "light.c"], 0))
        .await
        .unwrap();
    assert!(began.elapsed() < Duration::from_millis(600));

    tokio::time::sleep_until(began + Duration::from_millis(2100)).await;
    for light in ["light.a", "light.b", "light.c"] {
        assert_eq!(
            transitions(&lights.calls_for(light)),
            vec![TICK_TRANSITION, TICK_TRANSITION],
            "{light}"
        );
    }
}

#[tokio::test(start_paused = true)]
async fn stuck_tick_is_aborted_after_timeout() {
    let lights = MemoryLights::new()
        .with_log()
        .with_latency(Duration::from_secs(10))
        .with_light("light.a", warm());
    let lights = Arc::new(lights);
    let registry =
        AnimationRegistry::new(Arc::clone(&lights)).with_stop_timeout(Duration::from_millis(100));

    registry.start(spec("Fire", &["light.a"], 0)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(1500)).await;
    registry.stop("Fire").await;

    // The aborted tick never lands; the restore does
    assert_eq!(
        transitions(&lights.calls_for("light.a")),
        vec![TICK_TRANSITION, RESTORE_TRANSITION_SECS]
    );
    assert_eq!(lights.state("light.a"), Some(warm()));
}

#[tokio::test(start_paused = true)]
async fn stop_all_stops_everything() {
    let lights = house(&["light.a", "light.b", "light.c"], &[]);
    let registry = AnimationRegistry::new(Arc::clone(&lights));

    registry.start(spec("A", &["light.a", "light.b"], 0)).await.unwrap();
    registry.start(spec("B", &["light.b", "light.c"], 5)).await.unwrap();

    let activity = registry.activity().await;
    assert_eq!(activity.count, 2);
    assert_eq!(activity.animations[0].name, "A");
    assert_eq!(activity.animations[0].lights, ids(&["light.a"]));
    assert_eq!(activity.animations[1].lights, ids(&["light.b", "light.c"]));
    assert_eq!(registry.captured().await, registry.active_lights().await);

    assert_eq!(registry.stop_all().await, 2);
    assert_eq!(registry.activity().await, ActivitySnapshot::default());
    for light in ["light.a", "light.b", "light.c"] {
        assert_eq!(lights.state(light), Some(warm()));
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Membership
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn remove_with_skip_restore_sends_nothing() {
    let lights = house(&["light.a", "light.b"], &[]);
    let registry = AnimationRegistry::new(Arc::clone(&lights));
    let mut events = registry.subscribe();

    registry.start(spec("Fire", &["light.a", "light.b"], 0)).await.unwrap();
    lights.clear_calls();

    let removed = registry.remove_lights(&ids(&["light.a"]), true).await;
    assert_eq!(removed, ids(&["light.a"]));
    assert!(lights.calls_for("light.a").is_empty());
    assert_eq!(registry.owner_of("light.a").await, None);
    assert_eq!(registry.captured().await, ids(&["light.b"]));

    // Removing the last light restores it and stops the animation
    registry.remove_lights(&ids(&["light.b", "light.zzz"]), false).await;
    assert_eq!(
        transitions(&lights.calls_for("light.b")),
        vec![RESTORE_TRANSITION_SECS]
    );
    assert!(registry.list_active().await.is_empty());
    assert_eq!(
        drain_events(&mut events).last(),
        Some(&("Fire".to_string(), AnimationEventKind::Stopped))
    );
}

#[tokio::test(start_paused = true)]
async fn add_to_unknown_animation_changes_nothing() {
    let lights = house(&["light.a", "light.b"], &[]);
    let registry = AnimationRegistry::new(Arc::clone(&lights));
    let handle = registry.start(spec("Fire", &["light.a"], 0)).await.unwrap();
    lights.clear_calls();

    let err = registry
        .add_lights_to_animation(&ids(&["light.b"]), Some("Nope"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, SceneError::NotFound(ref name) if name == "Nope"));

    let err = registry
        .add_lights_to_animation(&ids(&["light.b"]), None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, SceneError::InvalidTarget));

    let err = registry
        .add_lights_to_animation(&ids(&["light.b"]), Some("Fire"), Some(&handle))
        .await
        .unwrap_err();
    assert!(matches!(err, SceneError::InvalidTarget));

    assert_eq!(registry.active_lights().await, ids(&["light.a"]));
    assert!(lights.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn add_lights_by_name_and_handle() {
    let lights = house(&["light.a", "light.b", "light.c"], &[]);
    let registry = AnimationRegistry::new(Arc::clone(&lights));
    let handle = registry.start(spec("Fire", &["light.a"], 0)).await.unwrap();

    let added = registry
        .add_lights_to_animation(&ids(&["light.b", "light.a"]), Some("Fire"), None)
        .await
        .unwrap();
    assert_eq!(added, ids(&["light.b"]));
    assert_eq!(transitions(&lights.calls_for("light.b")), vec![TICK_TRANSITION]);

    let added = registry
        .add_lights_to_animation(&ids(&["light.c"]), None, Some(&handle))
        .await
        .unwrap();
    assert_eq!(added, ids(&["light.c"]));
    assert_eq!(handle.lights(), ids(&["light.a", "light.b", "light.c"]));
    assert_eq!(registry.captured().await, registry.active_lights().await);

    // A handle to a replaced animation no longer resolves
    registry.start(spec("Fire", &["light.a"], 0)).await.unwrap();
    let err = registry
        .add_lights_to_animation(&ids(&["light.b"]), None, Some(&handle))
        .await
        .unwrap_err();
    assert!(matches!(err, SceneError::NotFound(_)));
}

#[tokio::test(start_paused = true)]
async fn unknown_and_off_lights_are_skipped() {
    let lights = house(&["light.a"], &["light.off"]);
    let registry = AnimationRegistry::new(Arc::clone(&lights));

    let handle = registry
        .start(spec("Fire", &["light.a", "light.nope", "light.off"], 0))
        .await
        .unwrap();
    assert_eq!(handle.lights(), ids(&["light.a"]));
    assert!(lights.calls_for("light.off").is_empty());

    let err = registry
        .start(spec("Ghost", &["light.nope"], 0))
        .await
        .unwrap_err();
    assert!(matches!(err, SceneError::NoLights(_)));
    assert_eq!(registry.list_active().await, ids(&["Fire"]));
}

#[tokio::test(start_paused = true)]
async fn off_lights_turned_on_when_not_ignored() {
    let lights = house(&[], &["light.off"]);
    let registry = AnimationRegistry::new(Arc::clone(&lights));

    let mut scene = spec("Fire", &["light.off"], 0);
    scene.ignore_off = false;
    scene.restore_power = true;
    registry.start(scene).await.unwrap();

    let calls = lights.calls_for("light.off");
    assert_eq!(
        calls[0],
        LightCall::TurnOn {
            light: "light.off".to_string()
        }
    );
    assert!(lights.state("light.off").unwrap().on);

    registry.stop("Fire").await;
    assert_eq!(
        lights.calls_for("light.off").last(),
        Some(&LightCall::TurnOff {
            light: "light.off".to_string()
        })
    );
    assert!(!lights.state("light.off").unwrap().on);
}

// ─────────────────────────────────────────────────────────────────────────────
// Ticks
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn ticks_follow_change_frequency() {
    let lights = house(&["light.a", "light.b"], &[]);
    let registry = AnimationRegistry::new(Arc::clone(&lights));

    registry.start(spec("Fire", &["light.a", "light.b"], 0)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5500)).await;

    // Initial assignment plus five ticks
    assert_eq!(lights.calls_for("light.a").len(), 6);
    assert_eq!(lights.calls_for("light.b").len(), 6);
}

#[tokio::test(start_paused = true)]
async fn one_shot_applies_once_and_keeps_running() {
    let lights = house(&["light.a", "light.b"], &[]);
    let registry = AnimationRegistry::new(Arc::clone(&lights));

    let mut scene = spec("Static", &["light.a", "light.b"], 0);
    scene.change_frequency = None;
    let handle = registry.start(scene).await.unwrap();

    assert_eq!(lights.calls().len(), 2);
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(lights.calls().len(), 2);
    assert_eq!(handle.state(), ControllerState::Running);

    assert!(registry.stop("Static").await);
    assert_eq!(handle.state(), ControllerState::Stopped);
    assert_eq!(lights.state("light.a"), Some(warm()));
}

#[tokio::test(start_paused = true)]
async fn failing_light_does_not_stop_ticks() {
    let lights = house(&["light.a", "light.b"], &[]);
    let registry = AnimationRegistry::new(Arc::clone(&lights));

    registry.start(spec("Fire", &["light.a", "light.b"], 0)).await.unwrap();
    lights.fail("light.b");
    tokio::time::sleep(Duration::from_millis(3500)).await;

    assert_eq!(lights.calls_for("light.a").len(), 4);
    assert_eq!(registry.list_active().await, ids(&["Fire"]));
    assert_eq!(lights.state("light.b").unwrap().color, Some(ColorValue::Rgb([255, 0, 0])));
}

#[tokio::test(start_paused = true)]
async fn switched_off_lights_are_left_alone() {
    let lights = house(&["light.a", "light.b"], &[]);
    let registry = AnimationRegistry::new(Arc::clone(&lights));

    registry.start(spec("Fire", &["light.a", "light.b"], 0)).await.unwrap();
    lights.set_power("light.a", false);
    lights.clear_calls();

    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert!(lights.calls_for("light.a").is_empty());
    assert_eq!(lights.calls_for("light.b").len(), 2);

    lights.set_power("light.a", true);
    assert!(registry.light_turned_on("light.a").await);
    assert_eq!(lights.calls_for("light.a").len(), 1);
    assert!(!registry.light_turned_on("light.unowned").await);
}

#[tokio::test(start_paused = true)]
async fn start_config_rejects_invalid_scene() {
    let lights = house(&["light.a"], &[]);
    let registry = AnimationRegistry::new(Arc::clone(&lights));

    let file: glimmer_types::SceneFile = toml::from_str(
        r#"
[[scene]]
name = "Broken"
lights = ["light.a"]

[[scene.colors]]
color_type = "rgb"
color = [255, 0]
"#,
    )
    .unwrap();

    let err = registry.start_config(&file.scenes[0]).await.unwrap_err();
    assert!(matches!(err, SceneError::Configuration(_)));
    assert!(registry.list_active().await.is_empty());
    assert!(lights.calls().is_empty());
}
