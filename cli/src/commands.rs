use std::path::Path;
use std::sync::Arc;

use glimmer_core::{AnimationEvent, AnimationEventKind, SceneError, scene};
use tokio::sync::RwLock;

use crate::app_state::AppState;

type State = Arc<RwLock<AppState>>;

pub async fn start_scene(name: &str, state: State) {
    let (config, registry) = {
        let s = state.read().await;
        (s.library.get(name).cloned(), Arc::clone(&s.registry))
    };
    let Some(config) = config else {
        println!("No scene named '{name}'. Try `scenes`.");
        return;
    };

    match registry.start_config(&config).await {
        Ok(handle) => println!(
            "Started '{}' on {} light(s): {}",
            handle.name(),
            handle.lights().len(),
            handle.lights().join(", ")
        ),
        Err(e) => println!("Failed to start '{name}': {e}"),
    }
}

pub async fn stop_scene(name: &str, state: State) {
    let registry = Arc::clone(&state.read().await.registry);
    if registry.stop(name).await {
        println!("Stopped '{name}'");
    } else {
        println!("'{name}' is not running");
    }
}

pub async fn stop_all(state: State) {
    let registry = Arc::clone(&state.read().await.registry);
    let stopped = registry.stop_all().await;
    println!("Stopped {stopped} animation(s)");
}

pub async fn add_lights(animation: &str, lights: &[String], state: State) {
    let registry = Arc::clone(&state.read().await.registry);
    match registry
        .add_lights_to_animation(lights, Some(animation), None)
        .await
    {
        Ok(added) if added.is_empty() => println!("No lights added to '{animation}'"),
        Ok(added) => println!("Added {} to '{animation}'", added.join(", ")),
        Err(SceneError::NotFound(_)) => println!("'{animation}' is not running"),
        Err(e) => println!("{e}"),
    }
}

pub async fn remove_lights(lights: &[String], skip_restore: bool, state: State) {
    let registry = Arc::clone(&state.read().await.registry);
    let removed = registry.remove_lights(lights, skip_restore).await;
    if removed.is_empty() {
        println!("None of those lights are animated");
    } else {
        println!("Removed {}", removed.join(", "));
    }
}

pub async fn show_status(state: State) {
    let registry = Arc::clone(&state.read().await.registry);
    let activity = registry.activity().await;
    match serde_json::to_string_pretty(&activity) {
        Ok(json) => println!("{json}"),
        Err(e) => println!("Failed to render status: {e}"),
    }
}

pub async fn list_lights(state: State) {
    let (lights, registry) = {
        let s = state.read().await;
        (Arc::clone(&s.lights), Arc::clone(&s.registry))
    };
    for id in lights.light_ids() {
        let Some(light) = lights.state(&id) else {
            continue;
        };
        let owner = registry
            .owner_of(&id)
            .await
            .map(|name| format!(" [{name}]"))
            .unwrap_or_default();
        let color = light
            .color
            .map(|c| c.to_string())
            .unwrap_or_else(|| "-".to_string());
        let brightness = light
            .brightness
            .map(|b| b.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{id:<24} {:<3} {color:<28} bri {brightness}{owner}",
            if light.on { "on" } else { "off" }
        );
    }
}

/// Flip a simulated light as a wall switch would.
pub async fn set_power(light: &str, on: bool, state: State) {
    let (lights, registry) = {
        let s = state.read().await;
        (Arc::clone(&s.lights), Arc::clone(&s.registry))
    };
    if !lights.set_power(light, on) {
        println!("Unknown light {light}");
        return;
    }
    if on && registry.light_turned_on(light).await {
        println!("{light} turned on, animation re-applied");
    } else {
        println!("{light} turned {}", if on { "on" } else { "off" });
    }
}

pub async fn list_scenes(state: State) {
    let s = state.read().await;
    if s.library.is_empty() {
        println!("No scenes in {}", s.settings.scene_directory);
        return;
    }
    for name in s.library.names() {
        println!("{name}");
    }
}

pub async fn export_scenes(path: &str, state: State) {
    let s = state.read().await;
    let file = s.library.to_file();
    match scene::save_file(Path::new(path), &file) {
        Ok(()) => println!("Wrote {} scene(s) to {path}", file.scenes.len()),
        Err(e) => println!("Failed to export scenes: {e}"),
    }
}

pub async fn reload(state: State) {
    let mut s = state.write().await;
    let count = s.reload();
    println!("Loaded {count} scene(s) from {}", s.settings.scene_directory);
}

pub async fn show_settings(state: State) {
    let s = state.read().await;
    println!("Scene directory: {}", s.settings.scene_directory);
    println!("Simulated lights: {}", s.settings.lights.join(", "));
    println!("Latency: {} ms", s.settings.latency_ms);
}

pub async fn set_directory(path: &str, state: State) {
    let mut s = state.write().await;
    s.settings.scene_directory = path.to_string();
    if let Err(e) = s.settings.save() {
        println!("Failed to save settings: {e}");
    }
    let count = s.reload();
    println!("Scene directory set to {path}, {count} scene(s) loaded");
}

pub fn describe_event(event: &AnimationEvent) -> String {
    let verb = match event.kind {
        AnimationEventKind::Started => "started",
        AnimationEventKind::Stopped => "stopped",
    };
    format!(
        "[{}] {} {verb}",
        event.timestamp.format("%H:%M:%S"),
        event.name
    )
}

pub fn exit() {
    println!("Goodbye");
}
