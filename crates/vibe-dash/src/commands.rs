//! Verb handlers. Each maps 1:1 onto a [`StateEngine`] operation.

use anyhow::Context;
use chrono::Utc;
use vibe_core::{ProjectState, VibeError};
use vibe_engine::{FavoriteAction, StateEngine};

use crate::cli::{
    AddOpts, ConfigCommand, FavoriteOpts, ListOpts, NoteOpts, RenameOpts, ResetOpts, StatusOpts,
    Target,
};
use crate::exit::{PROJECT_NOT_FOUND, SilentExit};
use crate::output;

pub async fn add(engine: &StateEngine, opts: AddOpts) -> anyhow::Result<()> {
    let snap = engine.track(&opts.path, opts.name).await?;
    println!(
        "Tracking {} ({}): {} / {}",
        snap.label(),
        snap.project.canonical_path.display(),
        snap.project.detected_method,
        snap.project.current_stage
    );
    Ok(())
}

pub async fn remove(engine: &StateEngine, target: Target) -> anyhow::Result<()> {
    let snap = engine.untrack(&target.project).await?;
    println!("Removed {}", snap.label());
    Ok(())
}

pub fn list(engine: &StateEngine, opts: ListOpts) -> anyhow::Result<()> {
    let now = Utc::now();
    let projects = engine.list_at(now);
    if opts.json {
        println!("{}", output::list_json(&projects)?);
    } else {
        println!("{}", output::list_table(&projects, now));
    }
    Ok(())
}

pub async fn status(engine: &StateEngine, opts: StatusOpts) -> anyhow::Result<()> {
    let snap = engine.get(&opts.project).await?;
    if opts.json {
        println!("{}", output::status_json(&snap)?);
    } else {
        println!("{}", output::status_text(&snap, Utc::now()));
    }
    Ok(())
}

pub async fn rename(engine: &StateEngine, opts: RenameOpts) -> anyhow::Result<()> {
    let name = if opts.clear { None } else { opts.name };
    let snap = engine.rename(&opts.project, name).await?;
    match snap.project.display_name.as_deref() {
        Some(name) => println!("Renamed {} to {name}", snap.project.name),
        None => println!("Cleared display name of {}", snap.project.name),
    }
    Ok(())
}

pub async fn favorite(engine: &StateEngine, opts: FavoriteOpts) -> anyhow::Result<()> {
    let action = if opts.toggle {
        FavoriteAction::Toggle
    } else if opts.off {
        FavoriteAction::Off
    } else {
        FavoriteAction::On
    };
    let snap = engine.favorite(&opts.project, action).await?;
    if snap.project.is_favorite {
        println!("{} is a favorite", snap.label());
    } else {
        println!("{} is no longer a favorite", snap.label());
    }
    Ok(())
}

pub async fn note(engine: &StateEngine, opts: NoteOpts) -> anyhow::Result<()> {
    let text = opts.text.join(" ");
    let snap = engine.set_notes(&opts.project, text.trim()).await?;
    if snap.project.notes.is_empty() {
        println!("Cleared notes for {}", snap.label());
    } else {
        println!("Saved notes for {}", snap.label());
    }
    Ok(())
}

pub async fn hibernate(engine: &StateEngine, target: Target) -> anyhow::Result<()> {
    let before = engine.get(&target.project).await?;
    let snap = engine.hibernate(before.id()).await?;
    if before.project.state == ProjectState::Hibernated {
        println!("{} is already hibernated", snap.label());
    } else {
        println!("Hibernated {}", snap.label());
    }
    Ok(())
}

pub async fn activate(engine: &StateEngine, target: Target) -> anyhow::Result<()> {
    let before = engine.get(&target.project).await?;
    let snap = engine.activate(before.id()).await?;
    if before.project.state == ProjectState::Active {
        println!("{} is already active", snap.label());
    } else {
        println!("Activated {}", snap.label());
    }
    Ok(())
}

pub async fn refresh(engine: &StateEngine) -> anyhow::Result<()> {
    let summary = engine.refresh_all().await?;
    if summary.failed > 0 {
        println!(
            "Refreshed {} projects ({} failed)",
            summary.refreshed, summary.failed
        );
    } else {
        println!("Refreshed {} projects", summary.refreshed);
    }
    Ok(())
}

/// Status only: 0 when tracked, 2 when not.
pub async fn exists(engine: &StateEngine, target: Target) -> anyhow::Result<()> {
    match engine.resolve(&target.project).await {
        Ok(_) => Ok(()),
        Err(VibeError::ProjectNotFound(_)) => Err(SilentExit(PROJECT_NOT_FOUND).into()),
        Err(e) => Err(e.into()),
    }
}

pub async fn config(engine: &StateEngine, command: ConfigCommand) -> anyhow::Result<()> {
    match command {
        ConfigCommand::Set(opts) => {
            let snap = engine
                .set_config(&opts.project, &opts.key, &opts.value)
                .await?;
            println!("Set {} = {} for {}", opts.key, opts.value.trim(), snap.label());
        }
    }
    Ok(())
}

pub async fn reset(engine: &StateEngine, opts: ResetOpts) -> anyhow::Result<()> {
    let snap = engine.reset(&opts.project, opts.confirm).await?;
    println!(
        "Reset {}: {} / {}",
        snap.label(),
        snap.project.detected_method,
        snap.project.current_stage
    );
    Ok(())
}

pub async fn watch(engine: &StateEngine) -> anyhow::Result<()> {
    engine.run().await.context("watch mode failed")?;
    Ok(())
}
