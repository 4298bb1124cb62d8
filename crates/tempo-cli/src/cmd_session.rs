use std::path::Path;

/// `tempo stop`
pub fn stop(root: &Path) -> anyhow::Result<()> {
    let _lock = crate::workspace::lock(root).map_err(|e| {
        anyhow::anyhow!("{e}\na recorder is running here; type `stop` in its terminal instead")
    })?;
    let recorder = crate::workspace::recorder(root)?;
    match recorder.stop()? {
        Some(summary) => crate::cmd_record::print_summary(&summary),
        None => println!("no paused session"),
    }
    Ok(())
}

/// `tempo status`
pub fn status(root: &Path, json: bool) -> anyhow::Result<()> {
    let workspace_id = tempo_store::workspace_id(root);
    // Probing the lock tells whether another process is recording.
    let recording = crate::workspace::lock(root).is_err();
    let saved = crate::workspace::recorder(root)?.saved_session();

    let state = match (&saved, recording) {
        (_, true) => "recording",
        (Some(_), false) => "paused",
        (None, false) => "stopped",
    };

    if json {
        let mut out = serde_json::json!({
            "workspace_root": root.display().to_string(),
            "workspace_id": workspace_id,
            "state": state,
        });
        if let Some(saved) = &saved {
            out["paused_session"] = serde_json::to_value(saved)?;
            out["elapsed_ms"] = saved.frozen_elapsed_ms().into();
            out["event_count"] = event_count(&saved.log_path).into();
        }
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("workspace: {} ({workspace_id})", root.display());
    println!("state:     {state}");
    if let Some(saved) = saved {
        println!("session:   {}", saved.session_id);
        println!("elapsed:   {} ms", saved.frozen_elapsed_ms());
        println!("mode:      {}", saved.control_mode.unwrap_or_default());
        println!("log:       {}", saved.log_path.display());
        println!("events:    {}", event_count(&saved.log_path));
    }
    Ok(())
}

/// Records in a session log across rotated files; 0 if it cannot be read.
fn event_count(log_path: &Path) -> usize {
    match tempo_log::read_events(log_path) {
        Ok(events) => events.len(),
        Err(e) => {
            tracing::warn!(path = %log_path.display(), error = %e, "cannot read session log");
            0
        }
    }
}
