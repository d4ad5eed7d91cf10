//! Plain-text status page.
//!
//! One block per target: a header line followed by tab-indented settings.
//! `Loop:` says whether the daemon actually runs the target.

use std::collections::BTreeSet;
use std::fmt::Write;

use ebbflow_core::{RestartTrigger, TargetConfig, TargetKind};

/// Render the status page for `targets`; `running` holds the ids with a
/// live control loop.
pub fn render_status(
    enabled: bool,
    targets: &[TargetConfig],
    running: &BTreeSet<String>,
) -> String {
    let mut out = String::new();
    let state = if enabled { "enabled" } else { "disabled" };
    let _ = writeln!(out, "scaling: {state}");
    let _ = writeln!(out, "targets: {}", targets.len());
    let live = targets.iter().filter(|t| running.contains(&t.id())).count();
    let _ = writeln!(out, "loops: {live}");

    for target in targets {
        out.push('\n');
        render_target(&mut out, target, running.contains(&target.id()));
    }
    out
}

fn render_target(out: &mut String, target: &TargetConfig, running: bool) {
    match &target.kind {
        TargetKind::PodScale {
            app,
            process_type,
            queue,
            policy,
            bounds,
        } => {
            let _ = writeln!(out, "{app}-{process_type}");
            let _ = writeln!(out, "\tqueue: {}", queue.name);
            let _ = writeln!(out, "\tEnv: {}", queue.broker_env);
            let _ = writeln!(out, "\tMethod: scale");
            let _ = writeln!(out, "\tThreshold: {}", policy.threshold);
            let _ = writeln!(out, "\tWatermark: {}", policy.watermark);
            let _ = writeln!(out, "\tScale By: {}", policy.scale_up_by);
            let _ = writeln!(out, "\tMin: {}", bounds.min);
            let _ = writeln!(out, "\tMax: {}", bounds.max);
        }
        TargetKind::Restart {
            app,
            process_type,
            trigger,
        } => {
            let _ = writeln!(out, "{app}-{process_type}");
            match trigger {
                RestartTrigger::Alert {
                    alert_host,
                    alert_name,
                    degraded_alert,
                    ..
                } => {
                    let _ = writeln!(out, "\talert: {alert_name}");
                    let _ = writeln!(out, "\tAlert Host: {alert_host}");
                    let _ = writeln!(out, "\tMethod: restartworker");
                    let _ = writeln!(out, "\tSuppressed By: {degraded_alert}");
                }
                RestartTrigger::Backlog { queue, threshold } => {
                    let _ = writeln!(out, "\tqueue: {}", queue.name);
                    let _ = writeln!(out, "\tEnv: {}", queue.broker_env);
                    let _ = writeln!(out, "\tMethod: restart");
                    let _ = writeln!(out, "\tThreshold: {threshold}");
                }
            }
        }
        TargetKind::GroupScale {
            group,
            region,
            queue,
            policy,
            honor_cooldown,
        } => {
            let _ = writeln!(out, "{group} ({region})");
            let _ = writeln!(out, "\tqueue: {}", queue.name);
            let _ = writeln!(out, "\tEnv: {}", queue.broker_env);
            let _ = writeln!(out, "\tMethod: scale");
            let _ = writeln!(out, "\tThreshold: {}", policy.threshold);
            let _ = writeln!(out, "\tWatermark: {}", policy.watermark);
            let _ = writeln!(out, "\tScale Up By: {}", policy.scale_up_by);
            let _ = writeln!(out, "\tScale Down By: {}", policy.scale_down_by);
            let _ = writeln!(out, "\tProvider Cooldown: {honor_cooldown}");
        }
    }

    let _ = writeln!(out, "\tPoll Interval: {}s", target.poll_interval.as_secs());
    let _ = writeln!(out, "\tCooldown: {}s", target.cooldown.as_secs());
    let _ = writeln!(out, "\tEnabled: {}", target.enabled);
    let loop_state = if running { "running" } else { "skipped" };
    let _ = writeln!(out, "\tLoop: {loop_state}");
}
