//! Files consumed by external plotting tools
//!
//! - loss history as CSV (`epoch,loss,eval_loss`)
//! - prediction series as CSV (`step,target,prediction`)
//! - run and comparison summaries as pretty JSON
//! - wirings as Graphviz DOT

use std::fs;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::error::{NcpsError, Result};
use crate::training::TrainingHistory;
use crate::wirings::{NeuronType, Wiring};

#[derive(Serialize)]
struct HistoryRow {
    epoch: usize,
    loss: f32,
    eval_loss: Option<f32>,
}

#[derive(Serialize)]
struct PredictionRow {
    step: usize,
    target: f32,
    prediction: f32,
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// One row per completed epoch; `eval_loss` is empty where no evaluation ran.
pub fn write_history_csv(path: impl AsRef<Path>, history: &TrainingHistory) -> Result<()> {
    let path = path.as_ref();
    ensure_parent(path)?;
    let mut writer = csv::Writer::from_path(path)?;
    for (epoch, &loss) in history.losses.iter().enumerate() {
        writer.serialize(HistoryRow {
            epoch,
            loss,
            eval_loss: history.eval_loss_at(epoch),
        })?;
    }
    writer.flush()?;
    info!("Wrote {} epochs to {}", history.losses.len(), path.display());
    Ok(())
}

pub fn write_predictions_csv(
    path: impl AsRef<Path>,
    targets: &[f32],
    predictions: &[f32],
) -> Result<()> {
    if targets.len() != predictions.len() {
        return Err(NcpsError::shape(format!(
            "{} targets but {} predictions",
            targets.len(),
            predictions.len()
        )));
    }
    let path = path.as_ref();
    ensure_parent(path)?;
    let mut writer = csv::Writer::from_path(path)?;
    for (step, (&target, &prediction)) in targets.iter().zip(predictions).enumerate() {
        writer.serialize(PredictionRow {
            step,
            target,
            prediction,
        })?;
    }
    writer.flush()?;
    info!("Wrote {} predictions to {}", targets.len(), path.display());
    Ok(())
}

pub fn write_json<T: Serialize>(path: impl AsRef<Path>, value: &T) -> Result<()> {
    let path = path.as_ref();
    ensure_parent(path)?;
    fs::write(path, serde_json::to_string_pretty(value)?)?;
    info!("Wrote {}", path.display());
    Ok(())
}

fn neuron_color(neuron_type: NeuronType) -> &'static str {
    match neuron_type {
        NeuronType::Inter => "#7fc97f",
        NeuronType::Command => "#beaed4",
        NeuronType::Motor => "#fdc086",
    }
}

fn edge_color(polarity: i32) -> &'static str {
    if polarity > 0 {
        "#1f77b4"
    } else {
        "#d62728"
    }
}

/// Graphviz DOT description of `wiring`.
///
/// Sensory inputs and each neuron type form their own cluster; excitatory
/// synapses are blue and inhibitory ones red.
pub fn wiring_to_dot(wiring: &dyn Wiring) -> String {
    let mut dot = String::from("digraph wiring {\n");
    dot.push_str("    rankdir=LR;\n");
    dot.push_str("    node [shape=circle, style=filled];\n");

    if let Some(input_dim) = wiring.input_dim() {
        dot.push_str("    subgraph cluster_sensory {\n");
        dot.push_str("        label=\"sensory\";\n");
        for i in 0..input_dim {
            dot += &format!("        s{} [label=\"s{}\", fillcolor=\"#ffff99\"];\n", i, i);
        }
        dot.push_str("    }\n");
    }

    for neuron_type in [NeuronType::Inter, NeuronType::Command, NeuronType::Motor] {
        let members: Vec<usize> = (0..wiring.units())
            .filter(|&n| wiring.neuron_type(n) == neuron_type)
            .collect();
        if members.is_empty() {
            continue;
        }
        dot += &format!("    subgraph cluster_{} {{\n", neuron_type);
        dot += &format!("        label=\"{}\";\n", neuron_type);
        for n in members {
            dot += &format!(
                "        n{} [label=\"{}\", fillcolor=\"{}\"];\n",
                n,
                n,
                neuron_color(neuron_type)
            );
        }
        dot.push_str("    }\n");
    }

    if let Some(sensory) = wiring.sensory_adjacency_matrix() {
        for ((src, dest), &polarity) in sensory.indexed_iter() {
            if polarity != 0 {
                dot += &dot_edge("s", src, dest, polarity);
            }
        }
    }
    for ((src, dest), &polarity) in wiring.adjacency_matrix().indexed_iter() {
        if polarity != 0 {
            dot += &dot_edge("n", src, dest, polarity);
        }
    }

    dot.push_str("}\n");
    dot
}

fn dot_edge(src_prefix: &str, src: usize, dest: usize, polarity: i32) -> String {
    format!("    {}{} -> n{} [color=\"{}\"];\n", src_prefix, src, dest, edge_color(polarity))
}

pub fn write_wiring_dot(path: impl AsRef<Path>, wiring: &dyn Wiring) -> Result<()> {
    let path = path.as_ref();
    ensure_parent(path)?;
    fs::write(path, wiring_to_dot(wiring))?;
    info!(
        "Wrote wiring with {} synapses and {} sensory synapses to {}",
        wiring.synapse_count(),
        wiring.sensory_synapse_count(),
        path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::{EvalRecord, StopReason};
    use crate::wirings::{AutoNCP, FullyConnected};

    fn history() -> TrainingHistory {
        TrainingHistory {
            losses: vec![0.5, 0.4, 0.3],
            eval_losses: vec![EvalRecord { epoch: 1, loss: 0.45 }],
            best_loss: Some(0.3),
            best_epoch: Some(2),
            stop_reason: StopReason::Completed,
            profile: None,
        }
    }

    #[test]
    fn test_history_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("history.csv");
        write_history_csv(&path, &history()).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "epoch,loss,eval_loss");
        assert_eq!(lines[1], "0,0.5,");
        assert_eq!(lines[2], "1,0.4,0.45");
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn test_predictions_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("predictions.csv");
        write_predictions_csv(&path, &[1.0, 2.0], &[0.5, 1.5]).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "step,target,prediction\n0,1.0,0.5\n1,2.0,1.5\n");
        assert!(write_predictions_csv(&path, &[1.0], &[]).is_err());
    }

    #[test]
    fn test_json_summary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.json");
        write_json(&path, &history()).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["best_epoch"], 2);
        assert_eq!(value["stop_reason"]["reason"], "completed");
    }

    #[test]
    fn test_wiring_dot_groups_and_edges() {
        let mut wiring = AutoNCP::new(10, 2, 0.5, 3).unwrap();
        wiring.build(3).unwrap();
        let dot = wiring_to_dot(&wiring);

        assert!(dot.starts_with("digraph wiring {"));
        for cluster in ["cluster_sensory", "cluster_inter", "cluster_command", "cluster_motor"] {
            assert!(dot.contains(cluster), "missing {}", cluster);
        }
        let edges = dot.lines().filter(|line| line.contains("->")).count();
        assert_eq!(edges, wiring.synapse_count() + wiring.sensory_synapse_count());
    }

    #[test]
    fn test_edge_colors_follow_polarity() {
        let mut wiring = FullyConnected::new(2, None, 1, false).unwrap();
        wiring.add_synapse(0, 1, 1).unwrap();
        wiring.add_synapse(1, 0, -1).unwrap();
        let dot = wiring_to_dot(&wiring);
        assert!(dot.contains("n0 -> n1 [color=\"#1f77b4\"]"));
        assert!(dot.contains("n1 -> n0 [color=\"#d62728\"]"));
    }

    #[test]
    fn test_dot_is_well_formed_without_sensory_inputs() {
        let wiring = FullyConnected::new(3, None, 1, true).unwrap();
        let dot = wiring_to_dot(&wiring);

        assert!(!dot.contains("cluster_sensory"));
        assert!(!dot.contains(" s0 "));
        assert!(dot.ends_with("}\n"));
        assert_eq!(dot.matches('{').count(), dot.matches('}').count());
        assert!(dot.contains("n2 [label=\"2\", fillcolor="));
        let edges = dot.lines().filter(|line| line.contains("->")).count();
        assert_eq!(edges, wiring.synapse_count());
    }
}
