//! CLI wiring for the blockforge developer tool.

use anyhow::{Context, Result};
use blockforge_layers::{apply_rotation, BlockConfig, Layer, RotaryEmbedding, SwiGlu};
use clap::{Parser, Subcommand};
use ndarray::{Array2, Axis};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "blockforge", about = "Inspect rotary embeddings and SwiGLU feed-forward layers")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the cos/sin tables for a range of positions as JSON.
    Angles {
        #[arg(long)]
        dim: usize,
        #[arg(long)]
        seq_len: usize,
        #[arg(long, default_value_t = 0)]
        offset: usize,
        #[arg(long, default_value_t = 10_000.0)]
        base: f32,
    },
    /// Rotate a ramp input and check that the inverse rotation restores it.
    Rotate {
        #[arg(long)]
        dim: usize,
        #[arg(long)]
        seq_len: usize,
    },
    /// Run a randomly initialised SwiGLU feed-forward and report timing.
    FeedForward {
        /// JSON block configuration; defaults are used when omitted.
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long, default_value_t = 16)]
        rows: usize,
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[derive(Debug, Serialize)]
struct AnglesReport {
    dim: usize,
    offset: usize,
    inv_freq: Vec<f32>,
    cos: Vec<Vec<f32>>,
    sin: Vec<Vec<f32>>,
}

#[derive(Debug, Serialize)]
struct RotateReport {
    dim: usize,
    seq_len: usize,
    max_round_trip_error: f32,
    max_norm_drift: f32,
}

#[derive(Debug, Serialize)]
struct FeedForwardReport {
    kernel: &'static str,
    input_shape: Vec<usize>,
    output_shape: Vec<usize>,
    parameters: usize,
    latency_ms: f64,
}

pub fn run_cli(cli: Cli) -> Result<()> {
    tracing_subscriber::fmt::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .init();

    match cli.command {
        Command::Angles {
            dim,
            seq_len,
            offset,
            base,
        } => {
            let table_len = offset.saturating_add(seq_len.max(1));
            let rope = RotaryEmbedding::with_base(dim, table_len, base)
                .context("invalid rotary configuration")?;
            let (cos, sin) = rope
                .angles_for_positions(offset, seq_len)
                .context("invalid rotary positions")?;
            let report = AnglesReport {
                dim,
                offset,
                inv_freq: rope.inv_freq().to_vec(),
                cos: table_rows(&cos),
                sin: table_rows(&sin),
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Rotate { dim, seq_len } => {
            let rope = RotaryEmbedding::new(dim, seq_len.max(1))
                .context("invalid rotary configuration")?;
            let x = Array2::from_shape_fn((seq_len, dim), |(t, c)| {
                ((t * dim + c) as f32 * 0.37).sin()
            });
            let (cos, sin) = rope.compute_angles(&x, None)?;
            let rotated = apply_rotation(&x, &cos, &sin)?;
            let restored = apply_rotation(&rotated, &cos, &sin.mapv(|v| -v))?;

            let max_round_trip_error = restored
                .iter()
                .zip(x.iter())
                .map(|(a, b)| (a - b).abs())
                .fold(0.0f32, f32::max);
            let max_norm_drift = x
                .axis_iter(Axis(0))
                .zip(rotated.axis_iter(Axis(0)))
                .map(|(before, after)| {
                    let norm = |row: ndarray::ArrayView1<'_, f32>| row.dot(&row).sqrt();
                    (norm(before) - norm(after)).abs()
                })
                .fold(0.0f32, f32::max);

            info!(
                dim,
                seq_len,
                max_round_trip_error,
                "rotation round trip complete"
            );
            let report = RotateReport {
                dim,
                seq_len,
                max_round_trip_error,
                max_norm_drift,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::FeedForward { config, rows, seed } => {
            let config = match config {
                Some(path) => {
                    info!(path = %path.display(), "loading block configuration");
                    BlockConfig::load(&path)
                        .with_context(|| format!("failed to load {}", path.display()))?
                }
                None => {
                    info!("using default block configuration");
                    BlockConfig::default()
                }
            };
            if let Some(seed) = seed {
                fastrand::seed(seed);
            }

            let ffn = SwiGlu::from_config(&config.feed_forward)?;
            let input = Array2::from_shape_fn((rows, ffn.in_features()), |_| {
                fastrand::f32() * 2.0 - 1.0
            });

            let start = Instant::now();
            let output = ffn.apply(input.view().into_dyn())?;
            let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
            info!(
                rows,
                kernel = ffn.kernel_name(),
                latency_ms,
                "feed-forward completed"
            );

            let report = FeedForwardReport {
                kernel: ffn.kernel_name(),
                input_shape: input.shape().to_vec(),
                output_shape: output.shape().to_vec(),
                parameters: Layer::num_parameters(&ffn),
                latency_ms,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    Ok(())
}

fn table_rows(table: &Array2<f32>) -> Vec<Vec<f32>> {
    table.outer_iter().map(|row| row.to_vec()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_feed_forward_arguments() {
        let cli = Cli::try_parse_from(["blockforge", "feed-forward", "--rows", "4", "--seed", "9"])
            .unwrap();
        match cli.command {
            Command::FeedForward { config, rows, seed } => {
                assert!(config.is_none());
                assert_eq!(rows, 4);
                assert_eq!(seed, Some(9));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn angles_default_to_standard_base() {
        let cli =
            Cli::try_parse_from(["blockforge", "angles", "--dim", "4", "--seq-len", "2"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Angles { dim: 4, seq_len: 2, offset: 0, base } if base == 10_000.0
        ));
    }

    #[test]
    fn table_rows_preserve_layout() {
        let table = ndarray::array![[1.0f32, 2.0], [3.0, 4.0]];
        assert_eq!(table_rows(&table), vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
    }
}
