use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use inquire::Text;
use std::{path::PathBuf, process::ExitCode, sync::Arc};
use weather_predict_core::{
    Config, HttpPredictionService, ImageFile, Prediction, PredictionController, SelectionOutcome,
    TempDirPreviews,
};

const EMPTY_PROMPT: &str =
    "Arrastra y suelta una imagen aquí, o haz clic para seleccionar un archivo";

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather-predict", version, about = "Predict the weather from a photo")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Interactively set the prediction endpoint and request timeout.
    Configure,

    /// Show where the configuration lives and what is in effect.
    Config,

    /// Upload an image and print the predicted weather.
    Predict {
        /// Image file(s). Only the first one is used.
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Override the configured endpoint for this run.
        #[arg(long)]
        endpoint: Option<String>,

        /// Give up after this many seconds; 0 means no limit.
        #[arg(long)]
        timeout: Option<u64>,
    },
}

impl Cli {
    pub async fn run(self) -> Result<ExitCode> {
        match self.command {
            Command::Configure => configure(),
            Command::Config => show_config(),
            Command::Predict {
                files,
                endpoint,
                timeout,
            } => {
                let mut cfg = Config::load()?;
                if let Some(endpoint) = endpoint {
                    cfg.set_endpoint(endpoint)?;
                }
                if let Some(secs) = timeout {
                    cfg.timeout_secs = (secs > 0).then_some(secs);
                }
                predict(&cfg, &files).await
            }
        }
    }
}

async fn predict(cfg: &Config, paths: &[PathBuf]) -> Result<ExitCode> {
    let service = HttpPredictionService::from_config(cfg)?;
    let previews =
        TempDirPreviews::new().context("Failed to create a directory for image previews")?;
    let mut controller = PredictionController::new(Arc::new(service), Arc::new(previews));

    match select_first(&mut controller, paths) {
        Ok(SelectionOutcome::Selected { ignored }) if ignored > 0 => {
            eprintln!("Solo se usa el primer archivo; {ignored} ignorado(s).");
        }
        Ok(_) => {}
        Err(err) => {
            eprintln!("{EMPTY_PROMPT}");
            return Err(err);
        }
    }

    let selected = controller
        .selected()
        .ok_or_else(|| anyhow!("{EMPTY_PROMPT}"))?;
    println!("Archivo seleccionado: {}", selected.name());

    eprintln!("Procesando...");
    let Some(prediction) = controller.submit().await else {
        return Err(anyhow!("Submission did not start"));
    };

    println!("{}", result_panel(prediction));

    Ok(if prediction.is_failure() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

/// Select the first path. The remaining paths are counted but never read.
fn select_first(controller: &mut PredictionController, paths: &[PathBuf]) -> Result<SelectionOutcome> {
    let Some((first, rest)) = paths.split_first() else {
        return Ok(SelectionOutcome::Unchanged);
    };

    let file = ImageFile::from_path(first)?;
    let outcome = controller.select([file])?;

    Ok(match outcome {
        SelectionOutcome::Selected { .. } => {
            if !rest.is_empty() {
                tracing::debug!(ignored = rest.len(), "keeping only the first file");
            }
            SelectionOutcome::Selected { ignored: rest.len() }
        }
        SelectionOutcome::Unchanged => SelectionOutcome::Unchanged,
    })
}

fn result_panel(prediction: &Prediction) -> String {
    format!("Predicción:\n{}", prediction.text())
}

fn configure() -> Result<ExitCode> {
    let mut cfg = Config::load()?;

    let endpoint = Text::new("Prediction endpoint:")
        .with_default(&cfg.endpoint)
        .prompt()
        .context("Failed to read endpoint")?;
    cfg.set_endpoint(endpoint)?;

    let initial = cfg.timeout_secs.map(|s| s.to_string()).unwrap_or_default();
    let timeout = Text::new("Request timeout in seconds (empty for none):")
        .with_initial_value(&initial)
        .prompt()
        .context("Failed to read timeout")?;
    cfg.timeout_secs = parse_timeout(&timeout)?;

    cfg.save()?;
    println!(
        "Configuration saved to {}",
        Config::config_file_path()?.display()
    );

    Ok(ExitCode::SUCCESS)
}

fn show_config() -> Result<ExitCode> {
    let path = Config::config_file_path()?;
    let cfg = Config::load()?;

    println!("Config file: {}", path.display());
    println!("Endpoint:    {}", cfg.endpoint);
    match cfg.timeout_secs {
        Some(secs) => println!("Timeout:     {secs}s"),
        None => println!("Timeout:     none"),
    }

    Ok(ExitCode::SUCCESS)
}

fn parse_timeout(input: &str) -> Result<Option<u64>> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    match trimmed.parse::<u64>() {
        Ok(0) => Ok(None),
        Ok(secs) => Ok(Some(secs)),
        Err(_) => Err(anyhow!(
            "Invalid timeout '{trimmed}': expected a whole number of seconds"
        )),
    }
}
