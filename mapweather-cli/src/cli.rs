use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use mapweather_core::{
    AuthorizationState, Config, Coordinate, FlowDriver, LocationAuthorizationFlow, SimulatedLocation,
    SimulationScript, WeatherClient, client_from_config, flow_channel,
    photos::{FileItemLoader, PickerRequest, pick_and_load},
};

use crate::console::{self, ConsolePresenter, ConsoleSettings, PathPicker};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "mapweather", version, about = "Current weather for where you are")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the OpenWeather API key.
    Configure,

    /// Fetch current weather for a coordinate.
    Show {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
    },

    /// Run the location authorization flow against a simulated device.
    Locate(LocateArgs),

    /// Load picked photo files and list the ones that could be read.
    Photos {
        /// Files to treat as the picker's selection.
        paths: Vec<PathBuf>,

        /// Selection limit; defaults to the configured one. 0 means no limit.
        #[arg(long)]
        limit: Option<usize>,
    },
}

#[derive(Debug, Args)]
pub struct LocateArgs {
    /// Simulate location services being turned off device-wide.
    #[arg(long)]
    services_disabled: bool,

    /// Authorization before the permission dialog is shown.
    #[arg(long, default_value = "undetermined", value_parser = parse_state)]
    status: AuthorizationState,

    /// Answer given in the permission dialog.
    #[arg(long, default_value = "when-in-use", value_parser = parse_state)]
    grant: AuthorizationState,

    /// Position the device reports; without it the device never gets a fix.
    #[arg(long, requires = "lon", allow_hyphen_values = true)]
    lat: Option<f64>,
    #[arg(long, requires = "lat", allow_hyphen_values = true)]
    lon: Option<f64>,

    /// Press refresh once the first weather is shown.
    #[arg(long)]
    refresh: bool,

    /// Accept the "go to Settings" prompt.
    #[arg(long)]
    open_settings: bool,

    /// Give up waiting for the flow after this many seconds.
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,
}

impl LocateArgs {
    fn script(&self) -> SimulationScript {
        SimulationScript {
            services_enabled: !self.services_disabled,
            initial: self.status,
            grant: self.grant,
            fix: self.lat.zip(self.lon).map(|(lat, lon)| Coordinate::new(lat, lon)),
        }
    }
}

fn parse_state(value: &str) -> Result<AuthorizationState, String> {
    AuthorizationState::try_from(value).map_err(|e| e.to_string())
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure => configure(),
            Command::Show { lat, lon } => show(Coordinate::new(lat, lon)).await,
            Command::Locate(args) => locate(args).await,
            Command::Photos { paths, limit } => photos(paths, limit).await,
        }
    }
}

fn configure() -> anyhow::Result<()> {
    let mut config = Config::load()?;

    let api_key = inquire::Password::new("OpenWeather API key:")
        .without_confirmation()
        .with_help_message("Get one at https://home.openweathermap.org/api_keys")
        .prompt()
        .context("Failed to read API key")?;

    if api_key.trim().is_empty() {
        anyhow::bail!("API key must not be empty");
    }

    config.set_api_key(api_key.trim().to_string());
    let path = config.save()?;
    println!("Saved configuration to {}", path.display());
    Ok(())
}

async fn show(coordinate: Coordinate) -> anyhow::Result<()> {
    if !coordinate.is_finite() {
        anyhow::bail!("Coordinate {coordinate} is not finite");
    }

    let config = Config::load()?;
    let client = client_from_config(&config)?;

    let reading = client
        .fetch_weather(coordinate)
        .await
        .with_context(|| format!("Failed to fetch weather for {coordinate}"))?;

    println!("{coordinate}");
    println!("{}", console::format_reading(&reading));
    Ok(())
}

async fn locate(args: LocateArgs) -> anyhow::Result<()> {
    let config = Config::load()?;
    let client = Arc::new(client_from_config(&config)?);

    let (handle, events) = flow_channel();
    let location = Arc::new(SimulatedLocation::new(args.script()));
    location.attach(handle.clone());

    let presenter = ConsolePresenter::new(handle.clone(), args.refresh, args.open_settings);
    let driver = FlowDriver::new(
        LocationAuthorizationFlow::new(config.fallback),
        events,
        location.clone(),
        Arc::new(ConsoleSettings),
        client,
        presenter,
    );

    let mut task = tokio::spawn(driver.run());
    handle.check_authorization();

    let (flow, _) = match tokio::time::timeout(Duration::from_secs(args.timeout_secs), &mut task).await {
        Ok(joined) => joined.context("Flow driver panicked")?,
        Err(_) => {
            tracing::warn!(timeout_secs = args.timeout_secs, "flow did not settle, stopping");
            println!("No result after {}s.", args.timeout_secs);
            handle.shutdown();
            task.await.context("Flow driver panicked")?
        }
    };

    let stats = location.stats();
    println!(
        "authorization: {}, permission requests: {}, update starts: {}, update stops: {}",
        flow.authorization().map(|s| s.as_str()).unwrap_or("not checked"),
        stats.permission_requests,
        stats.update_starts,
        stats.update_stops,
    );
    Ok(())
}

async fn photos(paths: Vec<PathBuf>, limit: Option<usize>) -> anyhow::Result<()> {
    let config = Config::load()?;
    let mut request = PickerRequest::from(config.picker);
    if let Some(limit) = limit {
        request.selection_limit = limit;
    }

    let picked = paths.len();
    let images = pick_and_load(&PathPicker::new(paths), &FileItemLoader, request).await;

    for image in &images {
        println!(
            "{:<6} {:>11}  {}",
            format!("{:?}", image.format),
            format!("{}x{}", image.width(), image.height()),
            image.name,
        );
    }
    println!("Loaded {} of {} picked item(s).", images.len(), picked);
    Ok(())
}
