use std::io::Read;
use std::path::PathBuf;

use anyhow::Context;
use anyhow::bail;
use clap::Parser;
use frontier_rs::portfolio::AnalysisConfig;
use frontier_rs::portfolio::AnalysisReport;
use frontier_rs::portfolio::Bounds;
use frontier_rs::portfolio::Frequency;
use frontier_rs::portfolio::Objective;
use frontier_rs::portfolio::PortfolioEngine;
use frontier_rs::portfolio::ReturnSeries;
use frontier_rs::PortfolioError;
use ndarray::Array2;
use prettytable::Table;
use prettytable::row;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Mean-variance analysis of a CSV price table.
#[derive(Parser, Debug)]
#[command(name = "frontier", version, about)]
struct Cli {
  /// CSV with a date column followed by one price column per asset
  #[arg(long)]
  prices: PathBuf,

  /// Annualized risk-free rate
  #[arg(long, default_value_t = 0.02)]
  risk_free_rate: f64,

  /// Sampling frequency of the prices: daily, weekly or monthly
  #[arg(long, default_value = "daily")]
  frequency: String,

  /// Number of random portfolios
  #[arg(long, default_value_t = 10_000)]
  num_simulations: usize,

  /// sharpe, min_volatility, max_return or target_return
  #[arg(long, default_value = "sharpe")]
  objective: String,

  /// Annualized target for the target_return objective
  #[arg(long)]
  target_return: Option<f64>,

  #[arg(long, default_value_t = 0.0)]
  min_weight: f64,

  #[arg(long, default_value_t = 1.0)]
  max_weight: f64,

  /// Number of efficient-frontier points
  #[arg(long, default_value_t = 50)]
  points: usize,

  /// Current weights, comma separated in column order (equal weights if omitted)
  #[arg(long, value_delimiter = ',')]
  weights: Option<Vec<f64>>,

  /// Fixed Monte Carlo seed
  #[arg(long)]
  seed: Option<u64>,

  /// Print the full report as JSON
  #[arg(long)]
  json: bool,
}

fn parse_cell(raw: &str) -> anyhow::Result<f64> {
  let raw = raw.trim();
  if raw.is_empty() || raw.eq_ignore_ascii_case("nan") || raw.eq_ignore_ascii_case("null") {
    return Ok(f64::NAN);
  }
  raw
    .parse::<f64>()
    .with_context(|| format!("cannot parse price '{raw}'"))
}

/// Read `date,asset1,asset2,...` rows into asset labels and a price matrix.
fn read_prices<R: Read>(mut reader: csv::Reader<R>) -> anyhow::Result<(Vec<String>, Array2<f64>)> {
  let headers = reader.headers().context("failed to read CSV header")?.clone();
  if headers.len() < 2 {
    bail!("price table needs a date column and at least one asset column");
  }
  let assets: Vec<String> = headers.iter().skip(1).map(|h| h.trim().to_string()).collect();

  let mut flat = Vec::new();
  let mut rows = 0;
  for (line, record) in reader.records().enumerate() {
    let record = record.with_context(|| format!("malformed CSV row {}", line + 2))?;
    if record.len() != headers.len() {
      bail!(
        "row {} has {} fields, expected {}",
        line + 2,
        record.len(),
        headers.len()
      );
    }
    for cell in record.iter().skip(1) {
      flat.push(parse_cell(cell).with_context(|| format!("row {}", line + 2))?);
    }
    rows += 1;
  }

  let prices = Array2::from_shape_vec((rows, assets.len()), flat)?;
  Ok((assets, prices))
}

fn build_config(cli: &Cli) -> anyhow::Result<AnalysisConfig> {
  let frequency: Frequency = cli.frequency.parse()?;
  let objective = Objective::parse(&cli.objective, cli.target_return)?;
  let bounds = Bounds::new(cli.min_weight, cli.max_weight)?;

  let config = AnalysisConfig {
    frequency,
    risk_free_rate: cli.risk_free_rate,
    objective,
    bounds,
    num_simulations: cli.num_simulations,
    frontier_points: cli.points,
    seed: cli.seed,
    ..AnalysisConfig::default()
  };
  config.validate()?;
  Ok(config)
}

fn print_report(report: &AnalysisReport) {
  let stats = &report.statistics;
  let vols = stats.asset_volatilities(report.frequency);
  let af = report.frequency.annualization_factor();

  let mut assets = Table::new();
  assets.set_titles(row!["Asset", "Return", "Volatility", "Current", "Optimal"]);
  for (i, name) in report.assets().iter().enumerate() {
    assets.add_row(row![
      name,
      format!("{:.2}%", stats.mean()[i] * af * 100.0),
      format!("{:.2}%", vols[i] * 100.0),
      format!("{:.2}%", report.current_weights[i] * 100.0),
      format!("{:.2}%", report.optimal.weights[i] * 100.0)
    ]);
  }
  assets.printstd();

  let mut summary = Table::new();
  summary.set_titles(row!["Portfolio", "Return", "Volatility", "Sharpe"]);
  let mut add = |label: &str, ret: f64, vol: f64, sharpe: f64| {
    summary.add_row(row![
      label,
      format!("{:.2}%", ret * 100.0),
      format!("{:.2}%", vol * 100.0),
      format!("{sharpe:.3}")
    ]);
  };
  add(
    "Current",
    report.current.expected_return,
    report.current.volatility,
    report.current.sharpe_ratio,
  );
  if let Some((_, best)) = report.best_simulated() {
    add(
      "Best simulated",
      best.expected_return,
      best.volatility,
      best.sharpe_ratio,
    );
  }
  let optimal_label = format!("Optimal ({})", report.objective);
  add(
    &optimal_label,
    report.optimal.metrics.expected_return,
    report.optimal.metrics.volatility,
    report.optimal.metrics.sharpe_ratio,
  );
  summary.printstd();

  let mut frontier = Table::new();
  frontier.set_titles(row!["Frontier return", "Volatility"]);
  for p in report.frontier.iter() {
    frontier.add_row(row![
      format!("{:.2}%", p.expected_return * 100.0),
      format!("{:.2}%", p.volatility * 100.0)
    ]);
  }
  frontier.printstd();
  if !report.frontier.skipped.is_empty() {
    println!(
      "{} frontier target(s) skipped",
      report.frontier.skipped.len()
    );
  }
}

fn run(cli: Cli) -> anyhow::Result<()> {
  let config = build_config(&cli)?;

  let reader = csv::Reader::from_path(&cli.prices)
    .with_context(|| format!("failed to open {}", cli.prices.display()))?;
  let (assets, prices) = read_prices(reader)?;
  let series = ReturnSeries::from_prices(assets, &prices)?;

  let engine = PortfolioEngine::new(config);
  let report = engine.analyze(&series, cli.weights.as_deref())?;

  if cli.json {
    println!("{}", serde_json::to_string_pretty(&report)?);
  } else {
    print_report(&report);
  }
  Ok(())
}

fn main() {
  tracing_subscriber::registry()
    .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
    .with(tracing_subscriber::EnvFilter::from_default_env())
    .init();

  let cli = Cli::parse();
  if let Err(e) = run(cli) {
    match e.downcast_ref::<PortfolioError>() {
      Some(pe) => eprintln!("error [{}]: {pe}", pe.kind()),
      None => eprintln!("error: {e:#}"),
    }
    std::process::exit(1);
  }
}
