use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use perpfund::prelude::*;
use prettytable::{Cell, Row, Table};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "perpfund")]
#[command(about = "A funding-rate backtesting engine for perpetual futures", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    //run a single backtest
    Run {
        #[command(flatten)]
        data: DataArgs,

        //entry threshold above which funding is faded with a short
        #[arg(long, allow_negative_numbers = true)]
        threshold_high: Option<f64>,

        //entry threshold below which funding is faded with a long
        #[arg(long, allow_negative_numbers = true)]
        threshold_low: Option<f64>,

        //take-profit distance from entry, as a fraction
        #[arg(long)]
        take_profit: Option<f64>,

        //signed stop-loss fraction (eg -0.1)
        #[arg(long, allow_negative_numbers = true)]
        stop_loss: Option<f64>,

        //maximum position size
        #[arg(long)]
        max_position_size: Option<f64>,

        //output options
        //output path for per-step series csv
        #[arg(long)]
        output_series_csv: Option<PathBuf>,

        //output path for trades csv
        #[arg(long)]
        output_trades_csv: Option<PathBuf>,

        //output path for summary json
        #[arg(long)]
        output_summary_json: Option<PathBuf>,
    },
    //run a parameter grid in parallel and rank the results
    Sweep {
        #[command(flatten)]
        data: DataArgs,

        //comma separated high thresholds
        #[arg(
            long,
            value_delimiter = ',',
            allow_negative_numbers = true,
            default_value = "0.0005"
        )]
        threshold_high: Vec<f64>,

        //comma separated low thresholds
        #[arg(
            long,
            value_delimiter = ',',
            allow_negative_numbers = true,
            default_value = "0.0"
        )]
        threshold_low: Vec<f64>,

        //comma separated take-profit fractions
        #[arg(long, value_delimiter = ',', default_value = "0.2")]
        take_profit: Vec<f64>,

        //comma separated stop-loss fractions
        #[arg(
            long,
            value_delimiter = ',',
            allow_negative_numbers = true,
            default_value = "-0.1"
        )]
        stop_loss: Vec<f64>,

        //maximum position size for every run
        #[arg(long, default_value = "1.0")]
        max_position_size: f64,

        //number of ranked rows to print
        #[arg(long, default_value = "20")]
        top: usize,
    },
}

//inputs shared by every subcommand
#[derive(Args)]
struct DataArgs {
    //path to a json configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    //path to funding rate csv (timestamp,fundingRate)
    #[arg(long)]
    funding: Option<PathBuf>,

    //path to close price csv (timestamp,close)
    #[arg(long)]
    prices: Option<PathBuf>,

    //join policy (strict, inner)
    #[arg(long)]
    join_policy: Option<String>,

    //cumulative return mode (additive, compounding)
    #[arg(long)]
    cumulative_mode: Option<String>,

    //return alignment (lagged, same_step)
    #[arg(long)]
    return_alignment: Option<String>,

    //periods per year for sharpe annualization (252 daily, 1095 for 8h funding)
    #[arg(long)]
    annualization_factor: Option<f64>,

    //annual risk-free rate
    #[arg(long)]
    risk_free_rate: Option<f64>,
}

impl DataArgs {
    //merges the config file (if any) with command line overrides
    fn resolve(&self) -> Result<BacktestConfiguration> {
        let mut config = match &self.config {
            Some(path) => BacktestConfiguration::from_json_file(path)
                .context(format!("Failed to load config from {:?}", path))?,
            None => {
                let funding = self
                    .funding
                    .clone()
                    .ok_or_else(|| anyhow::anyhow!("--funding required without --config"))?;
                let prices = self
                    .prices
                    .clone()
                    .ok_or_else(|| anyhow::anyhow!("--prices required without --config"))?;
                BacktestConfiguration {
                    funding_path: funding,
                    price_path: prices,
                    ..BacktestConfiguration::default()
                }
            }
        };

        if let Some(path) = &self.funding {
            config.funding_path = path.clone();
        }
        if let Some(path) = &self.prices {
            config.price_path = path.clone();
        }
        if let Some(policy) = &self.join_policy {
            config.join_policy = JoinPolicy::parse(policy)
                .ok_or_else(|| anyhow::anyhow!("Unknown join policy: {}", policy))?;
        }
        if let Some(mode) = &self.cumulative_mode {
            config.metrics.cumulative_mode = CumulativeMode::parse(mode)
                .ok_or_else(|| anyhow::anyhow!("Unknown cumulative mode: {}", mode))?;
        }
        if let Some(alignment) = &self.return_alignment {
            config.metrics.return_alignment = ReturnAlignment::parse(alignment)
                .ok_or_else(|| anyhow::anyhow!("Unknown return alignment: {}", alignment))?;
        }
        if let Some(factor) = self.annualization_factor {
            config.metrics.annualization_factor = factor;
        }
        if let Some(rate) = self.risk_free_rate {
            config.metrics.risk_free_rate = rate;
        }

        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            data,
            threshold_high,
            threshold_low,
            take_profit,
            stop_loss,
            max_position_size,
            output_series_csv,
            output_trades_csv,
            output_summary_json,
        } => {
            let mut config = data.resolve()?;
            let strategy = &mut config.strategy;
            if let Some(v) = threshold_high {
                strategy.threshold_high = v;
            }
            if let Some(v) = threshold_low {
                strategy.threshold_low = v;
            }
            if let Some(v) = take_profit {
                strategy.take_profit_pct = v;
            }
            if let Some(v) = stop_loss {
                strategy.stop_loss_pct = v;
            }
            if let Some(v) = max_position_size {
                strategy.max_position_size = v;
            }
            if output_series_csv.is_some() {
                config.output_series_csv = output_series_csv;
            }
            if output_trades_csv.is_some() {
                config.output_trades_csv = output_trades_csv;
            }
            if output_summary_json.is_some() {
                config.output_summary_json = output_summary_json;
            }

            run_single(&config)?;
        }
        Commands::Sweep {
            data,
            threshold_high,
            threshold_low,
            take_profit,
            stop_loss,
            max_position_size,
            top,
        } => {
            let config = data.resolve()?;
            let grid = SweepGrid {
                threshold_high,
                threshold_low,
                take_profit_pct: take_profit,
                stop_loss_pct: stop_loss,
                max_position_size,
            };
            run_grid(&config, &grid, top)?;
        }
    }

    Ok(())
}

fn load_observations(config: &BacktestConfiguration) -> Result<Vec<Observation>> {
    println!("Loading funding rates from {:?}...", config.funding_path);
    let funding = load_funding_csv(&config.funding_path).context(format!(
        "Failed to load funding rates from {:?}",
        config.funding_path
    ))?;

    println!("Loading prices from {:?}...", config.price_path);
    let prices = load_price_csv(&config.price_path).context(format!(
        "Failed to load prices from {:?}",
        config.price_path
    ))?;

    let (observations, report) = join_on_timestamp(&funding, &prices, config.join_policy)?;

    if observations.is_empty() {
        anyhow::bail!("No overlapping timestamps between funding and price data");
    }

    println!(
        "Joined {} observations ({} funding rows dropped, {} price rows unused)",
        report.matched, report.unmatched_funding, report.unmatched_prices
    );
    if let (Some(first), Some(last)) = (observations.first(), observations.last()) {
        println!("Date range: {} to {}\n", first.timestamp, last.timestamp);
    }

    Ok(observations)
}

fn run_single(config: &BacktestConfiguration) -> Result<()> {
    println!("Perpfund Funding-Rate Backtesting Engine");
    println!("========================================\n");

    let observations = load_observations(config)?;

    let strategy = &config.strategy;
    println!(
        "Strategy: funding threshold (high={}, low={}, tp={}, sl={}, max size={})",
        strategy.threshold_high,
        strategy.threshold_low,
        strategy.take_profit_pct,
        strategy.stop_loss_pct,
        strategy.max_position_size
    );
    println!(
        "Metrics: {:?} cumulative, {:?} returns, annualization {}\n",
        config.metrics.cumulative_mode,
        config.metrics.return_alignment,
        config.metrics.annualization_factor
    );

    let engine = BacktestEngine::new(
        BacktestConfig {
            strategy: config.strategy.clone(),
            metrics: config.metrics.clone(),
        },
        observations,
    );
    let result = engine.run()?;

    println!("Backtest Results");
    println!("================\n");
    result.summary.pretty_print_table();

    //save outputs if requested
    if let Some(path) = &config.output_series_csv {
        save_series_csv(&result, path)?;
        println!("\nSeries saved to {:?}", path);
    }

    if let Some(path) = &config.output_trades_csv {
        save_trades_csv(&result.trades, path)?;
        println!("Trades saved to {:?}", path);
    }

    if let Some(path) = &config.output_summary_json {
        let json = serde_json::to_string_pretty(&result.summary)?;
        std::fs::write(path, json)?;
        println!("Summary saved to {:?}", path);
    }

    Ok(())
}

fn run_grid(config: &BacktestConfiguration, grid: &SweepGrid, top: usize) -> Result<()> {
    println!("Perpfund Parameter Sweep");
    println!("========================\n");

    let observations = load_observations(config)?;
    let strategies = grid.configs();
    println!("Running {} backtests...\n", strategies.len());

    let mut outcomes = run_sweep(&strategies, &config.metrics, &observations);
    rank_by_total_return(&mut outcomes);

    let mut table = Table::new();
    table.add_row(Row::new(vec![
        Cell::new("High"),
        Cell::new("Low"),
        Cell::new("TP"),
        Cell::new("SL"),
        Cell::new("Total Return"),
        Cell::new("Sharpe"),
        Cell::new("Max DD"),
        Cell::new("Trades"),
    ]));

    for outcome in outcomes.iter().take(top) {
        let s = &outcome.strategy;
        let mut cells = vec![
            Cell::new(&s.threshold_high.to_string()),
            Cell::new(&s.threshold_low.to_string()),
            Cell::new(&s.take_profit_pct.to_string()),
            Cell::new(&s.stop_loss_pct.to_string()),
        ];
        match &outcome.result {
            Ok(summary) => {
                cells.push(Cell::new(&format!("{:.2}%", summary.total_return * 100.0)));
                cells.push(Cell::new(&summary.sharpe_ratio.to_string()));
                cells.push(Cell::new(&format!("{:.2}%", summary.max_drawdown * 100.0)));
                cells.push(Cell::new(&summary.num_trades.to_string()));
            }
            Err(err) => {
                cells.push(Cell::new(&format!("error: {}", err)));
                cells.push(Cell::new("-"));
                cells.push(Cell::new("-"));
                cells.push(Cell::new("-"));
            }
        }
        table.add_row(Row::new(cells));
    }

    table.printstd();

    let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
    if failed > 0 {
        println!("\n{} of {} runs failed", failed, outcomes.len());
    }

    Ok(())
}

fn save_series_csv(result: &BacktestResult, path: &Path) -> Result<()> {
    use std::io::Write;

    let mut file = std::fs::File::create(path)?;
    writeln!(
        file,
        "timestamp,close,funding_rate,signal,position,step_return,cumulative_return,equity,drawdown"
    )?;

    for (step, record) in result.steps.iter().zip(&result.returns) {
        writeln!(
            file,
            "{},{},{},{},{},{},{},{},{}",
            step.timestamp.to_rfc3339(),
            step.close,
            step.funding_rate,
            step.signal.to_sign(),
            step.position.exposure(),
            record.step_return,
            record.cumulative_return,
            record.equity,
            record.drawdown
        )?;
    }

    Ok(())
}

fn save_trades_csv(trades: &[Trade], path: &Path) -> Result<()> {
    use std::io::Write;

    let mut file = std::fs::File::create(path)?;
    writeln!(
        file,
        "direction,size,entry_time,entry_price,exit_time,exit_price,exit_reason,return"
    )?;

    for trade in trades {
        writeln!(
            file,
            "{},{},{},{},{},{},{},{}",
            trade.direction,
            trade.size,
            trade.entry_time.to_rfc3339(),
            trade.entry_price,
            trade
                .exit_time
                .map(|t| t.to_rfc3339())
                .unwrap_or_default(),
            trade.exit_price.map(|p| p.to_string()).unwrap_or_default(),
            trade
                .exit_reason
                .map(|r| r.to_string())
                .unwrap_or_default(),
            trade
                .realized_return()
                .map(|r| r.to_string())
                .unwrap_or_default()
        )?;
    }

    Ok(())
}
