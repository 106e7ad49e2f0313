use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use trendgale::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "trendgale")]
#[command(about = "Backtests a moving-average trend filter with martingale bet sizing", long_about = None)]
struct Cli {
    //enable debug logging (RUST_LOG takes precedence)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    //run a backtest
    Run(RunArgs),

    //write the default configuration to a json file
    InitConfig {
        #[arg(long)]
        out: PathBuf,
    },

    //run one backtest per moving average period, in parallel
    Sweep {
        #[command(flatten)]
        overrides: Overrides,

        //comma separated moving average periods (eg 50,100,200)
        #[arg(long, value_delimiter = ',', required = true)]
        periods: Vec<usize>,
    },
}

#[derive(Args)]
struct RunArgs {
    #[command(flatten)]
    overrides: Overrides,

    //output path for equity curve csv
    #[arg(long)]
    output_equity_csv: Option<PathBuf>,

    //output path for trades csv
    #[arg(long)]
    output_trades_csv: Option<PathBuf>,
}

//command line values that replace fields of the json configuration
#[derive(Args)]
struct Overrides {
    //json configuration file (defaults are used when omitted)
    #[arg(long)]
    config: Option<PathBuf>,

    //path to csv data file
    #[arg(long)]
    data: Option<PathBuf>,

    //first bar to include (YYYY-MM-DD or "YYYY-MM-DD HH:MM")
    #[arg(long, value_parser = parse_date_arg)]
    from: Option<NaiveDateTime>,

    //last bar to include (YYYY-MM-DD or "YYYY-MM-DD HH:MM")
    #[arg(long, value_parser = parse_date_arg)]
    to: Option<NaiveDateTime>,

    //trend moving average period, in resampled bars
    #[arg(long)]
    ma_period: Option<usize>,

    //starting cash
    #[arg(long)]
    cash: Option<f64>,

    //fixed order size used by the sizer
    #[arg(long)]
    stake: Option<f64>,

    //commission per unit per side
    #[arg(long)]
    commission: Option<f64>,

    //how the bet size reaches the order (literal, quantity)
    #[arg(long)]
    bet_sizing: Option<String>,
}

impl Overrides {
    fn resolve(&self) -> Result<RunConfiguration> {
        let mut config = match &self.config {
            Some(path) => RunConfiguration::from_json_file(path)?,
            None => RunConfiguration::default(),
        };

        if let Some(data) = &self.data {
            config.feed.path = data.clone();
        }
        if let Some(from) = self.from {
            config.feed.from_date = Some(from);
        }
        if let Some(to) = self.to {
            config.feed.to_date = Some(to);
        }
        if let Some(period) = self.ma_period {
            config.strategy.ma_period = period;
        }
        if let Some(cash) = self.cash {
            config.broker.initial_cash = cash;
        }
        if let Some(stake) = self.stake {
            config.sizer.stake = stake;
        }
        if let Some(commission) = self.commission {
            config.broker.commission_per_unit = commission;
        }
        if let Some(sizing) = &self.bet_sizing {
            config.strategy.bet_sizing = BetSizing::parse(sizing)
                .ok_or_else(|| anyhow::anyhow!("Unknown bet sizing: {}", sizing))?;
        }

        Ok(config)
    }
}

fn parse_date_arg(s: &str) -> Result<NaiveDateTime, String> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M")
        .or_else(|_| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d").map(|d| d.and_time(chrono::NaiveTime::MIN))
        })
        .map_err(|e| format!("invalid date '{}': {}", s, e))
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose {
        "trendgale=debug"
    } else {
        "trendgale=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Run(args) => {
            let mut config = args.overrides.resolve()?;
            if args.output_equity_csv.is_some() {
                config.output.equity_csv = args.output_equity_csv;
            }
            if args.output_trades_csv.is_some() {
                config.output.trades_csv = args.output_trades_csv;
            }
            run_backtest(&config)?;
        }
        Commands::InitConfig { out } => {
            RunConfiguration::default().to_json_file(&out)?;
            println!("Default configuration written to {:?}", out);
        }
        Commands::Sweep { overrides, periods } => {
            let config = overrides.resolve()?;
            run_sweep(&config, &periods)?;
        }
    }

    Ok(())
}

fn load_bars(config: &RunConfiguration) -> Result<Vec<Bar>> {
    let path = &config.feed.path;
    println!("Loading data from {:?}...", path);

    let bars = load_csv(&config.feed).context(format!("Failed to load data from {:?}", path))?;

    let (first, last) = match (bars.first(), bars.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => anyhow::bail!("No bars in {:?} within the configured date window", path),
    };

    println!("Loaded {} bars for {}", bars.len(), config.feed.symbol);
    println!("Date range: {} to {}\n", first.timestamp, last.timestamp);

    Ok(bars)
}

fn run_backtest(config: &RunConfiguration) -> Result<()> {
    println!("Trendgale Martingale Backtester");
    println!("===============================\n");

    let bars = load_bars(config)?;

    let params = &config.strategy;
    println!(
        "Strategy: trend SMA({}) on {:?} x{} bars, close distance {}, starting bet {}, increment {}",
        params.ma_period,
        config.resample.timeframe,
        config.resample.compression,
        params.close_distance,
        params.starting_bet_size,
        params.bet_size_increment
    );
    println!("Bet sizing: {:?}, stake {}", params.bet_sizing, config.sizer.stake);
    println!(
        "Commission: {:.4} per unit, slippage: {:.4} per unit\n",
        config.broker.commission_per_unit, config.broker.slippage_per_unit
    );

    let mut strategy = TrendMartingaleStrategy::new(params.clone())?;
    let mut engine = BacktestEngine::new(config.backtest_config(), bars);

    println!("Starting Portfolio Value: {:.2}", config.broker.initial_cash);
    let result = engine.run(&mut strategy)?;
    println!("Final Portfolio Value: {:.2}\n", result.final_value);

    let state = strategy.unit().state();
    println!(
        "Final bet size: {}, starting bet size: {}",
        state.bet_size, state.starting_bet_size
    );
    println!("Trend bars: {}\n", result.trend_bar_count);

    println!("Backtest Results");
    println!("================\n");
    result.summary.pretty_print_table();

    if let Some(path) = &config.output.equity_csv {
        save_output(path, |p| save_equity_csv(&result.equity_curve, p))?;
        println!("\nEquity curve saved to {:?}", path);
    }

    if let Some(path) = &config.output.trades_csv {
        save_output(path, |p| save_trades_csv(&result.trades, p))?;
        println!("Trades saved to {:?}", path);
    }

    Ok(())
}

fn save_output<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&Path) -> Result<()>,
{
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .context(format!("Failed to create output directory {:?}", parent))?;
    }
    write(path)
}

fn run_sweep(config: &RunConfiguration, periods: &[usize]) -> Result<()> {
    let bars = load_bars(config)?;

    println!("Sweeping {} moving average periods...\n", periods.len());
    let rows = sweep_ma_periods(config, &bars, periods)?;
    sweep_table(&rows).printstd();

    Ok(())
}
