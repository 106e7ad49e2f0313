use crate::data::{Bar, ResampleConfig, ResampleError, Resampler};
use crate::engine::execution::{ExecutionEngine, Fill};
use crate::metrics::{calculate_equity_curve, EquityPoint, SummaryMetrics};
use crate::portfolio::{Account, ClosedTrade};
use crate::strategy::{FixedSize, Strategy, StrategyContext};
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BacktestError {
    #[error("No bars to run the backtest on")]
    NoData,
    #[error(transparent)]
    Resample(#[from] ResampleError),
}

//result of a backtest
#[derive(Debug, Clone)]
pub struct BacktestResult {
    pub strategy: String,
    pub starting_value: f64,
    pub final_value: f64,
    pub summary: SummaryMetrics,
    pub equity_curve: Vec<EquityPoint>,
    pub fills: Vec<Fill>,
    pub trades: Vec<ClosedTrade>,
    //bars produced by the resampled feed
    pub trend_bar_count: usize,
}

//configuration for a backtest
#[derive(Debug, Clone)]
pub struct BacktestConfig {
    pub symbol: String,
    pub initial_balance: f64,
    pub commission_per_unit: f64,
    pub slippage_per_unit: f64,
    pub stake: f64,
    pub resample: ResampleConfig,
    pub periods_per_year: f64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            symbol: "EURUSD".to_string(),
            initial_balance: 1_000_000_000.0,
            commission_per_unit: 0.0,
            slippage_per_unit: 0.0,
            stake: 10.0,
            resample: ResampleConfig::default(),
            periods_per_year: 6_240.0,
        }
    }
}

//main backtest engine
pub struct BacktestEngine {
    config: BacktestConfig,
    bars: Vec<Bar>,
    account: Account,
    execution: ExecutionEngine,
    equity_history: Vec<(DateTime<Utc>, f64)>,
}

impl BacktestEngine {
    pub fn new(config: BacktestConfig, bars: Vec<Bar>) -> Self {
        let account = Account::new(config.initial_balance);
        let execution = ExecutionEngine::new(config.commission_per_unit, config.slippage_per_unit);

        BacktestEngine {
            config,
            bars,
            account,
            execution,
            equity_history: Vec::new(),
        }
    }

    //runs the backtest with the given strategy
    //on every bar: fill orders from the previous bar at this open, mark to the close,
    //advance the resampled feed, deliver notifications, then ask the strategy
    pub fn run(&mut self, strategy: &mut dyn Strategy) -> Result<BacktestResult, BacktestError> {
        if self.bars.is_empty() {
            return Err(BacktestError::NoData);
        }

        let mut resampler = Resampler::new(self.config.resample)?;
        let mut trend_bars: Vec<Bar> = Vec::new();
        let sizer = FixedSize::new(self.config.stake);
        let symbol = self.config.symbol.as_str();
        let bars = self.bars.as_slice();

        self.account = Account::new(self.config.initial_balance);
        self.execution =
            ExecutionEngine::new(self.config.commission_per_unit, self.config.slippage_per_unit);
        self.equity_history = Vec::with_capacity(bars.len());

        tracing::debug!(value = self.account.equity, bars = bars.len(), "starting backtest");

        {
            let mut context = StrategyContext::new(
                symbol,
                &bars[..0],
                &trend_bars,
                &mut self.execution,
                &self.account,
                sizer,
            );
            strategy.on_start(&mut context);
        }

        let mut bars_in_market = 0usize;

        for (i, bar) in bars.iter().enumerate() {
            let history = &bars[..=i];

            let fills = self.execution.process_orders(bar, &self.account);
            let mut closed_trades = Vec::new();
            for fill in fills {
                if let Some(trade) = self.account.process_fill(fill) {
                    closed_trades.push(trade);
                }
            }
            self.account.mark(symbol, bar.close);

            if let Some(completed) = resampler.push(bar) {
                strategy.on_trend_bar(&completed);
                trend_bars.push(completed);
            }

            for event in self.execution.take_notifications() {
                let mut context = StrategyContext::new(
                    symbol,
                    history,
                    &trend_bars,
                    &mut self.execution,
                    &self.account,
                    sizer,
                );
                strategy.on_order(&mut context, &event);
            }

            for trade in &closed_trades {
                let mut context = StrategyContext::new(
                    symbol,
                    history,
                    &trend_bars,
                    &mut self.execution,
                    &self.account,
                    sizer,
                );
                strategy.on_trade(&mut context, trade);
            }

            {
                let mut context = StrategyContext::new(
                    symbol,
                    history,
                    &trend_bars,
                    &mut self.execution,
                    &self.account,
                    sizer,
                );
                strategy.on_bar(&mut context);
            }

            if self.account.position_size(symbol) != 0.0 {
                bars_in_market += 1;
            }
            self.equity_history.push((bar.timestamp, self.account.equity));
        }

        //orders placed on the last bar have no next open to fill at
        let unfilled = self.execution.pending_order_count();
        if unfilled > 0 {
            tracing::debug!(unfilled, "cancelling orders left at end of data");
        }
        self.execution.cancel_all_orders();

        for event in self.execution.take_notifications() {
            let mut context = StrategyContext::new(
                symbol,
                bars,
                &trend_bars,
                &mut self.execution,
                &self.account,
                sizer,
            );
            strategy.on_order(&mut context, &event);
        }

        {
            let mut context = StrategyContext::new(
                symbol,
                bars,
                &trend_bars,
                &mut self.execution,
                &self.account,
                sizer,
            );
            strategy.on_end(&mut context);
        }
        //anything submitted from on_end can never fill
        self.execution.cancel_all_orders();
        self.execution.take_notifications();

        tracing::debug!(value = self.account.equity, "backtest finished");

        let exposure = bars_in_market as f64 / bars.len() as f64;
        Ok(self.build_result(strategy.name(), exposure, trend_bars.len()))
    }

    fn build_result(&self, strategy: &str, exposure: f64, trend_bar_count: usize) -> BacktestResult {
        let timestamps: Vec<_> = self.equity_history.iter().map(|(t, _)| *t).collect();
        let equity_values: Vec<_> = self.equity_history.iter().map(|(_, e)| *e).collect();

        let equity_curve =
            calculate_equity_curve(&timestamps, &equity_values, self.config.initial_balance);

        let trades = self.account.closed_trades.clone();

        let summary = SummaryMetrics::from_backtest(
            &equity_curve,
            &trades,
            self.config.initial_balance,
            exposure,
            self.config.periods_per_year,
        );

        BacktestResult {
            strategy: strategy.to_string(),
            starting_value: self.config.initial_balance,
            final_value: self.account.equity,
            summary,
            equity_curve,
            fills: self.account.trade_log.clone(),
            trades,
            trend_bar_count,
        }
    }

    //returns a reference to the account
    pub fn account(&self) -> &Account {
        &self.account
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }
}
