pub mod trend_martingale;

use crate::data::Bar;
use crate::engine::execution::{ExecutionEngine, OrderEvent, OrderId, OrderSide};
use crate::portfolio::{Account, ClosedTrade, Position};
use chrono::{DateTime, Utc};

pub use trend_martingale::{
    BetSizing, Decision, Direction, MartingaleParams, MartingaleUnit, Outcome, ParamError, Phase,
    PositionState, Trend, TrendMartingaleStrategy,
};

//strategy interface driven by the backtest engine
//callbacks arrive in this order on every bar: on_trend_bar, on_order, on_trade, on_bar
pub trait Strategy: Send {
    //called once before the first bar
    fn on_start(&mut self, _context: &mut StrategyContext) {}

    //called when the resampled feed completes a bar
    fn on_trend_bar(&mut self, _bar: &Bar) {}

    //called on each new bar
    fn on_bar(&mut self, context: &mut StrategyContext);

    //called for every order status change
    fn on_order(&mut self, _context: &mut StrategyContext, _event: &OrderEvent) {}

    //called when a position returns to flat (or reverses)
    fn on_trade(&mut self, _context: &mut StrategyContext, _trade: &ClosedTrade) {}

    //called once after the last bar
    fn on_end(&mut self, _context: &mut StrategyContext) {}

    //returns the strategy name
    fn name(&self) -> &str;
}

//order parameters left to the strategy; size defaults to the sizer stake
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OrderRequest {
    pub size: Option<f64>,
    pub price: Option<f64>,
}

//fixed stake sizer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedSize {
    pub stake: f64,
}

impl FixedSize {
    pub fn new(stake: f64) -> Self {
        FixedSize { stake }
    }
}

//view of the market and order port handed to the strategy for one callback
pub struct StrategyContext<'a> {
    symbol: &'a str,
    bars: &'a [Bar],
    trend_bars: &'a [Bar],
    execution: &'a mut ExecutionEngine,
    account: &'a Account,
    sizer: FixedSize,
}

impl<'a> StrategyContext<'a> {
    pub fn new(
        symbol: &'a str,
        bars: &'a [Bar],
        trend_bars: &'a [Bar],
        execution: &'a mut ExecutionEngine,
        account: &'a Account,
        sizer: FixedSize,
    ) -> Self {
        StrategyContext {
            symbol,
            bars,
            trend_bars,
            execution,
            account,
            sizer,
        }
    }

    pub fn symbol(&self) -> &str {
        self.symbol
    }

    //timestamp of the current bar, none before the first bar
    pub fn current_time(&self) -> Option<DateTime<Utc>> {
        self.bars.last().map(|b| b.timestamp)
    }

    //bar `ago` steps back, 0 being the current bar
    pub fn bar(&self, ago: isize) -> Option<&Bar> {
        if ago > 0 {
            return None;
        }
        let back = ago.unsigned_abs();
        self.bars
            .len()
            .checked_sub(back + 1)
            .map(|idx| &self.bars[idx])
    }

    //close `ago` steps back, 0 being the current bar
    pub fn close(&self, ago: isize) -> Option<f64> {
        self.bar(ago).map(|b| b.close)
    }

    //number of bars seen so far
    pub fn bar_count(&self) -> usize {
        self.bars.len()
    }

    //completed bars of the resampled feed
    pub fn trend_bars(&self) -> &[Bar] {
        self.trend_bars
    }

    //returns the current position for the strategy's symbol
    pub fn current_position(&self) -> Option<&Position> {
        self.account.get_position(self.symbol)
    }

    //signed position size, 0 when flat
    pub fn position_size(&self) -> f64 {
        self.account.position_size(self.symbol)
    }

    pub fn cash(&self) -> f64 {
        self.account.cash
    }

    pub fn equity(&self) -> f64 {
        self.account.equity
    }

    //submits a market buy
    pub fn buy(&mut self, request: OrderRequest) -> OrderId {
        self.submit(OrderSide::Buy, request, false)
    }

    //submits a market sell
    pub fn sell(&mut self, request: OrderRequest) -> OrderId {
        self.submit(OrderSide::Sell, request, false)
    }

    //submits an order that flattens the current position
    //returns none when already flat
    pub fn close_position(&mut self) -> Option<OrderId> {
        let size = self.position_size();
        let position = self.current_position()?;
        if position.is_flat() {
            return None;
        }

        let side = if size > 0.0 {
            OrderSide::Sell
        } else {
            OrderSide::Buy
        };
        let request = OrderRequest {
            size: Some(size.abs()),
            price: None,
        };
        Some(self.submit(side, request, true))
    }

    //cancels a pending order
    pub fn cancel(&mut self, order_id: OrderId) -> bool {
        self.execution.cancel(order_id)
    }

    fn submit(&mut self, side: OrderSide, request: OrderRequest, reduce_only: bool) -> OrderId {
        let timestamp = self.current_time().unwrap_or_else(Utc::now);
        let qty = request.size.unwrap_or(self.sizer.stake);
        self.execution
            .market_order(timestamp, self.symbol, qty, side, request.price, reduce_only)
    }
}
