//! Moving-average trend filter with martingale bet sizing.
//!
//! The decision logic lives in [`MartingaleUnit`], which knows nothing about
//! the engine: it is fed moving-average values, closes and order outcomes, and
//! answers with a [`Decision`]. [`TrendMartingaleStrategy`] wires the unit to
//! the engine's callbacks, owns the trend indicator and submits the orders.

use crate::data::Bar;
use crate::engine::execution::{OrderEvent, OrderId, OrderSide, OrderStatus};
use crate::indicator::SimpleMovingAverage;
use crate::portfolio::ClosedTrade;
use crate::strategy::{OrderRequest, Strategy, StrategyContext};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ParamError {
    #[error("Moving average period must be at least 1, got {0}")]
    InvalidPeriod(usize),
    #[error("Starting bet size must be positive and finite, got {0}")]
    InvalidBetSize(f64),
    #[error("Close distance must be non-negative and finite, got {0}")]
    InvalidDistance(f64),
    #[error("Bet size increment must be non-negative and finite, got {0}")]
    InvalidIncrement(f64),
}

/// How the current bet size reaches the order.
///
/// `LimitPriceField` reproduces the historical behaviour: the bet size is
/// written into the order's price field, which a market order ignores, and
/// the quantity comes from the fixed-stake sizer. `Quantity` sends the bet
/// size as the order quantity instead, which is what the sizing loop
/// appears to intend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BetSizing {
    #[default]
    LimitPriceField,
    Quantity,
}

impl BetSizing {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "literal" | "price" | "limit_price_field" => Some(BetSizing::LimitPriceField),
            "quantity" | "qty" => Some(BetSizing::Quantity),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MartingaleParams {
    //period of the trend sma, counted in resampled bars
    pub ma_period: usize,
    //price distance from entry that triggers a close
    pub close_distance: f64,
    pub starting_bet_size: f64,
    //added to the starting bet after every favorable close
    pub bet_size_increment: f64,
    pub bet_sizing: BetSizing,
}

impl Default for MartingaleParams {
    fn default() -> Self {
        MartingaleParams {
            ma_period: 200,
            close_distance: 0.015,
            starting_bet_size: 50.0,
            bet_size_increment: 24.0,
            bet_sizing: BetSizing::LimitPriceField,
        }
    }
}

impl MartingaleParams {
    pub fn validate(&self) -> Result<(), ParamError> {
        if self.ma_period == 0 {
            return Err(ParamError::InvalidPeriod(self.ma_period));
        }
        if !self.starting_bet_size.is_finite() || self.starting_bet_size <= 0.0 {
            return Err(ParamError::InvalidBetSize(self.starting_bet_size));
        }
        if !self.close_distance.is_finite() || self.close_distance < 0.0 {
            return Err(ParamError::InvalidDistance(self.close_distance));
        }
        if !self.bet_size_increment.is_finite() || self.bet_size_increment < 0.0 {
            return Err(ParamError::InvalidIncrement(self.bet_size_increment));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Long,
    Short,
    Flat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    Bullish,
    Bearish,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Flat,
    PendingOpen,
    Open,
    PendingClose,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Favorable,
    Unfavorable,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decision {
    //`price` is the bet size at the time of the decision
    Open { side: OrderSide, price: f64 },
    Close { outcome: Outcome },
}

//per-trade state owned by the unit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionState {
    pub direction: Direction,
    pub entry_price: Option<f64>,
    pub bet_size: f64,
    pub starting_bet_size: f64,
}

/// The trade-management state machine.
///
/// Phases cycle `Flat -> PendingOpen -> Open -> PendingClose -> Flat`. While
/// an order is pending, [`decide`](Self::decide) returns `None`. A failed open
/// falls back to `Flat` and a failed close falls back to `Open`. Bet-size
/// changes made when a close is triggered stay in place either way.
#[derive(Debug, Clone)]
pub struct MartingaleUnit {
    close_distance: f64,
    bet_size_increment: f64,
    state: PositionState,
    trend: Trend,
    phase: Phase,
}

impl MartingaleUnit {
    pub fn new(params: &MartingaleParams) -> Result<Self, ParamError> {
        params.validate()?;
        Ok(MartingaleUnit {
            close_distance: params.close_distance,
            bet_size_increment: params.bet_size_increment,
            state: PositionState {
                direction: Direction::Flat,
                entry_price: None,
                bet_size: params.starting_bet_size,
                starting_bet_size: params.starting_bet_size,
            },
            trend: Trend::Bearish,
            phase: Phase::Flat,
        })
    }

    pub fn state(&self) -> &PositionState {
        &self.state
    }

    pub fn trend(&self) -> Trend {
        self.trend
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.phase, Phase::PendingOpen | Phase::PendingClose)
    }

    //rising average is bullish, falling is bearish, flat or missing keeps the last reading
    pub fn update_trend(&mut self, current: Option<f64>, previous: Option<f64>) -> Trend {
        if let (Some(now), Some(prev)) = (current, previous) {
            if now > prev {
                self.trend = Trend::Bullish;
            } else if now < prev {
                self.trend = Trend::Bearish;
            }
        }
        self.trend
    }

    //evaluates one bar close
    pub fn decide(&mut self, close: f64) -> Option<Decision> {
        match self.phase {
            Phase::PendingOpen | Phase::PendingClose => None,
            Phase::Flat => {
                let (direction, side) = match self.trend {
                    Trend::Bullish => (Direction::Long, OrderSide::Buy),
                    Trend::Bearish => (Direction::Short, OrderSide::Sell),
                };
                self.state.direction = direction;
                self.state.entry_price = Some(close);
                self.phase = Phase::PendingOpen;
                Some(Decision::Open {
                    side,
                    price: self.state.bet_size,
                })
            }
            Phase::Open => {
                let entry = self.state.entry_price?;
                let outcome = self.classify(entry, close)?;

                match outcome {
                    Outcome::Favorable => {
                        self.state.bet_size = self.state.starting_bet_size;
                        self.state.starting_bet_size += self.bet_size_increment;
                    }
                    Outcome::Unfavorable => {
                        self.state.bet_size *= 2.0;
                    }
                }
                self.phase = Phase::PendingClose;
                Some(Decision::Close { outcome })
            }
        }
    }

    fn classify(&self, entry: f64, close: f64) -> Option<Outcome> {
        let d = self.close_distance;
        let above = entry < close - d;
        let below = entry > close + d;

        match self.state.direction {
            Direction::Long if above => Some(Outcome::Favorable),
            Direction::Long if below => Some(Outcome::Unfavorable),
            Direction::Short if below => Some(Outcome::Favorable),
            Direction::Short if above => Some(Outcome::Unfavorable),
            _ => None,
        }
    }

    //the pending order completed
    pub fn confirm_fill(&mut self) {
        match self.phase {
            Phase::PendingOpen => self.phase = Phase::Open,
            Phase::PendingClose => self.go_flat(),
            Phase::Flat | Phase::Open => {}
        }
    }

    //the pending order was cancelled, rejected or refused for margin
    pub fn order_failed(&mut self) {
        match self.phase {
            Phase::PendingOpen => self.go_flat(),
            Phase::PendingClose => self.phase = Phase::Open,
            Phase::Flat | Phase::Open => {}
        }
    }

    fn go_flat(&mut self) {
        self.phase = Phase::Flat;
        self.state.direction = Direction::Flat;
        self.state.entry_price = None;
    }
}

//engine-facing wrapper around the unit
pub struct TrendMartingaleStrategy {
    params: MartingaleParams,
    unit: MartingaleUnit,
    trend_ma: SimpleMovingAverage,
    pending: Option<OrderId>,
}

impl TrendMartingaleStrategy {
    pub fn new(params: MartingaleParams) -> Result<Self, ParamError> {
        let unit = MartingaleUnit::new(&params)?;
        let trend_ma = SimpleMovingAverage::new(params.ma_period);
        Ok(TrendMartingaleStrategy {
            params,
            unit,
            trend_ma,
            pending: None,
        })
    }

    pub fn unit(&self) -> &MartingaleUnit {
        &self.unit
    }

    pub fn trend_ma(&self) -> &SimpleMovingAverage {
        &self.trend_ma
    }

    pub fn pending_order(&self) -> Option<OrderId> {
        self.pending
    }

    fn log(context: &StrategyContext, txt: &str) {
        let date = context
            .current_time()
            .map(|t| t.date_naive().to_string())
            .unwrap_or_default();
        tracing::info!("{}, {}", date, txt);
    }

    fn order_request(&self, bet_size: f64) -> OrderRequest {
        match self.params.bet_sizing {
            BetSizing::LimitPriceField => OrderRequest {
                size: None,
                price: Some(bet_size),
            },
            BetSizing::Quantity => OrderRequest {
                size: Some(bet_size),
                price: None,
            },
        }
    }
}

impl Strategy for TrendMartingaleStrategy {
    fn on_trend_bar(&mut self, bar: &Bar) {
        self.trend_ma.push(bar.close);
    }

    fn on_bar(&mut self, context: &mut StrategyContext) {
        //no trading until the average has its first value
        if !self.trend_ma.is_ready() {
            return;
        }

        self.unit
            .update_trend(self.trend_ma.value(0), self.trend_ma.value(-1));

        //one order at a time
        if self.pending.is_some() {
            return;
        }

        let close = match context.close(0) {
            Some(c) => c,
            None => return,
        };

        match self.unit.decide(close) {
            Some(Decision::Open { side, price }) => {
                let request = self.order_request(price);
                let id = match side {
                    OrderSide::Buy => {
                        Self::log(context, &format!("BUY CREATE, {:.2}", close));
                        context.buy(request)
                    }
                    OrderSide::Sell => {
                        Self::log(context, &format!("SELL CREATE, {:.2}", close));
                        context.sell(request)
                    }
                };
                self.pending = Some(id);
            }
            Some(Decision::Close { outcome }) => {
                let state = self.unit.state();
                tracing::debug!(
                    ?outcome,
                    close,
                    entry = ?state.entry_price,
                    bet_size = state.bet_size,
                    starting_bet_size = state.starting_bet_size,
                    "closing position"
                );
                match context.close_position() {
                    Some(id) => self.pending = Some(id),
                    None => {
                        tracing::warn!("close triggered with no open position");
                        self.unit.confirm_fill();
                    }
                }
            }
            None => {}
        }
    }

    fn on_order(&mut self, context: &mut StrategyContext, event: &OrderEvent) {
        let order = &event.order;
        if order.status.is_alive() {
            return;
        }

        let ours = self.pending == Some(order.id);

        match order.status {
            OrderStatus::Completed => {
                if let Some(fill) = &event.fill {
                    let label = match fill.side {
                        OrderSide::Buy => "BUY",
                        OrderSide::Sell => "SELL",
                    };
                    Self::log(
                        context,
                        &format!(
                            "{} EXECUTED, Price: {:.2}, Cost: {:.2}, Comm {:.2}",
                            label,
                            fill.fill_price,
                            fill.notional_value(),
                            fill.fees
                        ),
                    );
                }
                if ours {
                    self.unit.confirm_fill();
                }
            }
            _ => {
                Self::log(context, "Order Canceled/Margin/Rejected");
                if ours {
                    self.unit.order_failed();
                }
            }
        }

        if ours {
            self.pending = None;
        }
    }

    fn on_trade(&mut self, context: &mut StrategyContext, trade: &ClosedTrade) {
        Self::log(
            context,
            &format!(
                "OPERATION PROFIT, GROSS {:.2}, NET {:.2}",
                trade.pnl, trade.pnl_net
            ),
        );
    }

    fn name(&self) -> &str {
        "Trend Martingale"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit() -> MartingaleUnit {
        MartingaleUnit::new(&MartingaleParams::default()).unwrap()
    }

    fn bullish_unit() -> MartingaleUnit {
        let mut u = unit();
        u.update_trend(Some(1.0), Some(0.9));
        u
    }

    //opens at `entry` and confirms the fill
    fn open_at(u: &mut MartingaleUnit, entry: f64) -> Decision {
        let decision = u.decide(entry).unwrap();
        u.confirm_fill();
        decision
    }

    #[test]
    fn test_trend_updates() {
        let mut u = unit();
        assert_eq!(u.trend(), Trend::Bearish);
        assert_eq!(u.update_trend(Some(2.0), Some(1.0)), Trend::Bullish);
        assert_eq!(u.update_trend(Some(2.0), Some(2.0)), Trend::Bullish);
        assert_eq!(u.update_trend(Some(2.0), None), Trend::Bullish);
        assert_eq!(u.update_trend(Some(1.0), Some(2.0)), Trend::Bearish);
        assert_eq!(u.update_trend(Some(1.0), Some(1.0)), Trend::Bearish);
    }

    #[test]
    fn test_bullish_flat_opens_long_at_bet_size() {
        let mut u = bullish_unit();
        let decision = u.decide(100.0).unwrap();

        assert_eq!(
            decision,
            Decision::Open {
                side: OrderSide::Buy,
                price: 50.0
            }
        );
        assert_eq!(u.phase(), Phase::PendingOpen);
        assert_eq!(u.state().direction, Direction::Long);
        assert_eq!(u.state().entry_price, Some(100.0));
    }

    #[test]
    fn test_bearish_flat_opens_short() {
        let mut u = unit();
        let decision = u.decide(100.0).unwrap();
        assert_eq!(
            decision,
            Decision::Open {
                side: OrderSide::Sell,
                price: 50.0
            }
        );
        assert_eq!(u.state().direction, Direction::Short);
    }

    #[test]
    fn test_long_favorable_close() {
        let mut u = bullish_unit();
        open_at(&mut u, 100.0);
        assert_eq!(u.phase(), Phase::Open);

        let decision = u.decide(100.02).unwrap();
        assert_eq!(
            decision,
            Decision::Close {
                outcome: Outcome::Favorable
            }
        );
        assert_eq!(u.state().bet_size, 50.0);
        assert_eq!(u.state().starting_bet_size, 74.0);
        assert_eq!(u.phase(), Phase::PendingClose);

        u.confirm_fill();
        assert_eq!(u.phase(), Phase::Flat);
        assert_eq!(u.state().direction, Direction::Flat);
        assert_eq!(u.state().entry_price, None);
    }

    #[test]
    fn test_long_unfavorable_close_doubles() {
        let mut u = bullish_unit();
        open_at(&mut u, 100.0);

        let decision = u.decide(99.98).unwrap();
        assert_eq!(
            decision,
            Decision::Close {
                outcome: Outcome::Unfavorable
            }
        );
        assert_eq!(u.state().bet_size, 100.0);
        assert_eq!(u.state().starting_bet_size, 50.0);
    }

    #[test]
    fn test_within_band_holds() {
        let mut u = bullish_unit();
        open_at(&mut u, 100.0);

        assert_eq!(u.decide(100.01), None);
        assert_eq!(u.decide(99.99), None);
        assert_eq!(u.phase(), Phase::Open);
        assert_eq!(u.state().bet_size, 50.0);
    }

    #[test]
    fn test_short_is_mirrored() {
        let mut u = unit();
        open_at(&mut u, 100.0);
        assert_eq!(
            u.decide(99.98),
            Some(Decision::Close {
                outcome: Outcome::Favorable
            })
        );
        u.confirm_fill();

        open_at(&mut u, 100.0);
        assert_eq!(
            u.decide(100.02),
            Some(Decision::Close {
                outcome: Outcome::Unfavorable
            })
        );
        assert_eq!(u.state().bet_size, 100.0);
        assert_eq!(u.state().starting_bet_size, 74.0);
    }

    #[test]
    fn test_pending_suppresses_decisions() {
        let mut u = bullish_unit();
        u.decide(100.0).unwrap();
        for close in [90.0, 100.0, 110.0] {
            assert_eq!(u.decide(close), None);
        }
        assert_eq!(u.state().entry_price, Some(100.0));

        u.confirm_fill();
        u.decide(110.0).unwrap();
        assert_eq!(u.decide(80.0), None);
    }

    #[test]
    fn test_failed_open_returns_to_flat() {
        let mut u = bullish_unit();
        u.decide(100.0).unwrap();
        u.order_failed();

        assert_eq!(u.phase(), Phase::Flat);
        assert_eq!(u.state().direction, Direction::Flat);
        assert!(u.decide(101.0).is_some());
    }

    #[test]
    fn test_failed_close_keeps_position_and_sizing() {
        let mut u = bullish_unit();
        open_at(&mut u, 100.0);
        u.decide(99.0).unwrap();
        u.order_failed();

        assert_eq!(u.phase(), Phase::Open);
        assert_eq!(u.state().direction, Direction::Long);
        assert_eq!(u.state().bet_size, 100.0);
    }

    #[test]
    fn test_loss_streak_then_win() {
        let mut u = bullish_unit();
        for expected in [100.0, 200.0, 400.0] {
            open_at(&mut u, 100.0);
            u.decide(99.0).unwrap();
            u.confirm_fill();
            assert_eq!(u.state().bet_size, expected);
        }

        let opened = open_at(&mut u, 100.0);
        assert_eq!(
            opened,
            Decision::Open {
                side: OrderSide::Buy,
                price: 400.0
            }
        );
        u.decide(101.0).unwrap();
        assert_eq!(u.state().bet_size, 50.0);
        assert_eq!(u.state().starting_bet_size, 74.0);
    }

    #[test]
    fn test_param_validation() {
        let bad = MartingaleParams {
            starting_bet_size: 0.0,
            ..MartingaleParams::default()
        };
        assert_eq!(
            MartingaleUnit::new(&bad).unwrap_err(),
            ParamError::InvalidBetSize(0.0)
        );

        let bad = MartingaleParams {
            ma_period: 0,
            ..MartingaleParams::default()
        };
        assert!(TrendMartingaleStrategy::new(bad).is_err());
    }

    #[test]
    fn test_bet_sizing_parse() {
        assert_eq!(BetSizing::parse("literal"), Some(BetSizing::LimitPriceField));
        assert_eq!(BetSizing::parse("Quantity"), Some(BetSizing::Quantity));
        assert_eq!(BetSizing::parse("kelly"), None);
    }
}
