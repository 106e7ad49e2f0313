use crate::engine::execution::Fill;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const QTY_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionSide {
    Long,
    Short,
}

//a round trip from flat back to flat (or through a reversal)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClosedTrade {
    pub symbol: String,
    pub side: PositionSide,
    pub size: f64,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub entry_price: f64,
    pub exit_price: f64,
    //gross pnl
    pub pnl: f64,
    //pnl after commission and slippage
    pub pnl_net: f64,
}

//represents the open position in one symbol
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,

    //net quantity (positive for long, negative for short, 0 for flat)
    pub net_qty: f64,

    //average entry price
    pub avg_entry_price: f64,

    //realized pnl from closed trades
    pub realized_pnl: f64,

    //bookkeeping for the trade currently open
    opened_at: Option<DateTime<Utc>>,
    trade_pnl: f64,
    trade_fees: f64,
    peak_qty: f64,
}

impl Position {
    //creates a new flat position
    pub fn new(symbol: String) -> Self {
        Position {
            symbol,
            net_qty: 0.0,
            avg_entry_price: 0.0,
            realized_pnl: 0.0,
            opened_at: None,
            trade_pnl: 0.0,
            trade_fees: 0.0,
            peak_qty: 0.0,
        }
    }

    //calculates unrealized pnl at a given price
    pub fn unrealized_pnl(&self, current_price: f64) -> f64 {
        if self.is_flat() {
            return 0.0;
        }
        (current_price - self.avg_entry_price) * self.net_qty
    }

    pub fn is_flat(&self) -> bool {
        self.net_qty.abs() < QTY_EPSILON
    }

    pub fn is_long(&self) -> bool {
        self.net_qty >= QTY_EPSILON
    }

    pub fn is_short(&self) -> bool {
        self.net_qty <= -QTY_EPSILON
    }

    //cash tied up at entry prices
    pub fn notional_at_entry(&self) -> f64 {
        self.net_qty.abs() * self.avg_entry_price
    }

    //applies a fill, returns the realized pnl and the trade it closed, if any
    pub fn update_with_fill(&mut self, fill: &Fill) -> (f64, Option<ClosedTrade>) {
        if self.is_flat() {
            self.open_trade(fill.qty, fill.fill_price, fill.timestamp, fill.fees);
            return (0.0, None);
        }

        let same_direction = (self.net_qty > 0.0) == (fill.qty > 0.0);

        if same_direction {
            //adding to position - update average entry price
            let total_qty = self.net_qty + fill.qty;
            let total_cost = self.avg_entry_price * self.net_qty + fill.fill_price * fill.qty;
            self.avg_entry_price = total_cost / total_qty;
            self.net_qty = total_qty;
            self.trade_fees += fill.fees;
            self.peak_qty = self.peak_qty.max(total_qty.abs());
            return (0.0, None);
        }

        //reducing or reversing position
        let close_qty = fill.qty.abs().min(self.net_qty.abs());
        let price_diff = if self.net_qty > 0.0 {
            fill.fill_price - self.avg_entry_price
        } else {
            self.avg_entry_price - fill.fill_price
        };

        let realized = price_diff * close_qty;
        self.realized_pnl += realized;
        self.trade_pnl += realized;
        self.trade_fees += fill.fees;

        let previous_qty = self.net_qty;
        self.net_qty += fill.qty;
        if self.net_qty.abs() < QTY_EPSILON {
            self.net_qty = 0.0;
        }

        let reversed = !self.is_flat() && (self.net_qty > 0.0) != (previous_qty > 0.0);

        if !self.is_flat() && !reversed {
            return (realized, None);
        }

        let closed = ClosedTrade {
            symbol: self.symbol.clone(),
            side: if previous_qty > 0.0 {
                PositionSide::Long
            } else {
                PositionSide::Short
            },
            size: self.peak_qty,
            entry_time: self.opened_at.unwrap_or(fill.timestamp),
            exit_time: fill.timestamp,
            entry_price: self.avg_entry_price,
            exit_price: fill.fill_price,
            pnl: self.trade_pnl,
            pnl_net: self.trade_pnl - self.trade_fees,
        };

        if reversed {
            let remaining = self.net_qty;
            self.open_trade(remaining, fill.fill_price, fill.timestamp, 0.0);
        } else {
            self.avg_entry_price = 0.0;
            self.opened_at = None;
            self.trade_pnl = 0.0;
            self.trade_fees = 0.0;
            self.peak_qty = 0.0;
        }

        (realized, Some(closed))
    }

    fn open_trade(&mut self, qty: f64, price: f64, timestamp: DateTime<Utc>, fees: f64) {
        self.net_qty = qty;
        self.avg_entry_price = price;
        self.opened_at = Some(timestamp);
        self.trade_pnl = 0.0;
        self.trade_fees = fees;
        self.peak_qty = qty.abs();
    }
}
