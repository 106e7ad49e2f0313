use crate::engine::execution::Fill;
use crate::portfolio::position::{ClosedTrade, Position};
use indexmap::IndexMap;

//represents a trading account with positions and cash
#[derive(Debug, Clone)]
pub struct Account {
    //initial account balance
    pub initial_balance: f64,

    //current cash (includes realized pnl, subtracts fees)
    pub cash: f64,

    //current total equity (cash + unrealized pnl)
    pub equity: f64,

    //cash tied up in open positions at entry prices
    pub margin_used: f64,

    //positions by symbol, in the order they were first traded
    pub positions: IndexMap<String, Position>,

    //last known price by symbol
    marks: IndexMap<String, f64>,

    //complete fill log
    pub trade_log: Vec<Fill>,

    //completed round trips
    pub closed_trades: Vec<ClosedTrade>,
}

impl Account {
    pub fn new(initial_balance: f64) -> Self {
        Account {
            initial_balance,
            cash: initial_balance,
            equity: initial_balance,
            margin_used: 0.0,
            positions: IndexMap::new(),
            marks: IndexMap::new(),
            trade_log: Vec::new(),
            closed_trades: Vec::new(),
        }
    }

    //processes a fill and updates the account
    //returns the trade the fill closed, if any
    pub fn process_fill(&mut self, fill: Fill) -> Option<ClosedTrade> {
        self.cash -= fill.fees;

        let position = self
            .positions
            .entry(fill.symbol.clone())
            .or_insert_with(|| Position::new(fill.symbol.clone()));

        let (realized_pnl, closed) = position.update_with_fill(&fill);
        self.cash += realized_pnl;

        self.update_margin_used();
        self.trade_log.push(fill);

        if let Some(trade) = &closed {
            self.closed_trades.push(trade.clone());
        }

        self.recompute_equity();
        closed
    }

    //records the latest price for a symbol and revalues the account
    pub fn mark(&mut self, symbol: &str, price: f64) {
        self.marks.insert(symbol.to_string(), price);
        self.recompute_equity();
    }

    fn recompute_equity(&mut self) {
        let unrealized: f64 = self
            .positions
            .iter()
            .filter_map(|(symbol, position)| {
                self.marks
                    .get(symbol)
                    .map(|&price| position.unrealized_pnl(price))
            })
            .sum();

        self.equity = self.cash + unrealized;
    }

    fn update_margin_used(&mut self) {
        self.margin_used = self
            .positions
            .values()
            .filter(|p| !p.is_flat())
            .map(|p| p.notional_at_entry())
            .sum();
    }

    //returns the position for a symbol, or none if never traded
    pub fn get_position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    //signed position size, 0 when flat or never traded
    pub fn position_size(&self, symbol: &str) -> f64 {
        self.get_position(symbol).map(|p| p.net_qty).unwrap_or(0.0)
    }

    //returns available buying power (cash - margin_used)
    pub fn buying_power(&self) -> f64 {
        self.cash - self.margin_used
    }

    //returns total realized pnl across all positions
    pub fn total_realized_pnl(&self) -> f64 {
        self.positions.values().map(|p| p.realized_pnl).sum()
    }

    //returns the total return as a fraction
    pub fn total_return(&self) -> f64 {
        (self.equity - self.initial_balance) / self.initial_balance
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::execution::OrderSide;
    use chrono::Utc;

    fn fill(qty: f64, price: f64, fees: f64) -> Fill {
        Fill {
            id: 1,
            order_id: 1,
            timestamp: Utc::now(),
            symbol: "EURUSD".to_string(),
            qty,
            side: if qty > 0.0 {
                OrderSide::Buy
            } else {
                OrderSide::Sell
            },
            fill_price: price,
            fees,
        }
    }

    #[test]
    fn test_fill_updates_cash_and_margin() {
        let mut account = Account::new(1_000.0);
        assert!(account.process_fill(fill(100.0, 2.0, 1.0)).is_none());

        assert_eq!(account.cash, 999.0);
        assert_eq!(account.margin_used, 200.0);
        assert_eq!(account.buying_power(), 799.0);
        assert_eq!(account.position_size("EURUSD"), 100.0);
    }

    #[test]
    fn test_mark_to_market() {
        let mut account = Account::new(1_000.0);
        account.process_fill(fill(-100.0, 2.0, 0.0));
        account.mark("EURUSD", 1.5);
        assert!((account.equity - 1_050.0).abs() < 1e-9);
        assert!((account.total_return() - 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_close_realizes_pnl() {
        let mut account = Account::new(1_000.0);
        account.process_fill(fill(100.0, 2.0, 1.0));
        let closed = account.process_fill(fill(-100.0, 2.5, 1.0)).unwrap();

        assert!((closed.pnl - 50.0).abs() < 1e-9);
        assert!((closed.pnl_net - 48.0).abs() < 1e-9);
        assert!((account.cash - 1_048.0).abs() < 1e-9);
        assert_eq!(account.margin_used, 0.0);
        assert_eq!(account.closed_trades.len(), 1);
        assert_eq!(account.trade_log.len(), 2);
        assert!((account.total_realized_pnl() - 50.0).abs() < 1e-9);
        assert_eq!(account.position_size("EURUSD"), 0.0);
    }
}
