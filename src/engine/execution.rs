use crate::data::Bar;
use crate::portfolio::Account;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type OrderId = u64;

//order side (buy or sell)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    //converts to quantity sign (Buy = +1, Sell = -1)
    pub fn to_qty_sign(&self) -> f64 {
        match self {
            OrderSide::Buy => 1.0,
            OrderSide::Sell => -1.0,
        }
    }
}

//lifecycle of an order as reported to the strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Submitted,
    Accepted,
    Completed,
    Canceled,
    Margin,
    Rejected,
}

impl OrderStatus {
    //true while the order can still be filled
    pub fn is_alive(&self) -> bool {
        matches!(self, OrderStatus::Submitted | OrderStatus::Accepted)
    }

    //true for the terminal states that did not fill
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            OrderStatus::Canceled | OrderStatus::Margin | OrderStatus::Rejected
        )
    }
}

//a market order, filled at the open of the bar after submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub created_at: DateTime<Utc>,
    pub symbol: String,
    pub qty: f64,
    pub side: OrderSide,
    //carried for reporting, market orders never match on it
    pub requested_price: Option<f64>,
    //closing orders skip the margin check
    pub reduce_only: bool,
    pub status: OrderStatus,
}

impl Order {
    //returns the signed quantity (positive for buy, negative for sell)
    pub fn signed_qty(&self) -> f64 {
        self.qty * self.side.to_qty_sign()
    }
}

//represents a filled order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fill {
    pub id: u64,
    pub order_id: OrderId,
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub qty: f64, //signed: positive for buy, negative for sell
    pub side: OrderSide,
    pub fill_price: f64,
    pub fees: f64, //commission + slippage
}

impl Fill {
    pub fn from_order(
        fill_id: u64,
        order: &Order,
        timestamp: DateTime<Utc>,
        fill_price: f64,
        fees: f64,
    ) -> Self {
        Fill {
            id: fill_id,
            order_id: order.id,
            timestamp,
            symbol: order.symbol.clone(),
            qty: order.signed_qty(),
            side: order.side,
            fill_price,
            fees,
        }
    }

    //returns the notional value of the fill
    pub fn notional_value(&self) -> f64 {
        self.fill_price * self.qty.abs()
    }
}

//status change delivered to the strategy
#[derive(Debug, Clone)]
pub struct OrderEvent {
    pub order: Order,
    pub fill: Option<Fill>,
}

impl OrderEvent {
    pub fn status(&self) -> OrderStatus {
        self.order.status
    }
}

//simulates order execution and queues notifications for the strategy
pub struct ExecutionEngine {
    next_order_id: OrderId,
    next_fill_id: u64,
    commission_per_unit: f64,
    slippage_per_unit: f64,
    pending_orders: Vec<Order>,
    notifications: Vec<OrderEvent>,
}

impl ExecutionEngine {
    pub fn new(commission_per_unit: f64, slippage_per_unit: f64) -> Self {
        ExecutionEngine {
            next_order_id: 1,
            next_fill_id: 1,
            commission_per_unit,
            slippage_per_unit,
            pending_orders: Vec::new(),
            notifications: Vec::new(),
        }
    }

    //creates and submits a market order, returns its id
    //orders with a non-positive or non-finite size are rejected immediately
    pub fn market_order(
        &mut self,
        timestamp: DateTime<Utc>,
        symbol: &str,
        qty: f64,
        side: OrderSide,
        requested_price: Option<f64>,
        reduce_only: bool,
    ) -> OrderId {
        let id = self.next_order_id;
        self.next_order_id += 1;

        let mut order = Order {
            id,
            created_at: timestamp,
            symbol: symbol.to_string(),
            qty,
            side,
            requested_price,
            reduce_only,
            status: OrderStatus::Submitted,
        };
        self.notify(&order, None);

        if !qty.is_finite() || qty <= 0.0 {
            tracing::debug!(order_id = id, qty, "rejecting order with invalid size");
            order.status = OrderStatus::Rejected;
            self.notify(&order, None);
            return id;
        }

        self.pending_orders.push(order);
        id
    }

    //matches pending orders at the open of `bar` and returns the fills
    //opening orders whose notional exceeds the account's buying power are refused with Margin
    pub fn process_orders(&mut self, bar: &Bar, account: &Account) -> Vec<Fill> {
        let mut fills = Vec::new();
        let mut available = account.buying_power();
        let orders: Vec<Order> = self.pending_orders.drain(..).collect();

        for mut order in orders {
            order.status = OrderStatus::Accepted;
            self.notify(&order, None);

            let fill_price = bar.open;
            let fees = (self.commission_per_unit + self.slippage_per_unit) * order.qty;

            if !order.reduce_only {
                let required = fill_price * order.qty + fees;
                if required > available {
                    tracing::debug!(
                        order_id = order.id,
                        required,
                        available,
                        "insufficient buying power"
                    );
                    order.status = OrderStatus::Margin;
                    self.notify(&order, None);
                    continue;
                }
                available -= required;
            }

            let fill = Fill::from_order(self.next_fill_id, &order, bar.timestamp, fill_price, fees);
            self.next_fill_id += 1;

            order.status = OrderStatus::Completed;
            self.notify(&order, Some(fill.clone()));
            fills.push(fill);
        }

        fills
    }

    //cancels one pending order, returns false if it was not pending
    pub fn cancel(&mut self, order_id: OrderId) -> bool {
        match self.pending_orders.iter().position(|o| o.id == order_id) {
            Some(idx) => {
                let mut order = self.pending_orders.remove(idx);
                order.status = OrderStatus::Canceled;
                self.notify(&order, None);
                true
            }
            None => false,
        }
    }

    //cancels all pending orders
    pub fn cancel_all_orders(&mut self) {
        let orders: Vec<Order> = self.pending_orders.drain(..).collect();
        for mut order in orders {
            order.status = OrderStatus::Canceled;
            self.notify(&order, None);
        }
    }

    //returns queued notifications, oldest first
    pub fn take_notifications(&mut self) -> Vec<OrderEvent> {
        std::mem::take(&mut self.notifications)
    }

    //returns the number of pending orders
    pub fn pending_order_count(&self) -> usize {
        self.pending_orders.len()
    }

    fn notify(&mut self, order: &Order, fill: Option<Fill>) {
        self.notifications.push(OrderEvent {
            order: order.clone(),
            fill,
        });
    }
}

impl Default for ExecutionEngine {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}
