//! In-memory gateway for tests.
//!
//! Orders fill at the requested price unless an outcome was scripted with
//! [`MockGateway::push_outcome`]. Fills move the simulated position, so a
//! close after an open leaves the venue flat.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;
use rust_decimal::Decimal;
use sigbot_core::{AssetSpec, Price, Size};

use crate::error::{ExchangeError, ExchangeResult};
use crate::gateway::{
    AccountValue, BoxFuture, ExchangeGateway, Fill, LivePosition, OrderOutcome, OrderRequest,
};

/// Size decimals used for symbols without an explicit spec.
pub const MOCK_DEFAULT_SZ_DECIMALS: u32 = 4;

#[derive(Debug)]
pub struct MockGateway {
    prices: Mutex<HashMap<String, Price>>,
    positions: Mutex<HashMap<String, Size>>,
    specs: Mutex<HashMap<String, AssetSpec>>,
    account: Mutex<Option<AccountValue>>,
    scripted: Mutex<VecDeque<OrderOutcome>>,
    orders: Mutex<Vec<OrderRequest>>,
    positions_failing: AtomicBool,
    next_oid: AtomicU64,
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGateway {
    /// Empty venue with a $1000 account.
    pub fn new() -> Self {
        Self {
            prices: Mutex::new(HashMap::new()),
            positions: Mutex::new(HashMap::new()),
            specs: Mutex::new(HashMap::new()),
            account: Mutex::new(Some(AccountValue {
                total_value: Decimal::from(1000),
                withdrawable: Decimal::from(1000),
            })),
            scripted: Mutex::new(VecDeque::new()),
            orders: Mutex::new(Vec::new()),
            positions_failing: AtomicBool::new(false),
            next_oid: AtomicU64::new(1),
        }
    }

    pub fn set_price(&self, symbol: &str, price: Decimal) {
        self.prices.lock().insert(symbol.to_string(), Price::new(price));
    }

    pub fn clear_price(&self, symbol: &str) {
        self.prices.lock().remove(symbol);
    }

    /// Set the signed live position (negative = short, zero = flat).
    pub fn set_position(&self, symbol: &str, size: Decimal) {
        let mut positions = self.positions.lock();
        if size.is_zero() {
            positions.remove(symbol);
        } else {
            positions.insert(symbol.to_string(), Size::new(size));
        }
    }

    pub fn position_size(&self, symbol: &str) -> Decimal {
        self.positions
            .lock()
            .get(symbol)
            .map(|s| s.inner())
            .unwrap_or(Decimal::ZERO)
    }

    pub fn set_spec(&self, symbol: &str, asset_id: u32, sz_decimals: u32) {
        self.specs
            .lock()
            .insert(symbol.to_string(), AssetSpec::new(symbol, asset_id, sz_decimals));
    }

    pub fn set_account_value(&self, total_value: Decimal, withdrawable: Decimal) {
        *self.account.lock() = Some(AccountValue {
            total_value,
            withdrawable,
        });
    }

    /// Make account queries fail.
    pub fn fail_account(&self) {
        *self.account.lock() = None;
    }

    /// Make position queries fail (transport error).
    pub fn set_positions_failing(&self, failing: bool) {
        self.positions_failing.store(failing, Ordering::SeqCst);
    }

    /// Queue an outcome for the next order.
    pub fn push_outcome(&self, outcome: OrderOutcome) {
        self.scripted.lock().push_back(outcome);
    }

    /// Queue `n` rejections.
    pub fn push_rejections(&self, n: usize) {
        let mut scripted = self.scripted.lock();
        for i in 0..n {
            scripted.push_back(OrderOutcome::Rejected(format!("scripted rejection {i}")));
        }
    }

    /// Orders placed so far.
    pub fn orders(&self) -> Vec<OrderRequest> {
        self.orders.lock().clone()
    }

    pub fn order_count(&self) -> usize {
        self.orders.lock().len()
    }

    fn apply_fill(&self, request: &OrderRequest, fill: &Fill) {
        let delta = if request.is_buy {
            fill.filled_size.inner()
        } else {
            -fill.filled_size.inner()
        };
        let current = self.position_size(&request.symbol);
        self.set_position(&request.symbol, current + delta);
    }

    fn spec_for(&self, symbol: &str) -> AssetSpec {
        let mut specs = self.specs.lock();
        let next_id = specs.len() as u32;
        specs
            .entry(symbol.to_string())
            .or_insert_with(|| AssetSpec::new(symbol, next_id, MOCK_DEFAULT_SZ_DECIMALS))
            .clone()
    }
}

impl ExchangeGateway for MockGateway {
    fn current_price<'a>(&'a self, symbol: &'a str) -> BoxFuture<'a, Option<Price>> {
        Box::pin(async move { self.prices.lock().get(symbol).copied() })
    }

    fn position<'a>(
        &'a self,
        symbol: &'a str,
    ) -> BoxFuture<'a, ExchangeResult<Option<LivePosition>>> {
        Box::pin(async move {
            if self.positions_failing.load(Ordering::SeqCst) {
                return Err(ExchangeError::HttpClient("mock position query failure".into()));
            }
            Ok(self.positions.lock().get(symbol).map(|size| LivePosition {
                symbol: symbol.to_string(),
                size: *size,
                entry_price: None,
            }))
        })
    }

    fn positions(&self) -> BoxFuture<'_, ExchangeResult<Vec<LivePosition>>> {
        Box::pin(async move {
            if self.positions_failing.load(Ordering::SeqCst) {
                return Err(ExchangeError::HttpClient("mock position query failure".into()));
            }
            let mut positions: Vec<LivePosition> = self
                .positions
                .lock()
                .iter()
                .map(|(symbol, size)| LivePosition {
                    symbol: symbol.clone(),
                    size: *size,
                    entry_price: None,
                })
                .collect();
            positions.sort_by(|a, b| a.symbol.cmp(&b.symbol));
            Ok(positions)
        })
    }

    fn place_order(&self, request: OrderRequest) -> BoxFuture<'_, OrderOutcome> {
        Box::pin(async move {
            self.orders.lock().push(request.clone());

            let scripted = self.scripted.lock().pop_front();
            let outcome = scripted.unwrap_or_else(|| {
                OrderOutcome::Filled(Fill {
                    order_id: self.next_oid.fetch_add(1, Ordering::SeqCst),
                    avg_price: request.price,
                    filled_size: request.size,
                })
            });

            if let OrderOutcome::Filled(fill) = &outcome {
                self.apply_fill(&request, fill);
            }
            outcome
        })
    }

    fn account_value(&self) -> BoxFuture<'_, ExchangeResult<AccountValue>> {
        Box::pin(async move {
            (*self.account.lock())
                .ok_or_else(|| ExchangeError::Api("mock account query failure".into()))
        })
    }

    fn asset_spec<'a>(&'a self, symbol: &'a str) -> BoxFuture<'a, ExchangeResult<AssetSpec>> {
        Box::pin(async move { Ok(self.spec_for(symbol)) })
    }
}
