//! Link trade code allocation.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::PoisonError;

use rand::Rng;

use crate::config::TradeSettings;
use crate::queue::RequesterId;

pub struct TradeCodeBook {
    min: u32,
    max: u32,
    store: bool,
    issued: Mutex<HashMap<RequesterId, u32>>,
}

impl TradeCodeBook {
    pub fn new(settings: &TradeSettings) -> Self {
        Self {
            min: settings.min_trade_code,
            max: settings.max_trade_code.max(settings.min_trade_code),
            store: settings.store_trade_codes,
            issued: Mutex::new(HashMap::new()),
        }
    }

    /// Code for `requester`: the remembered one when codes are stored,
    /// otherwise a fresh random code in range.
    pub fn code_for(&self, requester: RequesterId) -> u32 {
        if !self.store {
            return self.random_code();
        }
        let mut issued = self.issued.lock().unwrap_or_else(PoisonError::into_inner);
        *issued
            .entry(requester)
            .or_insert_with(|| self.random_code())
    }

    fn random_code(&self) -> u32 {
        rand::rng().random_range(self.min..=self.max)
    }
}
