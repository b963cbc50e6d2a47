use crate::db::Database;
use rand::Rng;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use thiserror::Error;

const WORK_MIN: i64 = 10;
const WORK_MAX: i64 = 100;

#[derive(Error, Debug)]
pub enum EconomyError {
    #[error("the stake must be greater than 0")]
    NonPositiveStake,

    #[error("not enough credits: balance {balance}, stake {stake}")]
    InsufficientFunds { balance: i64, stake: i64 },

    #[error(transparent)]
    Db(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkOutcome {
    Paid { earned: i64, balance: i64 },
    CoolingDown { remaining: Duration },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GambleOutcome {
    Won { amount: i64, balance: i64 },
    Lost { amount: i64, balance: i64 },
}

/// Decides gamble rounds and work pay.
pub trait Coin: Send + Sync {
    fn flip(&self) -> bool;
    fn wage(&self) -> i64;
}

pub struct FairCoin;

impl Coin for FairCoin {
    fn flip(&self) -> bool {
        rand::thread_rng().gen_bool(0.5)
    }

    fn wage(&self) -> i64 {
        rand::thread_rng().gen_range(WORK_MIN..=WORK_MAX)
    }
}

pub struct EconomyService {
    db: Database,
    cooldowns: Mutex<HashMap<u64, Instant>>,
    cooldown: Duration,
    coin: Arc<dyn Coin>,
}

impl EconomyService {
    pub fn new(db: Database, cooldown: Duration) -> Self {
        Self::with_coin(db, cooldown, Arc::new(FairCoin))
    }

    pub fn with_coin(db: Database, cooldown: Duration, coin: Arc<dyn Coin>) -> Self {
        Self {
            db,
            cooldowns: Mutex::new(HashMap::new()),
            cooldown,
            coin,
        }
    }

    pub async fn balance(&self, user_id: u64) -> Result<i64, EconomyError> {
        let user = user_id.to_string();
        Ok(self.db.run_blocking(move |db| db.get_balance(&user)).await?)
    }

    /// Pays a random wage unless the user worked within the cooldown window.
    pub async fn work(&self, user_id: u64) -> Result<WorkOutcome, EconomyError> {
        {
            let mut cooldowns = self
                .cooldowns
                .lock()
                .map_err(|_| anyhow::anyhow!("cooldown table poisoned"))?;
            let now = Instant::now();
            if let Some(last) = cooldowns.get(&user_id) {
                let elapsed = now.duration_since(*last);
                if elapsed < self.cooldown {
                    return Ok(WorkOutcome::CoolingDown {
                        remaining: self.cooldown - elapsed,
                    });
                }
            }
            cooldowns.insert(user_id, now);
        }

        let earned = self.coin.wage();
        let user = user_id.to_string();
        let balance = self
            .db
            .run_blocking(move |db| db.credit(&user, earned))
            .await?;
        Ok(WorkOutcome::Paid { earned, balance })
    }

    /// Stakes `amount` on a coin flip. Invalid stakes change nothing.
    pub async fn gamble(&self, user_id: u64, amount: i64) -> Result<GambleOutcome, EconomyError> {
        if amount <= 0 {
            return Err(EconomyError::NonPositiveStake);
        }

        let balance = self.balance(user_id).await?;
        if amount > balance {
            return Err(EconomyError::InsufficientFunds {
                balance,
                stake: amount,
            });
        }

        let user = user_id.to_string();
        if self.coin.flip() {
            let balance = self
                .db
                .run_blocking(move |db| db.credit(&user, amount))
                .await?;
            Ok(GambleOutcome::Won { amount, balance })
        } else {
            let debited = self
                .db
                .run_blocking(move |db| db.debit(&user, amount))
                .await?;
            match debited {
                Some(balance) => Ok(GambleOutcome::Lost { amount, balance }),
                // Balance dropped between the check and the debit
                None => Err(EconomyError::InsufficientFunds {
                    balance: self.balance(user_id).await?,
                    stake: amount,
                }),
            }
        }
    }
}
