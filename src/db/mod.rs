use rusqlite::{params, Connection, OptionalExtension, Result};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use crate::config::Config;
use tracing::{info, debug};

mod schema;

#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn new(config: &Config) -> Result<Self> {
        Self::open(&config.database_url)
    }

    pub fn open(path: &str) -> Result<Self> {
        if path != ":memory:" {
            if let Some(parent) = Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    let _ = std::fs::create_dir_all(parent);
                }
            }
        }
        let conn = Connection::open(path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn execute_init(&self) -> anyhow::Result<()> {
        info!("Database: Initializing schema...");
        self.lock()?.execute_batch(schema::WALLETS)?;
        debug!("Database: Schema initialized successfully");
        Ok(())
    }

    fn lock(&self) -> anyhow::Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("database mutex poisoned"))
    }

    /// Runs a synchronous database call on the blocking pool.
    pub async fn run_blocking<T, F>(&self, f: F) -> anyhow::Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || f(&db)).await?
    }

    /// Current balance; the wallet row is created at zero on first access.
    pub fn get_balance(&self, user_id: &str) -> anyhow::Result<i64> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR IGNORE INTO wallets (user_id, balance) VALUES (?1, 0)",
            params![user_id],
        )?;
        let balance = conn.query_row(
            "SELECT balance FROM wallets WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(balance)
    }

    /// Adds `amount` and returns the new balance.
    pub fn credit(&self, user_id: &str, amount: i64) -> anyhow::Result<i64> {
        debug!("Database: Crediting {} to {}", amount, user_id);
        let conn = self.lock()?;
        let balance = conn.query_row(
            "INSERT INTO wallets (user_id, balance) VALUES (?1, ?2)
             ON CONFLICT(user_id) DO UPDATE SET balance = balance + excluded.balance
             RETURNING balance",
            params![user_id, amount],
            |row| row.get(0),
        )?;
        Ok(balance)
    }

    /// Subtracts `amount` only if the wallet covers it. `None` means nothing changed.
    pub fn debit(&self, user_id: &str, amount: i64) -> anyhow::Result<Option<i64>> {
        debug!("Database: Debiting {} from {}", amount, user_id);
        let conn = self.lock()?;
        let balance = conn
            .query_row(
                "UPDATE wallets SET balance = balance - ?2
                 WHERE user_id = ?1 AND balance >= ?2
                 RETURNING balance",
                params![user_id, amount],
                |row| row.get(0),
            )
            .optional()?;
        Ok(balance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        let db = Database::open(":memory:").unwrap();
        db.execute_init().unwrap();
        db
    }

    #[test]
    fn test_wallet_created_lazily() {
        let db = test_db();
        assert_eq!(db.get_balance("u1").unwrap(), 0);

        let conn = db.conn.lock().unwrap();
        let exists = conn
            .prepare("SELECT 1 FROM wallets WHERE user_id = 'u1'")
            .unwrap()
            .exists([])
            .unwrap();
        assert!(exists);
    }

    #[test]
    fn test_credit_and_debit() {
        let db = test_db();
        assert_eq!(db.credit("u1", 50).unwrap(), 50);
        assert_eq!(db.credit("u1", 30).unwrap(), 80);

        assert_eq!(db.debit("u1", 20).unwrap(), Some(60));
        // Overdraft leaves the balance alone
        assert_eq!(db.debit("u1", 100).unwrap(), None);
        assert_eq!(db.get_balance("u1").unwrap(), 60);
        // Unknown wallets cannot be debited
        assert_eq!(db.debit("nobody", 1).unwrap(), None);
    }

    #[test]
    fn test_balance_never_negative() {
        let db = test_db();
        let conn = db.conn.lock().unwrap();
        let result = conn.execute(
            "INSERT INTO wallets (user_id, balance) VALUES ('u2', -5)",
            [],
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_run_blocking() {
        let db = test_db();
        db.credit("u3", 7).unwrap();
        let balance = db.run_blocking(|db| db.get_balance("u3")).await.unwrap();
        assert_eq!(balance, 7);
    }
}
