//! Payment order operations.
//!
//! The orders table is the ledger consulted by the submit-time payment
//! gate.  Actual payment-gateway interaction is out of scope; an order is
//! marked paid by whatever confirms the payment.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use shift_core::{Error, OrderId, Result};

use crate::models::{fmt_ts, Order};

const COLS: &str = "order_id, client_id, source_key, amount, status, paid_at, created_at";

/// Create a new unpaid order for a client's uploaded file.
pub fn create_order(
    conn: &Connection,
    client_id: &str,
    source_key: &str,
    amount: i64,
    created_at: DateTime<Utc>,
) -> Result<Order> {
    let order_id = OrderId::new();

    conn.execute(
        "INSERT INTO orders (order_id, client_id, source_key, amount, status, created_at)
         VALUES (?1, ?2, ?3, ?4, 'unpaid', ?5)",
        rusqlite::params![
            order_id.to_string(),
            client_id,
            source_key,
            amount,
            fmt_ts(created_at),
        ],
    )
    .map_err(|e| Error::database(e.to_string()))?;

    Ok(Order {
        order_id,
        client_id: client_id.to_string(),
        source_key: source_key.to_string(),
        amount,
        status: "unpaid".to_string(),
        paid_at: None,
        created_at,
    })
}

/// Get an order by ID.
pub fn get_order(conn: &Connection, id: OrderId) -> Result<Option<Order>> {
    let q = format!("SELECT {COLS} FROM orders WHERE order_id = ?1");
    let result = conn.query_row(&q, [id.to_string()], Order::from_row);
    match result {
        Ok(o) => Ok(Some(o)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// Confirm payment for an order (CAS from `unpaid`).
pub fn mark_paid(conn: &Connection, id: OrderId, paid_at: DateTime<Utc>) -> Result<bool> {
    let n = conn
        .execute(
            "UPDATE orders SET status = 'paid', paid_at = ?1
             WHERE order_id = ?2 AND status = 'unpaid'",
            rusqlite::params![fmt_ts(paid_at), id.to_string()],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

/// Whether a confirmed payment exists for this client and source file.
pub fn is_paid_for(conn: &Connection, client_id: &str, source_key: &str) -> Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM orders
         WHERE client_id = ?1 AND source_key = ?2 AND status = 'paid'",
        rusqlite::params![client_id, source_key],
        |row| row.get(0),
    )
    .map_err(|e| Error::database(e.to_string()))
}
