use crate::Database;
use crate::models::{CropRow, MessageRow, NotificationRow, OrderRow, UserRow};
use anyhow::Result;
use mandi_types::models::ChatScope;
use rusqlite::{Row, params, params_from_iter};

/// Maps a scope to its discriminator column and comparable value.
fn scope_filter(scope: &ChatScope) -> (&'static str, String) {
    match scope {
        ChatScope::Order(id) => ("order_id", id.to_string()),
        ChatScope::CartItem(id) => ("cart_item_id", id.clone()),
        ChatScope::Crop(id) => ("crop_id", id.to_string()),
    }
}

impl Database {
    // -- Users --

    pub fn create_user(
        &self,
        id: &str,
        username: &str,
        email: &str,
        password_hash: &str,
        role: &str,
        created_at: &str,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, email, password, role, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![id, username, email, password_hash, role, created_at],
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            conn.prepare("SELECT id, username, email, password, role, created_at FROM users WHERE email = ?1")?
                .query_row([email], map_user)
                .optional()
        })
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            conn.prepare("SELECT id, username, email, password, role, created_at FROM users WHERE id = ?1")?
                .query_row([id], map_user)
                .optional()
        })
    }

    // -- Crops --

    pub fn insert_crop(&self, crop: &CropRow) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO crops (id, name, kind, price_per_kg, quantity_kg, location, seller_id, available, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    crop.id,
                    crop.name,
                    crop.kind,
                    crop.price_per_kg,
                    crop.quantity_kg,
                    crop.location,
                    crop.seller_id,
                    crop.available,
                    crop.created_at,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_crop(&self, id: &str) -> Result<Option<CropRow>> {
        self.with_conn(|conn| {
            conn.prepare(&format!("SELECT {CROP_COLS} FROM crops WHERE id = ?1"))?
                .query_row([id], map_crop)
                .optional()
        })
    }

    pub fn list_available_crops(&self) -> Result<Vec<CropRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CROP_COLS} FROM crops WHERE available = 1 ORDER BY created_at DESC"
            ))?;
            let rows = stmt
                .query_map([], map_crop)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Orders --

    pub fn insert_order(&self, order: &OrderRow) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO orders (id, buyer_id, farmer_id, crop_id, quantity_ordered, proposed_price, address, status, rejection_reason, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    order.id,
                    order.buyer_id,
                    order.farmer_id,
                    order.crop_id,
                    order.quantity_ordered,
                    order.proposed_price,
                    order.address,
                    order.status,
                    order.rejection_reason,
                    order.created_at,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_order(&self, id: &str) -> Result<Option<OrderRow>> {
        self.with_conn(|conn| {
            conn.prepare(&format!("SELECT {ORDER_COLS} FROM orders WHERE id = ?1"))?
                .query_row([id], map_order)
                .optional()
        })
    }

    /// Applies the supplied fields to an order. Returns false when the id
    /// does not exist.
    pub fn update_order(
        &self,
        id: &str,
        quantity_ordered: Option<&str>,
        status: Option<&str>,
        rejection_reason: Option<&str>,
    ) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE orders SET
                     quantity_ordered = COALESCE(?2, quantity_ordered),
                     status           = COALESCE(?3, status),
                     rejection_reason = COALESCE(?4, rejection_reason)
                 WHERE id = ?1",
                params![id, quantity_ordered, status, rejection_reason],
            )?;
            Ok(changed > 0)
        })
    }

    /// Accept path: the crop stock adjustment and the order status change
    /// commit together or not at all.
    pub fn accept_order(
        &self,
        order_id: &str,
        quantity_ordered: Option<&str>,
        crop_id: &str,
        new_quantity_kg: f64,
        available: bool,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "UPDATE crops SET quantity_kg = ?2, available = ?3 WHERE id = ?1",
                params![crop_id, new_quantity_kg, available],
            )?;
            tx.execute(
                "UPDATE orders SET
                     status = 'accepted',
                     quantity_ordered = COALESCE(?2, quantity_ordered)
                 WHERE id = ?1",
                params![order_id, quantity_ordered],
            )?;
            tx.commit()?;
            Ok(())
        })
    }

    pub fn delete_order(&self, id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute("DELETE FROM orders WHERE id = ?1", [id])?;
            Ok(changed > 0)
        })
    }

    pub fn list_orders(&self, buyer: Option<&str>, status: Option<&str>) -> Result<Vec<OrderRow>> {
        self.with_conn(|conn| {
            let mut sql = format!("SELECT {ORDER_COLS} FROM orders");
            let mut clauses = Vec::new();
            let mut values: Vec<String> = Vec::new();
            if let Some(buyer) = buyer {
                values.push(buyer.to_string());
                clauses.push(format!("buyer_id = ?{}", values.len()));
            }
            if let Some(status) = status {
                values.push(status.to_string());
                clauses.push(format!("status = ?{}", values.len()));
            }
            if !clauses.is_empty() {
                sql.push_str(" WHERE ");
                sql.push_str(&clauses.join(" AND "));
            }
            sql.push_str(" ORDER BY created_at DESC");

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(values.iter()), map_order)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Orders whose crop belongs to the given farmer. Keyed by crop
    /// ownership, not the denormalized farmer_id column.
    pub fn list_orders_for_farmer(&self, farmer_id: &str) -> Result<Vec<OrderRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT o.id, o.buyer_id, o.farmer_id, o.crop_id, o.quantity_ordered,
                        o.proposed_price, o.address, o.status, o.rejection_reason, o.created_at
                 FROM orders o
                 JOIN crops c ON o.crop_id = c.id
                 WHERE c.seller_id = ?1
                 ORDER BY o.created_at DESC",
            )?;
            let rows = stmt
                .query_map([farmer_id], map_order)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn delete_all_orders(&self) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let deleted = conn.execute("DELETE FROM orders", [])?;
            Ok(deleted)
        })
    }

    // -- Messages --

    pub fn insert_message(&self, msg: &MessageRow) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO messages (id, sender_id, receiver_id, content, crop_id, order_id, cart_item_id, read, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    msg.id,
                    msg.sender_id,
                    msg.receiver_id,
                    msg.content,
                    msg.crop_id,
                    msg.order_id,
                    msg.cart_item_id,
                    msg.read,
                    msg.created_at,
                ],
            )?;
            Ok(())
        })
    }

    /// Both directions between the unordered pair, one scope, chronological.
    pub fn messages_between(
        &self,
        user_a: &str,
        user_b: &str,
        scope: &ChatScope,
    ) -> Result<Vec<MessageRow>> {
        let (col, val) = scope_filter(scope);
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLS} FROM messages
                 WHERE ((sender_id = ?1 AND receiver_id = ?2)
                     OR (sender_id = ?2 AND receiver_id = ?1))
                   AND {col} = ?3
                 ORDER BY created_at ASC, rowid ASC"
            ))?;
            let rows = stmt
                .query_map(params![user_a, user_b, val], map_message)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn delete_messages_between(
        &self,
        user_a: &str,
        user_b: &str,
        scope: &ChatScope,
    ) -> Result<usize> {
        let (col, val) = scope_filter(scope);
        self.with_conn_mut(|conn| {
            let deleted = conn.execute(
                &format!(
                    "DELETE FROM messages
                     WHERE ((sender_id = ?1 AND receiver_id = ?2)
                         OR (sender_id = ?2 AND receiver_id = ?1))
                       AND {col} = ?3"
                ),
                params![user_a, user_b, val],
            )?;
            Ok(deleted)
        })
    }

    /// Directional: only buyer → farmer messages flip to read.
    pub fn mark_messages_read(&self, farmer_id: &str, buyer_id: &str) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE messages SET read = 1
                 WHERE sender_id = ?1 AND receiver_id = ?2 AND read = 0",
                params![buyer_id, farmer_id],
            )?;
            Ok(changed)
        })
    }

    /// Unread counts grouped by sender, across every conversation scope.
    pub fn unread_counts(&self, farmer_id: &str) -> Result<Vec<(String, i64)>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT sender_id, COUNT(*) FROM messages
                 WHERE receiver_id = ?1 AND read = 0
                 GROUP BY sender_id",
            )?;
            let rows = stmt
                .query_map([farmer_id], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Notifications --

    pub fn insert_notification(&self, n: &NotificationRow) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO notifications (id, user_id, crop_id, order_id, kind, message, read, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    n.id,
                    n.user_id,
                    n.crop_id,
                    n.order_id,
                    n.kind,
                    n.message,
                    n.read,
                    n.created_at,
                ],
            )?;
            Ok(())
        })
    }

    pub fn list_notifications(&self, user_id: &str) -> Result<Vec<NotificationRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {NOTIFICATION_COLS} FROM notifications
                 WHERE user_id = ?1 ORDER BY created_at DESC"
            ))?;
            let rows = stmt
                .query_map([user_id], map_notification)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn mark_notification_read(&self, id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute("UPDATE notifications SET read = 1 WHERE id = ?1", [id])?;
            Ok(changed > 0)
        })
    }
}

const CROP_COLS: &str =
    "id, name, kind, price_per_kg, quantity_kg, location, seller_id, available, created_at";
const ORDER_COLS: &str = "id, buyer_id, farmer_id, crop_id, quantity_ordered, proposed_price, address, status, rejection_reason, created_at";
const MESSAGE_COLS: &str =
    "id, sender_id, receiver_id, content, crop_id, order_id, cart_item_id, read, created_at";
const NOTIFICATION_COLS: &str = "id, user_id, crop_id, order_id, kind, message, read, created_at";

fn map_user(row: &Row) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password: row.get(3)?,
        role: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn map_crop(row: &Row) -> rusqlite::Result<CropRow> {
    Ok(CropRow {
        id: row.get(0)?,
        name: row.get(1)?,
        kind: row.get(2)?,
        price_per_kg: row.get(3)?,
        quantity_kg: row.get(4)?,
        location: row.get(5)?,
        seller_id: row.get(6)?,
        available: row.get(7)?,
        created_at: row.get(8)?,
    })
}

fn map_order(row: &Row) -> rusqlite::Result<OrderRow> {
    Ok(OrderRow {
        id: row.get(0)?,
        buyer_id: row.get(1)?,
        farmer_id: row.get(2)?,
        crop_id: row.get(3)?,
        quantity_ordered: row.get(4)?,
        proposed_price: row.get(5)?,
        address: row.get(6)?,
        status: row.get(7)?,
        rejection_reason: row.get(8)?,
        created_at: row.get(9)?,
    })
}

fn map_message(row: &Row) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        sender_id: row.get(1)?,
        receiver_id: row.get(2)?,
        content: row.get(3)?,
        crop_id: row.get(4)?,
        order_id: row.get(5)?,
        cart_item_id: row.get(6)?,
        read: row.get(7)?,
        created_at: row.get(8)?,
    })
}

fn map_notification(row: &Row) -> rusqlite::Result<NotificationRow> {
    Ok(NotificationRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        crop_id: row.get(2)?,
        order_id: row.get(3)?,
        kind: row.get(4)?,
        message: row.get(5)?,
        read: row.get(6)?,
        created_at: row.get(7)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
