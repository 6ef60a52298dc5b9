use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          TEXT PRIMARY KEY,
            username    TEXT NOT NULL,
            email       TEXT NOT NULL UNIQUE,
            password    TEXT NOT NULL,
            role        TEXT NOT NULL CHECK (role IN ('farmer', 'buyer')),
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS crops (
            id            TEXT PRIMARY KEY,
            name          TEXT NOT NULL,
            kind          TEXT NOT NULL,
            price_per_kg  REAL NOT NULL,
            quantity_kg   REAL NOT NULL CHECK (quantity_kg >= 0),
            location      TEXT NOT NULL,
            seller_id     TEXT NOT NULL REFERENCES users(id),
            available     INTEGER NOT NULL DEFAULT 1,
            created_at    TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_crops_seller
            ON crops(seller_id);

        CREATE TABLE IF NOT EXISTS orders (
            id                TEXT PRIMARY KEY,
            buyer_id          TEXT NOT NULL REFERENCES users(id),
            farmer_id         TEXT NOT NULL REFERENCES users(id),
            crop_id           TEXT NOT NULL REFERENCES crops(id),
            quantity_ordered  TEXT NOT NULL,
            proposed_price    REAL NOT NULL,
            address           TEXT NOT NULL,
            status            TEXT NOT NULL DEFAULT 'pending',
            rejection_reason  TEXT,
            created_at        TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_orders_crop
            ON orders(crop_id);

        CREATE TABLE IF NOT EXISTS messages (
            id            TEXT PRIMARY KEY,
            sender_id     TEXT NOT NULL REFERENCES users(id),
            receiver_id   TEXT NOT NULL REFERENCES users(id),
            content       TEXT NOT NULL,
            crop_id       TEXT REFERENCES crops(id),
            order_id      TEXT,
            cart_item_id  TEXT,
            read          INTEGER NOT NULL DEFAULT 0,
            created_at    TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_messages_pair
            ON messages(sender_id, receiver_id, created_at);

        CREATE INDEX IF NOT EXISTS idx_messages_unread
            ON messages(receiver_id, read);

        CREATE TABLE IF NOT EXISTS notifications (
            id          TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL REFERENCES users(id),
            crop_id     TEXT,
            order_id    TEXT,
            kind        TEXT NOT NULL,
            message     TEXT NOT NULL,
            read        INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_notifications_user
            ON notifications(user_id, created_at);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
