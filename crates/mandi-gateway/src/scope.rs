//! Validation of who may talk to whom, and about what. Consulted before
//! both message send and history fetch.

use anyhow::anyhow;
use uuid::Uuid;

use mandi_db::Database;
use mandi_types::error::{MarketError, MarketResult};
use mandi_types::models::{ChatScope, Role};

pub struct Participant {
    pub id: Uuid,
    pub username: String,
    pub role: Role,
}

/// Malformed ids surface the same as ids absent from storage.
pub fn parse_user_id(raw: &str) -> MarketResult<Uuid> {
    raw.parse().map_err(|_| MarketError::NotFound("user"))
}

fn load_participant(db: &Database, id: Uuid) -> MarketResult<Participant> {
    let row = db
        .get_user_by_id(&id.to_string())?
        .ok_or(MarketError::NotFound("user"))?;
    let role = Role::parse(&row.role).ok_or_else(|| anyhow!("bad role '{}' for {}", row.role, id))?;
    Ok(Participant {
        id,
        username: row.username,
        role,
    })
}

/// A conversation pairs exactly one farmer with one buyer.
pub fn resolve_pair(
    db: &Database,
    sender: Uuid,
    receiver: Uuid,
) -> MarketResult<(Participant, Participant)> {
    let sender = load_participant(db, sender)?;
    let receiver = load_participant(db, receiver)?;

    if sender.role == receiver.role {
        return Err(MarketError::forbidden(
            "only a farmer and a buyer may converse",
        ));
    }
    if sender.id == receiver.id {
        return Err(MarketError::forbidden("cannot message yourself"));
    }

    Ok((sender, receiver))
}

/// Picks the conversation scope from the supplied discriminators and
/// checks that a crop scope points at a real crop.
pub fn resolve_scope(
    db: &Database,
    order_id: Option<Uuid>,
    cart_item_id: Option<String>,
    crop_id: Option<Uuid>,
) -> MarketResult<ChatScope> {
    let scope = ChatScope::from_parts(order_id, cart_item_id, crop_id).ok_or_else(|| {
        MarketError::invalid("a crop, order, or cart item reference is required")
    })?;

    if let ChatScope::Crop(id) = &scope {
        if db.get_crop(&id.to_string())?.is_none() {
            return Err(MarketError::NotFound("crop"));
        }
    }

    Ok(scope)
}
