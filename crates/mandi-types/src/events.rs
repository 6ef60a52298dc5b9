use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{ChatMessage, Notification, NotificationKind};

/// Events sent over the WebSocket gateway. All gateway traffic is targeted
/// at a single user's connection; there is no broadcast channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server confirms successful authentication
    Ready { user_id: Uuid, username: String },

    /// A chat message was delivered (or echoed back to its sender)
    ReceiveMessage { message: ChatMessage },

    /// The other party started typing. Not persisted; the receiving client
    /// expires the indicator itself since no stop signal is guaranteed.
    Typing { sender: Uuid },

    /// A notification targeted at this user was created
    NewNotification { notification: Notification },

    /// A command failed. Emitted on the same connection since there is no
    /// caller to catch an error across the wire.
    Error { kind: String, message: String },
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Authenticate the WebSocket connection; registers presence
    Identify { token: String },

    /// Persist and best-effort-deliver a conversation-scoped message
    SendMessage {
        receiver: Uuid,
        content: String,
        crop_id: Option<Uuid>,
        order_id: Option<Uuid>,
        cart_item_id: Option<String>,
    },

    /// Signal typing to the receiver if they are online
    Typing { receiver: Uuid },

    /// Persist a notification and push it if the target is online
    NotifyFarmer {
        user: Uuid,
        crop: Option<Uuid>,
        order: Option<Uuid>,
        kind: NotificationKind,
        message: String,
    },
}
