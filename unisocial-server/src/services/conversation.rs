use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::Message;

/// One entry in the conversation list: the counterparty, the latest message
/// either way, and how many of their messages the viewer has not read.
#[derive(Debug, Serialize)]
pub struct ConversationPreview {
    pub partner_id: Uuid,
    pub last_message: String,
    pub last_message_at: DateTime<Utc>,
    pub unread_count: i64,
}

/// The other participant of a message, from `viewer`'s perspective.
pub fn partner_of(viewer: Uuid, message: &Message) -> Uuid {
    if message.sender_id == viewer {
        message.receiver_id
    } else {
        message.sender_id
    }
}

/// Group a user's messages into conversation previews.
///
/// Conversations are derived, never stored: each unordered {sender, receiver}
/// pair is one conversation. `messages` must already be filtered to rows
/// involving `viewer` and sorted newest first; the first message seen per
/// partner is therefore the conversation's latest, and the output preserves
/// most-recent-first order.
pub fn group_conversations(viewer: Uuid, messages: &[Message]) -> Vec<ConversationPreview> {
    let mut previews: Vec<ConversationPreview> = Vec::new();

    for message in messages {
        let partner = partner_of(viewer, message);
        let unread = message.receiver_id == viewer && !message.is_read;

        match previews.iter_mut().find(|p| p.partner_id == partner) {
            Some(preview) => {
                if unread {
                    preview.unread_count += 1;
                }
            }
            None => previews.push(ConversationPreview {
                partner_id: partner,
                last_message: message.content.clone(),
                last_message_at: message.created_at,
                unread_count: if unread { 1 } else { 0 },
            }),
        }
    }

    previews
}

/// Offset/limit page over an already-grouped conversation list.
pub fn page_conversations(
    previews: Vec<ConversationPreview>,
    offset: usize,
    limit: usize,
) -> (Vec<ConversationPreview>, usize) {
    let total = previews.len();
    let page = previews.into_iter().skip(offset).take(limit).collect();
    (page, total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn msg(sender: Uuid, receiver: Uuid, content: &str, minutes_ago: i64, is_read: bool) -> Message {
        Message {
            id: Uuid::new_v4(),
            sender_id: sender,
            receiver_id: receiver,
            content: content.to_string(),
            is_read,
            created_at: Utc::now() - Duration::minutes(minutes_ago),
        }
    }

    #[test]
    fn partner_is_the_other_participant() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let m = msg(a, b, "hi", 0, false);
        assert_eq!(partner_of(a, &m), b);
        assert_eq!(partner_of(b, &m), a);
    }

    #[test]
    fn grouping_counts_unread_from_partner_only() {
        let viewer = Uuid::new_v4();
        let partner = Uuid::new_v4();

        // newest first: one unread from partner, one read from partner,
        // one unread message the viewer sent (never counts)
        let messages = vec![
            msg(partner, viewer, "latest", 1, false),
            msg(partner, viewer, "older", 2, true),
            msg(viewer, partner, "mine", 3, false),
        ];

        let previews = group_conversations(viewer, &messages);
        assert_eq!(previews.len(), 1);
        assert_eq!(previews[0].partner_id, partner);
        assert_eq!(previews[0].last_message, "latest");
        assert_eq!(previews[0].unread_count, 1);
    }

    #[test]
    fn conversations_are_ordered_by_most_recent_message() {
        let viewer = Uuid::new_v4();
        let recent_partner = Uuid::new_v4();
        let stale_partner = Uuid::new_v4();

        let messages = vec![
            msg(recent_partner, viewer, "new thread", 1, false),
            msg(viewer, stale_partner, "old thread", 60, true),
            msg(stale_partner, viewer, "much older", 90, true),
        ];

        let previews = group_conversations(viewer, &messages);
        assert_eq!(previews.len(), 2);
        assert_eq!(previews[0].partner_id, recent_partner);
        assert_eq!(previews[1].partner_id, stale_partner);
        assert_eq!(previews[1].last_message, "old thread");
    }

    #[test]
    fn scenario_one_unread_then_zero_after_read() {
        // sender messages receiver; receiver sees one conversation with
        // unread_count=1; after marking read, unread_count=0
        let sender = Uuid::new_v4();
        let receiver = Uuid::new_v4();

        let before = vec![msg(sender, receiver, "hello", 1, false)];
        let previews = group_conversations(receiver, &before);
        assert_eq!(previews.len(), 1);
        assert_eq!(previews[0].unread_count, 1);

        let after = vec![msg(sender, receiver, "hello", 1, true)];
        let previews = group_conversations(receiver, &after);
        assert_eq!(previews[0].unread_count, 0);
    }

    #[test]
    fn paging_preserves_order_and_reports_total() {
        let viewer = Uuid::new_v4();
        let partners: Vec<Uuid> = (0..5).map(|_| Uuid::new_v4()).collect();
        let messages: Vec<Message> = partners
            .iter()
            .enumerate()
            .map(|(i, p)| msg(*p, viewer, "m", i as i64, true))
            .collect();

        let previews = group_conversations(viewer, &messages);
        let (page, total) = page_conversations(previews, 2, 2);
        assert_eq!(total, 5);
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].partner_id, partners[2]);
        assert_eq!(page[1].partner_id, partners[3]);
    }
}
