//! One-slot, time-limited undo buffer for deleted items.
//!
//! The slot is an explicit state machine:
//!
//! ```text
//!            record                 take_for_undo / clear / expire(token)
//!   Empty ───────────▶ Pending ───────────────────────────────────────▶ Cleared
//!     ▲                 │  ▲                                               │
//!     │                 └──┘ record (overwrites)                           │
//!     └──────────────── reset ◀──────────────────── record ───────────────┘
//! ```
//!
//! Whichever of undo, clear or timer expiry leaves `Pending` first wins; the
//! others find the slot no longer pending and do nothing.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use super::Item;

/// How long a deleted item can be restored.
pub const DEFAULT_UNDO_WINDOW: Duration = Duration::from_secs(5);

/// Identifies one deletion so a late timer cannot expire a newer one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeletionToken(u64);

/// A deleted item waiting for undo.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingDeletion {
    pub item: Item,
    pub deleted_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
    pub token: DeletionToken,
}

/// State of the undo slot.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum UndoSlot {
    /// Nothing was deleted since the slot was last reset.
    #[default]
    Empty,
    /// The most recent deletion, restorable until its deadline.
    Pending(PendingDeletion),
    /// The last deletion was undone, dismissed or expired.
    Cleared,
}

impl UndoSlot {
    /// Hold `item` as the most recent deletion, replacing any earlier one.
    pub fn record(&mut self, item: Item, now: DateTime<Utc>, window: Duration) -> DeletionToken {
        let token = DeletionToken(next_token());
        let window = TimeDelta::from_std(window).unwrap_or(TimeDelta::MAX);
        let deadline = now.checked_add_signed(window).unwrap_or(DateTime::<Utc>::MAX_UTC);
        *self = Self::Pending(PendingDeletion {
            item,
            deleted_at: now,
            deadline,
            token,
        });
        token
    }

    /// Take the pending item if its deadline has not passed.
    ///
    /// Any pending entry, live or stale, leaves the slot `Cleared`.
    pub fn take_for_undo(&mut self, now: DateTime<Utc>) -> Option<Item> {
        match std::mem::replace(self, Self::Cleared) {
            Self::Pending(pending) if now < pending.deadline => Some(pending.item),
            Self::Pending(_) | Self::Cleared => None,
            Self::Empty => {
                *self = Self::Empty;
                None
            }
        }
    }

    /// Dismiss the pending item. Returns whether it was still restorable at
    /// `now`; an expired entry is cleared as well but reports `false`.
    pub fn clear(&mut self, now: DateTime<Utc>) -> bool {
        match self {
            Self::Pending(pending) => {
                let live = now < pending.deadline;
                *self = Self::Cleared;
                live
            }
            Self::Empty | Self::Cleared => false,
        }
    }

    /// Timer transition: clear the slot only if it still holds `token`.
    pub fn expire(&mut self, token: DeletionToken) -> bool {
        match self {
            Self::Pending(pending) if pending.token == token => {
                *self = Self::Cleared;
                true
            }
            _ => false,
        }
    }

    /// Forget everything, e.g. when another collection is opened.
    pub fn reset(&mut self) {
        *self = Self::Empty;
    }

    /// Pending deletion still restorable at `now`.
    pub fn pending(&self, now: DateTime<Utc>) -> Option<&PendingDeletion> {
        match self {
            Self::Pending(pending) if now < pending.deadline => Some(pending),
            _ => None,
        }
    }
}

fn next_token() -> u64 {
    use std::sync::atomic::{AtomicU64, Ordering};

    // Tokens only need to differ between deletions in one process.
    static NEXT: AtomicU64 = AtomicU64::new(1);
    NEXT.fetch_add(1, Ordering::Relaxed)
}
