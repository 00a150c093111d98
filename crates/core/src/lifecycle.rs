//! Status lifecycle decision table for every manageable entity kind.
//!
//! The authoritative status lives server-side; this module only decides
//! what the admin surface may attempt against a row in a given status.
//! Every lookup is keyed by `(EntityKind, status)` and fails closed: a
//! status string that is not in the table is treated as locked.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::DbId;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Donation awaiting payment. The only editable/deletable donation status.
pub const DONATION_PENDING: &str = "pending";
pub const DONATION_PAID: &str = "paid";
pub const DONATION_FAILED: &str = "failed";
pub const DONATION_EXPIRED: &str = "expired";
pub const DONATION_CANCELLED: &str = "cancelled";

/// Pickup request just submitted by a donor.
pub const PICKUP_NEW: &str = "baru";
/// Pickup request with an agreed collection slot.
pub const PICKUP_SCHEDULED: &str = "dijadwalkan";
pub const PICKUP_DONE: &str = "selesai";
pub const PICKUP_CANCELLED: &str = "dibatalkan";

pub const CONSULTATION_NEW: &str = "baru";
pub const CONSULTATION_ANSWERED: &str = "dibalas";
pub const CONSULTATION_CLOSED: &str = "ditutup";

// ---------------------------------------------------------------------------
// Entity kinds
// ---------------------------------------------------------------------------

/// Tag identifying which manageable resource a rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Donation,
    PickupRequest,
    Consultation,
    Program,
    Article,
    Partner,
    Banner,
    BankAccount,
    User,
}

impl EntityKind {
    /// Every kind, in menu order.
    pub const ALL: [EntityKind; 9] = [
        Self::Donation,
        Self::PickupRequest,
        Self::Consultation,
        Self::Program,
        Self::Article,
        Self::Partner,
        Self::Banner,
        Self::BankAccount,
        Self::User,
    ];

    /// Convert from a wire tag.
    pub fn from_str_value(s: &str) -> Result<Self, String> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| {
                let valid: Vec<&str> = Self::ALL.iter().map(|k| k.as_str()).collect();
                format!(
                    "Invalid entity kind '{s}'. Must be one of: {}",
                    valid.join(", ")
                )
            })
    }

    /// Convert to the wire tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Donation => "donation",
            Self::PickupRequest => "pickup_request",
            Self::Consultation => "consultation",
            Self::Program => "program",
            Self::Article => "article",
            Self::Partner => "partner",
            Self::Banner => "banner",
            Self::BankAccount => "bank_account",
            Self::User => "user",
        }
    }

    /// REST collection segment, e.g. `pickup-requests`.
    pub fn resource_path(&self) -> &'static str {
        match self {
            Self::Donation => "donations",
            Self::PickupRequest => "pickup-requests",
            Self::Consultation => "consultations",
            Self::Program => "programs",
            Self::Article => "articles",
            Self::Partner => "partners",
            Self::Banner => "banners",
            Self::BankAccount => "bank-accounts",
            Self::User => "users",
        }
    }

    /// Human-readable singular name used in messages.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Donation => "Donation",
            Self::PickupRequest => "Pickup request",
            Self::Consultation => "Consultation",
            Self::Program => "Program",
            Self::Article => "Article",
            Self::Partner => "Partner",
            Self::Banner => "Banner",
            Self::BankAccount => "Bank account",
            Self::User => "User",
        }
    }

    /// The kind's status lifecycle, if it has one.
    pub fn lifecycle(&self) -> Option<&'static Lifecycle> {
        match self {
            Self::Donation => Some(&DONATION_LIFECYCLE),
            Self::PickupRequest => Some(&PICKUP_LIFECYCLE),
            Self::Consultation => Some(&CONSULTATION_LIFECYCLE),
            _ => None,
        }
    }

    pub fn has_lifecycle(&self) -> bool {
        self.lifecycle().is_some()
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Decision table
// ---------------------------------------------------------------------------

/// Display tone for a status badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    Neutral,
    Info,
    Warning,
    Success,
    Danger,
}

/// Label and tone shown for a row's status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusBadge {
    pub label: String,
    pub tone: Tone,
}

/// One row of a lifecycle table.
#[derive(Debug)]
pub struct StateRule {
    pub state: &'static str,
    pub label: &'static str,
    pub tone: Tone,
    /// Field edits are allowed while in this state.
    pub editable: bool,
    /// States this one may move to. Empty for terminal states.
    pub successors: &'static [&'static str],
}

/// Finite state set of one entity kind.
#[derive(Debug)]
pub struct Lifecycle {
    initial: &'static str,
    rules: &'static [StateRule],
}

impl Lifecycle {
    /// The initial, non-locked state. The only state that permits deletion.
    pub fn initial(&self) -> &'static str {
        self.initial
    }

    pub fn states(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.rules.iter().map(|r| r.state)
    }

    pub fn rules(&self) -> &'static [StateRule] {
        self.rules
    }

    pub fn rule(&self, state: &str) -> Option<&'static StateRule> {
        self.rules.iter().find(|r| r.state == state)
    }

    pub fn is_deletable(&self, state: &str) -> bool {
        state == self.initial
    }

    pub fn is_editable(&self, state: &str) -> bool {
        self.rule(state).is_some_and(|r| r.editable)
    }

    pub fn successors(&self, state: &str) -> &'static [&'static str] {
        self.rule(state).map(|r| r.successors).unwrap_or(&[])
    }
}

static DONATION_LIFECYCLE: Lifecycle = Lifecycle {
    initial: DONATION_PENDING,
    rules: &[
        StateRule {
            state: DONATION_PENDING,
            label: "Menunggu Pembayaran",
            tone: Tone::Warning,
            editable: true,
            successors: &[
                DONATION_PAID,
                DONATION_FAILED,
                DONATION_EXPIRED,
                DONATION_CANCELLED,
            ],
        },
        StateRule {
            state: DONATION_PAID,
            label: "Lunas",
            tone: Tone::Success,
            editable: false,
            successors: &[],
        },
        StateRule {
            state: DONATION_FAILED,
            label: "Gagal",
            tone: Tone::Danger,
            editable: false,
            successors: &[],
        },
        StateRule {
            state: DONATION_EXPIRED,
            label: "Kedaluwarsa",
            tone: Tone::Neutral,
            editable: false,
            successors: &[],
        },
        StateRule {
            state: DONATION_CANCELLED,
            label: "Dibatalkan",
            tone: Tone::Neutral,
            editable: false,
            successors: &[],
        },
    ],
};

static PICKUP_LIFECYCLE: Lifecycle = Lifecycle {
    initial: PICKUP_NEW,
    rules: &[
        StateRule {
            state: PICKUP_NEW,
            label: "Baru",
            tone: Tone::Info,
            editable: true,
            successors: &[PICKUP_SCHEDULED, PICKUP_CANCELLED],
        },
        // Scheduled pickups may still be edited, but only forward: never back to `baru`.
        StateRule {
            state: PICKUP_SCHEDULED,
            label: "Dijadwalkan",
            tone: Tone::Warning,
            editable: true,
            successors: &[PICKUP_DONE, PICKUP_CANCELLED],
        },
        StateRule {
            state: PICKUP_DONE,
            label: "Selesai",
            tone: Tone::Success,
            editable: false,
            successors: &[],
        },
        StateRule {
            state: PICKUP_CANCELLED,
            label: "Dibatalkan",
            tone: Tone::Danger,
            editable: false,
            successors: &[],
        },
    ],
};

static CONSULTATION_LIFECYCLE: Lifecycle = Lifecycle {
    initial: CONSULTATION_NEW,
    rules: &[
        StateRule {
            state: CONSULTATION_NEW,
            label: "Baru",
            tone: Tone::Info,
            editable: true,
            successors: &[CONSULTATION_ANSWERED, CONSULTATION_CLOSED],
        },
        StateRule {
            state: CONSULTATION_ANSWERED,
            label: "Dibalas",
            tone: Tone::Success,
            editable: false,
            successors: &[],
        },
        StateRule {
            state: CONSULTATION_CLOSED,
            label: "Ditutup",
            tone: Tone::Neutral,
            editable: false,
            successors: &[],
        },
    ],
};

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// True only for the kind's initial, non-locked state.
///
/// Kinds without a lifecycle have no recognised states, so this is always
/// `false` for them; use [`row_is_deletable`] for row eligibility.
pub fn is_deletable(kind: EntityKind, state: &str) -> bool {
    kind.lifecycle().is_some_and(|l| l.is_deletable(state))
}

/// True when field edits are allowed in `state`. Unknown states are locked.
pub fn is_editable(kind: EntityKind, state: &str) -> bool {
    kind.lifecycle().is_some_and(|l| l.is_editable(state))
}

/// True when `state` is terminal or unrecognised.
pub fn is_locked(kind: EntityKind, state: &str) -> bool {
    !is_editable(kind, state)
}

/// Successor allow-list for `from`. Empty for terminal and unknown states.
pub fn allowed_transitions(kind: EntityKind, from: &str) -> &'static [&'static str] {
    kind.lifecycle().map(|l| l.successors(from)).unwrap_or(&[])
}

pub fn can_transition(kind: EntityKind, from: &str, to: &str) -> bool {
    allowed_transitions(kind, from).contains(&to)
}

/// Deletion gate for a listed row.
///
/// Kinds without a lifecycle carry no status and are always deletable.
/// Lifecycle kinds with a missing status are denied.
pub fn row_is_deletable(kind: EntityKind, status: Option<&str>) -> bool {
    match (kind.lifecycle(), status) {
        (None, _) => true,
        (Some(l), Some(s)) => l.is_deletable(s),
        (Some(_), None) => false,
    }
}

/// Edit gate for a listed row, same rules as [`row_is_deletable`].
pub fn row_is_editable(kind: EntityKind, status: Option<&str>) -> bool {
    match (kind.lifecycle(), status) {
        (None, _) => true,
        (Some(l), Some(s)) => l.is_editable(s),
        (Some(_), None) => false,
    }
}

/// Badge for a status. Unknown states display their raw value in a neutral tone.
pub fn status_badge(kind: EntityKind, state: &str) -> StatusBadge {
    match kind.lifecycle().and_then(|l| l.rule(state)) {
        Some(rule) => StatusBadge {
            label: rule.label.to_string(),
            tone: rule.tone,
        },
        None => StatusBadge {
            label: state.to_string(),
            tone: Tone::Neutral,
        },
    }
}

// ---------------------------------------------------------------------------
// Guards
// ---------------------------------------------------------------------------

fn status_text(status: Option<&str>) -> String {
    status.unwrap_or("<none>").to_string()
}

/// Reject deletion of a row in a locked status before any I/O happens.
pub fn ensure_deletable(kind: EntityKind, id: DbId, status: Option<&str>) -> Result<(), CoreError> {
    if row_is_deletable(kind, status) {
        Ok(())
    } else {
        Err(CoreError::Locked {
            entity: kind.label(),
            id,
            status: status_text(status),
        })
    }
}

/// Reject field edits of a row in a locked status before any I/O happens.
pub fn ensure_editable(kind: EntityKind, id: DbId, status: Option<&str>) -> Result<(), CoreError> {
    if row_is_editable(kind, status) {
        Ok(())
    } else {
        Err(CoreError::Locked {
            entity: kind.label(),
            id,
            status: status_text(status),
        })
    }
}

/// Reject a status change that the lifecycle does not allow.
pub fn ensure_transition(
    kind: EntityKind,
    id: DbId,
    from: Option<&str>,
    to: &str,
) -> Result<(), CoreError> {
    let Some(lifecycle) = kind.lifecycle() else {
        return Err(CoreError::Validation(format!(
            "{} has no status lifecycle",
            kind.label()
        )));
    };
    if lifecycle.rule(to).is_none() {
        return Err(CoreError::Validation(format!(
            "Invalid {} status '{to}'. Must be one of: {}",
            kind.as_str(),
            lifecycle.states().collect::<Vec<_>>().join(", ")
        )));
    }
    let from_state = from.unwrap_or_default();
    if !row_is_editable(kind, from) {
        return Err(CoreError::Locked {
            entity: kind.label(),
            id,
            status: status_text(from),
        });
    }
    if !lifecycle.successors(from_state).contains(&to) {
        return Err(CoreError::InvalidTransition {
            entity: kind.label(),
            id,
            from: from_state.to_string(),
            to: to.to_string(),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
