//! Tenant context — mock account data for downstream steps.
//!
//! Stands in for a property-management system: rent balance, lease end,
//! recent maintenance tickets, and the assigned manager. Values are random
//! but reproducible when a seed is given.

use std::sync::Mutex;

use chrono::{Duration, NaiveDate, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

const ISSUES: &[&str] = &[
    "Clogged sink",
    "Leaky faucet",
    "Heating not working",
    "Broken window lock",
    "Air conditioning issue",
    "Electrical outlet malfunction",
    "Toilet not flushing",
    "Pest infestation",
];

const MANAGERS: &[&str] = &[
    "Jordan Reyes",
    "Priya Natarajan",
    "Sam Okafor",
    "Morgan Lindqvist",
    "Alex Chen",
    "Taylor Brooks",
];

/// Status of a past maintenance ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    InProgress,
    Resolved,
}

impl TicketStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::InProgress => "in_progress",
            Self::Resolved => "resolved",
        }
    }
}

const STATUSES: &[TicketStatus] = &[
    TicketStatus::Open,
    TicketStatus::InProgress,
    TicketStatus::Resolved,
];

/// A past maintenance ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceTicket {
    pub id: String,
    pub issue: String,
    pub status: TicketStatus,
    pub date: NaiveDate,
}

/// Account context for one tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantContext {
    pub tenant_name: String,
    pub address: Option<String>,
    /// Formatted as `$1,234`.
    pub rent_balance: String,
    pub lease_end_date: NaiveDate,
    pub maintenance_history: Vec<MaintenanceTicket>,
    pub property_manager: String,
}

/// Generates mock tenant context.
pub struct ContextLoader {
    rng: Mutex<StdRng>,
}

impl ContextLoader {
    /// `Some(seed)` makes output reproducible; `None` seeds from entropy.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng: Mutex::new(rng),
        }
    }

    /// Build context for a tenant, relative to today.
    pub fn load(&self, tenant_name: &str, address: Option<&str>) -> TenantContext {
        self.load_at(tenant_name, address, Utc::now().date_naive())
    }

    /// Build context for a tenant relative to `today`.
    pub fn load_at(&self, tenant_name: &str, address: Option<&str>, today: NaiveDate) -> TenantContext {
        // A poisoned lock only means another caller panicked mid-draw; the
        // generator state is still usable.
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());

        let rent_balance = format_dollars(rng.gen_range(800..=3500));
        let property_manager = pick(&mut *rng, MANAGERS).to_string();
        let lease_end_date = today + Duration::days(rng.gen_range(30..=365));

        let ticket_count = rng.gen_range(1..=3);
        let maintenance_history = (0..ticket_count)
            .map(|_| MaintenanceTicket {
                id: random_hex_id(&mut *rng, 10),
                issue: pick(&mut *rng, ISSUES).to_string(),
                status: *STATUSES.choose(&mut *rng).unwrap_or(&TicketStatus::Open),
                date: today - Duration::days(rng.gen_range(0..=365)),
            })
            .collect();

        TenantContext {
            tenant_name: tenant_name.to_string(),
            address: address.map(String::from),
            rent_balance,
            lease_end_date,
            maintenance_history,
            property_manager,
        }
    }
}

fn pick<'a, R: Rng>(rng: &mut R, items: &[&'a str]) -> &'a str {
    items.choose(rng).copied().unwrap_or_default()
}

/// `n` random lowercase hex characters.
pub fn random_hex_id<R: Rng>(rng: &mut R, n: usize) -> String {
    const HEX: &[u8] = b"0123456789abcdef";
    (0..n)
        .map(|_| HEX[rng.gen_range(0..HEX.len())] as char)
        .collect()
}

/// Format whole dollars with thousands separators: 1234 → "$1,234".
pub fn format_dollars(amount: u32) -> String {
    let digits = amount.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    format!("${out}")
}
