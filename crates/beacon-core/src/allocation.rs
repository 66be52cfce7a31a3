//! # Allocation Engine
//!
//! Read-only computation of which zone and cells satisfy a request.
//!
//! ## Retrieval
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Order SO-100 needs { A: 2, B: 1 }                                      │
//! │                                                                         │
//! │  candidate pigeonholes (hold ≥1 unit of a required item)               │
//! │      │                                                                  │
//! │      ▼  group by zone, sum held units per item                          │
//! │  ┌──────────────┐   ┌──────────────┐                                   │
//! │  │ R1-S1        │   │ R2-S1        │                                   │
//! │  │ A: 2  B: 1 ✓ │   │ A: 1       ✗ │                                   │
//! │  └──────────────┘   └──────────────┘                                   │
//! │      │                                                                  │
//! │      ▼  first satisfying zone in zone order wins                        │
//! │  RetrievalPlan { zone: R1-S1, valid_first_scan_cells: {P1, P2} }       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! An order is served from exactly one zone. When no single zone holds
//! everything, the order is not yet retrievable and is re-evaluated after
//! the next commit.
//!
//! ## Put-away
//! The least-loaded zone wins among zones with a pigeonhole that can take the
//! whole request. Ties go to the lowest zone.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::types::{CellKind, Order, PickItem, StockRequest, StorageCell, Zone};

// =============================================================================
// Retrieval
// =============================================================================

/// Zone and first-scan cells chosen for an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalPlan {
    pub order_no: String,
    pub zone: Zone,
    pub valid_first_scan_cells: BTreeSet<String>,
}

/// Outcome of [`allocate_retrieval`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetrievalAllocation {
    Retrievable(RetrievalPlan),
    NotYetRetrievable,
}

impl RetrievalAllocation {
    pub fn plan(self) -> Option<RetrievalPlan> {
        match self {
            RetrievalAllocation::Retrievable(plan) => Some(plan),
            RetrievalAllocation::NotYetRetrievable => None,
        }
    }
}

/// Decides whether `order` can be served from one zone of `cells`.
///
/// `cells` may contain the same cell more than once (one query per item);
/// the first occurrence of an id is used. Bins never count as stock.
pub fn allocate_retrieval(order: &Order, cells: &[StorageCell]) -> RetrievalAllocation {
    let requirements = order.requirements();
    if requirements.is_empty() {
        return RetrievalAllocation::NotYetRetrievable;
    }

    let mut unique: BTreeMap<&str, &StorageCell> = BTreeMap::new();
    for cell in cells {
        unique.entry(cell.cell_id.as_str()).or_insert(cell);
    }

    let mut zones: BTreeMap<&Zone, Vec<&StorageCell>> = BTreeMap::new();
    for cell in unique.into_values() {
        if cell.kind != CellKind::Pigeonhole {
            continue;
        }
        if requirements.keys().any(|item| cell.holds(item)) {
            zones.entry(&cell.zone).or_default().push(cell);
        }
    }

    for (zone, members) in zones {
        let satisfied = requirements.iter().all(|(item, needed)| {
            let held: i64 = members.iter().map(|c| c.quantity_of(item)).sum();
            held >= *needed
        });

        if satisfied {
            return RetrievalAllocation::Retrievable(RetrievalPlan {
                order_no: order.order_no.clone(),
                zone: zone.clone(),
                valid_first_scan_cells: members.iter().map(|c| c.cell_id.clone()).collect(),
            });
        }
    }

    RetrievalAllocation::NotYetRetrievable
}

/// Items to take from `cell` for `order`: `min(held, remaining)` per item.
pub fn pick_items(order: &Order, cell: &StorageCell) -> Vec<PickItem> {
    order
        .requirements()
        .into_iter()
        .filter_map(|(item, remaining)| {
            let take = cell.quantity_of(&item).min(remaining);
            (take > 0).then(|| PickItem::new(item, take))
        })
        .collect()
}

/// Plans for every order that is retrievable right now, in input order.
pub fn retrievable_orders(orders: &[Order], cells: &[StorageCell]) -> Vec<RetrievalPlan> {
    orders
        .iter()
        .filter_map(|order| allocate_retrieval(order, cells).plan())
        .collect()
}

// =============================================================================
// Put-away
// =============================================================================

/// Zone and target pigeonholes chosen for a stock request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PutawayPlan {
    pub request_no: String,
    pub item_code: String,
    pub quantity: i64,
    pub zone: Zone,
    pub target_cells: BTreeSet<String>,
}

/// Picks the least-loaded zone able to take the whole request.
///
/// Load is the total units stored in a zone's pigeonholes. Returns `None`
/// when no pigeonhole anywhere has `request.quantity` spare units.
pub fn allocate_putaway(request: &StockRequest, cells: &[StorageCell]) -> Option<PutawayPlan> {
    let mut zones: BTreeMap<&Zone, (i64, BTreeSet<String>)> = BTreeMap::new();
    let mut seen = BTreeSet::new();

    for cell in cells {
        if cell.kind != CellKind::Pigeonhole || !seen.insert(cell.cell_id.as_str()) {
            continue;
        }
        let entry = zones.entry(&cell.zone).or_default();
        entry.0 += cell.total_units();
        if cell.spare_capacity() >= request.quantity {
            entry.1.insert(cell.cell_id.clone());
        }
    }

    // BTreeMap order makes min_by_key keep the lowest zone on equal load.
    let (zone, (_, targets)) = zones
        .into_iter()
        .filter(|(_, (_, targets))| !targets.is_empty())
        .min_by_key(|(_, (load, _))| *load)?;

    Some(PutawayPlan {
        request_no: request.request_no.clone(),
        item_code: request.item_code.clone(),
        quantity: request.quantity,
        zone: zone.clone(),
        target_cells: targets,
    })
}
