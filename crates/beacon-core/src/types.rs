//! # Domain Types
//!
//! Core domain types used throughout Beacon.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  StorageCell    │   │     Order       │   │  StockRequest   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  cell_id        │   │  order_no       │   │  request_no     │       │
//! │  │  zone (R,S)     │   │  lines[]        │   │  item_code      │       │
//! │  │  kind, capacity │   │   item_code     │   │  quantity       │       │
//! │  │  contents{}     │   │   required/picked│  │  applied        │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │     Zone        │   │  SignalCommand  │   │  FleetRequest   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  rack  "R1"     │   │  location_id    │   │  task_type      │       │
//! │  │  side  "S1"     │   │  payload        │   │  station,rack   │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Cell Identity
//! Cell ids are composite: `{rack}-{side}-{slot}`, e.g. `R1-S1-P4`. The first
//! two segments are the zone the cell belongs to.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::validation::{
    validate_capacity, validate_cell_id, validate_item_code, validate_order_no, validate_quantity,
    validate_request_no, ValidationResult,
};

// =============================================================================
// Zone
// =============================================================================

/// A `(rack, side)` locality: the unit a robot brings to a station.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Zone {
    pub rack: String,
    pub side: String,
}

impl Zone {
    pub fn new(rack: impl Into<String>, side: impl Into<String>) -> Self {
        Zone {
            rack: rack.into(),
            side: side.into(),
        }
    }

    /// Derives the zone from a composite cell id (`R1-S1-P4` → `R1-S1`).
    pub fn from_cell_id(cell_id: &str) -> Option<Zone> {
        let mut parts = cell_id.split('-');
        let rack = parts.next().filter(|p| !p.is_empty())?;
        let side = parts.next().filter(|p| !p.is_empty())?;
        Some(Zone::new(rack, side))
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.rack, self.side)
    }
}

impl FromStr for Zone {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('-') {
            Some((rack, side)) if !rack.is_empty() && !side.is_empty() && !side.contains('-') => {
                Ok(Zone::new(rack, side))
            }
            _ => Err(ValidationError::InvalidFormat {
                field: "zone".to_string(),
                reason: format!("expected RACK-SIDE, got '{}'", s),
            }),
        }
    }
}

// =============================================================================
// Cell Kind
// =============================================================================

/// The role a storage cell plays at the station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellKind {
    /// First-scan cell holding stored items.
    Pigeonhole,
    /// Second-scan collection point signaled by light.
    Bin,
}

impl CellKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CellKind::Pigeonhole => "pigeonhole",
            CellKind::Bin => "bin",
        }
    }
}

impl fmt::Display for CellKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CellKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pigeonhole" => Ok(CellKind::Pigeonhole),
            "bin" => Ok(CellKind::Bin),
            other => Err(ValidationError::InvalidFormat {
                field: "kind".to_string(),
                reason: format!("unknown cell kind '{}'", other),
            }),
        }
    }
}

// =============================================================================
// Storage Cell
// =============================================================================

/// A physical storage cell and the item units it holds.
///
/// ## Invariant
/// `0 <= total_units() <= capacity`, and no per-item count is negative.
/// Only [`StorageCell::apply`] mutates contents, and it enforces both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageCell {
    pub cell_id: String,
    pub zone: Zone,
    pub slot: String,
    pub kind: CellKind,
    pub capacity: i64,
    /// Count per item code. Zero counts are never stored.
    pub contents: BTreeMap<String, i64>,
}

impl StorageCell {
    /// Creates an empty cell; the zone and slot are taken from the id.
    pub fn new(cell_id: impl Into<String>, kind: CellKind, capacity: i64) -> CoreResult<Self> {
        let cell_id = cell_id.into();
        validate_cell_id(&cell_id)?;
        validate_capacity(capacity)?;
        let zone = Zone::from_cell_id(&cell_id).ok_or_else(|| ValidationError::InvalidFormat {
            field: "cell_id".to_string(),
            reason: format!("expected RACK-SIDE-SLOT, got '{}'", cell_id),
        })?;
        let slot = cell_id
            .splitn(3, '-')
            .nth(2)
            .unwrap_or_default()
            .to_string();

        Ok(StorageCell {
            cell_id,
            zone,
            slot,
            kind,
            capacity,
            contents: BTreeMap::new(),
        })
    }

    /// Builder used by seeding and tests.
    pub fn with_item(mut self, item_code: impl Into<String>, quantity: i64) -> Self {
        if quantity > 0 {
            *self.contents.entry(item_code.into()).or_insert(0) += quantity;
        }
        self
    }

    /// Units of `item_code` held in this cell.
    pub fn quantity_of(&self, item_code: &str) -> i64 {
        self.contents.get(item_code).copied().unwrap_or(0)
    }

    pub fn holds(&self, item_code: &str) -> bool {
        self.quantity_of(item_code) > 0
    }

    pub fn total_units(&self) -> i64 {
        self.contents.values().sum()
    }

    pub fn spare_capacity(&self) -> i64 {
        (self.capacity - self.total_units()).max(0)
    }

    /// Applies a signed adjustment, refusing to break the capacity invariant.
    ///
    /// The cell is untouched when an error is returned.
    pub fn apply(&mut self, item_code: &str, delta: i64) -> CoreResult<()> {
        let held = self.quantity_of(item_code);
        let next = held + delta;

        if next < 0 {
            return Err(CoreError::InsufficientStock {
                cell_id: self.cell_id.clone(),
                item_code: item_code.to_string(),
                available: held,
                requested: -delta,
            });
        }

        let total = self.total_units() + delta;
        if total > self.capacity {
            return Err(CoreError::CapacityExceeded {
                cell_id: self.cell_id.clone(),
                capacity: self.capacity,
                requested: total,
            });
        }

        if next == 0 {
            self.contents.remove(item_code);
        } else {
            self.contents.insert(item_code.to_string(), next);
        }
        Ok(())
    }
}

// =============================================================================
// Orders
// =============================================================================

/// One line of a retrieval order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub item_code: String,
    pub required_quantity: i64,
    /// Units already collected by earlier rounds.
    #[serde(default)]
    pub picked_quantity: i64,
    #[serde(default)]
    pub fulfilled: bool,
}

impl OrderLine {
    pub fn new(item_code: impl Into<String>, required_quantity: i64) -> Self {
        OrderLine {
            item_code: item_code.into(),
            required_quantity,
            picked_quantity: 0,
            fulfilled: false,
        }
    }

    /// Units still to pick.
    pub fn remaining(&self) -> i64 {
        if self.fulfilled {
            0
        } else {
            (self.required_quantity - self.picked_quantity).max(0)
        }
    }
}

/// A retrieval order (sales order) made of item lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub order_no: String,
    pub lines: Vec<OrderLine>,
}

impl Order {
    pub fn new(order_no: impl Into<String>, lines: Vec<OrderLine>) -> Self {
        Order {
            order_no: order_no.into(),
            lines,
        }
    }

    /// Outstanding units per item code, summed across duplicate lines.
    pub fn requirements(&self) -> BTreeMap<String, i64> {
        let mut out = BTreeMap::new();
        for line in &self.lines {
            let remaining = line.remaining();
            if remaining > 0 {
                *out.entry(line.item_code.clone()).or_insert(0) += remaining;
            }
        }
        out
    }

    pub fn is_complete(&self) -> bool {
        self.lines.iter().all(|l| l.remaining() == 0)
    }

    /// Intake checks: a valid order number and at least one line, each
    /// with a valid item code and a positive required quantity.
    pub fn validate(&self) -> ValidationResult<()> {
        validate_order_no(&self.order_no)?;
        if self.lines.is_empty() {
            return Err(ValidationError::Required {
                field: "lines".to_string(),
            });
        }
        for line in &self.lines {
            validate_item_code(&line.item_code)?;
            validate_quantity(line.required_quantity)?;
        }
        Ok(())
    }

    /// Records picked units against the order's lines.
    ///
    /// Units of one item fill its open lines in line order. Returns the item
    /// codes whose lines are now all fulfilled.
    pub fn apply_picks(&mut self, picks: &[PickItem]) -> Vec<String> {
        let mut touched = Vec::new();

        for pick in picks {
            let mut left = pick.quantity;
            for line in self
                .lines
                .iter_mut()
                .filter(|l| l.item_code == pick.item_code && !l.fulfilled)
            {
                if left <= 0 {
                    break;
                }
                let take = left.min(line.remaining());
                line.picked_quantity += take;
                left -= take;
                if line.picked_quantity >= line.required_quantity {
                    line.fulfilled = true;
                }
            }
            if !touched.contains(&pick.item_code) {
                touched.push(pick.item_code.clone());
            }
        }

        touched
            .into_iter()
            .filter(|code| {
                self.lines
                    .iter()
                    .filter(|l| &l.item_code == code)
                    .all(|l| l.fulfilled)
            })
            .collect()
    }

    /// Marks every line for the given item codes fulfilled.
    pub fn mark_fulfilled(&mut self, item_codes: &[String]) {
        for line in self.lines.iter_mut() {
            if item_codes.contains(&line.item_code) {
                line.fulfilled = true;
            }
        }
    }
}

/// A put-away request: stock arriving with no predetermined zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRequest {
    pub request_no: String,
    pub item_code: String,
    pub quantity: i64,
    #[serde(default)]
    pub applied: bool,
}

impl StockRequest {
    pub fn new(request_no: impl Into<String>, item_code: impl Into<String>, quantity: i64) -> Self {
        StockRequest {
            request_no: request_no.into(),
            item_code: item_code.into(),
            quantity,
            applied: false,
        }
    }

    pub fn validate(&self) -> ValidationResult<()> {
        validate_request_no(&self.request_no)?;
        validate_item_code(&self.item_code)?;
        validate_quantity(self.quantity)
    }
}

// =============================================================================
// Picks and Adjustments
// =============================================================================

/// Units of one item taken from (or placed into) a cell in one round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickItem {
    pub item_code: String,
    pub quantity: i64,
}

impl PickItem {
    pub fn new(item_code: impl Into<String>, quantity: i64) -> Self {
        PickItem {
            item_code: item_code.into(),
            quantity,
        }
    }
}

/// Expands picks into one entry per unit: `[A×2]` → `["A", "A"]`.
pub fn expand_units(items: &[PickItem]) -> Vec<String> {
    items
        .iter()
        .flat_map(|i| std::iter::repeat(i.item_code.clone()).take(i.quantity.max(0) as usize))
        .collect()
}

/// A signed change to one item count in one cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Adjustment {
    pub cell_id: String,
    pub item_code: String,
    pub delta: i64,
}

impl Adjustment {
    pub fn new(cell_id: impl Into<String>, item_code: impl Into<String>, delta: i64) -> Self {
        Adjustment {
            cell_id: cell_id.into(),
            item_code: item_code.into(),
            delta,
        }
    }
}

// =============================================================================
// Signals
// =============================================================================

/// Display payload for a light-panel location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightPayload {
    pub color: u32,
    pub quantity: i64,
    pub title: String,
    pub sub_title: String,
    /// Up to three display lines.
    pub lines: Vec<String>,
    pub unit: String,
}

/// Request to light a location, sent once per session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalCommand {
    pub location_id: String,
    pub payload: LightPayload,
}

impl SignalCommand {
    /// Builds the light for a resolved retrieval bin.
    pub fn for_pick(bin_id: &str, order_no: &str, zone: &Zone, items: &[PickItem], color: u32) -> Self {
        SignalCommand {
            location_id: bin_id.to_string(),
            payload: LightPayload {
                color,
                quantity: items.iter().map(|i| i.quantity).sum(),
                title: order_no.to_string(),
                sub_title: zone.to_string(),
                lines: items.iter().take(3).map(|i| i.item_code.clone()).collect(),
                unit: "pcs".to_string(),
            },
        }
    }
}

/// Location confirmation pushed by the light panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalConfirmation {
    pub location_id: String,
}

// =============================================================================
// Fleet
// =============================================================================

/// What the robot fleet should do with a rack side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FleetTaskType {
    /// Bring the rack side to the station.
    Fetch,
    /// Take the rack side back to storage.
    Return,
}

/// Dispatch request for the fleet API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FleetRequest {
    pub task_type: FleetTaskType,
    pub station: String,
    pub rack: String,
    pub side: String,
}

impl FleetRequest {
    pub fn new(task_type: FleetTaskType, station: impl Into<String>, zone: &Zone) -> Self {
        FleetRequest {
            task_type,
            station: station.into(),
            rack: zone.rack.clone(),
            side: zone.side.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zone_from_cell_id() {
        assert_eq!(Zone::from_cell_id("R1-S2-P4"), Some(Zone::new("R1", "S2")));
        assert_eq!(Zone::from_cell_id("R1"), None);
        assert_eq!("R3-S1".parse::<Zone>().unwrap().to_string(), "R3-S1");
        assert!("R3".parse::<Zone>().is_err());
    }

    #[test]
    fn test_cell_new_splits_slot() {
        let cell = StorageCell::new("R1-S1-P7", CellKind::Pigeonhole, 10).unwrap();
        assert_eq!(cell.zone, Zone::new("R1", "S1"));
        assert_eq!(cell.slot, "P7");
        assert!(StorageCell::new("P7", CellKind::Bin, 10).is_err());
    }

    #[test]
    fn test_cell_new_rejects_bad_capacity() {
        for capacity in [0, -4] {
            let err = StorageCell::new("R1-S1-P7", CellKind::Pigeonhole, capacity).unwrap_err();
            assert_eq!(err.kind(), "validation");
        }
        assert!(StorageCell::new("R1-S1-P 7", CellKind::Pigeonhole, 10).is_err());
    }

    #[test]
    fn test_intake_validation() {
        assert!(Order::new("SO-1", vec![OrderLine::new("A", 2)]).validate().is_ok());
        assert!(Order::new("SO-1", vec![]).validate().is_err());
        assert!(Order::new(" ", vec![OrderLine::new("A", 2)]).validate().is_err());
        assert!(matches!(
            Order::new("SO-1", vec![OrderLine::new("A", 0)]).validate(),
            Err(ValidationError::MustBePositive { .. })
        ));

        assert!(StockRequest::new("ST-1", "A", 3).validate().is_ok());
        assert!(StockRequest::new("ST-1", "A", -3).validate().is_err());
        assert!(StockRequest::new("ST-1", "", 3).validate().is_err());
    }

    #[test]
    fn test_apply_respects_capacity() {
        let mut cell = StorageCell::new("R1-S1-P1", CellKind::Pigeonhole, 5)
            .unwrap()
            .with_item("A", 4);

        let err = cell.apply("B", 2).unwrap_err();
        assert!(matches!(err, CoreError::CapacityExceeded { requested: 6, .. }));
        assert_eq!(cell.total_units(), 4);

        let err = cell.apply("A", -5).unwrap_err();
        assert!(matches!(err, CoreError::InsufficientStock { available: 4, .. }));

        cell.apply("A", -4).unwrap();
        assert!(cell.contents.is_empty());
    }

    #[test]
    fn test_order_requirements_sum_duplicates() {
        let mut done = OrderLine::new("C", 1);
        done.fulfilled = true;
        let mut partial = OrderLine::new("A", 3);
        partial.picked_quantity = 1;

        let order = Order::new("SO-1", vec![partial, OrderLine::new("A", 1), done]);
        let reqs = order.requirements();
        assert_eq!(reqs.get("A"), Some(&3));
        assert_eq!(reqs.get("C"), None);
        assert!(!order.is_complete());
    }

    #[test]
    fn test_apply_picks_fills_lines_in_order() {
        let mut order = Order::new(
            "SO-7",
            vec![OrderLine::new("A", 2), OrderLine::new("A", 2), OrderLine::new("B", 1)],
        );

        let done = order.apply_picks(&[PickItem::new("A", 3), PickItem::new("B", 1)]);
        assert_eq!(done, vec!["B".to_string()]);
        assert!(order.lines[0].fulfilled);
        assert_eq!(order.lines[1].picked_quantity, 1);
        assert!(!order.lines[1].fulfilled);

        let done = order.apply_picks(&[PickItem::new("A", 1)]);
        assert_eq!(done, vec!["A".to_string()]);
        assert!(order.is_complete());
    }

    #[test]
    fn test_expand_units() {
        let units = expand_units(&[PickItem::new("A", 2), PickItem::new("B", 1)]);
        assert_eq!(units, vec!["A", "A", "B"]);
    }

    #[test]
    fn test_fleet_request_wire_format() {
        let req = FleetRequest::new(FleetTaskType::Return, "stationA", &Zone::new("R1", "S1"));
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["task_type"], "return");
        assert_eq!(json["rack"], "R1");
        assert_eq!(json["side"], "S1");
    }
}
