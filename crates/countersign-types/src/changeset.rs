//! Typed amendment changesets.
//!
//! An amendment proposal carries a closed set of permitted field edits
//! rather than an arbitrary field map: validation is an exhaustive match,
//! and a non-whitelisted key is rejected before anything is persisted.
//! The wire form stays the original record's field-map shape
//! (`{"totalCost": 12.5, "currency": "EUR"}`); [`Changeset::from_map`]
//! converts it into [`Amendment`] values.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ChangesetError;
use crate::order::{OrderStatus, ProcurementOrder, ProductLine};

/// One permitted field edit on a procurement order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Amendment {
    Status(OrderStatus),
    StatusNote(Option<String>),
    DeliveryDate(DateTime<Utc>),
    Quantity { sku: String, quantity: u32 },
    Products(Vec<ProductLine>),
    TotalCost(f64),
    Currency(String),
}

impl Amendment {
    /// The wire-form field key this amendment edits.
    pub fn field(&self) -> &'static str {
        match self {
            Amendment::Status(_) => "status",
            Amendment::StatusNote(_) => "statusUpdate",
            Amendment::DeliveryDate(_) => "deliveryDate",
            Amendment::Quantity { .. } => "quantity",
            Amendment::Products(_) => "products",
            Amendment::TotalCost(_) => "totalCost",
            Amendment::Currency(_) => "currency",
        }
    }
}

/// A validated, non-empty set of amendments with no duplicate fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Changeset(Vec<Amendment>);

impl Changeset {
    /// Build a changeset from amendments, rejecting empty sets and
    /// duplicate fields.
    pub fn new(amendments: Vec<Amendment>) -> Result<Self, ChangesetError> {
        if amendments.is_empty() {
            return Err(ChangesetError::Empty);
        }
        for (i, a) in amendments.iter().enumerate() {
            if amendments[..i].iter().any(|b| b.field() == a.field()) {
                return Err(ChangesetError::DuplicateField(a.field().to_string()));
            }
        }
        Ok(Self(amendments))
    }

    /// Parse the wire-form field map into a typed changeset.
    ///
    /// Unknown keys fail with `UnknownField`; whitelisted keys carrying an
    /// illegal value (e.g. `status` set to a string that is not an order
    /// status) fail with `InvalidValue`. Nothing is persisted on failure.
    pub fn from_map(map: &serde_json::Map<String, Value>) -> Result<Self, ChangesetError> {
        let mut amendments = Vec::with_capacity(map.len());
        for (key, value) in map {
            amendments.push(parse_amendment(key, value)?);
        }
        Self::new(amendments)
    }

    /// The amendments in this changeset.
    pub fn amendments(&self) -> &[Amendment] {
        &self.0
    }

    /// Whether the changeset explicitly sets the order status.
    pub fn sets_status(&self) -> bool {
        self.0.iter().any(|a| matches!(a, Amendment::Status(_)))
    }

    /// Check the changeset against an order without mutating it.
    pub fn validate(&self, order: &ProcurementOrder) -> Result<(), ChangesetError> {
        self.apply(&mut order.clone())
    }

    /// Merge the amendments into the order. Only the fields present in the
    /// changeset are touched; everything else is left as-is.
    pub fn apply(&self, order: &mut ProcurementOrder) -> Result<(), ChangesetError> {
        for amendment in &self.0 {
            match amendment {
                Amendment::Status(status) => order.status = *status,
                Amendment::StatusNote(note) => order.status_note = note.clone(),
                Amendment::DeliveryDate(date) => order.delivery_date = Some(*date),
                Amendment::Quantity { sku, quantity } => {
                    let line = order
                        .products
                        .iter_mut()
                        .find(|p| &p.sku == sku)
                        .ok_or_else(|| ChangesetError::InvalidValue {
                            field: "quantity".to_string(),
                            reason: format!("no product with sku '{sku}' on this order"),
                        })?;
                    line.quantity = *quantity;
                    line.recompute_total();
                }
                Amendment::Products(products) => order.products = products.clone(),
                Amendment::TotalCost(cost) => order.total_cost = *cost,
                Amendment::Currency(currency) => order.currency = currency.clone(),
            }
        }
        Ok(())
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ChangesetError {
    ChangesetError::InvalidValue {
        field: field.to_string(),
        reason: reason.into(),
    }
}

fn parse_amendment(key: &str, value: &Value) -> Result<Amendment, ChangesetError> {
    match key {
        "status" => {
            let s = value
                .as_str()
                .ok_or_else(|| invalid(key, "expected a status string"))?;
            let status: OrderStatus = s.parse().map_err(|e: String| invalid(key, e))?;
            Ok(Amendment::Status(status))
        }
        "statusUpdate" => match value {
            Value::Null => Ok(Amendment::StatusNote(None)),
            Value::String(s) => Ok(Amendment::StatusNote(Some(s.clone()))),
            _ => Err(invalid(key, "expected a string or null")),
        },
        "deliveryDate" => {
            let s = value
                .as_str()
                .ok_or_else(|| invalid(key, "expected an RFC 3339 datetime string"))?;
            let date = DateTime::parse_from_rfc3339(s)
                .map_err(|e| invalid(key, e.to_string()))?
                .with_timezone(&Utc);
            Ok(Amendment::DeliveryDate(date))
        }
        "quantity" => {
            let obj = value
                .as_object()
                .ok_or_else(|| invalid(key, "expected {\"sku\", \"quantity\"}"))?;
            let sku = obj
                .get("sku")
                .and_then(Value::as_str)
                .ok_or_else(|| invalid(key, "missing sku"))?;
            let quantity = obj
                .get("quantity")
                .and_then(Value::as_u64)
                .ok_or_else(|| invalid(key, "missing or non-integer quantity"))?;
            if quantity == 0 {
                return Err(invalid(key, "quantity must be at least 1"));
            }
            let quantity =
                u32::try_from(quantity).map_err(|_| invalid(key, "quantity out of range"))?;
            Ok(Amendment::Quantity {
                sku: sku.to_string(),
                quantity,
            })
        }
        "products" => {
            let mut products: Vec<ProductLine> = serde_json::from_value(value.clone())
                .map_err(|e| invalid(key, e.to_string()))?;
            if products.is_empty() {
                return Err(invalid(key, "product list cannot be empty"));
            }
            for line in &mut products {
                if line.quantity == 0 {
                    return Err(invalid(key, format!("sku '{}' has zero quantity", line.sku)));
                }
                if !line.unit_price.is_finite() || line.unit_price < 0.0 {
                    return Err(invalid(key, format!("sku '{}' has a bad unit price", line.sku)));
                }
                line.recompute_total();
            }
            Ok(Amendment::Products(products))
        }
        "totalCost" => {
            let cost = value
                .as_f64()
                .ok_or_else(|| invalid(key, "expected a number"))?;
            if !cost.is_finite() || cost <= 0.0 {
                return Err(invalid(key, "total cost must be a positive number"));
            }
            Ok(Amendment::TotalCost(cost))
        }
        "currency" => {
            let s = value
                .as_str()
                .ok_or_else(|| invalid(key, "expected a currency code string"))?;
            if s.len() != 3 || !s.chars().all(|c| c.is_ascii_alphabetic()) {
                return Err(invalid(key, "expected a 3-letter currency code"));
            }
            Ok(Amendment::Currency(s.to_ascii_uppercase()))
        }
        other => Err(ChangesetError::UnknownField(other.to_string())),
    }
}
