//! Itinerary data model
//!
//! Generator output is untyped; everything here is built field-by-field from
//! `serde_json::Value` so that invalid items are dropped rather than coerced.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::cost;
use super::error::PlanError;
use super::title::dedup_key;

const TITLE_FIELDS: &[&str] = &["title", "name"];
const DESCRIPTION_FIELDS: &[&str] = &["short_description", "shortDescription", "description"];
const COST_FIELDS: &[&str] = &["estimated_cost", "estimatedCost", "cost"];
const PLAN_DAYS_FIELDS: &[&str] = &["planDays", "plan_days"];
const REPLY_FIELDS: &[&str] = &["replyText", "reply_text"];

/// Late-arriving enrichment data attached to an item
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

impl ItemMetadata {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Fields set in `patch` override ours; unset fields keep our values
    pub fn merged_with(&self, patch: &ItemMetadata) -> ItemMetadata {
        ItemMetadata {
            image_url: patch.image_url.clone().or_else(|| self.image_url.clone()),
            place_id: patch.place_id.clone().or_else(|| self.place_id.clone()),
            address: patch.address.clone().or_else(|| self.address.clone()),
            latitude: patch.latitude.or(self.latitude),
            longitude: patch.longitude.or(self.longitude),
        }
    }
}

/// One activity in a day
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanItem {
    pub title: String,
    pub short_description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_cost: Option<String>,
    #[serde(skip_serializing_if = "ItemMetadata::is_empty")]
    pub metadata: ItemMetadata,
}

impl PlanItem {
    /// Build an item, returning `None` if title or description is blank
    pub fn new(title: impl Into<String>, short_description: impl Into<String>) -> Option<Self> {
        let title = title.into().trim().to_string();
        let short_description = short_description.into().trim().to_string();
        if title.is_empty() || short_description.is_empty() {
            return None;
        }
        Some(Self {
            title,
            short_description,
            estimated_cost: None,
            metadata: ItemMetadata::default(),
        })
    }

    /// Attach a cost, normalized to canonical form
    pub fn with_cost(mut self, raw: Option<&str>) -> Self {
        self.estimated_cost = cost::normalize(raw);
        self
    }

    /// Copy of this item with `patch` merged into its metadata
    pub fn with_metadata(&self, patch: &ItemMetadata) -> Self {
        Self {
            metadata: self.metadata.merged_with(patch),
            ..self.clone()
        }
    }

    /// Identity key used for dedup
    pub fn key(&self) -> String {
        dedup_key(&self.title)
    }

    /// Validate an untyped JSON object into an item
    ///
    /// Title and description must be non-empty strings (legacy aliases are
    /// accepted). A cost that is not a string is ignored, not fatal.
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let title = first_string(object, TITLE_FIELDS)?;
        let description = first_string(object, DESCRIPTION_FIELDS)?;
        let cost = first_string(object, COST_FIELDS);
        Some(Self::new(title, description)?.with_cost(cost))
    }
}

fn first_string<'a>(object: &'a serde_json::Map<String, Value>, names: &[&str]) -> Option<&'a str> {
    names.iter().find_map(|name| object.get(*name).and_then(Value::as_str))
}

/// Ordered activities for one calendar day
pub type DayBucket = Vec<PlanItem>;

/// Position of an item, or of a gap between items, within the plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotRef {
    pub day: usize,
    pub index: usize,
}

impl SlotRef {
    pub fn new(day: usize, index: usize) -> Self {
        Self { day, index }
    }
}

impl std::fmt::Display for SlotRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "day {} #{}", self.day, self.index)
    }
}

/// The itinerary: one bucket per day, in day order
///
/// Read access is public; mutation is reserved to the reconciler.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct PlanDocument {
    days: Vec<DayBucket>,
}

impl PlanDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_days(days: Vec<DayBucket>) -> Self {
        Self { days }
    }

    pub fn days(&self) -> &[DayBucket] {
        &self.days
    }

    pub fn day(&self, index: usize) -> Option<&DayBucket> {
        self.days.get(index)
    }

    pub fn item(&self, slot: SlotRef) -> Option<&PlanItem> {
        self.days.get(slot.day).and_then(|d| d.get(slot.index))
    }

    /// Number of days
    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn total_items(&self) -> usize {
        self.days.iter().map(Vec::len).sum()
    }

    /// Find an item by dedup key, searching `preferred_day` first
    pub fn find_key(&self, key: &str, preferred_day: Option<usize>) -> Option<SlotRef> {
        let in_day = |day: usize| {
            self.days
                .get(day)
                .and_then(|bucket| bucket.iter().position(|item| item.key() == key))
                .map(|index| SlotRef::new(day, index))
        };

        if let Some(found) = preferred_day.and_then(&in_day) {
            return Some(found);
        }
        (0..self.days.len())
            .filter(|day| Some(*day) != preferred_day)
            .find_map(&in_day)
    }

    pub(crate) fn days_mut(&mut self) -> &mut Vec<DayBucket> {
        &mut self.days
    }

    /// Mutable bucket for `index`, growing the document with empty days as needed
    pub(crate) fn day_mut_or_grow(&mut self, index: usize) -> &mut DayBucket {
        if self.days.len() <= index {
            self.days.resize_with(index + 1, Vec::new);
        }
        &mut self.days[index]
    }
}

/// A day recovered from a partial buffer, tagged with its `planDays` position
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedDay {
    pub day_index: usize,
    pub bucket: DayBucket,
}

/// The complete, parsed terminal document for one planning turn
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FinalPlan {
    pub reply_text: String,
    pub days: Vec<DayBucket>,
    /// Auxiliary suggestions, used first when backfilling short days
    pub suggestions: Vec<PlanItem>,
}

impl FinalPlan {
    /// Parse and validate the final frame payload
    pub fn parse(payload: &str) -> Result<Self, PlanError> {
        debug!(payload_len = payload.len(), "FinalPlan::parse: called");
        let value: Value = serde_json::from_str(payload)?;
        Self::from_value(&value)
    }

    pub fn from_value(value: &Value) -> Result<Self, PlanError> {
        let object = value
            .as_object()
            .ok_or_else(|| PlanError::Schema("document is not an object".to_string()))?;

        let reply_text = match REPLY_FIELDS.iter().find_map(|name| object.get(*name)) {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(text)) => text.clone(),
            Some(_) => return Err(PlanError::Schema("replyText is not a string".to_string())),
        };

        let raw_days = PLAN_DAYS_FIELDS
            .iter()
            .find_map(|name| object.get(*name))
            .ok_or_else(|| PlanError::Schema("planDays is missing".to_string()))?
            .as_array()
            .ok_or_else(|| PlanError::Schema("planDays is not an array".to_string()))?;

        let mut days = Vec::with_capacity(raw_days.len());
        for (index, raw_day) in raw_days.iter().enumerate() {
            let items = raw_day
                .as_array()
                .ok_or_else(|| PlanError::Schema(format!("planDays[{}] is not an array", index)))?;
            let bucket: DayBucket = items.iter().filter_map(PlanItem::from_value).collect();
            if bucket.len() < items.len() {
                debug!(
                    day = index,
                    dropped = items.len() - bucket.len(),
                    "FinalPlan::from_value: dropped invalid items"
                );
            }
            days.push(bucket);
        }

        let suggestions = object
            .get("suggestions")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(PlanItem::from_value).collect())
            .unwrap_or_default();

        Ok(Self {
            reply_text,
            days,
            suggestions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_item_from_value() {
        let item = PlanItem::from_value(&json!({
            "title": "Balboa Park",
            "short_description": "Gardens and museums",
            "estimated_cost": "Free entry"
        }))
        .unwrap();

        assert_eq!(item.title, "Balboa Park");
        assert_eq!(item.short_description, "Gardens and museums");
        assert_eq!(item.estimated_cost.as_deref(), Some("free"));
    }

    #[test]
    fn test_item_legacy_aliases() {
        let item = PlanItem::from_value(&json!({
            "name": "Zoo",
            "description": "Animals",
            "cost": "$25 to $40"
        }))
        .unwrap();

        assert_eq!(item.title, "Zoo");
        assert_eq!(item.estimated_cost.as_deref(), Some("$25–$40"));
    }

    #[test]
    fn test_item_requires_strings() {
        assert!(PlanItem::from_value(&json!({"title": "Zoo"})).is_none());
        assert!(PlanItem::from_value(&json!({"title": 5, "short_description": "x"})).is_none());
        assert!(PlanItem::from_value(&json!({"title": "  ", "short_description": "x"})).is_none());
        assert!(PlanItem::from_value(&json!(["Zoo", "Animals"])).is_none());
    }

    #[test]
    fn test_non_string_cost_ignored() {
        let item = PlanItem::from_value(&json!({"title": "Zoo", "short_description": "x", "estimated_cost": 12}))
            .unwrap();
        assert!(item.estimated_cost.is_none());
    }

    #[test]
    fn test_metadata_merge() {
        let base = ItemMetadata {
            image_url: Some("a.jpg".to_string()),
            place_id: Some("p1".to_string()),
            ..Default::default()
        };
        let patch = ItemMetadata {
            image_url: Some("b.jpg".to_string()),
            latitude: Some(32.7),
            ..Default::default()
        };

        let merged = base.merged_with(&patch);
        assert_eq!(merged.image_url.as_deref(), Some("b.jpg"));
        assert_eq!(merged.place_id.as_deref(), Some("p1"));
        assert_eq!(merged.latitude, Some(32.7));
    }

    #[test]
    fn test_find_key_prefers_day() {
        let zoo = PlanItem::new("Zoo", "Animals").unwrap();
        let park = PlanItem::new("Balboa Park", "Walk").unwrap();
        let doc = PlanDocument::from_days(vec![vec![zoo.clone()], vec![park, zoo]]);

        assert_eq!(doc.find_key("zoo", Some(1)), Some(SlotRef::new(1, 1)));
        assert_eq!(doc.find_key("zoo", None), Some(SlotRef::new(0, 0)));
        assert_eq!(doc.find_key("balboa park", Some(0)), Some(SlotRef::new(1, 0)));
        assert_eq!(doc.find_key("beach", None), None);
    }

    #[test]
    fn test_final_plan_parse() {
        let plan = FinalPlan::parse(
            r#"{"replyText":"Hi","planDays":[[{"title":"Zoo","short_description":"Animals"},{"title":"bad"}],[]],
               "suggestions":[{"title":"Beach","short_description":"Sand"}]}"#,
        )
        .unwrap();

        assert_eq!(plan.reply_text, "Hi");
        assert_eq!(plan.days.len(), 2);
        assert_eq!(plan.days[0].len(), 1);
        assert!(plan.days[1].is_empty());
        assert_eq!(plan.suggestions[0].title, "Beach");
    }

    #[test]
    fn test_final_plan_invalid_json() {
        assert!(matches!(
            FinalPlan::parse("{\"planDays\": [[").unwrap_err(),
            PlanError::InvalidFinal(_)
        ));
    }

    #[test]
    fn test_final_plan_schema_errors() {
        assert!(matches!(FinalPlan::parse("[]").unwrap_err(), PlanError::Schema(_)));
        assert!(matches!(
            FinalPlan::parse(r#"{"replyText":"Hi"}"#).unwrap_err(),
            PlanError::Schema(_)
        ));
        assert!(matches!(
            FinalPlan::parse(r#"{"planDays":[{"title":"x"}]}"#).unwrap_err(),
            PlanError::Schema(_)
        ));
        assert!(matches!(
            FinalPlan::parse(r#"{"replyText":3,"planDays":[]}"#).unwrap_err(),
            PlanError::Schema(_)
        ));
    }

    #[test]
    fn test_item_serializes_camel_case() {
        let item = PlanItem::new("Zoo", "Animals").unwrap().with_cost(Some("$10"));
        let value = serde_json::to_value(&item).unwrap();

        assert_eq!(value["shortDescription"], "Animals");
        assert_eq!(value["estimatedCost"], "$10");
        assert!(value.get("metadata").is_none());
    }
}
