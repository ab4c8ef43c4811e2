//! Banner value types.
//!
//! A banner is mostly opaque to the reconciliation engine: only `id`,
//! `priority` and `dismissible` are interpreted. Everything else (title,
//! html body, actions, ...) is carried in `extra` and round-trips unchanged.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use tracing::warn;

/// Presentation category of a banner. Unknown values are preserved verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BannerType {
    #[default]
    Info,
    Warning,
    Error,
    Other(String),
}

impl From<String> for BannerType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "info" => BannerType::Info,
            "warning" => BannerType::Warning,
            "error" => BannerType::Error,
            _ => BannerType::Other(value),
        }
    }
}

impl From<BannerType> for String {
    fn from(value: BannerType) -> Self {
        match value {
            BannerType::Info => "info".to_string(),
            BannerType::Warning => "warning".to_string(),
            BannerType::Error => "error".to_string(),
            BannerType::Other(other) => other,
        }
    }
}

impl BannerType {
    /// CSS class a renderer should attach. Unknown types render as info.
    pub fn css_class(&self) -> &'static str {
        match self {
            BannerType::Warning => "banner-warning",
            BannerType::Error => "banner-error",
            BannerType::Info | BannerType::Other(_) => "banner-info",
        }
    }

    /// Icon name a renderer should show. Unknown types render as info.
    pub fn icon(&self) -> &'static str {
        match self {
            BannerType::Warning => "warning",
            BannerType::Error => "error",
            BannerType::Info | BannerType::Other(_) => "info",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Banner {
    /// Stable identity. Empty strings deserialize as `None`.
    #[serde(
        default,
        deserialize_with = "non_empty_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_priority")]
    pub priority: f64,
    #[serde(default = "default_dismissible", deserialize_with = "lenient_dismissible")]
    pub dismissible: bool,
    #[serde(rename = "type", default, deserialize_with = "lenient_kind")]
    pub kind: BannerType,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Banner {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            id: (!id.is_empty()).then_some(id),
            priority: 0.0,
            dismissible: true,
            kind: BannerType::Info,
            extra: Map::new(),
        }
    }

    /// A banner with no identity. It is never deduplicated or dismissed.
    pub fn anonymous() -> Self {
        Self {
            id: None,
            priority: 0.0,
            dismissible: true,
            kind: BannerType::Info,
            extra: Map::new(),
        }
    }

    pub fn with_priority(mut self, priority: f64) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_kind(mut self, kind: BannerType) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_dismissible(mut self, dismissible: bool) -> Self {
        self.dismissible = dismissible;
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Id under which this banner participates in dismissal, if any.
    pub fn dismissal_key(&self) -> Option<&str> {
        if self.dismissible {
            self.id()
        } else {
            None
        }
    }

    /// Descending priority order. NaN compares as zero.
    pub fn cmp_priority_desc(&self, other: &Banner) -> Ordering {
        sortable(other.priority).total_cmp(&sortable(self.priority))
    }
}

fn sortable(priority: f64) -> f64 {
    // Folds NaN and -0.0 so total_cmp agrees with numeric equality.
    if priority.is_nan() || priority == 0.0 {
        0.0
    } else {
        priority
    }
}

fn default_dismissible() -> bool {
    true
}

fn non_empty_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let id = Option::<String>::deserialize(deserializer)?;
    Ok(id.filter(|value| !value.is_empty()))
}

fn lenient_priority<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(0.0))
}

// Only an explicit `false` opts a banner out of dismissal.
fn lenient_dismissible<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)? != Some(false))
}

// `type` is presentation only; anything but a string renders as the default.
fn lenient_kind<'de, D>(deserializer: D) -> Result<BannerType, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(kind)) => BannerType::from(kind),
        _ => BannerType::default(),
    })
}

/// Deserializes a banner list one entry at a time. Entries that are not valid
/// banners are dropped with a warning instead of failing the whole batch.
pub fn lenient_banners<'de, D>(deserializer: D) -> Result<Vec<Banner>, D::Error>
where
    D: Deserializer<'de>,
{
    let entries = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(entries
        .into_iter()
        .enumerate()
        .filter_map(|(index, entry)| match serde_json::from_value::<Banner>(entry) {
            Ok(banner) => Some(banner),
            Err(err) => {
                warn!(index, error = %err, "Dropping invalid banner from batch");
                None
            }
        })
        .collect())
}
