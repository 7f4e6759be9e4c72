mod session;

pub use session::{CrawlSession, SessionStatus};

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};
use uuid::Uuid;

use crate::error::ModelError;
use crate::normalize;

/// A settable listing field.
///
/// `link` and `unit_price` are deliberately absent: the link is the
/// immutable natural key and the unit price is always derived.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumString, EnumIter,
    Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Title,
    Address,
    City,
    Seller,
    Phone,
    Price,
    Area,
    PostedDate,
    Bedrooms,
    Bathrooms,
    Legal,
    Frontage,
    Description,
    AmenityLocation,
    PropertyType,
}

/// Raw field values produced by a source adapter, keyed by field.
pub type FieldMap = BTreeMap<Field, String>;

/// A listing link discovered on a search page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateLink {
    pub url: String,
    pub title: String,
}

/// Core property data model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub id: Uuid,
    pub title: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub seller: Option<String>,
    pub phone: Option<String>,
    pub price: Option<f64>,
    pub area: Option<f64>,
    pub unit_price: Option<f64>,
    pub link: String,
    pub posted_date: Option<NaiveDate>,
    pub bedrooms: Option<u32>,
    pub bathrooms: Option<u32>,
    pub legal: Option<String>,
    pub frontage: Option<f64>,
    pub description: Option<String>,
    pub amenity_location: Option<String>,
    pub property_type: Option<String>,
    pub source: String,
    pub crawled_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Property {
    /// Creates an empty listing for `link`, which must be an absolute
    /// http(s) URL.
    pub fn new(
        link: impl Into<String>,
        source: impl Into<String>,
        crawled_at: DateTime<Utc>,
    ) -> Result<Self, ModelError> {
        let link = link.into();
        if !normalize::is_valid_url(&link) {
            return Err(ModelError::InvalidLink(link));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            title: None,
            address: None,
            city: None,
            seller: None,
            phone: None,
            price: None,
            area: None,
            unit_price: None,
            link,
            posted_date: None,
            bedrooms: None,
            bathrooms: None,
            legal: None,
            frontage: None,
            description: None,
            amenity_location: None,
            property_type: None,
            source: source.into(),
            crawled_at,
            updated_at: crawled_at,
        })
    }

    /// Builds a listing from an adapter's field map. Fields that fail to
    /// normalize are left empty.
    pub fn from_fields(
        link: impl Into<String>,
        source: impl Into<String>,
        fields: &FieldMap,
        crawled_at: DateTime<Utc>,
    ) -> Result<Self, ModelError> {
        let mut property = Self::new(link, source, crawled_at)?;
        for (field, raw) in fields {
            if let Err(e) = property.apply_field(*field, raw) {
                tracing::debug!(link = %property.link, error = %e, "Dropping unparseable field");
            }
        }
        if property.city.is_none() {
            property.city = property.address.as_deref().and_then(normalize::extract_city);
        }
        Ok(property)
    }

    /// Normalizes `raw` for `field` and stores it. On failure the current
    /// value is left untouched.
    pub fn apply_field(&mut self, field: Field, raw: &str) -> Result<(), ModelError> {
        let unparseable = || ModelError::UnparseableField {
            field,
            value: raw.to_string(),
        };
        let text = || normalize::clean_text(raw).ok_or_else(unparseable);

        match field {
            Field::Title => self.title = Some(text()?),
            Field::Address => self.address = Some(text()?),
            Field::City => {
                self.city = Some(normalize::extract_city(raw).ok_or_else(unparseable)?);
            }
            Field::Seller => self.seller = Some(text()?),
            Field::Phone => self.phone = Some(normalize::parse_phone(raw).ok_or_else(unparseable)?),
            Field::Price => self.price = Some(normalize::parse_price(raw).ok_or_else(unparseable)?),
            Field::Area => self.area = Some(normalize::parse_area(raw).ok_or_else(unparseable)?),
            Field::PostedDate => {
                self.posted_date =
                    Some(normalize::parse_date(raw, self.crawled_at).ok_or_else(unparseable)?);
            }
            Field::Bedrooms => {
                self.bedrooms = Some(normalize::parse_bedrooms(raw).ok_or_else(unparseable)?);
            }
            Field::Bathrooms => {
                self.bathrooms = Some(normalize::parse_bathrooms(raw).ok_or_else(unparseable)?);
            }
            Field::Legal => self.legal = Some(text()?),
            Field::Frontage => {
                self.frontage = Some(normalize::parse_frontage(raw).ok_or_else(unparseable)?);
            }
            Field::Description => self.description = Some(text()?),
            Field::AmenityLocation => self.amenity_location = Some(text()?),
            Field::PropertyType => {
                self.property_type =
                    Some(normalize::normalize_property_type(raw).ok_or_else(unparseable)?);
            }
        }

        self.recompute_unit_price();
        Ok(())
    }

    /// Returns the current value of `field` rendered as text.
    pub fn field_value(&self, field: Field) -> Option<String> {
        match field {
            Field::Title => self.title.clone(),
            Field::Address => self.address.clone(),
            Field::City => self.city.clone(),
            Field::Seller => self.seller.clone(),
            Field::Phone => self.phone.clone(),
            Field::Price => self.price.map(|v| v.to_string()),
            Field::Area => self.area.map(|v| v.to_string()),
            Field::PostedDate => self.posted_date.map(|d| d.format("%Y-%m-%d").to_string()),
            Field::Bedrooms => self.bedrooms.map(|v| v.to_string()),
            Field::Bathrooms => self.bathrooms.map(|v| v.to_string()),
            Field::Legal => self.legal.clone(),
            Field::Frontage => self.frontage.map(|v| v.to_string()),
            Field::Description => self.description.clone(),
            Field::AmenityLocation => self.amenity_location.clone(),
            Field::PropertyType => self.property_type.clone(),
        }
    }

    /// True when `field` has no usable value.
    pub fn is_missing(&self, field: Field) -> bool {
        self.field_value(field).map_or(true, |v| v.trim().is_empty())
    }

    /// Fields that currently have no value.
    pub fn missing_fields(&self) -> Vec<Field> {
        Field::iter().filter(|f| self.is_missing(*f)).collect()
    }

    /// Derives `unit_price = round(price / area, 2)` when both are
    /// positive, clears it otherwise.
    pub fn recompute_unit_price(&mut self) {
        self.unit_price = match (self.price, self.area) {
            (Some(price), Some(area)) if price > 0.0 && area > 0.0 => {
                Some(normalize::round2(price / area))
            }
            _ => None,
        };
    }
}
