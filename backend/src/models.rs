//! Request schemas accepted at the HTTP boundary.
//!
//! Each resource names the fields it relies on and lets any other fields
//! through untouched via `extra`, so clients can keep storing itinerary,
//! media and profile details without a schema change here.

use std::str::FromStr;

use bson::{Bson, Decimal128, Document};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{ser::Error as _, Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::store::StoreError;

pub const ROLE_TOURIST: &str = "tourist";
pub const ROLE_TOUR_GUIDE: &str = "tourGuide";

pub const BOOKING_PENDING: &str = "Pending";
pub const BOOKING_IN_REVIEW: &str = "In Review";

type Extra = Map<String, Value>;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }
}

fn require_text(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new(format!("{field} must not be empty")));
    }
    Ok(())
}

fn require_email(field: &str, value: &str) -> Result<(), ValidationError> {
    require_text(field, value)?;
    if !value.contains('@') {
        return Err(ValidationError::new(format!(
            "{field} must be an email address"
        )));
    }
    Ok(())
}

/// Serializes a boundary struct into a storable document. Client-supplied
/// `_id` values never reach the store.
fn into_document<T: Serialize>(value: &T) -> Result<Document, StoreError> {
    let mut document = bson::to_document(value)?;
    document.remove("_id");
    Ok(document)
}

/// A decimal amount in the major currency unit, accepted as a JSON number or
/// a numeric string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(try_from = "RawPrice")]
pub struct Price(Decimal);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawPrice {
    Number(f64),
    Text(String),
}

impl TryFrom<RawPrice> for Price {
    type Error = String;

    fn try_from(raw: RawPrice) -> Result<Self, Self::Error> {
        let parsed = match raw {
            RawPrice::Number(number) => Decimal::from_f64(number),
            RawPrice::Text(text) => Decimal::from_str(text.trim()).ok(),
        };
        parsed
            .map(Price)
            .ok_or_else(|| "price must be a finite decimal number".to_string())
    }
}

impl Price {
    pub fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    pub fn amount(self) -> Decimal {
        self.0
    }
}

/// Stored as a BSON `Decimal128` so the validated amount keeps every digit.
impl Serialize for Price {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let stored: Decimal128 = self
            .0
            .to_string()
            .parse()
            .map_err(|err| S::Error::custom(format!("price {} is not storable: {err}", self.0)))?;
        stored.serialize(serializer)
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct UserProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl Validate for UserProfile {
    fn validate(&self) -> Result<(), ValidationError> {
        if let Some(role) = &self.role {
            require_text("role", role)?;
        }
        Ok(())
    }
}

impl UserProfile {
    /// Fields to `$set` on the user matched by `email`. The path email wins
    /// over any email in the body.
    pub fn into_set_document(mut self, email: &str) -> Result<Document, StoreError> {
        self.email = Some(email.to_string());
        into_document(&self)
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct NewPackage {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub price: Price,
    #[serde(flatten)]
    pub extra: Extra,
}

impl Validate for NewPackage {
    fn validate(&self) -> Result<(), ValidationError> {
        require_text("title", &self.title)?;
        if self.price.amount().is_sign_negative() {
            return Err(ValidationError::new("price must not be negative"));
        }
        Ok(())
    }
}

impl NewPackage {
    pub fn into_document(self) -> Result<Document, StoreError> {
        into_document(&self)
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct NewGuideApplication {
    pub email: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experience: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub languages: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specialty: Option<String>,
    #[serde(rename = "cvLink", default, skip_serializing_if = "Option::is_none")]
    pub cv_link: Option<String>,
    #[serde(rename = "photoURL", default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl Validate for NewGuideApplication {
    fn validate(&self) -> Result<(), ValidationError> {
        require_email("email", &self.email)?;
        require_text("name", &self.name)
    }
}

impl NewGuideApplication {
    pub fn into_document(self) -> Result<Document, StoreError> {
        into_document(&self)
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct NewStory {
    #[serde(rename = "authorEmail")]
    pub author_email: String,
    pub title: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl Validate for NewStory {
    fn validate(&self) -> Result<(), ValidationError> {
        require_email("authorEmail", &self.author_email)?;
        require_text("title", &self.title)
    }
}

impl NewStory {
    pub fn into_document(self) -> Result<Document, StoreError> {
        into_document(&self)
    }
}

#[derive(Debug, Deserialize)]
pub struct StoryUpdate {
    pub title: Option<String>,
    pub text: Option<String>,
    #[serde(rename = "newImages", default)]
    pub new_images: Vec<String>,
}

impl Validate for StoryUpdate {
    fn validate(&self) -> Result<(), ValidationError> {
        if let Some(title) = &self.title {
            require_text("title", title)?;
        }
        Ok(())
    }
}

impl StoryUpdate {
    pub fn set_document(&self) -> Document {
        let mut fields = Document::new();
        if let Some(title) = &self.title {
            fields.insert("title", title.clone());
        }
        if let Some(text) = &self.text {
            fields.insert("text", text.clone());
        }
        fields
    }

    pub fn appended_images(&self) -> Vec<Bson> {
        self.new_images.iter().cloned().map(Bson::String).collect()
    }
}

#[derive(Debug, Deserialize)]
pub struct RemoveImage {
    pub image: String,
}

impl Validate for RemoveImage {}

#[derive(Debug, Deserialize, Serialize)]
pub struct NewBooking {
    #[serde(rename = "touristEmail")]
    pub tourist_email: String,
    #[serde(rename = "tourGuideEmail", default, skip_serializing_if = "Option::is_none")]
    pub tour_guide_email: Option<String>,
    #[serde(rename = "packageId", default, skip_serializing_if = "Option::is_none")]
    pub package_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Price>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl Validate for NewBooking {
    fn validate(&self) -> Result<(), ValidationError> {
        require_email("touristEmail", &self.tourist_email)?;
        if let Some(email) = &self.tour_guide_email {
            require_email("tourGuideEmail", email)?;
        }
        Ok(())
    }
}

impl NewBooking {
    /// New bookings always start out pending, whatever the client sent.
    pub fn into_document(self) -> Result<Document, StoreError> {
        let mut document = into_document(&self)?;
        document.insert("status", BOOKING_PENDING);
        Ok(document)
    }
}

#[derive(Debug, Deserialize)]
pub struct BookingStatusUpdate {
    pub status: String,
}

impl Validate for BookingStatusUpdate {
    fn validate(&self) -> Result<(), ValidationError> {
        require_text("status", &self.status)
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct NewPayment {
    #[serde(rename = "bookingId")]
    pub booking_id: String,
    pub price: Price,
    #[serde(rename = "transactionId")]
    pub transaction_id: String,
    #[serde(flatten)]
    pub extra: Extra,
}

impl Validate for NewPayment {
    fn validate(&self) -> Result<(), ValidationError> {
        require_text("bookingId", &self.booking_id)?;
        require_text("transactionId", &self.transaction_id)?;
        if self.price.amount().is_sign_negative() {
            return Err(ValidationError::new("price must not be negative"));
        }
        Ok(())
    }
}

impl NewPayment {
    pub fn into_document(self) -> Result<Document, StoreError> {
        into_document(&self)
    }
}

#[derive(Debug, Deserialize)]
pub struct PaymentIntentRequest {
    pub price: Price,
}

impl Validate for PaymentIntentRequest {}
