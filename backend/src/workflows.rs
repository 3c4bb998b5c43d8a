//! Multi-document operations.
//!
//! The store only guarantees atomicity per operation, so each workflow keeps
//! a list of compensations for the steps it has completed and replays it in
//! reverse when a later step fails.

use bson::{doc, oid::ObjectId, Bson, Document};
use chrono::Utc;
use thiserror::Error;

use crate::models::{BOOKING_IN_REVIEW, ROLE_TOUR_GUIDE};
use crate::store::{Collection, DocumentStore, Filter, StoreError, Update};

/// Application fields mirrored onto the tour guide record.
const MIRRORED_FIELDS: [&str; 8] = [
    "name",
    "email",
    "title",
    "reason",
    "experience",
    "languages",
    "specialty",
    "cvLink",
];

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("application not found")]
    ApplicationNotFound,
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcceptedApplication {
    pub tour_guide_id: ObjectId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordedPayment {
    pub payment_id: ObjectId,
    pub bookings_updated: u64,
}

#[derive(Debug)]
enum Compensation {
    RestoreRole { email: String, previous: Option<Bson> },
    RemoveTourGuide(ObjectId),
    RemovePayment(ObjectId),
}

impl Compensation {
    async fn run(self, store: &dyn DocumentStore) -> Result<(), StoreError> {
        match self {
            Compensation::RestoreRole { email, previous } => {
                let update = match previous {
                    Some(role) => Update::set(doc! { "role": role }),
                    None => Update::unset("role"),
                };
                store
                    .update_one(Collection::Users, Filter::eq("email", email), update, false)
                    .await?;
            }
            Compensation::RemoveTourGuide(id) => {
                store.delete_one(Collection::TourGuides, Filter::Id(id)).await?;
            }
            Compensation::RemovePayment(id) => {
                store.delete_one(Collection::Payments, Filter::Id(id)).await?;
            }
        }
        Ok(())
    }
}

async fn roll_back(store: &dyn DocumentStore, completed: Vec<Compensation>) {
    for compensation in completed.into_iter().rev() {
        let description = format!("{compensation:?}");
        if let Err(err) = compensation.run(store).await {
            tracing::error!(error = %err, compensation = %description, "rollback step failed");
        }
    }
}

/// Promotes a guide application: the applicant's user becomes a tour guide,
/// a tour guide record is created and the application is removed.
pub async fn accept_application(
    store: &dyn DocumentStore,
    application_id: ObjectId,
) -> Result<AcceptedApplication, WorkflowError> {
    let application = store
        .find_one(Collection::GuideApplications, Filter::Id(application_id))
        .await?
        .ok_or(WorkflowError::ApplicationNotFound)?;

    let mut completed = Vec::new();
    let promoted = promote_applicant(store, application_id, &application, &mut completed).await;
    match promoted {
        Ok(tour_guide_id) => {
            tracing::info!(
                application_id = %application_id,
                tour_guide_id = %tour_guide_id,
                "accepted guide application"
            );
            Ok(AcceptedApplication { tour_guide_id })
        }
        Err(err) => {
            tracing::error!(
                error = %err,
                application_id = %application_id,
                completed_steps = completed.len(),
                "accept application failed, rolling back"
            );
            roll_back(store, completed).await;
            Err(err.into())
        }
    }
}

async fn promote_applicant(
    store: &dyn DocumentStore,
    application_id: ObjectId,
    application: &Document,
    completed: &mut Vec<Compensation>,
) -> Result<ObjectId, StoreError> {
    // Without an email there is no user to promote; a null filter would
    // match users that lack the field.
    match application.get_str("email") {
        Ok(email) if !email.trim().is_empty() => promote_user(store, email, completed).await?,
        _ => tracing::warn!(%application_id, "application has no email, skipping role update"),
    }

    let tour_guide = tour_guide_document(application);
    let tour_guide_id = store
        .insert_one(Collection::TourGuides, tour_guide)
        .await?
        .inserted_id;
    completed.push(Compensation::RemoveTourGuide(tour_guide_id));

    store
        .delete_one(Collection::GuideApplications, Filter::Id(application_id))
        .await?;

    Ok(tour_guide_id)
}

async fn promote_user(
    store: &dyn DocumentStore,
    email: &str,
    completed: &mut Vec<Compensation>,
) -> Result<(), StoreError> {
    let user_filter = Filter::eq("email", email);
    let previous_role = store
        .find_one(Collection::Users, user_filter.clone())
        .await?
        .and_then(|user| user.get("role").cloned());
    let promoted = store
        .update_one(
            Collection::Users,
            user_filter,
            Update::set(doc! { "role": ROLE_TOUR_GUIDE }),
            false,
        )
        .await?;
    if promoted.matched_count > 0 {
        completed.push(Compensation::RestoreRole {
            email: email.to_string(),
            previous: previous_role,
        });
    }
    Ok(())
}

fn tour_guide_document(application: &Document) -> Document {
    let mut tour_guide = Document::new();
    for field in MIRRORED_FIELDS {
        if let Some(value) = application.get(field) {
            tour_guide.insert(field, value.clone());
        }
    }
    let photo = match application.get("photoURL") {
        Some(Bson::String(url)) if !url.is_empty() => Bson::String(url.clone()),
        _ => Bson::String(String::new()),
    };
    tour_guide.insert("photoURL", photo);
    tour_guide.insert("joinedAt", bson::DateTime::from_chrono(Utc::now()));
    tour_guide
}

/// Stores a payment and moves its booking into review.
///
/// A `booking_id` that is not an ObjectId cannot match any booking, so the
/// payment is kept and zero bookings are reported as updated.
pub async fn record_payment(
    store: &dyn DocumentStore,
    payment: Document,
    booking_id: &str,
    transaction_id: &str,
) -> Result<RecordedPayment, StoreError> {
    let payment_id = store.insert_one(Collection::Payments, payment).await?.inserted_id;

    let Ok(booking_oid) = ObjectId::parse_str(booking_id) else {
        tracing::warn!(%payment_id, booking_id, "payment references a malformed booking id");
        return Ok(RecordedPayment {
            payment_id,
            bookings_updated: 0,
        });
    };

    let update = Update::set(doc! {
        "status": BOOKING_IN_REVIEW,
        "transactionId": transaction_id,
    });
    match store
        .update_one(Collection::Bookings, Filter::Id(booking_oid), update, false)
        .await
    {
        Ok(outcome) => {
            tracing::info!(
                %payment_id,
                booking_id = %booking_oid,
                modified = outcome.modified_count,
                "recorded payment"
            );
            Ok(RecordedPayment {
                payment_id,
                bookings_updated: outcome.modified_count,
            })
        }
        Err(err) => {
            tracing::error!(
                error = %err,
                %payment_id,
                booking_id = %booking_oid,
                "booking update failed, removing payment"
            );
            roll_back(store, vec![Compensation::RemovePayment(payment_id)]).await;
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::store::{
        DeleteOutcome, InsertOutcome, MemoryStore, StoreResult, UpdateOutcome,
    };

    /// Delegates to a [`MemoryStore`] but fails writes to one collection.
    struct FailingStore {
        inner: MemoryStore,
        failing: Collection,
        fail_deletes: bool,
        fail_updates: bool,
        tripped: AtomicBool,
    }

    impl FailingStore {
        fn new(inner: MemoryStore, failing: Collection) -> Self {
            Self {
                inner,
                failing,
                fail_deletes: false,
                fail_updates: false,
                tripped: AtomicBool::new(false),
            }
        }

        fn injected(&self, operator: &'static str) -> StoreError {
            self.tripped.store(true, Ordering::SeqCst);
            StoreError::InvalidUpdate {
                operator,
                field: self.failing.name().to_string(),
                reason: "injected failure".to_string(),
            }
        }
    }

    #[async_trait]
    impl DocumentStore for FailingStore {
        async fn find_one(
            &self,
            collection: Collection,
            filter: Filter,
        ) -> StoreResult<Option<Document>> {
            self.inner.find_one(collection, filter).await
        }

        async fn find_many(
            &self,
            collection: Collection,
            filter: Filter,
        ) -> StoreResult<Vec<Document>> {
            self.inner.find_many(collection, filter).await
        }

        async fn insert_one(
            &self,
            collection: Collection,
            document: Document,
        ) -> StoreResult<InsertOutcome> {
            self.inner.insert_one(collection, document).await
        }

        async fn update_one(
            &self,
            collection: Collection,
            filter: Filter,
            update: Update,
            upsert: bool,
        ) -> StoreResult<UpdateOutcome> {
            if self.fail_updates && collection == self.failing {
                return Err(self.injected("update"));
            }
            self.inner.update_one(collection, filter, update, upsert).await
        }

        async fn delete_one(
            &self,
            collection: Collection,
            filter: Filter,
        ) -> StoreResult<DeleteOutcome> {
            if self.fail_deletes && collection == self.failing {
                return Err(self.injected("delete"));
            }
            self.inner.delete_one(collection, filter).await
        }

        async fn count(&self, collection: Collection, filter: Filter) -> StoreResult<u64> {
            self.inner.count(collection, filter).await
        }
    }

    async fn seed_application(store: &MemoryStore) -> ObjectId {
        store
            .insert_one(
                Collection::GuideApplications,
                doc! {
                    "email": "guide@example.com",
                    "name": "Rafiq",
                    "title": "Hill tracks specialist",
                    "languages": ["Bangla", "English"],
                    "cvLink": "https://cv.example/rafiq",
                },
            )
            .await
            .unwrap()
            .inserted_id
    }

    #[tokio::test]
    async fn accept_mirrors_application_into_tour_guide() {
        let store = MemoryStore::new();
        store
            .insert_one(
                Collection::Users,
                doc! { "email": "guide@example.com", "role": "tourist" },
            )
            .await
            .unwrap();
        let application_id = seed_application(&store).await;

        let accepted = accept_application(&store, application_id).await.unwrap();

        let guide = store
            .find_one(Collection::TourGuides, Filter::Id(accepted.tour_guide_id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(guide.get_str("name").unwrap(), "Rafiq");
        assert_eq!(guide.get_str("photoURL").unwrap(), "");
        assert_eq!(guide.get_str("cvLink").unwrap(), "https://cv.example/rafiq");
        assert!(guide.get_datetime("joinedAt").is_ok());
        assert!(guide.get("reason").is_none());

        let user = store
            .find_one(Collection::Users, Filter::eq("email", "guide@example.com"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.get_str("role").unwrap(), ROLE_TOUR_GUIDE);
        assert_eq!(store.len(Collection::GuideApplications).await, 0);
    }

    #[tokio::test]
    async fn accept_missing_application_is_not_found() {
        let store = MemoryStore::new();
        let result = accept_application(&store, ObjectId::new()).await;
        assert!(matches!(result, Err(WorkflowError::ApplicationNotFound)));
        assert_eq!(store.len(Collection::TourGuides).await, 0);
    }

    #[tokio::test]
    async fn failed_removal_rolls_back_promotion() {
        let inner = MemoryStore::new();
        inner
            .insert_one(
                Collection::Users,
                doc! { "email": "guide@example.com", "role": "tourist" },
            )
            .await
            .unwrap();
        let application_id = seed_application(&inner).await;

        let mut store = FailingStore::new(inner.clone(), Collection::GuideApplications);
        store.fail_deletes = true;

        let result = accept_application(&store, application_id).await;
        assert!(matches!(result, Err(WorkflowError::Store(_))));
        assert!(store.tripped.load(Ordering::SeqCst));

        assert_eq!(inner.len(Collection::TourGuides).await, 0);
        assert_eq!(inner.len(Collection::GuideApplications).await, 1);
        let user = inner
            .find_one(Collection::Users, Filter::eq("email", "guide@example.com"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.get_str("role").unwrap(), "tourist");
    }

    #[tokio::test]
    async fn rollback_unsets_role_the_user_never_had() {
        let inner = MemoryStore::new();
        inner
            .insert_one(Collection::Users, doc! { "email": "guide@example.com" })
            .await
            .unwrap();
        let application_id = seed_application(&inner).await;

        let mut store = FailingStore::new(inner.clone(), Collection::GuideApplications);
        store.fail_deletes = true;

        accept_application(&store, application_id).await.unwrap_err();

        let user = inner
            .find_one(Collection::Users, Filter::eq("email", "guide@example.com"))
            .await
            .unwrap()
            .unwrap();
        assert!(user.get("role").is_none());
    }

    #[tokio::test]
    async fn failed_booking_update_removes_payment() {
        let inner = MemoryStore::new();
        let booking_id = inner
            .insert_one(Collection::Bookings, doc! { "status": "Pending" })
            .await
            .unwrap()
            .inserted_id;

        let mut store = FailingStore::new(inner.clone(), Collection::Bookings);
        store.fail_updates = true;

        let result = record_payment(
            &store,
            doc! { "bookingId": booking_id.to_hex(), "price": 100, "transactionId": "pi_1" },
            &booking_id.to_hex(),
            "pi_1",
        )
        .await;
        assert!(result.is_err());
        assert_eq!(inner.len(Collection::Payments).await, 0);
    }

    #[tokio::test]
    async fn malformed_booking_reference_keeps_payment() {
        let store = MemoryStore::new();
        let recorded = record_payment(
            &store,
            doc! { "bookingId": "not-an-id", "price": 100, "transactionId": "pi_2" },
            "not-an-id",
            "pi_2",
        )
        .await
        .unwrap();
        assert_eq!(recorded.bookings_updated, 0);
        assert_eq!(store.len(Collection::Payments).await, 1);
    }

    #[tokio::test]
    async fn application_without_email_promotes_nobody() {
        let store = MemoryStore::new();
        store
            .insert_one(Collection::Users, doc! { "name": "Legacy admin", "role": "admin" })
            .await
            .unwrap();
        let application_id = store
            .insert_one(Collection::GuideApplications, doc! { "name": "No email" })
            .await
            .unwrap()
            .inserted_id;

        let accepted = accept_application(&store, application_id).await.unwrap();

        let admin = store
            .find_one(Collection::Users, Filter::eq("name", "Legacy admin"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(admin.get_str("role").unwrap(), "admin");
        assert!(store
            .find_one(Collection::TourGuides, Filter::Id(accepted.tour_guide_id))
            .await
            .unwrap()
            .is_some());
    }
}
