use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use chrono::{Local, NaiveDate};
use teloxide::types::ChatId;
use tokio::sync::RwLock;

use crate::config::AppConfig;
use crate::form::{BookingForm, FormErrors};
use crate::models::{Booking, DraftState, Invoice, PatientLookup, PatientRecord, PaymentConfig};
use crate::patients::PatientDirectory;
use crate::payment::PaymentLinkSimulator;
use crate::store::{BookingStore, StoreError};
use crate::tasks::{TaskKey, TaskRegistry};
use crate::test_orders::{InvoiceBook, TestOrder, TestOrderError};

const DRAFT_TTL_SECS: u64 = 300;

type DraftCache = Arc<RwLock<HashMap<ChatId, (DraftState, SystemTime)>>>;

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("{0}")]
    Invalid(#[from] FormErrors),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    TestOrder(#[from] TestOrderError),
}

/// Which kind of payment request is being simulated; resends are quicker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkRequest {
    Initial,
    Resend,
}

/// The single owner of all front desk state. Clones share the same data;
/// every mutation goes through a method here.
#[derive(Clone)]
pub struct AppState {
    config: Arc<AppConfig>,
    store: Arc<RwLock<BookingStore>>,
    invoices: Arc<RwLock<InvoiceBook>>,
    patients: Arc<RwLock<PatientDirectory>>,
    drafts: DraftCache,
    tasks: TaskRegistry,
    payments: PaymentLinkSimulator,
}

impl AppState {
    pub fn new(config: AppConfig, payment_config: PaymentConfig) -> Self {
        let today = Local::now().date_naive();
        Self {
            config: Arc::new(config),
            store: Arc::new(RwLock::new(BookingStore::seeded(today))),
            invoices: Arc::new(RwLock::new(InvoiceBook::new())),
            patients: Arc::new(RwLock::new(PatientDirectory::seeded())),
            drafts: Arc::new(RwLock::new(HashMap::new())),
            tasks: TaskRegistry::new(),
            payments: PaymentLinkSimulator::new(payment_config),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }

    // ---- drafts ----

    pub async fn get_draft(&self, chat_id: ChatId) -> DraftState {
        let cache = self.drafts.read().await;
        match cache.get(&chat_id) {
            Some((draft, timestamp)) if timestamp.elapsed().unwrap_or_default().as_secs() < DRAFT_TTL_SECS => {
                draft.clone()
            }
            _ => DraftState::default(),
        }
    }

    pub async fn save_draft(&self, chat_id: ChatId, draft: DraftState) {
        let mut cache = self.drafts.write().await;
        cache.insert(chat_id, (draft, SystemTime::now()));
        log::debug!("💾 Draft saved for chat {}", chat_id);
    }

    /// Applies `update` to the chat's current draft under the cache lock, so
    /// input saved meanwhile by another handler is never overwritten.
    pub async fn update_draft<R>(&self, chat_id: ChatId, update: impl FnOnce(&mut DraftState) -> R) -> R {
        let mut cache = self.drafts.write().await;
        let mut draft = match cache.remove(&chat_id) {
            Some((draft, timestamp)) if timestamp.elapsed().unwrap_or_default().as_secs() < DRAFT_TTL_SECS => draft,
            _ => DraftState::default(),
        };
        let result = update(&mut draft);
        cache.insert(chat_id, (draft, SystemTime::now()));
        result
    }

    /// Drops the chat's draft and any lookup still running for it.
    pub async fn clear_draft(&self, chat_id: ChatId) {
        self.tasks.cancel(&TaskKey::PatientLookup(chat_id)).await;
        self.drafts.write().await.remove(&chat_id);
    }

    pub async fn cleanup_cache(&self) {
        let mut cache = self.drafts.write().await;
        let now = SystemTime::now();
        let previous_count = cache.len();

        cache.retain(|_, (_, timestamp)| {
            now.duration_since(*timestamp).unwrap_or_default().as_secs() < DRAFT_TTL_SECS
        });

        log::debug!("🧹 Draft cache cleaned: {} -> {} entries", previous_count, cache.len());
    }

    // ---- bookings ----

    pub async fn bookings(&self) -> Vec<Booking> {
        self.store.read().await.list().to_vec()
    }

    pub async fn booking_count(&self) -> usize {
        self.store.read().await.len()
    }

    pub async fn booking(&self, id: &str) -> Option<Booking> {
        self.store.read().await.get(id).cloned()
    }

    /// Validates the form and appends the resulting booking to the store.
    pub async fn create_booking(&self, form: &BookingForm) -> Result<Booking, StateError> {
        let validated = form.validate(self.today(), self.config.booking_window_days)?;
        let booking = self.store.write().await.append(validated);

        if let Some(patient_id) = &booking.patient_id {
            self.patients.write().await.register(PatientRecord {
                patient_id: patient_id.clone(),
                name: booking.name.clone(),
                contact_number: booking.contact_number.clone(),
            });
        }

        log::info!("📋 Booking {} added to queue for {} {}", booking.id, booking.display_date(), booking.slot);
        log::debug!("{}", serde_json::to_string(&booking).unwrap_or_default());
        Ok(booking)
    }

    /// Simulates texting a payment link for the booking. After the delay the
    /// booking is marked `payment_sent` with the short link attached.
    /// Returns `Ok(None)` when the request was cancelled or superseded.
    pub async fn request_payment_link(&self, id: &str, kind: LinkRequest) -> Result<Option<Booking>, StateError> {
        let start_time = Instant::now();
        let booking = self
            .booking(id)
            .await
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        ensure_link_allowed(&booking)?;

        let uri = self.payments.appointment_uri(&booking.id, booking.fee);
        let token = self.tasks.register(TaskKey::PaymentLink(booking.id.clone())).await;
        if !self.tasks.delay(self.link_delay(kind), token).await {
            log::info!("⏹️ Payment link for {} was cancelled", booking.id);
            return Ok(None);
        }

        // The booking may have been confirmed while the delay ran.
        let updated = {
            let mut store = self.store.write().await;
            let current = store
                .get(&booking.id)
                .ok_or_else(|| StoreError::NotFound(booking.id.clone()))?;
            ensure_link_allowed(current)?;

            let dispatch = self.payments.send_sms(&booking.id, &booking.contact_number, uri);
            log::debug!("🔗 {} -> +91{}: {}", dispatch.reference, dispatch.contact_number, dispatch.upi_uri);
            store.mark_payment_sent(&booking.id, dispatch.short_link)?
        };

        log::info!(
            "✅ Payment link {} sent for booking {} in {:?}",
            updated.payment_link.as_deref().unwrap_or_default(),
            updated.id,
            start_time.elapsed()
        );
        Ok(Some(updated))
    }

    pub async fn cancel_payment_link(&self, id: &str) -> bool {
        self.tasks.cancel(&TaskKey::PaymentLink(id.to_string())).await
    }

    pub async fn payment_link_pending(&self, id: &str) -> bool {
        self.tasks.is_pending(&TaskKey::PaymentLink(id.to_string())).await
    }

    pub async fn confirm_payment(&self, id: &str) -> Result<Booking, StateError> {
        let booking = self.store.write().await.mark_confirmed(id)?;
        log::info!("🎉 Booking {} confirmed", booking.id);
        Ok(booking)
    }

    fn link_delay(&self, kind: LinkRequest) -> Duration {
        match kind {
            LinkRequest::Initial => self.config.link_delay,
            LinkRequest::Resend => self.config.resend_delay,
        }
    }

    // ---- patients ----

    /// Simulated patient record fetch. A newer lookup from the same chat
    /// cancels this one, in which case `None` is returned.
    pub async fn lookup_patient(&self, chat_id: ChatId, contact_number: &str) -> Option<PatientLookup> {
        let token = self.tasks.register(TaskKey::PatientLookup(chat_id)).await;
        if !self.tasks.delay(self.config.lookup_delay, token).await {
            return None;
        }
        let lookup = self.patients.read().await.lookup(contact_number);
        log::info!("🔎 Lookup for {} resolved to {}", contact_number, lookup.patient_id());
        Some(lookup)
    }

    // ---- test orders ----

    pub async fn issue_invoice(&self, order: &TestOrder) -> Result<Invoice, StateError> {
        let invoice = self.invoices.write().await.issue(order)?;
        log::info!("🧾 Invoice {} issued for {} (₹{})", invoice.number, invoice.patient_id, invoice.total);
        log::debug!("{}", serde_json::to_string(&invoice).unwrap_or_default());
        Ok(invoice)
    }

    pub async fn invoice(&self, number: &str) -> Option<Invoice> {
        self.invoices.read().await.get(number).cloned()
    }

    pub async fn request_invoice_link(&self, number: &str) -> Result<Option<Invoice>, StateError> {
        let invoice = self
            .invoice(number)
            .await
            .ok_or_else(|| TestOrderError::NotFound(number.to_string()))?;

        let uri = self.payments.tests_uri(&invoice.number, invoice.total);
        let token = self.tasks.register(TaskKey::InvoiceLink(invoice.number.clone())).await;
        if !self.tasks.delay(self.config.link_delay, token).await {
            log::info!("⏹️ Payment link for {} was cancelled", invoice.number);
            return Ok(None);
        }

        let dispatch = self.payments.send_sms(&invoice.number, &invoice.contact_number, uri);
        log::debug!("🔗 {} -> +91{}: {}", dispatch.reference, dispatch.contact_number, dispatch.upi_uri);
        let updated = self.invoices.write().await.mark_payment_sent(&invoice.number, dispatch.short_link)?;
        Ok(Some(updated))
    }

    pub async fn cancel_invoice_link(&self, number: &str) -> bool {
        self.tasks.cancel(&TaskKey::InvoiceLink(number.to_string())).await
    }
}

fn ensure_link_allowed(booking: &Booking) -> Result<(), StoreError> {
    if booking.status.awaits_payment() {
        Ok(())
    } else {
        Err(StoreError::InvalidTransition {
            id: booking.id.clone(),
            from: booking.status,
            to: crate::models::BookingStatus::PaymentSent,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BookingStatus, Doctor, FormStep, InvoiceStatus, Sex, TimeSlot};

    fn state() -> AppState {
        AppState::new(AppConfig::default(), PaymentConfig::default())
    }

    fn form(state: &AppState) -> BookingForm {
        let mut form = BookingForm::with_fee(state.config().default_fee);
        form.contact_number = "9123456780".to_string();
        form.patient_id = Some("PT55555".to_string());
        form.name = "Kavya Nair".to_string();
        form.age = "29".to_string();
        form.sex = Some(Sex::Female);
        form.select_doctor(Doctor::find_by_id("DR03").unwrap());
        form.date = Some(state.today());
        form.slot = TimeSlot::new(15, 0);
        form
    }

    async fn wait_until_pending(state: &AppState, id: &str) {
        while !state.payment_link_pending(id).await {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn booking_then_payment_link() {
        let state = state();
        let booking = state.create_booking(&form(&state)).await.unwrap();
        assert_eq!(booking.status, BookingStatus::PendingPayment);
        assert_eq!(state.bookings().await.len(), 4);

        let updated = state
            .request_payment_link(&booking.id, LinkRequest::Initial)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.status, BookingStatus::PaymentSent);
        assert!(updated.payment_link.unwrap().starts_with("shorturl.at/"));
        assert_eq!(state.booking(&booking.id).await.unwrap().status, BookingStatus::PaymentSent);
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_form_is_not_stored() {
        let state = state();
        let mut form = form(&state);
        form.age = "0".to_string();
        form.contact_number = "12ab".to_string();

        match state.create_booking(&form).await {
            Err(StateError::Invalid(errors)) => assert_eq!(errors.len(), 2),
            other => panic!("expected validation errors, got {:?}", other.map(|b| b.id)),
        }
        assert_eq!(state.bookings().await.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_link_leaves_booking_untouched() {
        let state = state();
        let request = {
            let state = state.clone();
            tokio::spawn(async move { state.request_payment_link("BK10002", LinkRequest::Resend).await })
        };
        wait_until_pending(&state, "BK10002").await;

        assert!(state.cancel_payment_link("BK10002").await);
        assert!(request.await.unwrap().unwrap().is_none());

        let booking = state.booking("BK10002").await.unwrap();
        assert_eq!(booking.status, BookingStatus::PendingPayment);
        assert_eq!(booking.payment_link, None);
    }

    #[tokio::test(start_paused = true)]
    async fn newer_request_supersedes_older() {
        let state = state();
        let first = {
            let state = state.clone();
            tokio::spawn(async move { state.request_payment_link("BK10003", LinkRequest::Resend).await })
        };
        wait_until_pending(&state, "BK10003").await;

        let second = state.request_payment_link("BK10003", LinkRequest::Resend).await.unwrap();
        assert!(first.await.unwrap().unwrap().is_none());

        let second = second.unwrap();
        assert_eq!(second.status, BookingStatus::PaymentSent);
        assert_eq!(state.booking("BK10003").await.unwrap().payment_link, second.payment_link);
    }

    #[tokio::test(start_paused = true)]
    async fn confirmed_booking_rejects_payment_link() {
        let state = state();
        let err = state.request_payment_link("BK10001", LinkRequest::Resend).await.unwrap_err();
        assert!(matches!(err, StateError::Store(StoreError::InvalidTransition { .. })));
        assert!(!state.payment_link_pending("BK10001").await);
    }

    #[tokio::test(start_paused = true)]
    async fn confirmation_during_resend_keeps_booking_confirmed() {
        let state = state();
        let request = {
            let state = state.clone();
            tokio::spawn(async move { state.request_payment_link("BK10003", LinkRequest::Resend).await })
        };
        wait_until_pending(&state, "BK10003").await;

        state.confirm_payment("BK10003").await.unwrap();
        let err = request.await.unwrap().unwrap_err();
        assert!(matches!(
            err,
            StateError::Store(StoreError::InvalidTransition { from: BookingStatus::Confirmed, .. })
        ));

        let booking = state.booking("BK10003").await.unwrap();
        assert_eq!(booking.status, BookingStatus::Confirmed);
        assert_eq!(booking.payment_link.as_deref(), Some("shorturl.at/wxyz1"));
    }

    #[tokio::test(start_paused = true)]
    async fn lookup_finds_seeded_patient_and_learns_new_ones() {
        let state = state();
        let known = state.lookup_patient(ChatId(1), "9876543210").await.unwrap();
        assert_eq!(known.name(), Some("Rahul Sharma"));

        let booking = state.create_booking(&form(&state)).await.unwrap();
        let repeat = state.lookup_patient(ChatId(1), &booking.contact_number).await.unwrap();
        assert_eq!(repeat.patient_id(), "PT55555");
        assert_eq!(repeat.name(), Some("Kavya Nair"));
    }

    #[tokio::test(start_paused = true)]
    async fn clearing_draft_cancels_lookup() {
        let state = state();
        let lookup = {
            let state = state.clone();
            tokio::spawn(async move { state.lookup_patient(ChatId(9), "9876543210").await })
        };
        while !state.tasks.is_pending(&TaskKey::PatientLookup(ChatId(9))).await {
            tokio::task::yield_now().await;
        }
        state.clear_draft(ChatId(9)).await;
        assert!(lookup.await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn drafts_round_trip_through_cache() {
        let state = state();
        let mut draft = DraftState::booking(500);
        draft.form.name = "Arun".to_string();
        state.save_draft(ChatId(3), draft).await;
        assert_eq!(state.get_draft(ChatId(3)).await.form.name, "Arun");

        state.clear_draft(ChatId(3)).await;
        assert_eq!(state.get_draft(ChatId(3)).await.form.name, "");
    }

    #[tokio::test(start_paused = true)]
    async fn update_draft_sees_latest_saved_input() {
        let state = state();
        let mut draft = DraftState::booking(500);
        draft.step = FormStep::Address;
        draft.form.sex = Some(Sex::Female);
        state.save_draft(ChatId(4), draft).await;

        let step = state
            .update_draft(ChatId(4), |draft| {
                draft.form.patient_id = Some("PT10001".to_string());
                draft.step
            })
            .await;
        assert_eq!(step, FormStep::Address);

        let draft = state.get_draft(ChatId(4)).await;
        assert_eq!(draft.step, FormStep::Address);
        assert_eq!(draft.form.sex, Some(Sex::Female));
        assert_eq!(draft.form.patient_id.as_deref(), Some("PT10001"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_order_invoice_gets_payment_link() {
        let state = state();
        let lookup = state.lookup_patient(ChatId(2), "9876543210").await.unwrap();
        let mut order = TestOrder::new("9876543210", &lookup);
        order.toggle("CBC").unwrap();
        order.toggle("XRCH").unwrap();

        let invoice = state.issue_invoice(&order).await.unwrap();
        assert_eq!(invoice.total, 800);
        assert_eq!(invoice.status, InvoiceStatus::Pending);

        let sent = state.request_invoice_link(&invoice.number).await.unwrap().unwrap();
        assert_eq!(sent.status, InvoiceStatus::PaymentSent);
        assert!(sent.payment_link.is_some());
        assert_eq!(state.invoice(&invoice.number).await.unwrap().status, InvoiceStatus::PaymentSent);
        assert_eq!(state.bookings().await.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_invoice_link_leaves_invoice_pending() {
        let state = state();
        let lookup = state.lookup_patient(ChatId(5), "9876543210").await.unwrap();
        let mut order = TestOrder::new("9876543210", &lookup);
        order.toggle("TSH").unwrap();
        let invoice = state.issue_invoice(&order).await.unwrap();

        let request = {
            let state = state.clone();
            let number = invoice.number.clone();
            tokio::spawn(async move { state.request_invoice_link(&number).await })
        };
        let key = TaskKey::InvoiceLink(invoice.number.clone());
        while !state.tasks.is_pending(&key).await {
            tokio::task::yield_now().await;
        }

        assert!(state.cancel_invoice_link(&invoice.number).await);
        assert!(request.await.unwrap().unwrap().is_none());
        assert!(!state.cancel_invoice_link(&invoice.number).await);

        let stored = state.invoice(&invoice.number).await.unwrap();
        assert_eq!(stored.status, InvoiceStatus::Pending);
        assert_eq!(stored.payment_link, None);
    }
}
