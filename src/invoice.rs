//! Invoicing collaborator seam. The core only sums configured per-item
//! prices and hands the result over; capture and document rendering live
//! elsewhere.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentKind {
    BedReservation,
}

impl PaymentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BedReservation => "bed_reservation",
        }
    }
}

/// Sent to the invoicing collaborator after a reservation commits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceNotice {
    pub patient_id: Uuid,
    /// The booking the amount refers to.
    pub reference_id: Uuid,
    pub amount: f64,
    pub kind: PaymentKind,
}

pub trait InvoiceSink {
    fn notify(&self, notice: InvoiceNotice);
}

/// Sink for callers that do their own invoicing elsewhere.
pub struct NullInvoiceSink;

impl InvoiceSink for NullInvoiceSink {
    fn notify(&self, _notice: InvoiceNotice) {}
}

/// Captures notices for assertions in tests.
#[derive(Default)]
pub struct RecordingInvoiceSink {
    notices: std::sync::Mutex<Vec<InvoiceNotice>>,
}

impl RecordingInvoiceSink {
    pub fn taken(&self) -> Vec<InvoiceNotice> {
        self.notices.lock().expect("sink lock").clone()
    }
}

impl InvoiceSink for RecordingInvoiceSink {
    fn notify(&self, notice: InvoiceNotice) {
        self.notices.lock().expect("sink lock").push(notice);
    }
}
