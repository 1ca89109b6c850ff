use ratecard_core::errors::DeliveryError;
use ratecard_core::{AssembledQuote, QuoteId};
use ratecard_db::repositories::QuoteRepository;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::mail::{QuoteEmailRenderer, QuoteMailer};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DeliveryReceipt {
    /// `None` when the quote could not be stored; the email still went out.
    pub quote_id: Option<QuoteId>,
    pub recipient: String,
}

/// Stores the quote, then emails it.
///
/// A storage failure is logged and delivery continues without an id. A render or
/// transport failure is returned; there is no partially-sent state.
pub async fn deliver_quote(
    quote: &AssembledQuote,
    quotes: &dyn QuoteRepository,
    renderer: &QuoteEmailRenderer,
    mailer: &dyn QuoteMailer,
    correlation_id: &str,
) -> Result<DeliveryReceipt, DeliveryError> {
    let quote_id = match quotes.insert(&quote.record).await {
        Ok(id) => Some(id),
        Err(error) => {
            warn!(
                event_name = "delivery.persist_failed",
                correlation_id,
                error = %error,
                "quote could not be stored, sending email anyway"
            );
            None
        }
    };

    let email = renderer.render(quote, quote_id)?;
    if let Err(send_error) = mailer.send(&email).await {
        error!(
            event_name = "delivery.send_failed",
            correlation_id,
            quote_id = ?quote_id,
            transport = mailer.name(),
            error = %send_error,
            "quote email could not be sent"
        );
        return Err(send_error);
    }

    info!(
        event_name = "delivery.sent",
        correlation_id,
        quote_id = ?quote_id,
        transport = mailer.name(),
        currency = %quote.record.currency,
        "quote delivered"
    );
    Ok(DeliveryReceipt { quote_id, recipient: email.to })
}
