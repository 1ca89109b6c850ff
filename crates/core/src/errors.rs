use thiserror::Error;

use crate::tables::TableName;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("selection is incomplete: missing {}", missing.join(", "))]
    IncompleteSelection { missing: Vec<&'static str> },
    #[error("invalid contact details: {0}")]
    InvalidContact(String),
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
    #[error("rate is too large to compute at the {stage} step")]
    RateOverflow { stage: &'static str },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CurrencyError {
    #[error("no exchange rate is known for currency `{code}`")]
    MissingRate { code: String },
    #[error("exchange rate for `{code}` must be strictly positive")]
    NonPositiveRate { code: String },
    #[error("exchange rate feed unavailable: {0}")]
    FeedUnavailable(String),
    #[error("amount is too large to convert with the `{code}` exchange rate")]
    Overflow { code: String },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LookupError {
    #[error("lookup source unavailable for `{table}`: {reason}")]
    SourceUnavailable { table: TableName, reason: String },
    #[error("could not decode `{table}` record: {reason}")]
    Decode { table: TableName, reason: String },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("quote persistence failed: {0}")]
    Persistence(String),
    #[error("quote email could not be rendered: {0}")]
    Template(String),
    #[error("quote email could not be sent: {0}")]
    Transport(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Currency(#[from] CurrencyError),
    #[error(transparent)]
    Lookup(#[from] LookupError),
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let unassigned = || "unassigned".to_owned();
        match value {
            ApplicationError::Domain(error) => {
                Self::BadRequest { message: error.to_string(), correlation_id: unassigned() }
            }
            ApplicationError::Currency(error @ CurrencyError::FeedUnavailable(_)) => {
                Self::ServiceUnavailable { message: error.to_string(), correlation_id: unassigned() }
            }
            ApplicationError::Currency(error) => {
                Self::BadRequest { message: error.to_string(), correlation_id: unassigned() }
            }
            ApplicationError::Lookup(error) => Self::ServiceUnavailable {
                message: error.to_string(),
                correlation_id: unassigned(),
            },
            ApplicationError::Delivery(DeliveryError::Template(message))
            | ApplicationError::Configuration(message) => {
                Self::Internal { message, correlation_id: unassigned() }
            }
            ApplicationError::Delivery(error) => Self::ServiceUnavailable {
                message: error.to_string(),
                correlation_id: unassigned(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::{
        ApplicationError, CurrencyError, DeliveryError, DomainError, InterfaceError,
    };

    #[test]
    fn incomplete_selection_maps_to_bad_request_with_correlation_id() {
        let interface = ApplicationError::from(DomainError::IncompleteSelection {
            missing: vec!["region", "seniority"],
        })
        .into_interface("req-1");

        assert!(matches!(
            interface,
            InterfaceError::BadRequest {
                ref correlation_id,
                ref message,
            } if correlation_id == "req-1" && message.contains("region, seniority")
        ));
    }

    #[test]
    fn missing_rate_is_a_user_correctable_error() {
        let interface =
            ApplicationError::from(CurrencyError::MissingRate { code: "JPY".to_owned() })
                .into_interface("req-2");

        assert_eq!(
            interface.user_message(),
            "The request could not be processed. Check inputs and try again."
        );
        assert_eq!(interface.correlation_id(), "req-2");
    }

    #[test]
    fn transport_failure_maps_to_service_unavailable() {
        let interface =
            ApplicationError::from(DeliveryError::Transport("relay returned 502".to_owned()))
                .into_interface("req-3");

        assert!(matches!(interface, InterfaceError::ServiceUnavailable { .. }));
        assert_eq!(
            interface.user_message(),
            "The service is temporarily unavailable. Please retry shortly."
        );
    }

    #[test]
    fn overflowing_conversion_is_a_bad_request() {
        let interface = ApplicationError::from(CurrencyError::Overflow { code: "VES".to_owned() })
            .into_interface("req-6");

        assert!(matches!(
            interface,
            InterfaceError::BadRequest { ref message, .. } if message.contains("`VES`")
        ));
    }

    #[test]
    fn rate_feed_outage_is_not_blamed_on_the_caller() {
        let interface =
            ApplicationError::from(CurrencyError::FeedUnavailable("timed out".to_owned()))
                .into_interface("req-5");

        assert!(matches!(interface, InterfaceError::ServiceUnavailable { .. }));
    }

    #[test]
    fn template_failure_maps_to_internal() {
        let interface =
            ApplicationError::from(DeliveryError::Template("unknown variable".to_owned()))
                .into_interface("req-4");

        assert!(matches!(interface, InterfaceError::Internal { .. }));
        assert_eq!(interface.user_message(), "An unexpected internal error occurred.");
    }
}
