use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Subscribable services tracked per customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Service {
    PhoneService,
    MultipleLines,
    InternetService,
    OnlineSecurity,
    OnlineBackup,
    DeviceProtection,
    TechSupport,
    StreamingTv,
    StreamingMovies,
}

impl Service {
    /// Every service, in raw column order.
    pub const ALL: [Service; 9] = [
        Service::PhoneService,
        Service::MultipleLines,
        Service::InternetService,
        Service::OnlineSecurity,
        Service::OnlineBackup,
        Service::DeviceProtection,
        Service::TechSupport,
        Service::StreamingTv,
        Service::StreamingMovies,
    ];

    /// Raw column name carrying this service.
    pub fn column(self) -> &'static str {
        match self {
            Service::PhoneService => "phone_service",
            Service::MultipleLines => "multiple_lines",
            Service::InternetService => "internet_service",
            Service::OnlineSecurity => "online_security",
            Service::OnlineBackup => "online_backup",
            Service::DeviceProtection => "device_protection",
            Service::TechSupport => "tech_support",
            Service::StreamingTv => "streaming_tv",
            Service::StreamingMovies => "streaming_movies",
        }
    }

    /// Whether a raw column value marks the service as subscribed.
    pub fn is_active_value(raw: &str) -> bool {
        let value = raw.trim();
        !(value.is_empty()
            || value.eq_ignore_ascii_case("no")
            || value.eq_ignore_ascii_case("no internet service")
            || value.eq_ignore_ascii_case("no phone service")
            || value == "0"
            || value.eq_ignore_ascii_case("false"))
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// One raw customer row as ingested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerRecord {
    pub customer_id: String,
    pub tenure_months: u32,
    /// Contract type, e.g. `Month-to-month`, `One year`, `Two year`.
    pub contract: String,
    pub monthly_charges: f64,
    #[serde(default)]
    pub total_charges: Option<f64>,
    /// Internet technology (`DSL`, `Fiber optic`, `No`).
    #[serde(default)]
    pub internet_service: Option<String>,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub senior_citizen: bool,
    #[serde(default)]
    pub partner: bool,
    #[serde(default)]
    pub dependents: bool,
    #[serde(default)]
    pub paperless_billing: bool,
    #[serde(default)]
    pub services: BTreeSet<Service>,
    /// Historical churn label; only present in training data.
    #[serde(default)]
    pub churn: Option<bool>,
}

impl CustomerRecord {
    /// Minimal record with no optional attributes, mainly for tests and fixtures.
    pub fn new(
        customer_id: impl Into<String>,
        tenure_months: u32,
        contract: impl Into<String>,
        monthly_charges: f64,
    ) -> Self {
        Self {
            customer_id: customer_id.into(),
            tenure_months,
            contract: contract.into(),
            monthly_charges,
            total_charges: None,
            internet_service: None,
            payment_method: None,
            senior_citizen: false,
            partner: false,
            dependents: false,
            paperless_billing: false,
            services: BTreeSet::new(),
            churn: None,
        }
    }

    pub fn with_services(mut self, services: impl IntoIterator<Item = Service>) -> Self {
        self.services = services.into_iter().collect();
        self
    }

    pub fn with_internet_service(mut self, value: impl Into<String>) -> Self {
        self.internet_service = Some(value.into());
        self
    }

    pub fn with_payment_method(mut self, value: impl Into<String>) -> Self {
        self.payment_method = Some(value.into());
        self
    }

    pub fn with_churn(mut self, churn: bool) -> Self {
        self.churn = Some(churn);
        self
    }

    /// Number of subscribed services.
    pub fn active_services(&self) -> usize {
        self.services.len()
    }

    /// Whether the payment method is an automatic one.
    pub fn is_auto_payment(&self) -> bool {
        self.payment_method
            .as_deref()
            .is_some_and(|method| method.to_ascii_lowercase().contains("automatic"))
    }
}
