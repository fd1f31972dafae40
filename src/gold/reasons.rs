//! Human-readable reasons for feature contributions.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data::CustomerRecord;
use crate::features::{SERVICE_COUNT, TenureGroup};

/// How a feature is put into words for one customer.
#[derive(Clone, Copy)]
enum Phrase {
    Tenure,
    TenureGroup,
    MonthlyCharges,
    TotalCharges,
    Contract,
    InternetService,
    PaymentMethod,
    ServiceCount,
    Flag {
        get: fn(&CustomerRecord) -> bool,
        yes: &'static str,
        no: &'static str,
    },
}

const PHRASES: [(&str, Phrase); 13] = [
    ("tenure_months", Phrase::Tenure),
    ("tenure_group", Phrase::TenureGroup),
    ("monthly_charges", Phrase::MonthlyCharges),
    ("total_charges", Phrase::TotalCharges),
    ("contract", Phrase::Contract),
    ("internet_service", Phrase::InternetService),
    ("payment_method", Phrase::PaymentMethod),
    (
        "is_auto_payment",
        Phrase::Flag {
            get: CustomerRecord::is_auto_payment,
            yes: "automatic payments",
            no: "manual payments",
        },
    ),
    ("service_density", Phrase::ServiceCount),
    (
        "senior_citizen",
        Phrase::Flag {
            get: is_senior,
            yes: "senior citizen status",
            no: "non-senior status",
        },
    ),
    (
        "partner",
        Phrase::Flag {
            get: has_partner,
            yes: "having a partner on the account",
            no: "having no partner on the account",
        },
    ),
    (
        "dependents",
        Phrase::Flag {
            get: has_dependents,
            yes: "having dependents",
            no: "having no dependents",
        },
    ),
    (
        "paperless_billing",
        Phrase::Flag {
            get: is_paperless,
            yes: "paperless billing",
            no: "paper billing",
        },
    ),
];

fn is_senior(record: &CustomerRecord) -> bool {
    record.senior_citizen
}

fn has_partner(record: &CustomerRecord) -> bool {
    record.partner
}

fn has_dependents(record: &CustomerRecord) -> bool {
    record.dependents
}

fn is_paperless(record: &CustomerRecord) -> bool {
    record.paperless_billing
}

impl Phrase {
    fn describe(self, record: &CustomerRecord) -> String {
        match self {
            Phrase::Tenure => match record.tenure_months {
                1 => "a tenure of 1 month".to_string(),
                months => format!("a tenure of {months} months"),
            },
            Phrase::TenureGroup => format!(
                "the {} tenure cohort",
                TenureGroup::from_months(record.tenure_months).label()
            ),
            Phrase::MonthlyCharges => format!("monthly charges of {:.2}", record.monthly_charges),
            Phrase::TotalCharges => {
                let total = record
                    .total_charges
                    .unwrap_or(record.tenure_months as f64 * record.monthly_charges);
                format!("lifetime spend of {total:.2}")
            }
            Phrase::Contract => format!("a {} contract", lower(&record.contract)),
            Phrase::InternetService => match record.internet_service.as_deref().map(lower) {
                Some(kind) if kind == "no" => "having no internet service".to_string(),
                Some(kind) => format!("{kind} internet service"),
                None => "an unknown internet service".to_string(),
            },
            Phrase::PaymentMethod => match record.payment_method.as_deref() {
                Some(method) => format!("payment by {}", lower(method)),
                None => "an unknown payment method".to_string(),
            },
            Phrase::ServiceCount => {
                format!("{} of {SERVICE_COUNT} services", record.active_services())
            }
            Phrase::Flag { get, yes, no } => (if get(record) { yes } else { no }).to_string(),
        }
    }
}

fn lower(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Reason used when no feature pushes the probability up.
pub const NO_DRIVERS_REASON: &str = "Low risk: no churn drivers";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no reason phrase for feature `{feature}`")]
pub struct UnmappedFeatureError {
    pub feature: String,
}

/// Coarse size of one contribution on the probability scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MagnitudeTier {
    Low,
    Medium,
    High,
}

impl MagnitudeTier {
    pub fn as_str(self) -> &'static str {
        match self {
            MagnitudeTier::Low => "low",
            MagnitudeTier::Medium => "medium",
            MagnitudeTier::High => "high",
        }
    }

    fn title(self) -> &'static str {
        match self {
            MagnitudeTier::Low => "Low",
            MagnitudeTier::Medium => "Medium",
            MagnitudeTier::High => "High",
        }
    }
}

/// Cut points on `|contribution|`: below `medium` is low, from `high` up is high.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierThresholds {
    pub medium: f64,
    pub high: f64,
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            medium: 0.02,
            high: 0.08,
        }
    }
}

impl TierThresholds {
    pub fn tier(&self, contribution: f64) -> MagnitudeTier {
        let magnitude = contribution.abs();
        if magnitude >= self.high {
            MagnitudeTier::High
        } else if magnitude >= self.medium {
            MagnitudeTier::Medium
        } else {
            MagnitudeTier::Low
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(self.medium.is_finite() && self.high.is_finite()) || self.medium < 0.0 {
            return Err("tier thresholds must be finite and non-negative".to_string());
        }
        if self.medium > self.high {
            return Err(format!(
                "medium tier threshold {} exceeds high threshold {}",
                self.medium, self.high
            ));
        }
        Ok(())
    }
}

/// Renders reasons from a feature name and the customer's own values.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReasonCatalog;

impl ReasonCatalog {
    fn phrase(&self, feature: &str) -> Result<Phrase, UnmappedFeatureError> {
        PHRASES
            .iter()
            .find(|(name, _)| *name == feature)
            .map(|(_, phrase)| *phrase)
            .ok_or_else(|| UnmappedFeatureError {
                feature: feature.to_string(),
            })
    }

    /// Fail on the first feature the catalog has no phrase for.
    pub fn ensure_covers<'a>(
        &self,
        features: impl IntoIterator<Item = &'a str>,
    ) -> Result<(), UnmappedFeatureError> {
        for feature in features {
            self.phrase(feature)?;
        }
        Ok(())
    }

    /// Risk wording for positive contributions, retention wording for negative
    /// ones, and a neutral note for exact zeros.
    pub fn reason(
        &self,
        feature: &str,
        contribution: f64,
        tier: MagnitudeTier,
        record: &CustomerRecord,
    ) -> Result<String, UnmappedFeatureError> {
        let subject = self.phrase(feature)?.describe(record);
        Ok(if contribution > 0.0 {
            format!("{} risk due to {subject}", tier.title())
        } else if contribution < 0.0 {
            format!("{} retention from {subject}", tier.title())
        } else {
            format!("No effect from {subject}")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FEATURE_NAMES;

    #[test]
    fn catalog_covers_the_feature_schema() {
        ReasonCatalog.ensure_covers(FEATURE_NAMES).unwrap();
        let err = ReasonCatalog
            .ensure_covers(["contract", "favourite_colour"])
            .unwrap_err();
        assert_eq!(err.feature, "favourite_colour");
    }

    #[test]
    fn tiers_use_inclusive_lower_bounds() {
        let tiers = TierThresholds::default();
        assert_eq!(tiers.tier(0.0199), MagnitudeTier::Low);
        assert_eq!(tiers.tier(-0.02), MagnitudeTier::Medium);
        assert_eq!(tiers.tier(0.0799), MagnitudeTier::Medium);
        assert_eq!(tiers.tier(0.08), MagnitudeTier::High);
        assert!(TierThresholds { medium: 0.1, high: 0.05 }.validate().is_err());
    }

    #[test]
    fn reasons_name_the_customers_own_values() {
        let record = CustomerRecord::new("c", 30, "Month-to-month", 89.5)
            .with_internet_service("Fiber optic")
            .with_payment_method("Electronic check");
        let catalog = ReasonCatalog;
        let risk = catalog
            .reason("contract", 0.12, MagnitudeTier::High, &record)
            .unwrap();
        assert_eq!(risk, "High risk due to a month-to-month contract");
        let retention = catalog
            .reason("tenure_months", -0.03, MagnitudeTier::Medium, &record)
            .unwrap();
        assert_eq!(retention, "Medium retention from a tenure of 30 months");
        let charges = catalog
            .reason("monthly_charges", 0.01, MagnitudeTier::Low, &record)
            .unwrap();
        assert_eq!(charges, "Low risk due to monthly charges of 89.50");
        let internet = catalog
            .reason("internet_service", 0.05, MagnitudeTier::Medium, &record)
            .unwrap();
        assert_eq!(internet, "Medium risk due to fiber optic internet service");
    }

    #[test]
    fn flag_phrases_follow_the_flag_not_the_sign() {
        let mut record = CustomerRecord::new("c", 3, "One year", 40.0);
        record.partner = true;
        let catalog = ReasonCatalog;
        assert_eq!(
            catalog
                .reason("partner", 0.52, MagnitudeTier::High, &record)
                .unwrap(),
            "High risk due to having a partner on the account"
        );
        record.partner = false;
        assert_eq!(
            catalog
                .reason("partner", -0.05, MagnitudeTier::Medium, &record)
                .unwrap(),
            "Medium retention from having no partner on the account"
        );
        assert_eq!(
            catalog
                .reason("is_auto_payment", 0.03, MagnitudeTier::Medium, &record)
                .unwrap(),
            "Medium risk due to manual payments"
        );
    }

    #[test]
    fn zero_contribution_is_neutral() {
        let record = CustomerRecord::new("c", 40, "Two year", 20.0);
        let reason = ReasonCatalog
            .reason("tenure_months", 0.0, MagnitudeTier::Low, &record)
            .unwrap();
        assert_eq!(reason, "No effect from a tenure of 40 months");
    }
}
