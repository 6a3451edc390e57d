//! Rate book and rate engine
//!
//! A VoIP plan groups retail plans and may ban prefixes. The rate engine
//! matches the longest retail prefix of a dialed number inside every retail
//! plan of the caller's VoIP plan; the simulator and the rate API are both
//! built on it.
//!
//! # Examples
//!
//! ```
//! use voipbill_rates::engine::RateBook;
//! use voipbill_core::types::VoipPlanId;
//!
//! let book = RateBook::from_json_str(r#"{
//!     "voip_plans": [{"id": 1, "name": "Default", "retail_plans": [1]}],
//!     "retail_plans": [{"id": 1, "name": "Retail", "rates": [
//!         {"id": 10, "prefix": "34", "destination": "Spain", "retail_rate": 0.02}
//!     ]}]
//! }"#).unwrap();
//!
//! let rows = book.simulate("34912345678", VoipPlanId::new(1)).unwrap();
//! assert_eq!(rows[0].retail_rate, 0.02);
//! ```

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};
use voipbill_core::error::{BillingError, Result};
use voipbill_core::types::{RateRow, RateSortField, SortOrder, VoipPlanId};

/// A VoIP plan as assigned to user profiles
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoipPlan {
    pub id: VoipPlanId,
    pub name: String,
    /// Retail plans whose rates apply to this VoIP plan
    #[serde(default)]
    pub retail_plans: Vec<u32>,
    /// Prefixes callers on this plan may not dial
    #[serde(default)]
    pub banned_prefixes: Vec<String>,
}

/// One retail rate inside a retail plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetailRate {
    pub id: u32,
    pub prefix: String,
    pub destination: String,
    pub retail_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetailPlan {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub rates: Vec<RetailRate>,
}

/// Best matching retail rate of one retail plan
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetailQuote {
    /// Id of the matched retail rate
    pub rrid: u32,
    pub retail_plan_id: u32,
    pub retail_plan_name: String,
    pub prefix: String,
    pub destination: String,
    pub retail_rate: f64,
}

/// One line of the call simulator output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationRow {
    pub voipplan_id: VoipPlanId,
    pub retail_plan_name: String,
    pub retail_rate: f64,
}

/// All leading prefixes of a dialed number, longest first
///
/// Non-digit characters (`+`, spaces, dashes) are dropped first.
pub fn prefix_list(number: &str) -> Vec<String> {
    let digits: String = number.chars().filter(char::is_ascii_digit).collect();
    (1..=digits.len()).rev().map(|len| digits[..len].to_string()).collect()
}

/// In-memory rate book
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RateBook {
    #[serde(default)]
    pub voip_plans: Vec<VoipPlan>,
    #[serde(default)]
    pub retail_plans: Vec<RetailPlan>,
}

impl RateBook {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a rate book from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let book = Self::from_json_str(&text)?;
        info!(
            "Loaded rate book from {}: {} VoIP plans, {} retail plans",
            path.display(),
            book.voip_plans.len(),
            book.retail_plans.len()
        );
        Ok(book)
    }

    pub fn voip_plan(&self, id: VoipPlanId) -> Result<&VoipPlan> {
        self.voip_plans
            .iter()
            .find(|plan| plan.id == id)
            .ok_or(BillingError::UnknownVoipPlan(id))
    }

    fn retail_plans_of<'a>(&'a self, plan: &'a VoipPlan) -> impl Iterator<Item = &'a RetailPlan> + 'a {
        plan.retail_plans
            .iter()
            .filter_map(move |id| self.retail_plans.iter().find(|rp| rp.id == *id))
    }

    /// Whether the plan lets callers dial this number
    pub fn prefix_allowed_to_call(&self, number: &str, plan_id: VoipPlanId) -> Result<bool> {
        let plan = self.voip_plan(plan_id)?;
        let prefixes = prefix_list(number);
        if prefixes.is_empty() {
            return Ok(false);
        }
        let banned = prefixes
            .iter()
            .any(|p| plan.banned_prefixes.iter().any(|b| b == p));
        if banned {
            debug!("{} is banned on VoIP plan {}", number, plan_id);
        }
        Ok(!banned)
    }

    /// Longest-prefix retail rate per retail plan, cheapest first
    pub fn rate_engine(&self, number: &str, plan_id: VoipPlanId) -> Result<Vec<RetailQuote>> {
        let plan = self.voip_plan(plan_id)?;
        let prefixes = prefix_list(number);

        let mut quotes: Vec<RetailQuote> = self
            .retail_plans_of(plan)
            .filter_map(|retail_plan| {
                // prefixes are longest first, so the first hit is the best match
                prefixes.iter().find_map(|p| {
                    retail_plan
                        .rates
                        .iter()
                        .filter(|r| &r.prefix == p)
                        .min_by(|a, b| cmp_f64(a.retail_rate, b.retail_rate))
                        .map(|rate| RetailQuote {
                            rrid: rate.id,
                            retail_plan_id: retail_plan.id,
                            retail_plan_name: retail_plan.name.clone(),
                            prefix: rate.prefix.clone(),
                            destination: rate.destination.clone(),
                            retail_rate: rate.retail_rate,
                        })
                })
            })
            .collect();

        quotes.sort_by(|a, b| cmp_f64(a.retail_rate, b.retail_rate));
        Ok(quotes)
    }

    /// Simulator rows for a destination number; empty when the number is banned
    pub fn simulate(&self, number: &str, plan_id: VoipPlanId) -> Result<Vec<SimulationRow>> {
        if !self.prefix_allowed_to_call(number, plan_id)? {
            return Ok(Vec::new());
        }
        Ok(self
            .rate_engine(number, plan_id)?
            .into_iter()
            .map(|quote| SimulationRow {
                voipplan_id: plan_id,
                retail_plan_name: quote.retail_plan_name,
                retail_rate: quote.retail_rate,
            })
            .collect())
    }

    /// Rate listing served by the rate API
    ///
    /// One row per prefix carrying the cheapest retail rate across the plan.
    /// A dialcode keeps only prefixes that lead the dialcode.
    pub fn rate_listing(
        &self,
        plan_id: VoipPlanId,
        dialcode: Option<&str>,
        sort_field: RateSortField,
        sort_order: SortOrder,
    ) -> Result<Vec<RateRow>> {
        let plan = self.voip_plan(plan_id)?;
        let allowed: Option<Vec<String>> = dialcode
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(prefix_list);

        let mut cheapest: HashMap<&str, &RetailRate> = HashMap::new();
        for rate in self.retail_plans_of(plan).flat_map(|rp| rp.rates.iter()) {
            if let Some(allowed) = &allowed {
                if !allowed.iter().any(|p| p == &rate.prefix) {
                    continue;
                }
            }
            cheapest
                .entry(rate.prefix.as_str())
                .and_modify(|best| {
                    if rate.retail_rate < best.retail_rate {
                        *best = rate;
                    }
                })
                .or_insert(rate);
        }

        let mut rates: Vec<&RetailRate> = cheapest.into_values().collect();
        rates.sort_by(|a, b| {
            let ord = match sort_field {
                RateSortField::Prefix => cmp_prefix(&a.prefix, &b.prefix),
                RateSortField::RetailRate => cmp_f64(a.retail_rate, b.retail_rate),
                RateSortField::Destination => a.destination.cmp(&b.destination),
            }
            .then_with(|| cmp_prefix(&a.prefix, &b.prefix));
            match sort_order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            }
        });

        Ok(rates
            .into_iter()
            .map(|r| RateRow::new(r.prefix.clone(), r.destination.clone(), format!("{:.4}", r.retail_rate)))
            .collect())
    }
}

fn cmp_f64(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

/// Numeric order for digit prefixes, text order otherwise
fn cmp_prefix(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        _ => a.cmp(b),
    }
}
