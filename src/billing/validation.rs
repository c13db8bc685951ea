//! Local, synchronous checks on payment input.
//!
//! Every rule runs and all failures come back together in one
//! [`FieldErrors`] so the form can mark every bad field at once.

use std::borrow::Cow;

use chrono::{Datelike, Local, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use validator::{Validate, ValidationError};

use crate::error::FieldErrors;
use crate::models::payment::{
    CardDetails, EmiDetails, NetBankingDetails, PaymentMethod, PurchaseRequest, UpiDetails,
};

static UPI_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9]{10}@[A-Za-z0-9_.-]+$").expect("UPI id pattern compiles")
});

static MONTH_INPUT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})-(\d{2})$").expect("month pattern compiles"));

static CARD_EXPIRY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{2})\s*/\s*(\d{2}|\d{4})$").expect("expiry pattern compiles"));

/// Inputs the rules need besides the method itself.
#[derive(Debug, Clone, Copy)]
pub struct ValidationContext {
    pub today: NaiveDate,
    pub require_bank_verification: bool,
}

impl ValidationContext {
    pub fn now() -> Self {
        Self {
            today: Local::now().date_naive(),
            require_bank_verification: true,
        }
    }

    pub fn at(today: NaiveDate) -> Self {
        Self {
            today,
            require_bank_verification: true,
        }
    }

    pub fn require_bank_verification(mut self, required: bool) -> Self {
        self.require_bank_verification = required;
        self
    }
}

impl Default for ValidationContext {
    fn default() -> Self {
        Self::now()
    }
}

pub fn validate(method: &PaymentMethod) -> Result<(), FieldErrors> {
    validate_with(method, &ValidationContext::now())
}

pub fn validate_with(method: &PaymentMethod, ctx: &ValidationContext) -> Result<(), FieldErrors> {
    match method {
        PaymentMethod::Card(card) => validate_card(card, ctx.today),
        PaymentMethod::NetBanking(bank) => validate_net_banking(bank, ctx.require_bank_verification),
        PaymentMethod::Upi(upi) => validate_upi(upi),
        PaymentMethod::Emi(emi) => validate_emi(emi),
    }
}

/// Method rules plus the purchase-level ones (plan and amount).
pub fn validate_purchase(
    request: &PurchaseRequest,
    ctx: &ValidationContext,
) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();
    if request.plan_type.trim().is_empty() {
        errors.add("plan_type", "Please select a plan");
    }
    if request.amount <= Decimal::ZERO {
        errors.add("amount", "Amount must be greater than 0");
    }
    if let Err(method_errors) = validate_with(&request.method, ctx) {
        errors.merge(method_errors);
    }
    errors.into_result()
}

/// Sixteen digits once spaces are removed.
pub fn validate_card_number(number: &str) -> bool {
    let digits: Vec<char> = number.chars().filter(|c| !c.is_whitespace()).collect();
    digits.len() == 16 && digits.iter().all(|c| c.is_ascii_digit())
}

pub fn validate_cvv(cvv: &str) -> bool {
    let cvv = cvv.trim();
    (3..=4).contains(&cvv.len()) && cvv.bytes().all(|b| b.is_ascii_digit())
}

pub fn validate_upi_id(id: &str) -> bool {
    UPI_ID.is_match(id.trim())
}

/// Reads `YYYY-MM`, `MM/YY` or `MM/YYYY` into `(year, month)`.
pub fn parse_expiry(expiry: &str) -> Option<(i32, u32)> {
    let expiry = expiry.trim();
    let (year, month) = if let Some(caps) = MONTH_INPUT.captures(expiry) {
        (caps[1].parse::<i32>().ok()?, caps[2].parse::<u32>().ok()?)
    } else {
        let caps = CARD_EXPIRY.captures(expiry)?;
        let month = caps[1].parse::<u32>().ok()?;
        let year = caps[2].parse::<i32>().ok()?;
        let year = if caps[2].len() == 2 { 2000 + year } else { year };
        (year, month)
    };
    (1..=12).contains(&month).then_some((year, month))
}

/// Expiry in the current month is still valid.
pub fn is_expired(year: i32, month: u32, today: NaiveDate) -> bool {
    (year, month) < (today.year(), today.month())
}

pub(crate) fn card_number_rule(number: &str) -> Result<(), ValidationError> {
    if number.trim().is_empty() {
        return Err(rule_error("required", "Card number is required"));
    }
    if !validate_card_number(number) {
        return Err(rule_error("card_number", "Card number must be 16 digits"));
    }
    Ok(())
}

pub(crate) fn cvv_rule(cvv: &str) -> Result<(), ValidationError> {
    if cvv.trim().is_empty() {
        return Err(rule_error("required", "CVV is required"));
    }
    if !validate_cvv(cvv) {
        return Err(rule_error("cvv", "CVV must be 3 or 4 digits"));
    }
    Ok(())
}

pub(crate) fn holder_name_rule(name: &str) -> Result<(), ValidationError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(rule_error("required", "Cardholder name is required"));
    }
    if name.chars().count() < 3 {
        return Err(rule_error(
            "holder_name",
            "Cardholder name must be at least 3 characters",
        ));
    }
    Ok(())
}

fn rule_error(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(Cow::Borrowed(message));
    err
}

fn derived_errors<T: Validate>(details: &T) -> FieldErrors {
    match details.validate() {
        Ok(()) => FieldErrors::new(),
        Err(errors) => errors.into(),
    }
}

fn validate_card(card: &CardDetails, today: NaiveDate) -> Result<(), FieldErrors> {
    let mut errors = derived_errors(card);

    if card.expiry.trim().is_empty() {
        errors.add("expiry", "Expiry date is required");
    } else {
        match parse_expiry(&card.expiry) {
            None => errors.add("expiry", "Expiry date is invalid"),
            Some((year, month)) if is_expired(year, month, today) => {
                errors.add("expiry", "Card has expired")
            }
            Some(_) => {}
        }
    }

    errors.into_result()
}

fn validate_net_banking(bank: &NetBankingDetails, require_verification: bool) -> Result<(), FieldErrors> {
    let mut errors = derived_errors(bank);
    if bank.bank.trim().is_empty() {
        errors.add("bank", "Please select your bank");
    }
    if errors.is_empty() && require_verification && bank.verified.is_none() {
        errors.add("verification", "Please verify your bank credentials");
    }
    errors.into_result()
}

fn validate_upi(upi: &UpiDetails) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();
    match upi {
        UpiDetails::Id { id, verified } => {
            if id.trim().is_empty() {
                errors.add("upi_id", "UPI ID is required");
            } else if !validate_upi_id(id) {
                errors.add("upi_id", "Please enter a valid UPI ID (e.g. 9876543210@paytm)");
            } else if verified.is_none() {
                errors.add("verification", "Please verify your UPI ID");
            }
        }
        UpiDetails::App(app) => {
            if app.trim().is_empty() {
                errors.add("upi_app", "Please select a UPI app");
            }
        }
    }
    errors.into_result()
}

fn validate_emi(emi: &EmiDetails) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();
    if emi.bank.trim().is_empty() {
        errors.add("bank", "Please select your bank");
    }
    if emi.tenure().is_none() {
        errors.add("tenure", "Please select an EMI tenure of 3, 6 or 12 months");
    }
    errors.into_result()
}
