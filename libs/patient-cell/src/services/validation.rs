use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::models::{CreatePatientRequest, Gender, UpdatePatientRequest};

pub const MIN_NAME_CHARS: usize = 2;
pub const MAX_NAME_CHARS: usize = 100;

fn egyptian_mobile() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\+?20|0020)?0?1[0125]\d{8}$").expect("valid mobile regex"))
}

fn international_number() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\+|00)[1-9]\d{7,14}$").expect("valid international regex"))
}

/// Strip the separators people type into phone fields.
pub fn clean_phone(raw: &str) -> String {
    raw.chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')' | '.'))
        .collect()
}

/// The stored form of a phone number. Egyptian mobiles in any prefix style
/// collapse to the local `01xxxxxxxxx` form; other numbers are only cleaned.
pub fn canonical_phone(raw: &str) -> String {
    let phone = clean_phone(raw);
    if egyptian_mobile().is_match(&phone) {
        let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
        format!("0{}", &digits[digits.len() - 10..])
    } else {
        phone
    }
}

pub fn is_valid_phone(raw: &str) -> bool {
    let phone = clean_phone(raw);
    egyptian_mobile().is_match(&phone) || international_number().is_match(&phone)
}

pub fn validate_full_name(name: &str) -> Result<(), String> {
    let length = name.trim().chars().count();
    if !(MIN_NAME_CHARS..=MAX_NAME_CHARS).contains(&length) {
        return Err(format!(
            "Full name must be between {} and {} characters",
            MIN_NAME_CHARS, MAX_NAME_CHARS
        ));
    }
    Ok(())
}

pub fn validate_phone(phone: &str) -> Result<(), String> {
    if is_valid_phone(phone) {
        Ok(())
    } else {
        Err(format!("Invalid phone number: {}", phone.trim()))
    }
}

pub fn validate_date_of_birth(dob: NaiveDate, today: NaiveDate) -> Result<(), String> {
    if dob > today {
        return Err("Date of birth cannot be in the future".to_string());
    }
    Ok(())
}

pub fn validate_gender(gender: &str) -> Result<Gender, String> {
    Gender::parse(gender).ok_or_else(|| "Gender must be male or female".to_string())
}

/// All problems with a new patient, in field order.
pub fn validate_create(request: &CreatePatientRequest, today: NaiveDate) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    if let Err(e) = validate_full_name(&request.full_name) {
        errors.push(e);
    }
    if let Err(e) = validate_phone(&request.phone) {
        errors.push(e);
    }
    if let Some(gender) = &request.gender {
        if let Err(e) = validate_gender(gender) {
            errors.push(e);
        }
    }
    if let Some(dob) = request.date_of_birth {
        if let Err(e) = validate_date_of_birth(dob, today) {
            errors.push(e);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

pub fn validate_update(request: &UpdatePatientRequest, today: NaiveDate) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    if let Some(name) = &request.full_name {
        if let Err(e) = validate_full_name(name) {
            errors.push(e);
        }
    }
    if let Some(phone) = &request.phone {
        if let Err(e) = validate_phone(phone) {
            errors.push(e);
        }
    }
    if let Some(gender) = &request.gender {
        if let Err(e) = validate_gender(gender) {
            errors.push(e);
        }
    }
    if let Some(dob) = request.date_of_birth {
        if let Err(e) = validate_date_of_birth(dob, today) {
            errors.push(e);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
