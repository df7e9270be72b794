//! Display formatting for prices, changes and dates.
//!
//! Prices render as Indian-grouped rupees (last three digits, then pairs):
//! `₹2,500.50`, `₹1,23,456.78`. Missing values render as `N/A`.

use chrono::NaiveDate;

pub fn format_inr(price: Option<f64>) -> String {
    // NaN and infinities have no rupee rendering; treat them as missing.
    let Some(price) = price.filter(|value| value.is_finite()) else {
        return "N/A".to_string();
    };
    let sign = if price < 0.0 { "-" } else { "" };
    let fixed = format!("{:.2}", price.abs());
    let (int_part, frac_part) = fixed
        .split_once('.')
        .expect("fixed-point format of a finite value has a decimal point");
    format!("{sign}₹{}.{frac_part}", group_indian(int_part))
}

pub fn format_change(change: Option<f64>) -> String {
    match change {
        Some(change) => format!("{change:.2}%"),
        None => "N/A".to_string(),
    }
}

pub fn format_change_with_sign(change: Option<f64>) -> String {
    match change {
        Some(change) if change >= 0.0 => format!("+{change:.2}%"),
        Some(change) => format!("{change:.2}%"),
        None => "N/A".to_string(),
    }
}

/// `2025-11-29` -> `29 Nov`. Anything unparseable renders as `N/A`.
pub fn format_date_short(date: &str) -> String {
    match NaiveDate::parse_from_str(date, "%Y-%m-%d") {
        Ok(parsed) => parsed.format("%d %b").to_string(),
        Err(_) => "N/A".to_string(),
    }
}

fn group_indian(digits: &str) -> String {
    if digits.len() <= 3 {
        return digits.to_string();
    }
    let (head, tail) = digits.split_at(digits.len() - 3);
    let mut grouped = Vec::new();
    let bytes = head.as_bytes();
    let mut end = bytes.len();
    while end > 2 {
        grouped.push(&head[end - 2..end]);
        end -= 2;
    }
    grouped.push(&head[..end]);
    grouped.reverse();
    format!("{},{}", grouped.join(","), tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rupee_grouping_uses_indian_digit_pairs() {
        assert_eq!(format_inr(Some(2500.50)), "₹2,500.50");
        assert_eq!(format_inr(Some(123456.78)), "₹1,23,456.78");
        assert_eq!(format_inr(Some(12345678.9)), "₹1,23,45,678.90");
        assert_eq!(format_inr(Some(999.0)), "₹999.00");
        assert_eq!(format_inr(Some(-1234.5)), "-₹1,234.50");
        assert_eq!(format_inr(None), "N/A");
    }

    #[test]
    fn non_finite_prices_render_as_missing() {
        assert_eq!(format_inr(Some(f64::NAN)), "N/A");
        assert_eq!(format_inr(Some(f64::INFINITY)), "N/A");
        assert_eq!(format_inr(Some(f64::NEG_INFINITY)), "N/A");
    }

    #[test]
    fn change_formats_with_and_without_sign() {
        assert_eq!(format_change(Some(5.25)), "5.25%");
        assert_eq!(format_change(None), "N/A");
        assert_eq!(format_change_with_sign(Some(5.25)), "+5.25%");
        assert_eq!(format_change_with_sign(Some(-1.5)), "-1.50%");
        assert_eq!(format_change_with_sign(Some(0.0)), "+0.00%");
    }

    #[test]
    fn short_dates_render_day_and_month() {
        assert_eq!(format_date_short("2025-11-29"), "29 Nov");
        assert_eq!(format_date_short("not-a-date"), "N/A");
    }
}
