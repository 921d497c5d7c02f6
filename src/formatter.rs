//! Deterministic rendering of retrieved sales records
//!
//! No model output flows through here. Every numeric claim in a response
//! comes from this module so the figures stay reproducible and auditable.

use crate::models::{QueryField, SalesRecord};
use rust_decimal::Decimal;

/// Fixed reply when retrieval found nothing.
pub const NO_RECORDS_MESSAGE: &str = "未找到相关记录";

/// Render the requested field across a record set: entity, field label,
/// record count, exact total, and one detail line per record.
///
/// The printed total is the arithmetic sum of the printed per-record
/// values; missing numeric fields count as zero.
pub fn format_summary(records: &[SalesRecord], field: QueryField, entity: &str) -> String {
    if records.is_empty() {
        return NO_RECORDS_MESSAGE.to_string();
    }

    let total: Decimal = records.iter().map(|r| r.field_value(field)).sum();

    let mut lines = Vec::with_capacity(records.len() + 2);
    lines.push(format!("{}的{}情况：", entity, field.label()));
    lines.push(format!(
        "找到 {} 条记录，{}合计: {} 元\n",
        records.len(),
        field.label(),
        format_amount(total)
    ));

    for record in records {
        lines.push(format!(
            "- {}: {} 元",
            record.entry_date.format("%Y-%m-%d %H:%M:%S"),
            format_amount(record.field_value(field))
        ));
    }

    lines.join("\n")
}

/// Fixed two decimal places with thousands separators.
pub fn format_amount(value: Decimal) -> String {
    let rounded = value.round_dp(2);
    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    let text = rounded.abs().to_string();

    let (int_part, frac_part) = match text.split_once('.') {
        Some((int_part, frac_part)) => (int_part, frac_part),
        None => (text.as_str(), ""),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let mut frac: String = frac_part.chars().take(2).collect();
    while frac.len() < 2 {
        frac.push('0');
    }

    format!("{}{}.{}", if negative { "-" } else { "" }, grouped, frac)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn record(id: i64, amount: Decimal, received: Option<Decimal>) -> SalesRecord {
        SalesRecord {
            id,
            customer: "北京极客邦有限公司".to_string(),
            entry_date: Utc.with_ymd_and_hms(2024, 3, id as u32, 10, 0, 0).unwrap(),
            amount,
            total_received: received,
            remaining_amount: None,
        }
    }

    #[test]
    fn empty_records_yield_fixed_message() {
        let text = format_summary(&[], QueryField::GrossAmount, "北京极客邦有限公司");
        assert_eq!(text, NO_RECORDS_MESSAGE);
    }

    #[test]
    fn sum_matches_listed_values_with_null_as_zero() {
        // Gross amounts 100.00, 250.50 and a null received treated as zero.
        let records = vec![
            record(1, Decimal::new(10_000, 2), Some(Decimal::new(10_000, 2))),
            record(2, Decimal::new(25_050, 2), Some(Decimal::new(5_000, 2))),
            record(3, Decimal::ZERO, None),
        ];

        let text = format_summary(&records, QueryField::GrossAmount, "北京极客邦有限公司");

        assert!(text.contains("找到 3 条记录"));
        assert!(text.contains("总金额合计: 350.50 元"));
        assert!(text.contains("0.00 元"));

        // Received field: the null entry prints 0.00 and the total is exact.
        let received = format_summary(&records, QueryField::AmountReceived, "北京极客邦有限公司");
        assert!(received.contains("已收金额合计: 150.00 元"));
    }

    #[test]
    fn detail_lines_cover_every_record() {
        let records = vec![
            record(1, Decimal::new(10_000, 2), None),
            record(2, Decimal::new(25_050, 2), None),
        ];

        let text = format_summary(&records, QueryField::GrossAmount, "客户");
        let detail_lines = text.lines().filter(|l| l.starts_with("- ")).count();
        assert_eq!(detail_lines, 2);
        assert!(text.contains("- 2024-03-01 10:00:00: 100.00 元"));
    }

    #[test]
    fn formatting_is_idempotent() {
        let records = vec![record(1, Decimal::new(123_456_789, 2), None)];

        let first = format_summary(&records, QueryField::GrossAmount, "客户");
        let second = format_summary(&records, QueryField::GrossAmount, "客户");

        assert_eq!(first, second);
    }

    #[test]
    fn amounts_get_thousands_separators_and_two_decimals() {
        assert_eq!(format_amount(Decimal::new(123_456_789, 2)), "1,234,567.89");
        assert_eq!(format_amount(Decimal::new(1_000, 0)), "1,000.00");
        assert_eq!(format_amount(Decimal::new(5, 1)), "0.50");
        assert_eq!(format_amount(Decimal::ZERO), "0.00");
        assert_eq!(format_amount(Decimal::new(-123_45, 2)), "-123.45");
    }

    #[test]
    fn rounding_happens_once_at_the_shared_path() {
        // 0.005 rounds bankers-style in Decimal; both the sum and the
        // detail line go through format_amount so they cannot diverge.
        let value = Decimal::new(100_005, 3);
        let records = vec![SalesRecord {
            id: 1,
            customer: "客户".to_string(),
            entry_date: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            amount: value,
            total_received: None,
            remaining_amount: None,
        }];

        let text = format_summary(&records, QueryField::GrossAmount, "客户");
        let printed = format_amount(value);
        assert!(text.matches(&printed).count() >= 2);
    }
}
