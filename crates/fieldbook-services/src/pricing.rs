//! Booking price computation
//!
//! `total = field.price_per_hour * hours + sum(add_on.price_per_hour * quantity * hours)`
//! where `hours` is the interval length rounded up to whole hours. Unit prices
//! are captured on the line items so later price edits never touch a booking.

use fieldbook_core::models::{AddOn, Field, Interval, NewLineItem};
use rust_decimal::Decimal;

/// Computed price of a reservation
#[derive(Debug, Clone, PartialEq)]
pub struct PriceQuote {
    pub billable_hours: i64,
    pub field_total: Decimal,
    pub line_items: Vec<NewLineItem>,
    pub total: Decimal,
}

/// Price a field plus `(add-on, quantity)` pairs over an interval
pub fn quote(field: &Field, interval: &Interval, add_ons: &[(AddOn, i32)]) -> PriceQuote {
    let billable_hours = interval.billable_hours();
    let hours = Decimal::from(billable_hours);
    let field_total = field.price_per_hour * hours;

    let line_items: Vec<NewLineItem> = add_ons
        .iter()
        .map(|(add_on, quantity)| NewLineItem {
            add_on_id: add_on.id,
            quantity: *quantity,
            unit_price: add_on.price_per_hour,
            line_total: add_on.price_per_hour * Decimal::from(*quantity) * hours,
        })
        .collect();

    let total = field_total + line_items.iter().map(|li| li.line_total).sum::<Decimal>();

    PriceQuote {
        billable_hours,
        field_total,
        line_items,
        total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveTime, TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn field(price: Decimal) -> Field {
        Field {
            id: 1,
            place_id: 1,
            name: "Court".to_string(),
            price_per_hour: price,
            opening_time: NaiveTime::MIN,
            closing_time: NaiveTime::MIN,
        }
    }

    fn add_on(id: i64, price: Decimal) -> AddOn {
        AddOn {
            id,
            place_id: 1,
            name: format!("Add-on {}", id),
            price_per_hour: price,
            stock: 10,
        }
    }

    fn interval(start_h: u32, start_m: u32, end_h: u32, end_m: u32) -> Interval {
        Interval::new(
            Utc.with_ymd_and_hms(2025, 5, 1, start_h, start_m, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 5, 1, end_h, end_m, 0).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_two_hours_at_one_hundred() {
        let q = quote(&field(dec!(100)), &interval(10, 0, 12, 0), &[]);

        assert_eq!(q.billable_hours, 2);
        assert_eq!(q.total, dec!(200));
        assert!(q.line_items.is_empty());
    }

    #[test]
    fn test_partial_hour_rounds_up() {
        let q = quote(&field(dec!(80)), &interval(9, 0, 10, 30), &[]);

        assert_eq!(q.billable_hours, 2);
        assert_eq!(q.total, dec!(160));
    }

    #[test]
    fn test_add_ons_are_priced_per_hour_and_unit() {
        let q = quote(
            &field(dec!(100)),
            &interval(10, 0, 12, 0),
            &[(add_on(5, dec!(7.50)), 2), (add_on(6, dec!(3)), 1)],
        );

        assert_eq!(q.line_items[0].unit_price, dec!(7.50));
        assert_eq!(q.line_items[0].line_total, dec!(30.00));
        assert_eq!(q.line_items[1].line_total, dec!(6));
        assert_eq!(q.field_total, dec!(200));
        assert_eq!(q.total, dec!(236.00));
    }
}
