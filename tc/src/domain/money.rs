//! Amount formatting

/// Format an amount as rupiah with thousands separators, e.g. `Rp 5,250,000`
pub fn format_amount(amount: f64) -> String {
    let rounded = amount.round();
    let negative = rounded < 0.0;
    let digits = format!("{:.0}", rounded.abs());

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    if negative {
        format!("-Rp {}", grouped)
    } else {
        format!("Rp {}", grouped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(0.0), "Rp 0");
        assert_eq!(format_amount(999.0), "Rp 999");
        assert_eq!(format_amount(1_000.0), "Rp 1,000");
        assert_eq!(format_amount(5_250_000.0), "Rp 5,250,000");
        assert_eq!(format_amount(499_999.6), "Rp 500,000");
        assert_eq!(format_amount(-12_500.0), "-Rp 12,500");
    }
}
