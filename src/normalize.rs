//! Text normalizers turning raw scraped strings into typed values.
//!
//! Every function here is pure: no state, no I/O. Extraction and
//! enrichment merge both go through these, so a value accepted during a
//! crawl is accepted the same way when it comes back from the inference
//! provider.

use std::sync::LazyLock;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use regex::Regex;

static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

static DISALLOWED_CHARS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"[^\w\s\-.,:;()\[\]{}!?@#$%^&*+=<>/\\|`~"'²]"#).expect("valid regex")
});

static BILLION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)?)\s*t[ỷy]").expect("valid regex"));
static MILLION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)?)\s*(?:triệu|tr\b)").expect("valid regex"));
static THOUSAND_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)?)\s*(?:nghìn|ngàn|k\b)").expect("valid regex"));
static PLAIN_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d+(?:\.\d+)?)\s*(?:đ|vnd|vnđ)?\s*$").expect("valid regex"));

static AREA_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+(?:\.\d+)?)\s*(?:m²|m\s*2|mét\s*vuông|met\s*vuong)").expect("valid regex")
});

static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:\+84|84|0)(\d{9,10})").expect("valid regex"));

static BEDROOM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+)\s*(?:phòng\s*ngủ|pn|bed(?:room)?s?\b|ngủ|phòng)").expect("valid regex")
});
static BATHROOM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+)\s*(?:phòng\s*tắm|phòng\s*vệ\s*sinh|wc|toilet|bath(?:room)?s?\b|tắm|vệ\s*sinh|phòng)")
        .expect("valid regex")
});

static FRONTAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)?)\s*m(?:[^²2]|$)").expect("valid regex"));

static DMY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{1,2})[/-](\d{1,2})[/-](\d{4})").expect("valid regex"));
static YMD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4})[/-](\d{1,2})[/-](\d{1,2})").expect("valid regex"));
static DAYS_AGO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*ngày\s*trước").expect("valid regex"));
static HOURS_AGO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*giờ\s*trước").expect("valid regex"));
static MINUTES_AGO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*phút\s*trước").expect("valid regex"));

static CITY_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:tp\.?\s*|thành phố\s*|tỉnh\s*|huyện\s*)").expect("valid regex")
});
static COUNTRY_SUFFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:việt nam|vietnam|vn)$").expect("valid regex"));

const CITY_ALIASES: &[(&str, &str)] = &[
    ("hồ chí minh", "Hồ Chí Minh"),
    ("tphcm", "Hồ Chí Minh"),
    ("hcm", "Hồ Chí Minh"),
    ("ho chi minh", "Hồ Chí Minh"),
    ("sài gòn", "Hồ Chí Minh"),
    ("sai gon", "Hồ Chí Minh"),
    ("hà nội", "Hà Nội"),
    ("ha noi", "Hà Nội"),
    ("hanoi", "Hà Nội"),
    ("đà nẵng", "Đà Nẵng"),
    ("da nang", "Đà Nẵng"),
    ("danang", "Đà Nẵng"),
    ("hải phòng", "Hải Phòng"),
    ("hai phong", "Hải Phòng"),
    ("cần thơ", "Cần Thơ"),
    ("can tho", "Cần Thơ"),
    ("biên hòa", "Biên Hòa"),
    ("bien hoa", "Biên Hòa"),
    ("nha trang", "Nha Trang"),
    ("vũng tàu", "Vũng Tàu"),
    ("vung tau", "Vũng Tàu"),
    ("huế", "Huế"),
    ("hue", "Huế"),
];

/// Listing categories accepted for `property_type`.
pub const PROPERTY_TYPES: &[&str] = &[
    "căn hộ",
    "nhà phố",
    "đất nền",
    "biệt thự",
    "shophouse",
    "kho xưởng",
];

/// Collapses whitespace and strips characters that never appear in
/// listing text. Returns `None` when nothing is left.
pub fn clean_text(text: &str) -> Option<String> {
    let collapsed = WHITESPACE_RE.replace_all(text.trim(), " ");
    let cleaned = DISALLOWED_CHARS_RE.replace_all(&collapsed, "");
    let cleaned = cleaned.trim();
    (!cleaned.is_empty()).then(|| cleaned.to_string())
}

/// Parses a price in VND. Understands `"12 tỷ 500 triệu"`, `"3,5 tỷ"`,
/// `"800 triệu"`, `"50k"` and bare numbers.
pub fn parse_price(text: &str) -> Option<f64> {
    let text = text.to_lowercase().replace(',', ".");

    let unit = |re: &Regex, multiplier: f64| {
        re.captures(&text)
            .and_then(|caps| caps[1].parse::<f64>().ok())
            .map(|value| value * multiplier)
    };

    let total: f64 = [
        unit(&BILLION_RE, 1_000_000_000.0),
        unit(&MILLION_RE, 1_000_000.0),
        unit(&THOUSAND_RE, 1_000.0),
    ]
    .into_iter()
    .flatten()
    .sum();

    if total > 0.0 {
        return Some(total);
    }

    // Bare numbers: thousands separators are dots in Vietnamese listings.
    let digits_only = text.replace('.', "");
    PLAIN_NUMBER_RE
        .captures(&digits_only)
        .and_then(|caps| caps[1].parse::<f64>().ok())
        .filter(|value| *value > 0.0)
}

/// Parses an area in square meters (`"85 m²"`, `"85,5m2"`, `"40 mét vuông"`).
/// Bare positive numbers are accepted as square meters.
pub fn parse_area(text: &str) -> Option<f64> {
    let text = text.to_lowercase().replace(',', ".");
    AREA_RE
        .captures(&text)
        .and_then(|caps| caps[1].parse::<f64>().ok())
        .or_else(|| text.trim().parse::<f64>().ok())
        .filter(|value| value.is_finite() && *value > 0.0)
}

/// Extracts a Vietnamese phone number normalized to `0xxxxxxxxx`.
pub fn parse_phone(text: &str) -> Option<String> {
    let compact: String = text
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-' && *c != '.')
        .collect();
    PHONE_RE
        .captures(&compact)
        .map(|caps| format!("0{}", &caps[1]))
}

fn parse_count(text: &str, re: &Regex) -> Option<u32> {
    let text = text.to_lowercase();
    re.captures(&text)
        .and_then(|caps| caps[1].parse().ok())
        .or_else(|| text.trim().parse().ok())
}

/// Parses a bedroom count (`"3 phòng ngủ"`, `"2PN"`, `"4 bedrooms"`, `"2"`).
pub fn parse_bedrooms(text: &str) -> Option<u32> {
    parse_count(text, &BEDROOM_RE)
}

/// Parses a bathroom count (`"2 WC"`, `"1 bath"`, `"3 phòng tắm"`, `"2"`).
pub fn parse_bathrooms(text: &str) -> Option<u32> {
    parse_count(text, &BATHROOM_RE)
}

/// Parses a frontage width in meters (`"7"`, `"7.5m"`, `"mặt tiền 5 m"`).
pub fn parse_frontage(text: &str) -> Option<f64> {
    let text = text.trim().to_lowercase().replace(',', ".");
    text.parse::<f64>()
        .ok()
        .or_else(|| {
            FRONTAGE_RE
                .captures(&text)
                .and_then(|caps| caps[1].parse::<f64>().ok())
        })
        .filter(|value| value.is_finite() && *value >= 0.0)
}

/// Parses a post date. Absolute `dd/mm/yyyy`, `yyyy-mm-dd` and relative
/// Vietnamese/English phrases are resolved against `now`.
pub fn parse_date(text: &str, now: DateTime<Utc>) -> Option<NaiveDate> {
    let text = text.trim().to_lowercase();

    if let Some(caps) = YMD_RE.captures(&text) {
        return NaiveDate::from_ymd_opt(
            caps[1].parse().ok()?,
            caps[2].parse().ok()?,
            caps[3].parse().ok()?,
        );
    }
    if let Some(caps) = DMY_RE.captures(&text) {
        return NaiveDate::from_ymd_opt(
            caps[3].parse().ok()?,
            caps[2].parse().ok()?,
            caps[1].parse().ok()?,
        );
    }

    // Out-of-range offsets yield None rather than overflowing
    let ago = |re: &Regex, unit: fn(i64) -> Option<Duration>| {
        re.captures(&text)
            .and_then(|caps| caps[1].parse::<i64>().ok())
            .and_then(unit)
            .and_then(|offset| now.checked_sub_signed(offset))
            .map(|date| date.date_naive())
    };

    if text.contains("hôm nay") || text.contains("today") {
        Some(now.date_naive())
    } else if text.contains("hôm qua") || text.contains("yesterday") {
        Some((now - Duration::days(1)).date_naive())
    } else if text.contains("tuần") && text.contains("trước") {
        Some((now - Duration::days(7)).date_naive())
    } else {
        ago(&DAYS_AGO_RE, Duration::try_days)
            .or_else(|| ago(&HOURS_AGO_RE, Duration::try_hours))
            .or_else(|| ago(&MINUTES_AGO_RE, Duration::try_minutes))
    }
}

/// Extracts the city from a comma separated address, mapping common
/// spellings onto a canonical name.
pub fn extract_city(address: &str) -> Option<String> {
    let last = address.rsplit(',').next().unwrap_or(address).trim();
    let stripped = CITY_PREFIX_RE.replace(last, "");
    let lowered = stripped.to_lowercase();

    if let Some((_, canonical)) = CITY_ALIASES
        .iter()
        .find(|(alias, _)| lowered.contains(alias))
    {
        return Some((*canonical).to_string());
    }

    let city = COUNTRY_SUFFIX_RE.replace(stripped.trim(), "");
    clean_text(&city)
}

/// Maps free text onto one of [`PROPERTY_TYPES`]. Unknown non-empty
/// categories fall back to `"căn hộ"`.
pub fn normalize_property_type(text: &str) -> Option<String> {
    let lowered = text.trim().to_lowercase();
    if lowered.is_empty() {
        return None;
    }
    let matched = PROPERTY_TYPES
        .iter()
        .find(|known| lowered == **known)
        .or_else(|| {
            PROPERTY_TYPES
                .iter()
                .find(|known| lowered.contains(**known) || known.contains(lowered.as_str()))
        })
        .copied()
        .unwrap_or("căn hộ");
    Some(matched.to_string())
}

/// Returns true for absolute `http`/`https` URLs with a host.
pub fn is_valid_url(text: &str) -> bool {
    url::Url::parse(text)
        .map(|url| matches!(url.scheme(), "http" | "https") && url.host_str().is_some())
        .unwrap_or(false)
}

/// Rounds to two decimals.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 20, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_clean_text_collapses_whitespace() {
        assert_eq!(clean_text("  Nhà   phố\n Quận 1 "), Some("Nhà phố Quận 1".to_string()));
        assert_eq!(clean_text("   "), None);
    }

    #[test]
    fn test_parse_price_units() {
        assert_eq!(parse_price("3,5 tỷ"), Some(3_500_000_000.0));
        assert_eq!(parse_price("12 tỷ 500 triệu"), Some(12_500_000_000.0));
        assert_eq!(parse_price("800 triệu"), Some(800_000_000.0));
        assert_eq!(parse_price("50k"), Some(50_000.0));
        assert_eq!(parse_price("1.200.000.000"), Some(1_200_000_000.0));
    }

    #[test]
    fn test_parse_price_rejects_garbage() {
        assert_eq!(parse_price("thỏa thuận"), None);
        assert_eq!(parse_price("not-a-price"), None);
        assert_eq!(parse_price(""), None);
    }

    #[test]
    fn test_parse_area() {
        assert_eq!(parse_area("85 m²"), Some(85.0));
        assert_eq!(parse_area("85,5m2"), Some(85.5));
        assert_eq!(parse_area("40 mét vuông"), Some(40.0));
        assert_eq!(parse_area("120"), Some(120.0));
        assert_eq!(parse_area("rộng"), None);
        assert_eq!(parse_area("-5"), None);
    }

    #[test]
    fn test_parse_phone_normalizes_prefix() {
        assert_eq!(parse_phone("Gọi 0912 345 678"), Some("0912345678".to_string()));
        assert_eq!(parse_phone("+84 912-345-678"), Some("0912345678".to_string()));
        assert_eq!(parse_phone("no phone"), None);
    }

    #[test]
    fn test_parse_rooms() {
        assert_eq!(parse_bedrooms("3 phòng ngủ"), Some(3));
        assert_eq!(parse_bedrooms("2PN"), Some(2));
        assert_eq!(parse_bedrooms("4"), Some(4));
        assert_eq!(parse_bathrooms("2 WC"), Some(2));
        assert_eq!(parse_bathrooms("1 bath"), Some(1));
        assert_eq!(parse_bathrooms("nhiều"), None);
    }

    #[test]
    fn test_parse_frontage() {
        assert_eq!(parse_frontage("7"), Some(7.0));
        assert_eq!(parse_frontage("7,5m"), Some(7.5));
        assert_eq!(parse_frontage("mặt tiền 5 m"), Some(5.0));
        assert_eq!(parse_frontage("rộng"), None);
    }

    #[test]
    fn test_parse_date_absolute_and_relative() {
        assert_eq!(parse_date("15/03/2024", now()), NaiveDate::from_ymd_opt(2024, 3, 15));
        assert_eq!(parse_date("2024-03-15", now()), NaiveDate::from_ymd_opt(2024, 3, 15));
        assert_eq!(parse_date("Hôm nay", now()), NaiveDate::from_ymd_opt(2024, 5, 20));
        assert_eq!(parse_date("hôm qua", now()), NaiveDate::from_ymd_opt(2024, 5, 19));
        assert_eq!(parse_date("3 ngày trước", now()), NaiveDate::from_ymd_opt(2024, 5, 17));
        assert_eq!(parse_date("31/02/2024", now()), None);
        assert_eq!(parse_date("sometime", now()), None);
    }

    #[test]
    fn test_parse_date_out_of_range_offset_is_none() {
        assert_eq!(parse_date("1000000000 ngày trước", now()), None);
        assert_eq!(parse_date("99999999999999 ngày trước", now()), None);
        assert_eq!(parse_date("999999999999999999 giờ trước", now()), None);
        assert_eq!(parse_date("99999999999999999999 phút trước", now()), None);
        assert_eq!(parse_date("2 giờ trước", now()), NaiveDate::from_ymd_opt(2024, 5, 20));
    }

    #[test]
    fn test_extract_city() {
        assert_eq!(
            extract_city("12 Lê Lợi, Quận 1, TP. Hồ Chí Minh"),
            Some("Hồ Chí Minh".to_string())
        );
        assert_eq!(extract_city("Phường 5, Hanoi"), Some("Hà Nội".to_string()));
        assert_eq!(extract_city("Khu A, Tỉnh Bình Dương"), Some("Bình Dương".to_string()));
    }

    #[test]
    fn test_normalize_property_type() {
        assert_eq!(normalize_property_type("Biệt thự"), Some("biệt thự".to_string()));
        assert_eq!(normalize_property_type("nhà phố liền kề"), Some("nhà phố".to_string()));
        assert_eq!(normalize_property_type("penthouse"), Some("căn hộ".to_string()));
        assert_eq!(normalize_property_type(" "), None);
    }

    #[test]
    fn test_is_valid_url() {
        assert!(is_valid_url("https://mogi.vn/abc"));
        assert!(!is_valid_url("/relative/path"));
        assert!(!is_valid_url("ftp://mogi.vn/abc"));
        assert!(!is_valid_url(""));
    }
}
