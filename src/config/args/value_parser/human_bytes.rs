use byte_unit::Byte;
use std::str::FromStr;

const UNDER_MIN_VALUE: &str = "must be greater than or equal to 1KiB";
const OVER_MAX_VALUE: &str = "must be smaller than or equal to 256MiB";

const MIN_VALUE: u128 = 1024;
const MAX_VALUE: u128 = 256 * 1024 * 1024;

pub fn check_human_bytes(value: &str) -> Result<String, String> {
    let result = Byte::from_str(value).map_err(|e| e.to_string())?;

    if result.as_u128() < MIN_VALUE {
        return Err(UNDER_MIN_VALUE.to_string());
    }
    if result.as_u128() > MAX_VALUE {
        return Err(OVER_MAX_VALUE.to_string());
    }

    Ok(value.to_string())
}

pub fn parse_human_bytes(value: &str) -> Result<u64, String> {
    check_human_bytes(value)?;

    let result = Byte::from_str(value).map_err(|e| e.to_string())?;
    u64::try_from(result.as_u128()).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_valid_value() {
        init_dummy_tracing_subscriber();

        check_human_bytes("1KiB").unwrap();
        check_human_bytes("1024").unwrap();
        check_human_bytes("1MiB").unwrap();
        check_human_bytes("256MiB").unwrap();
        check_human_bytes("268435456").unwrap();
    }

    #[test]
    fn parse_valid_value() {
        init_dummy_tracing_subscriber();

        assert_eq!(parse_human_bytes("1MiB").unwrap(), 1024 * 1024);
        assert_eq!(parse_human_bytes("64KiB").unwrap(), 64 * 1024);
        assert_eq!(parse_human_bytes("4096").unwrap(), 4096);
    }

    #[test]
    fn check_invalid_value() {
        init_dummy_tracing_subscriber();

        assert!(check_human_bytes("524287a").is_err());
        assert!(check_human_bytes("5Zib").is_err());
    }

    #[test]
    fn check_under_min_value() {
        init_dummy_tracing_subscriber();

        assert_eq!(check_human_bytes("1023").unwrap_err(), UNDER_MIN_VALUE);
    }

    #[test]
    fn check_over_max_value() {
        init_dummy_tracing_subscriber();

        assert_eq!(check_human_bytes("268435457").unwrap_err(), OVER_MAX_VALUE);
        assert_eq!(check_human_bytes("5Eib").unwrap_err(), OVER_MAX_VALUE);
    }

    fn init_dummy_tracing_subscriber() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("dummy=trace")
            .try_init();
    }
}
