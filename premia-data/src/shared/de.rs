use serde::{Deserialize, Deserializer};

// Deserialize a `String` as the desired type.
pub fn de_str<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::de::Deserializer<'de>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let data: &str = serde::de::Deserialize::deserialize(deserializer)?;
    data.parse::<T>().map_err(serde::de::Error::custom)
}

// Deserialise a optional str. For example value to deserialise is "69.69". This
// de will return Some(69.69) if exists. None the value you are de has to be a string.
pub fn de_str_optional<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let s: Option<&str> = Option::deserialize(deserializer)?;
    match s {
        Some(s) => s.parse::<T>().map(Some).map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StrOrNum {
    Str(String),
    Num(f64),
}

impl StrOrNum {
    fn into_f64(self) -> Option<f64> {
        match self {
            StrOrNum::Str(s) => s.trim().parse::<f64>().ok(),
            StrOrNum::Num(n) => Some(n),
        }
    }
}

// Venues are inconsistent about quoting numbers, "1.23" and 1.23 both show up
// (sometimes in the same payload). Unparseable or non finite input becomes 0.0
// so callers can reject it with a positivity check.
pub fn de_flexible_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = StrOrNum::deserialize(deserializer)?;
    Ok(value
        .into_f64()
        .filter(|value| value.is_finite())
        .unwrap_or(0.0))
}

// Same as above but absent or null stays None.
pub fn de_flexible_f64_optional<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<StrOrNum> = Option::deserialize(deserializer)?;
    Ok(value
        .and_then(StrOrNum::into_f64)
        .filter(|value| value.is_finite()))
}

// Some venues send a single object where they usually send a list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item],
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Deserialize)]
    struct Sample {
        #[serde(deserialize_with = "de_flexible_f64")]
        price: f64,
        #[serde(default, deserialize_with = "de_flexible_f64_optional")]
        fee: Option<f64>,
    }

    #[test]
    fn test_de_flexible_f64() {
        struct TestCase {
            name: &'static str,
            input: &'static str,
            price: f64,
            fee: Option<f64>,
        }

        let cases = vec![
            TestCase {
                name: "quoted",
                input: r#"{"price": "101.5", "fee": "0.1"}"#,
                price: 101.5,
                fee: Some(0.1),
            },
            TestCase {
                name: "bare numbers",
                input: r#"{"price": 7, "fee": 0}"#,
                price: 7.0,
                fee: Some(0.0),
            },
            TestCase {
                name: "garbage price, missing fee",
                input: r#"{"price": "n/a"}"#,
                price: 0.0,
                fee: None,
            },
            TestCase {
                name: "null fee",
                input: r#"{"price": "1", "fee": null}"#,
                price: 1.0,
                fee: None,
            },
        ];

        for case in cases {
            let sample: Sample = serde_json::from_str(case.input).unwrap();
            assert_eq!(sample.price, case.price, "{}", case.name);
            assert_eq!(sample.fee, case.fee, "{}", case.name);
        }
    }

    #[test]
    fn test_one_or_many() {
        let one: OneOrMany<u32> = serde_json::from_str("7").unwrap();
        let many: OneOrMany<u32> = serde_json::from_str("[1, 2]").unwrap();
        assert_eq!(one.into_vec(), vec![7]);
        assert_eq!(many.into_vec(), vec![1, 2]);
    }
}
